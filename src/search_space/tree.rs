//! Group trees: the materialized feasible assignments of one
//! independent parameter group.
//!
//! A node at depth `d` holds one feasible value of the group's `d`-th
//! parameter; a root→leaf path is one feasible partial assignment.
//! Parents own their children, so the structure is strictly rooted and
//! needs no back-references.

use crate::parameter::Parameter;
use crate::range::Range;
use crate::value::{Configuration, Value};

/// Payload of a tree node.
#[derive(Debug, Clone)]
pub(crate) enum NodeData {
    /// Group roots carry no value.
    Root,
    /// One feasible value of the parameter at this depth.
    Value(Value),
    /// Compressed form: a single-parameter unconstrained group stores
    /// its whole range in one child instead of one node per value.
    Range(Range),
}

#[derive(Debug)]
pub(crate) struct Node {
    pub(crate) data: NodeData,
    pub(crate) children: Vec<Node>,
    /// Number of logical leaves below this node; leaves count 1.
    /// The compressed Range child also counts 1; its parent root
    /// carries the range length instead.
    pub(crate) num_leafs: u64,
}

impl Node {
    pub(crate) fn new(data: NodeData) -> Self {
        Node {
            data,
            children: Vec::new(),
            num_leafs: 0,
        }
    }
}

/// One materialized group: its tree plus, when index access is
/// enabled, the ordered feasible partial assignments at the leaves.
#[derive(Debug)]
pub(crate) struct GroupTree {
    pub(crate) root: Node,
    pub(crate) leaf_count: u64,
    /// `partial_leafs[leaf]` lists the values along the root→leaf path
    /// in the group's parameter order. Empty for compressed groups,
    /// where the range itself resolves indices.
    pub(crate) partial_leafs: Vec<Vec<Value>>,
}

/// Materializes the tree for one group of parameters (declaration
/// order), pruning every branch with no feasible descendant path.
pub(crate) fn build_group_tree(members: &[&Parameter], collect_leafs: bool) -> GroupTree {
    if members.len() == 1 && members[0].constraint().is_none() {
        let range = members[0].range().clone();
        let leaf_count = range.len();
        let mut child = Node::new(NodeData::Range(range));
        child.num_leafs = 1;
        let mut root = Node::new(NodeData::Root);
        root.children.push(child);
        root.num_leafs = leaf_count;
        return GroupTree {
            root,
            leaf_count,
            partial_leafs: Vec::new(),
        };
    }

    let mut root = Node::new(NodeData::Root);
    let mut partial = Configuration::new();
    let mut path = Vec::new();
    let mut partial_leafs = Vec::new();
    let leaf_count = expand(
        members,
        0,
        &mut partial,
        &mut path,
        &mut root,
        collect_leafs,
        &mut partial_leafs,
    );
    root.num_leafs = leaf_count;
    GroupTree {
        root,
        leaf_count,
        partial_leafs,
    }
}

/// Depth-first enumeration of feasible values for `members[depth]`
/// under the ancestor assignment in `partial`. Returns the number of
/// leaves attached below `parent`; children without any feasible
/// descendant path are not attached at all.
fn expand(
    members: &[&Parameter],
    depth: usize,
    partial: &mut Configuration,
    path: &mut Vec<Value>,
    parent: &mut Node,
    collect_leafs: bool,
    leafs: &mut Vec<Vec<Value>>,
) -> u64 {
    let param = members[depth];
    let mut added = 0;
    for value in param.range().iter() {
        partial.insert(param.name().to_string(), value.clone());
        if let Some(constraint) = param.constraint() {
            if !constraint.is_satisfied(partial) {
                continue;
            }
        }

        let mut child = Node::new(NodeData::Value(value.clone()));
        if depth + 1 < members.len() {
            path.push(value);
            let below = expand(
                members,
                depth + 1,
                partial,
                path,
                &mut child,
                collect_leafs,
                leafs,
            );
            path.pop();
            if below > 0 {
                child.num_leafs = below;
                parent.children.push(child);
                added += below;
            }
        } else {
            child.num_leafs = 1;
            parent.children.push(child);
            added += 1;
            if collect_leafs {
                let mut leaf = path.clone();
                leaf.push(value);
                leafs.push(leaf);
            }
        }
    }
    partial.remove(param.name());
    added
}
