//! # Constrained Search Space
//!
//! Turns an ordered list of [`Parameter`]s into a compact, indexable
//! structure whose size is exactly the number of feasible
//! configurations.
//!
//! ## Construction
//!
//! ```text
//! Parameters (declaration order)
//!     ↓ validate names + constraint references
//! Reachability matrix (Floyd–Warshall, direction conflict = circular)
//!     ↓ connected components (undirected projection)
//! Independent groups, materialized as trees (rayon, one task per group)
//!     ↓
//! Chain of trees + per-group leaf tables (optional, for index access)
//! ```
//!
//! Each group tree enumerates the group's feasible partial assignments;
//! a single-parameter unconstrained group is compressed to one child
//! node carrying the range itself. The feasible-space size is the
//! product of the groups' leaf counts.
//!
//! ## Addressing
//!
//! * **Coordinates**: a vector in `(0,1]^D`, one component per
//!   parameter, resolved by weighted descent over `num_leafs`.
//! * **Index**: a dense integer in `[0, constrained_size)`, resolved
//!   by mixed-radix decomposition over the groups (last group least
//!   significant). Requires `enable_index_access` at build time.

mod tree;

use crate::error::{ConfigurationError, DomainError};
use crate::parameter::Parameter;
use crate::value::Configuration;
use rayon::prelude::*;
use std::collections::HashSet;
use tracing::debug;

pub(crate) use tree::{GroupTree, Node, NodeData};
use tree::build_group_tree;

/// Directed reachability between two parameters' constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reach {
    Unreachable,
    Referencing,
    ReferencedBy,
}

/// The constrained space of feasible configurations. Immutable after
/// construction; addressing never mutates, so shared references are
/// safe across threads.
#[derive(Debug)]
pub struct SearchSpace {
    parameters: Vec<Parameter>,
    /// Parameter names in chain-of-trees layer order (groups
    /// concatenated, declaration order within each group).
    layer_names: Vec<String>,
    trees: Vec<GroupTree>,
    constrained_size: u128,
    unconstrained_size: u128,
    index_access: bool,
}

impl SearchSpace {
    /// Builds the search space. `enable_index_access` additionally
    /// records the ordered feasible partial assignments per group so
    /// configurations can be resolved from dense integer indices.
    pub fn build(
        parameters: Vec<Parameter>,
        enable_index_access: bool,
    ) -> Result<Self, ConfigurationError> {
        let num_params = parameters.len();

        let mut seen = HashSet::new();
        for param in &parameters {
            if !seen.insert(param.name().to_string()) {
                return Err(ConfigurationError::DuplicateParameterName(
                    param.name().to_string(),
                ));
            }
        }

        // Constraints may reference only themselves and parameters
        // declared earlier.
        let mut declared: HashSet<&str> = HashSet::new();
        let mut references: Vec<HashSet<&str>> = Vec::with_capacity(num_params);
        for param in &parameters {
            declared.insert(param.name());
            let mut refs = HashSet::new();
            if let Some(constraint) = param.constraint() {
                for name in constraint.references() {
                    refs.insert(name.as_str());
                }
                if !refs.contains(param.name()) {
                    return Err(ConfigurationError::ConstraintMissingSelf(
                        param.name().to_string(),
                    ));
                }
                let mut undeclared: Vec<&str> = refs
                    .iter()
                    .filter(|name| !declared.contains(*name))
                    .copied()
                    .collect();
                if !undeclared.is_empty() {
                    undeclared.sort_unstable();
                    return Err(ConfigurationError::UndeclaredConstraintReference {
                        name: param.name().to_string(),
                        undeclared: undeclared.join(", "),
                    });
                }
                refs.remove(param.name());
            }
            references.push(refs);
        }

        let reach = transitive_closure(&parameters, &references)?;
        let groups = independent_groups(num_params, &reach);

        let layer_names: Vec<String> = groups
            .iter()
            .flatten()
            .map(|&i| parameters[i].name().to_string())
            .collect();
        let unconstrained_size = if groups.is_empty() {
            0
        } else {
            parameters
                .iter()
                .map(|p| u128::from(p.range().len()))
                .product()
        };

        let trees: Vec<GroupTree> = groups
            .par_iter()
            .map(|group| {
                let members: Vec<&Parameter> = group.iter().map(|&i| &parameters[i]).collect();
                build_group_tree(&members, enable_index_access)
            })
            .collect();

        let constrained_size = if trees.is_empty() {
            0
        } else {
            trees.iter().map(|t| u128::from(t.leaf_count)).product()
        };

        debug!(
            parameters = num_params,
            groups = trees.len(),
            constrained_size,
            unconstrained_size,
            "search space built"
        );

        Ok(SearchSpace {
            parameters,
            layer_names,
            trees,
            constrained_size,
            unconstrained_size,
            index_access: enable_index_access,
        })
    }

    /// Number of feasible configurations.
    pub fn constrained_size(&self) -> u128 {
        self.constrained_size
    }

    /// Cartesian-product size, ignoring constraints.
    pub fn unconstrained_size(&self) -> u128 {
        self.unconstrained_size
    }

    /// Dimensionality `D` of the coordinate space.
    pub fn num_parameters(&self) -> usize {
        self.parameters.len()
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn index_access_enabled(&self) -> bool {
        self.index_access
    }

    /// JSON descriptors of all parameters, declaration order.
    pub fn parameter_descriptors(&self) -> Vec<serde_json::Value> {
        self.parameters.iter().map(Parameter::descriptor).collect()
    }

    /// Resolves a coordinate vector in `(0,1]^D` to a configuration.
    ///
    /// Each component addresses one chain-of-trees layer: compressed
    /// range children map `c` to `ceil(c · len) − 1`, everything else
    /// descends into the child whose `num_leafs` slice covers
    /// `c · num_leafs`.
    pub fn configuration_by_coordinates(
        &self,
        coordinates: &[f64],
    ) -> Result<Configuration, DomainError> {
        if self.constrained_size == 0 {
            return Err(DomainError::EmptySearchSpace);
        }
        if coordinates.len() != self.parameters.len() {
            return Err(DomainError::WrongDimensionality {
                expected: self.parameters.len(),
                got: coordinates.len(),
            });
        }
        if let Some(&c) = coordinates.iter().find(|c| !(**c > 0.0 && **c <= 1.0)) {
            return Err(DomainError::CoordinateOutOfRange(c));
        }

        let mut config = Configuration::new();
        let mut layer = 0;
        for tree in &self.trees {
            let mut node = &tree.root;
            loop {
                match node.children.as_slice() {
                    [] => break,
                    [child] if matches!(child.data, NodeData::Range(_)) => {
                        let NodeData::Range(range) = &child.data else {
                            break;
                        };
                        let index = (coordinates[layer] * range.len() as f64).ceil() as u64 - 1;
                        config.insert(self.layer_names[layer].clone(), range.get(index)?);
                        layer += 1;
                        break;
                    }
                    children => {
                        let target = coordinates[layer] * node.num_leafs as f64;
                        let mut num_left_leafs = 0u64;
                        let mut chosen = None;
                        for child in children {
                            if (num_left_leafs as f64) < target
                                && target <= (num_left_leafs + child.num_leafs) as f64
                            {
                                chosen = Some(child);
                                break;
                            }
                            num_left_leafs += child.num_leafs;
                        }
                        let child = match chosen {
                            Some(child) => child,
                            None => &children[children.len() - 1],
                        };
                        if let NodeData::Value(value) = &child.data {
                            config.insert(self.layer_names[layer].clone(), value.clone());
                        }
                        node = child;
                        layer += 1;
                    }
                }
            }
        }
        Ok(config)
    }

    /// Resolves a dense index in `[0, constrained_size)` to a
    /// configuration. Requires index access to have been enabled.
    pub fn configuration_by_index(&self, index: u64) -> Result<Configuration, DomainError> {
        if u128::from(index) >= self.constrained_size {
            return Err(DomainError::IndexOutOfRange {
                index,
                size: u64::try_from(self.constrained_size).unwrap_or(u64::MAX),
            });
        }
        if !self.index_access {
            return Err(DomainError::IndexAccessDisabled);
        }

        // One local index per group; the last group is the
        // least-significant digit.
        let mut locals = vec![0u64; self.trees.len()];
        let mut divisor: u128 = 1;
        for (g, tree) in self.trees.iter().enumerate().rev() {
            locals[g] = ((u128::from(index) / divisor) % u128::from(tree.leaf_count)) as u64;
            divisor *= u128::from(tree.leaf_count);
        }

        let mut config = Configuration::new();
        let mut layer = 0;
        for (tree, local) in self.trees.iter().zip(locals) {
            match tree.root.children.as_slice() {
                [child] if matches!(child.data, NodeData::Range(_)) => {
                    let NodeData::Range(range) = &child.data else {
                        continue;
                    };
                    config.insert(self.layer_names[layer].clone(), range.get(local)?);
                    layer += 1;
                }
                _ => {
                    for value in &tree.partial_leafs[local as usize] {
                        config.insert(self.layer_names[layer].clone(), value.clone());
                        layer += 1;
                    }
                }
            }
        }
        Ok(config)
    }

    #[cfg(test)]
    pub(crate) fn trees(&self) -> &[GroupTree] {
        &self.trees
    }
}

/// Floyd–Warshall closure over the constraint-reference matrix. A
/// transitive edge whose direction disagrees with an existing one
/// means two parameters reference each other through some chain.
fn transitive_closure(
    parameters: &[Parameter],
    references: &[HashSet<&str>],
) -> Result<Vec<Vec<Reach>>, ConfigurationError> {
    let n = parameters.len();
    let index_of = |name: &str| parameters.iter().position(|p| p.name() == name);

    let mut reach = vec![vec![Reach::Unreachable; n]; n];
    for (i, refs) in references.iter().enumerate() {
        for name in refs {
            let Some(j) = index_of(name) else { continue };
            reach[i][j] = Reach::Referencing;
            reach[j][i] = Reach::ReferencedBy;
        }
    }

    for k in 0..n {
        for i in 0..n {
            for j in 0..n {
                if reach[i][k] != Reach::Unreachable && reach[i][k] == reach[k][j] {
                    let transitive = reach[i][k];
                    if reach[i][j] == Reach::Unreachable {
                        reach[i][j] = transitive;
                    } else if reach[i][j] != transitive {
                        return Err(ConfigurationError::CircularConstraint(
                            parameters[i].name().to_string(),
                            parameters[j].name().to_string(),
                        ));
                    }
                }
            }
        }
    }
    Ok(reach)
}

/// Connected components of the undirected reachability projection,
/// emitted in order of their first-declared parameter; members stay in
/// declaration order.
fn independent_groups(num_params: usize, reach: &[Vec<Reach>]) -> Vec<Vec<usize>> {
    let mut ungrouped: Vec<usize> = (0..num_params).collect();
    let mut groups = Vec::new();
    while let Some(&seed) = ungrouped.first() {
        let mut in_group = vec![false; num_params];
        let mut frontier = vec![seed];
        while let Some(i) = frontier.pop() {
            in_group[i] = true;
            ungrouped.retain(|&x| x != i);
            for &j in &ungrouped {
                if reach[i][j] != Reach::Unreachable && !frontier.contains(&j) {
                    frontier.push(j);
                }
            }
        }
        groups.push((0..num_params).filter(|&i| in_group[i]).collect());
    }
    groups
}
