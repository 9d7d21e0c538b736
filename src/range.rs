//! # Value Ranges
//!
//! A [`Range`] is the finite, ordered sequence of values a tuning
//! parameter may take: either an [interval](Range::interval) over
//! numbers or an explicit [set](Range::set) of arbitrary values.
//!
//! Intervals use integer arithmetic when start, end, and step are all
//! integral. As soon as one bound is a float the interval re-indexes
//! internally to `[0, n)` with unit step and materializes values as
//! `start + k * step`, which keeps indexed access exact under float
//! rounding. An optional generator post-transforms every value, e.g.
//! to enumerate powers of two.
//!
//! ```
//! use tunekit::range::{Generator, Range};
//! use tunekit::value::Value;
//!
//! let threads = Range::interval(1, 16).unwrap();
//! assert_eq!(threads.len(), 16);
//!
//! let tile = Range::interval(0, 5)
//!     .unwrap()
//!     .with_generator(Generator::labeled("1 << i", |v| {
//!         Value::Int(1 << v.as_int().unwrap())
//!     }));
//! assert_eq!(tile.get(3).unwrap(), Value::Int(8));
//! ```

use crate::error::{ConfigurationError, DomainError};
use crate::value::Value;
use serde_json::json;
use std::fmt;
use std::sync::Arc;

/// A numeric interval bound; integers and floats mix freely.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn is_float(self) -> bool {
        matches!(self, Num::Float(_))
    }

    fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }

    fn to_value(self) -> Value {
        match self {
            Num::Int(i) => Value::Int(i),
            Num::Float(f) => Value::Float(f),
        }
    }
}

impl From<i64> for Num {
    fn from(v: i64) -> Self {
        Num::Int(v)
    }
}

impl From<i32> for Num {
    fn from(v: i32) -> Self {
        Num::Int(i64::from(v))
    }
}

impl From<f64> for Num {
    fn from(v: f64) -> Self {
        Num::Float(v)
    }
}

/// Post-transform applied to every interval value.
#[derive(Clone)]
pub struct Generator {
    label: Option<String>,
    func: Arc<dyn Fn(Value) -> Value + Send + Sync>,
}

impl Generator {
    /// A generator without source text; the JSON descriptor omits it.
    pub fn new(func: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        Generator {
            label: None,
            func: Arc::new(func),
        }
    }

    /// A generator whose source text is embedded in log descriptors.
    pub fn labeled(
        label: impl Into<String>,
        func: impl Fn(Value) -> Value + Send + Sync + 'static,
    ) -> Self {
        Generator {
            label: Some(label.into()),
            func: Arc::new(func),
        }
    }

    fn apply(&self, value: Value) -> Value {
        (self.func)(value)
    }
}

impl fmt::Debug for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generator")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Backing representation of an interval. Float-backed intervals keep
/// the user-supplied bounds only for the JSON descriptor.
#[derive(Debug, Clone)]
enum Repr {
    Int { start: i64, step: i64 },
    Float { start: f64, step: f64 },
}

/// A finite, indexable, iterable sequence of parameter values.
#[derive(Debug, Clone)]
pub enum Range {
    Interval {
        repr: Repr,
        len: u64,
        bounds: (Num, Num, Num),
        generator: Option<Generator>,
    },
    Set(Vec<Value>),
}

impl Range {
    /// Interval from `start` to `end` inclusive with step 1.
    pub fn interval(start: impl Into<Num>, end: impl Into<Num>) -> Result<Self, ConfigurationError> {
        Self::interval_with_step(start, end, 1)
    }

    /// Interval from `start` towards `end` in increments of `step`.
    ///
    /// The sign of `step` sets the direction; a direction mismatch
    /// (e.g. `step > 0` with `start > end`) yields an empty range.
    pub fn interval_with_step(
        start: impl Into<Num>,
        end: impl Into<Num>,
        step: impl Into<Num>,
    ) -> Result<Self, ConfigurationError> {
        let (start, end, step) = (start.into(), end.into(), step.into());
        if step.as_f64() == 0.0 {
            return Err(ConfigurationError::ZeroStep);
        }

        let bounds = (start, end, step);
        if start.is_float() || end.is_float() || step.is_float() {
            let (fstart, fend, fstep) = (start.as_f64(), end.as_f64(), step.as_f64());
            let mut len: u64 = 0;
            if fstep < 0.0 {
                while fstart + len as f64 * fstep >= fend {
                    len += 1;
                }
            } else {
                while fstart + len as f64 * fstep <= fend {
                    len += 1;
                }
            }
            Ok(Range::Interval {
                repr: Repr::Float {
                    start: fstart,
                    step: fstep,
                },
                len,
                bounds,
                generator: None,
            })
        } else {
            let (istart, iend, istep) = match (start, end, step) {
                (Num::Int(a), Num::Int(b), Num::Int(s)) => (a, b, s),
                _ => unreachable!(),
            };
            let len = if istart == iend {
                1
            } else if (istep < 0 && istart < iend) || (istep > 0 && istart > iend) {
                0
            } else {
                let span = istart.abs_diff(iend) + 1;
                span.div_ceil(istep.unsigned_abs())
            };
            Ok(Range::Interval {
                repr: Repr::Int {
                    start: istart,
                    step: istep,
                },
                len,
                bounds,
                generator: None,
            })
        }
    }

    /// Explicit value set; insertion order and duplicates are kept.
    pub fn set(values: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        Range::Set(values.into_iter().map(Into::into).collect())
    }

    /// Attaches a generator to an interval. No effect on sets.
    pub fn with_generator(self, generator: Generator) -> Self {
        match self {
            Range::Interval {
                repr, len, bounds, ..
            } => Range::Interval {
                repr,
                len,
                bounds,
                generator: Some(generator),
            },
            set @ Range::Set(_) => set,
        }
    }

    /// Number of values in the range.
    pub fn len(&self) -> u64 {
        match self {
            Range::Interval { len, .. } => *len,
            Range::Set(values) => values.len() as u64,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The `index`-th value in iteration order.
    pub fn get(&self, index: u64) -> Result<Value, DomainError> {
        if index >= self.len() {
            return Err(DomainError::RangeIndexOutOfBounds(index));
        }
        Ok(match self {
            Range::Interval {
                repr, generator, ..
            } => {
                let value = match repr {
                    Repr::Int { start, step } => Value::Int(start + index as i64 * step),
                    Repr::Float { start, step } => Value::Float(start + index as f64 * step),
                };
                match generator {
                    Some(g) => g.apply(value),
                    None => value,
                }
            }
            Range::Set(values) => values[index as usize].clone(),
        })
    }

    /// Lazy, restartable iteration over all values.
    pub fn iter(&self) -> RangeIter<'_> {
        RangeIter {
            range: self,
            next: 0,
        }
    }

    /// JSON descriptor for the tuning log.
    pub fn descriptor(&self) -> serde_json::Value {
        match self {
            Range::Interval {
                bounds, generator, ..
            } => {
                let mut json = json!({
                    "kind": "Interval",
                    "start": bounds.0.to_value(),
                    "end": bounds.1.to_value(),
                    "step": bounds.2.to_value(),
                });
                if let Some(Generator {
                    label: Some(label), ..
                }) = generator
                {
                    json["generator"] = json!(label);
                }
                json
            }
            Range::Set(values) => json!({
                "kind": "Set",
                "values": values,
            }),
        }
    }
}

/// Iterator over a range's values, in index order.
pub struct RangeIter<'a> {
    range: &'a Range,
    next: u64,
}

impl Iterator for RangeIter<'_> {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        if self.next >= self.range.len() {
            return None;
        }
        let value = self.range.get(self.next).ok();
        self.next += 1;
        value
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.range.len() - self.next) as usize;
        (remaining, Some(remaining))
    }
}

impl<'a> IntoIterator for &'a Range {
    type Item = Value;
    type IntoIter = RangeIter<'a>;

    fn into_iter(self) -> RangeIter<'a> {
        self.iter()
    }
}
