use serde::{Deserialize, Serialize};

use crate::error::DataError;

/// Ordered scheduling periods, each with its own duration.
///
/// The day-ahead stage typically runs on a coarse axis (hourly or daily
/// steps); the intraday stage refines it through a [`TimePartition`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeAxis {
    hours: Vec<f64>,
}

impl TimeAxis {
    /// Builds an axis from explicit period durations.
    pub fn from_hours(hours: Vec<f64>) -> Result<Self, DataError> {
        let axis = Self { hours };
        axis.check()?;
        Ok(axis)
    }

    /// Builds an axis of `len` periods lasting `hours_each` hours.
    pub fn uniform(len: usize, hours_each: f64) -> Result<Self, DataError> {
        Self::from_hours(vec![hours_each; len])
    }

    /// Re-runs construction-time validation.
    ///
    /// Needed because axes can also arrive through deserialized records.
    pub(crate) fn check(&self) -> Result<(), DataError> {
        if self.hours.is_empty() {
            return Err(DataError::EmptyHorizon);
        }
        for (index, h) in self.hours.iter().enumerate() {
            if !h.is_finite() || *h <= 0.0 {
                return Err(DataError::NonPositiveDuration { index });
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.hours.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hours.is_empty()
    }

    /// Duration of period `t` in hours.
    pub fn hours(&self, t: usize) -> f64 {
        self.hours[t]
    }

    pub fn as_hours(&self) -> &[f64] {
        &self.hours
    }

    pub fn total_hours(&self) -> f64 {
        self.hours.iter().sum()
    }
}

/// A fine time axis refining a coarse one.
///
/// Every sub-period belongs to exactly one parent period; parents are
/// covered completely, in order, with no overlap and no gaps, and the
/// sub-period durations of a parent add up to the parent duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimePartition {
    fine: TimeAxis,
    parent_of: Vec<usize>,
    parent_count: usize,
}

impl TimePartition {
    /// Builds and validates a partition of `coarse` into `fine` periods.
    pub fn new(fine: TimeAxis, parent_of: Vec<usize>, coarse: &TimeAxis) -> Result<Self, DataError> {
        let partition = Self {
            fine,
            parent_of,
            parent_count: coarse.len(),
        };
        partition.check_against(coarse)?;
        Ok(partition)
    }

    /// Splits every period of `coarse` into `children` equal sub-periods.
    pub fn refine_uniform(coarse: &TimeAxis, children: usize) -> Result<Self, DataError> {
        coarse.check()?;
        if children == 0 {
            return Err(DataError::MalformedPartition {
                index: 0,
                detail: "zero sub-periods per period".to_string(),
            });
        }
        let mut hours = Vec::with_capacity(coarse.len() * children);
        let mut parent_of = Vec::with_capacity(coarse.len() * children);
        for t in 0..coarse.len() {
            let child_hours = coarse.hours(t) / children as f64;
            for _ in 0..children {
                hours.push(child_hours);
                parent_of.push(t);
            }
        }
        Ok(Self {
            fine: TimeAxis { hours },
            parent_of,
            parent_count: coarse.len(),
        })
    }

    /// Validates this partition against the coarse axis it claims to refine.
    pub fn check_against(&self, coarse: &TimeAxis) -> Result<(), DataError> {
        coarse.check()?;
        self.fine.check()?;
        if self.parent_count != coarse.len() {
            return Err(DataError::LengthMismatch {
                series: "partition parent count".to_string(),
                expected: coarse.len(),
                actual: self.parent_count,
            });
        }
        if self.parent_of.len() != self.fine.len() {
            return Err(DataError::LengthMismatch {
                series: "partition parent map".to_string(),
                expected: self.fine.len(),
                actual: self.parent_of.len(),
            });
        }
        if self.parent_of[0] != 0 {
            return Err(DataError::MalformedPartition {
                index: 0,
                detail: format!("first sub-period maps to parent {}, expected 0", self.parent_of[0]),
            });
        }
        for i in 1..self.parent_of.len() {
            let (prev, cur) = (self.parent_of[i - 1], self.parent_of[i]);
            if cur < prev {
                return Err(DataError::MalformedPartition {
                    index: i,
                    detail: format!("parent {} follows parent {}", cur, prev),
                });
            }
            if cur > prev + 1 {
                return Err(DataError::MalformedPartition {
                    index: i,
                    detail: format!("parent {} skipped", prev + 1),
                });
            }
        }
        let last = self.parent_of[self.parent_of.len() - 1];
        if last != coarse.len() - 1 {
            return Err(DataError::MalformedPartition {
                index: self.parent_of.len() - 1,
                detail: format!(
                    "last sub-period maps to parent {}, expected {}",
                    last,
                    coarse.len() - 1
                ),
            });
        }
        for parent in 0..coarse.len() {
            let children = self.children_of(parent);
            let child_sum: f64 = children.clone().map(|t| self.fine.hours(t)).sum();
            if (child_sum - coarse.hours(parent)).abs() > 1e-6 * coarse.hours(parent).max(1.0) {
                return Err(DataError::MalformedPartition {
                    index: children.start,
                    detail: format!(
                        "sub-periods of parent {} sum to {:.6} h but the parent lasts {:.6} h",
                        parent,
                        child_sum,
                        coarse.hours(parent)
                    ),
                });
            }
        }
        Ok(())
    }

    /// The fine axis.
    pub fn fine(&self) -> &TimeAxis {
        &self.fine
    }

    /// Number of parent periods this partition refines.
    pub fn parent_count(&self) -> usize {
        self.parent_count
    }

    /// Parent period of sub-period `sub`.
    pub fn parent_of(&self, sub: usize) -> usize {
        self.parent_of[sub]
    }

    /// Sub-period indices belonging to `parent`.
    ///
    /// `parent_of` is non-decreasing, so the children form a contiguous
    /// range that binary search locates directly.
    pub fn children_of(&self, parent: usize) -> std::ops::Range<usize> {
        let start = self.parent_of.partition_point(|&p| p < parent);
        let end = self.parent_of.partition_point(|&p| p <= parent);
        start..end
    }
}
