//! Plausibility checks applied to every value before it reaches the journal.
//!
//! The policy is a pure function of `(metric, value, bounds)`. It keeps no
//! history, so one outlier never influences the verdict on the next cycle.

use crate::measurement::Metric;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Inclusive `[min, max]` range for one metric.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Limits {
    /// Lowest accepted value.
    pub min: f64,
    /// Highest accepted value.
    pub max: f64,
}

impl Limits {
    /// Bounds from `min` to `max`, both included.
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Inclusive on both ends. NaN is never contained.
    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }
}

impl fmt::Display for Limits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

/// Why a value was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    /// Outside the configured bounds.
    OutOfRange,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::OutOfRange => f.write_str("out_of_range"),
        }
    }
}

/// A value that was read successfully but is not physically plausible.
#[derive(Error, Clone, Debug, PartialEq)]
#[error("{metric} value {value} rejected ({reason}), bounds {bounds}")]
pub struct Rejection {
    /// Metric checked.
    pub metric: Metric,
    /// Why it failed.
    pub reason: RejectReason,
    /// Value as read.
    pub value: f64,
    /// Bounds it was checked against.
    pub bounds: Limits,
}

/// Outcome of checking one value.
#[derive(Clone, Debug, PartialEq)]
pub enum Verdict {
    /// Keep the value.
    Accept(f64),
    /// Drop the value, leaving the metric missing.
    Reject(Rejection),
}

impl Verdict {
    /// True for [`Verdict::Accept`].
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accept(_))
    }
}

/// Per-metric bounds plus the global on/off switch.
///
/// Metrics without configured bounds pass through unchecked.
#[derive(Clone, Debug, Default)]
pub struct ValidationPolicy {
    enabled: bool,
    limits: HashMap<Metric, Limits>,
}

impl ValidationPolicy {
    /// Policy checking `limits` when `enabled`.
    pub fn new(enabled: bool, limits: HashMap<Metric, Limits>) -> Self {
        Self { enabled, limits }
    }

    /// A policy that accepts everything.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Whether limits are applied.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Bounds configured for `metric`.
    pub fn limits(&self, metric: Metric) -> Option<&Limits> {
        self.limits.get(&metric)
    }

    /// Verdict on one value of `metric`.
    pub fn check(&self, metric: Metric, value: f64) -> Verdict {
        if !self.enabled {
            return Verdict::Accept(value);
        }
        match self.limits.get(&metric) {
            Some(bounds) if !bounds.contains(value) => Verdict::Reject(Rejection {
                metric,
                reason: RejectReason::OutOfRange,
                value,
                bounds: *bounds,
            }),
            _ => Verdict::Accept(value),
        }
    }
}
