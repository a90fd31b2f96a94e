//! Sounding quality filters, e.g. `Quality_Flag == 0`.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    Gt,
    Lt,
}

impl Comparator {
    /// Accepts `=`, `==`, `eq`, `>`, `gt`, `<` and `lt`.
    pub fn parse(op: &str) -> Option<Self> {
        match op.trim() {
            "=" | "==" | "eq" => Some(Comparator::Eq),
            ">" | "gt" => Some(Comparator::Gt),
            "<" | "lt" => Some(Comparator::Lt),
            _ => None,
        }
    }

    pub fn compare(&self, value: f32, threshold: f32) -> bool {
        match self {
            Comparator::Eq => value == threshold,
            Comparator::Gt => value > threshold,
            Comparator::Lt => value < threshold,
        }
    }
}

/// Keep soundings whose `variable` compares true against `threshold`.
///
/// The comparator is kept as written; an unrecognised one is skipped when
/// the filter is applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityFilter {
    pub variable: String,
    pub op: String,
    pub threshold: f32,
}

impl QualityFilter {
    pub fn new(variable: impl Into<String>, op: impl Into<String>, threshold: f32) -> Self {
        Self {
            variable: variable.into(),
            op: op.into(),
            threshold,
        }
    }

    pub fn comparator(&self) -> Option<Comparator> {
        Comparator::parse(&self.op)
    }

    /// `None` when the comparator is not recognised.
    pub fn passes(&self, value: f32) -> Option<bool> {
        self.comparator().map(|c| c.compare(value, self.threshold))
    }
}

impl fmt::Display for QualityFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.variable, self.op, self.threshold)
    }
}
