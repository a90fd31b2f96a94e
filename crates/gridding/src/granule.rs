//! Access to Level 2 granule variables.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::error::{GridError, Result};

/// A variable's values with their shape (C order).
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl Variable {
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Self {
        Self { shape, data }
    }

    /// One-dimensional variable.
    pub fn vector(data: Vec<f32>) -> Self {
        Self {
            shape: vec![data.len()],
            data,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Source of granule variables, e.g. a decoded NetCDF file or a remote
/// OpenDAP dataset.
pub trait GranuleSource {
    /// Read a variable. Group members are addressed as `Group/name`.
    fn variable(&self, name: &str) -> Result<Variable>;

    /// Coverage date of the granule, when known.
    fn date(&self) -> Option<NaiveDate> {
        None
    }
}

/// Granule held in memory.
///
/// Lookups of `Group/name` fall back to `Group_name`, the flattened form
/// OpenDAP clients expose.
#[derive(Debug, Clone, Default)]
pub struct MemoryGranule {
    date: Option<NaiveDate>,
    variables: HashMap<String, Variable>,
}

impl MemoryGranule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, variable: Variable) -> Self {
        self.variables.insert(name.into(), variable);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, variable: Variable) {
        self.variables.insert(name.into(), variable);
    }
}

impl GranuleSource for MemoryGranule {
    fn variable(&self, name: &str) -> Result<Variable> {
        self.variables
            .get(name)
            .or_else(|| self.variables.get(&name.replace('/', "_")))
            .cloned()
            .ok_or_else(|| GridError::missing_variable(name))
    }

    fn date(&self) -> Option<NaiveDate> {
        self.date
    }
}

/// Footprint corners per sounding from a `(4, N)` or `(N, 4)` array.
///
/// A `(4, 4)` array is read as `(4, N)`.
pub fn footprint_vertices(name: &str, variable: &Variable) -> Result<Vec<[f64; 4]>> {
    let invalid = || GridError::InvalidVertexLayout {
        variable: name.to_string(),
        shape: variable.shape.clone(),
    };

    if variable.shape.len() != 2 || variable.shape.iter().product::<usize>() != variable.len() {
        return Err(invalid());
    }
    let data = &variable.data;

    match (variable.shape[0], variable.shape[1]) {
        (4, n) => Ok((0..n)
            .map(|i| {
                [
                    data[i] as f64,
                    data[n + i] as f64,
                    data[2 * n + i] as f64,
                    data[3 * n + i] as f64,
                ]
            })
            .collect()),
        (n, 4) => Ok((0..n)
            .map(|i| {
                let row = &data[i * 4..i * 4 + 4];
                [row[0] as f64, row[1] as f64, row[2] as f64, row[3] as f64]
            })
            .collect()),
        _ => Err(invalid()),
    }
}

/// Read a per-sounding variable and check its length.
pub fn sounding_values(granule: &dyn GranuleSource, name: &str, soundings: usize) -> Result<Vec<f32>> {
    let variable = granule.variable(name)?;
    if variable.len() != soundings {
        return Err(GridError::ShapeMismatch {
            variable: name.to_string(),
            expected: soundings,
            actual: variable.len(),
        });
    }
    Ok(variable.data)
}
