//! Staged fills applied to a [`Registry`](crate::Registry) all at once.
//!
//! A [`FillBatch`] records fills without touching any collection.
//! [`Registry::commit`](crate::Registry::commit) checks the whole batch
//! against the registered collections first and only then applies it, so a
//! batch either lands completely or leaves the registry untouched.

/// One staged fill.
#[derive(Debug, Clone, PartialEq)]
pub enum Fill<'a> {
    /// A weighted one-dimensional histogram fill.
    Histogram1D {
        /// Collection name.
        name: &'a str,
        /// Filled value.
        value: f64,
        /// Fill weight.
        weight: f64,
    },
    /// A weighted two-dimensional histogram fill.
    Histogram2D {
        /// Collection name.
        name: &'a str,
        /// Filled x value.
        x: f64,
        /// Filled y value.
        y: f64,
        /// Fill weight.
        weight: f64,
    },
    /// A table row.
    Row {
        /// Table name.
        name: &'a str,
        /// One value per column.
        values: Vec<f64>,
    },
}

impl Fill<'_> {
    /// Name of the target collection.
    pub const fn name(&self) -> &str {
        match self {
            Self::Histogram1D { name, .. } | Self::Histogram2D { name, .. } | Self::Row { name, .. } => {
                *name
            }
        }
    }
}

/// Ordered list of staged fills.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FillBatch<'a> {
    fills: Vec<Fill<'a>>,
}

impl<'a> FillBatch<'a> {
    /// An empty batch.
    pub const fn new() -> Self {
        Self { fills: Vec::new() }
    }

    /// Stage a unit-weight one-dimensional fill.
    pub fn fill_1d(&mut self, name: &'a str, value: f64) {
        self.fills.push(Fill::Histogram1D {
            name,
            value,
            weight: 1.0,
        });
    }

    /// Stage a unit-weight two-dimensional fill.
    pub fn fill_2d(&mut self, name: &'a str, x: f64, y: f64) {
        self.fills.push(Fill::Histogram2D {
            name,
            x,
            y,
            weight: 1.0,
        });
    }

    /// Stage a table row.
    pub fn append_row(&mut self, name: &'a str, values: &[f64]) {
        self.fills.push(Fill::Row {
            name,
            values: values.to_vec(),
        });
    }

    /// Number of staged fills.
    pub const fn len(&self) -> usize {
        self.fills.len()
    }

    /// Whether nothing is staged.
    pub const fn is_empty(&self) -> bool {
        self.fills.is_empty()
    }

    /// Staged fills in order.
    pub fn iter(&self) -> impl Iterator<Item = &Fill<'a>> {
        self.fills.iter()
    }
}
