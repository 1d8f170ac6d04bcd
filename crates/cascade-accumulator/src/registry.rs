//! The named accumulator registry.
//!
//! A [`Registry`] maps unique names to histograms and tables. Collections are
//! registered once during setup, filled many times while events are
//! processed, and persisted once at the end of the run.
//!
//! # Fill mode
//!
//! The [`FillMode`] is fixed when the registry is built. In
//! [`FillMode::Disabled`] every fill call returns `Ok(())` straight away,
//! whatever the name, so analysis code never needs its own "is output on?"
//! checks. In [`FillMode::Enabled`] an unknown name is a programming error
//! and surfaces as [`AccumulatorError::UnknownCollection`].

use std::collections::BTreeMap;
use std::io::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::AccumulatorError;
use crate::batch::{Fill, FillBatch};
use crate::histogram::{Axis, Binning, Histogram1D, Histogram2D};
use crate::table::Table;

/// Format tag written at the top of every persisted document.
pub const DOCUMENT_FORMAT: &str = "cascade-accumulator";

/// Version of the persisted document layout.
pub const DOCUMENT_VERSION: u32 = 1;

/// Whether fill calls are applied or skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillMode {
    /// Fill calls update the registered collections.
    Enabled,
    /// Fill calls are no-ops.
    Disabled,
}

/// Shape of a registered collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    /// One-dimensional histogram.
    Histogram1D,
    /// Two-dimensional histogram.
    Histogram2D,
    /// Row table.
    Table,
}

impl core::fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Histogram1D => write!(f, "1-D histogram"),
            Self::Histogram2D => write!(f, "2-D histogram"),
            Self::Table => write!(f, "table"),
        }
    }
}

/// A registered collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Collection {
    /// One-dimensional histogram.
    #[serde(rename = "histogram_1d")]
    Histogram1D(Histogram1D),
    /// Two-dimensional histogram.
    #[serde(rename = "histogram_2d")]
    Histogram2D(Histogram2D),
    /// Row table.
    Table(Table),
}

impl Collection {
    /// The shape of this collection.
    pub const fn kind(&self) -> CollectionKind {
        match self {
            Self::Histogram1D(_) => CollectionKind::Histogram1D,
            Self::Histogram2D(_) => CollectionKind::Histogram2D,
            Self::Table(_) => CollectionKind::Table,
        }
    }

    /// One-line summary for end-of-run logs.
    pub fn summary(&self) -> String {
        match self {
            Self::Histogram1D(h) => format!(
                "entries={} mean={} clamped_below={} clamped_above={}",
                h.entries(),
                h.mean().map_or_else(|| "n/a".to_owned(), |m| format!("{m:.4}")),
                h.clamped_below(),
                h.clamped_above()
            ),
            Self::Histogram2D(h) => {
                format!("entries={} clamped={}", h.entries(), h.clamped())
            }
            Self::Table(t) => format!("rows={} columns={}", t.len(), t.width()),
        }
    }
}

#[derive(Serialize)]
struct NamedCollection<'a> {
    name: &'a str,
    #[serde(flatten)]
    collection: &'a Collection,
}

#[derive(Serialize)]
struct Document<'a> {
    format: &'static str,
    version: u32,
    run_id: Uuid,
    written_at: DateTime<Utc>,
    fill_mode: FillMode,
    collections: Vec<NamedCollection<'a>>,
}

/// Registry of named accumulators, kept in registration order.
#[derive(Debug, Clone)]
pub struct Registry {
    mode: FillMode,
    run_id: Uuid,
    /// Collections in registration order.
    collections: Vec<(String, Collection)>,
    /// Name -> position in `collections`.
    positions: BTreeMap<String, usize>,
}

impl Registry {
    /// Create an empty registry with the given fill mode.
    pub fn new(mode: FillMode) -> Self {
        Self {
            mode,
            run_id: Uuid::now_v7(),
            collections: Vec::new(),
            positions: BTreeMap::new(),
        }
    }

    /// Rebuild this registry with a different fill mode, keeping every
    /// registered collection and its contents.
    #[must_use]
    pub fn into_mode(self, mode: FillMode) -> Self {
        Self { mode, ..self }
    }

    /// The fill mode chosen at construction.
    pub const fn mode(&self) -> FillMode {
        self.mode
    }

    /// Identifier written into the persisted document.
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Number of registered collections.
    pub const fn len(&self) -> usize {
        self.collections.len()
    }

    /// Whether no collection is registered.
    pub const fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    /// Iterate over `(name, collection)` pairs in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Collection)> {
        self.collections.iter().map(|(name, c)| (name.as_str(), c))
    }

    /// Register a one-dimensional histogram.
    ///
    /// # Errors
    ///
    /// Returns [`AccumulatorError::DuplicateName`] if `name` is taken, or
    /// [`AccumulatorError::InvalidBinning`] for an unusable range.
    pub fn register_histogram_1d(
        &mut self,
        name: &str,
        bins: u32,
        low: f64,
        high: f64,
    ) -> Result<(), AccumulatorError> {
        self.ensure_free(name)?;
        let axis = Axis::new(name, Binning::new(bins, low, high))?;
        self.insert(name, Collection::Histogram1D(Histogram1D::new(axis)));
        Ok(())
    }

    /// Register a two-dimensional histogram.
    ///
    /// # Errors
    ///
    /// Returns [`AccumulatorError::DuplicateName`] if `name` is taken, or
    /// [`AccumulatorError::InvalidBinning`] if either axis is unusable.
    pub fn register_histogram_2d(
        &mut self,
        name: &str,
        x: Binning,
        y: Binning,
    ) -> Result<(), AccumulatorError> {
        self.ensure_free(name)?;
        let x_axis = Axis::new(name, x)?;
        let y_axis = Axis::new(name, y)?;
        self.insert(name, Collection::Histogram2D(Histogram2D::new(x_axis, y_axis)));
        Ok(())
    }

    /// Register a row table with the given column names.
    ///
    /// # Errors
    ///
    /// Returns [`AccumulatorError::DuplicateName`] if `name` is taken, or
    /// [`AccumulatorError::EmptySchema`] if `columns` is empty.
    pub fn register_table(&mut self, name: &str, columns: &[&str]) -> Result<(), AccumulatorError> {
        self.ensure_free(name)?;
        if columns.is_empty() {
            return Err(AccumulatorError::EmptySchema {
                name: name.to_owned(),
            });
        }
        let columns = columns.iter().map(|c| (*c).to_owned()).collect();
        self.insert(name, Collection::Table(Table::new(columns)));
        Ok(())
    }

    /// Fill a one-dimensional histogram with unit weight.
    ///
    /// # Errors
    ///
    /// See [`fill_1d_weighted`](Self::fill_1d_weighted).
    pub fn fill_1d(&mut self, name: &str, value: f64) -> Result<(), AccumulatorError> {
        self.fill_1d_weighted(name, value, 1.0)
    }

    /// Fill a one-dimensional histogram.
    ///
    /// # Errors
    ///
    /// In enabled mode: [`AccumulatorError::UnknownCollection`],
    /// [`AccumulatorError::KindMismatch`], or
    /// [`AccumulatorError::NonFiniteValue`] for NaN input.
    pub fn fill_1d_weighted(
        &mut self,
        name: &str,
        value: f64,
        weight: f64,
    ) -> Result<(), AccumulatorError> {
        if self.mode == FillMode::Disabled {
            return Ok(());
        }
        match self.lookup_mut(name)? {
            Collection::Histogram1D(h) => h
                .fill(value, weight)
                .map(|_| ())
                .ok_or_else(|| AccumulatorError::NonFiniteValue {
                    name: name.to_owned(),
                }),
            other => Err(AccumulatorError::KindMismatch {
                name: name.to_owned(),
                expected: CollectionKind::Histogram1D,
                actual: other.kind(),
            }),
        }
    }

    /// Fill a two-dimensional histogram with unit weight.
    ///
    /// # Errors
    ///
    /// See [`fill_2d_weighted`](Self::fill_2d_weighted).
    pub fn fill_2d(&mut self, name: &str, x: f64, y: f64) -> Result<(), AccumulatorError> {
        self.fill_2d_weighted(name, x, y, 1.0)
    }

    /// Fill a two-dimensional histogram.
    ///
    /// # Errors
    ///
    /// In enabled mode: [`AccumulatorError::UnknownCollection`],
    /// [`AccumulatorError::KindMismatch`], or
    /// [`AccumulatorError::NonFiniteValue`] for NaN input.
    pub fn fill_2d_weighted(
        &mut self,
        name: &str,
        x: f64,
        y: f64,
        weight: f64,
    ) -> Result<(), AccumulatorError> {
        if self.mode == FillMode::Disabled {
            return Ok(());
        }
        match self.lookup_mut(name)? {
            Collection::Histogram2D(h) => h
                .fill(x, y, weight)
                .map(|_| ())
                .ok_or_else(|| AccumulatorError::NonFiniteValue {
                    name: name.to_owned(),
                }),
            other => Err(AccumulatorError::KindMismatch {
                name: name.to_owned(),
                expected: CollectionKind::Histogram2D,
                actual: other.kind(),
            }),
        }
    }

    /// Append a row to a table.
    ///
    /// # Errors
    ///
    /// In enabled mode: [`AccumulatorError::UnknownCollection`],
    /// [`AccumulatorError::KindMismatch`], or
    /// [`AccumulatorError::RowWidth`] if the row does not match the schema.
    pub fn append_row(&mut self, name: &str, row: &[f64]) -> Result<(), AccumulatorError> {
        if self.mode == FillMode::Disabled {
            return Ok(());
        }
        match self.lookup_mut(name)? {
            Collection::Table(t) => {
                if t.append(row) {
                    Ok(())
                } else {
                    Err(AccumulatorError::RowWidth {
                        name: name.to_owned(),
                        expected: t.width(),
                        actual: row.len(),
                    })
                }
            }
            other => Err(AccumulatorError::KindMismatch {
                name: name.to_owned(),
                expected: CollectionKind::Table,
                actual: other.kind(),
            }),
        }
    }

    /// Apply a staged batch. Every fill is checked first; the registry is
    /// modified only if the whole batch is valid.
    ///
    /// # Errors
    ///
    /// In enabled mode, the first error any single fill in the batch would
    /// raise. Nothing is applied in that case.
    pub fn commit(&mut self, batch: &FillBatch<'_>) -> Result<(), AccumulatorError> {
        if self.mode == FillMode::Disabled {
            return Ok(());
        }
        for fill in batch.iter() {
            self.check(fill)?;
        }
        for fill in batch.iter() {
            match fill {
                Fill::Histogram1D { name, value, weight } => {
                    self.fill_1d_weighted(name, *value, *weight)?;
                }
                Fill::Histogram2D { name, x, y, weight } => {
                    self.fill_2d_weighted(name, *x, *y, *weight)?;
                }
                Fill::Row { name, values } => self.append_row(name, values)?,
            }
        }
        Ok(())
    }

    /// Look up a collection by name.
    ///
    /// # Errors
    ///
    /// Returns [`AccumulatorError::UnknownCollection`] if `name` is not
    /// registered. Lookups are checked in both fill modes.
    pub fn get(&self, name: &str) -> Result<&Collection, AccumulatorError> {
        self.positions
            .get(name)
            .and_then(|&position| self.collections.get(position))
            .map(|(_, c)| c)
            .ok_or_else(|| AccumulatorError::UnknownCollection {
                name: name.to_owned(),
            })
    }

    /// Look up a one-dimensional histogram by name.
    ///
    /// # Errors
    ///
    /// Returns [`AccumulatorError::UnknownCollection`] or
    /// [`AccumulatorError::KindMismatch`].
    pub fn histogram_1d(&self, name: &str) -> Result<&Histogram1D, AccumulatorError> {
        match self.get(name)? {
            Collection::Histogram1D(h) => Ok(h),
            other => Err(AccumulatorError::KindMismatch {
                name: name.to_owned(),
                expected: CollectionKind::Histogram1D,
                actual: other.kind(),
            }),
        }
    }

    /// Look up a two-dimensional histogram by name.
    ///
    /// # Errors
    ///
    /// Returns [`AccumulatorError::UnknownCollection`] or
    /// [`AccumulatorError::KindMismatch`].
    pub fn histogram_2d(&self, name: &str) -> Result<&Histogram2D, AccumulatorError> {
        match self.get(name)? {
            Collection::Histogram2D(h) => Ok(h),
            other => Err(AccumulatorError::KindMismatch {
                name: name.to_owned(),
                expected: CollectionKind::Histogram2D,
                actual: other.kind(),
            }),
        }
    }

    /// Look up a table by name.
    ///
    /// # Errors
    ///
    /// Returns [`AccumulatorError::UnknownCollection`] or
    /// [`AccumulatorError::KindMismatch`].
    pub fn table(&self, name: &str) -> Result<&Table, AccumulatorError> {
        match self.get(name)? {
            Collection::Table(t) => Ok(t),
            other => Err(AccumulatorError::KindMismatch {
                name: name.to_owned(),
                expected: CollectionKind::Table,
                actual: other.kind(),
            }),
        }
    }

    /// Write every collection to `writer` as one JSON document, in
    /// registration order. An empty registry writes a document with an
    /// empty collection list.
    ///
    /// # Errors
    ///
    /// Returns [`AccumulatorError::Persist`] if serialization fails, or
    /// [`AccumulatorError::Io`] if the writer cannot be flushed.
    pub fn persist<W: Write>(&self, mut writer: W) -> Result<(), AccumulatorError> {
        let document = Document {
            format: DOCUMENT_FORMAT,
            version: DOCUMENT_VERSION,
            run_id: self.run_id,
            written_at: Utc::now(),
            fill_mode: self.mode,
            collections: self
                .collections
                .iter()
                .map(|(name, collection)| NamedCollection { name, collection })
                .collect(),
        };
        serde_json::to_writer_pretty(&mut writer, &document)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        debug!(collections = self.collections.len(), "accumulator registry persisted");
        Ok(())
    }

    /// Would `fill` succeed against the current collections?
    fn check(&self, fill: &Fill<'_>) -> Result<(), AccumulatorError> {
        let name = fill.name();
        let collection = self.get(name)?;
        let non_finite = || AccumulatorError::NonFiniteValue {
            name: name.to_owned(),
        };
        let mismatch = |expected| AccumulatorError::KindMismatch {
            name: name.to_owned(),
            expected,
            actual: collection.kind(),
        };
        match (fill, collection) {
            (Fill::Histogram1D { value, weight, .. }, Collection::Histogram1D(_)) => {
                if value.is_nan() || weight.is_nan() {
                    return Err(non_finite());
                }
            }
            (Fill::Histogram2D { x, y, weight, .. }, Collection::Histogram2D(_)) => {
                if x.is_nan() || y.is_nan() || weight.is_nan() {
                    return Err(non_finite());
                }
            }
            (Fill::Row { values, .. }, Collection::Table(t)) => {
                if values.len() != t.width() {
                    return Err(AccumulatorError::RowWidth {
                        name: name.to_owned(),
                        expected: t.width(),
                        actual: values.len(),
                    });
                }
            }
            (Fill::Histogram1D { .. }, _) => return Err(mismatch(CollectionKind::Histogram1D)),
            (Fill::Histogram2D { .. }, _) => return Err(mismatch(CollectionKind::Histogram2D)),
            (Fill::Row { .. }, _) => return Err(mismatch(CollectionKind::Table)),
        }
        Ok(())
    }

    fn ensure_free(&self, name: &str) -> Result<(), AccumulatorError> {
        if self.positions.contains_key(name) {
            return Err(AccumulatorError::DuplicateName {
                name: name.to_owned(),
            });
        }
        Ok(())
    }

    fn insert(&mut self, name: &str, collection: Collection) {
        debug!(name, kind = %collection.kind(), "collection registered");
        self.positions.insert(name.to_owned(), self.collections.len());
        self.collections.push((name.to_owned(), collection));
    }

    fn lookup_mut(&mut self, name: &str) -> Result<&mut Collection, AccumulatorError> {
        self.positions
            .get(name)
            .and_then(|&position| self.collections.get_mut(position))
            .map(|(_, c)| c)
            .ok_or_else(|| AccumulatorError::UnknownCollection {
                name: name.to_owned(),
            })
    }
}
