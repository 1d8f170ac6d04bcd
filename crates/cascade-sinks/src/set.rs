//! The set of enabled sinks and their shared lifecycle.

use std::path::PathBuf;

use cascade_accumulator::{FillMode, Registry};
use cascade_types::{Event, RunInfo};
use tracing::{debug, info, warn};

use crate::accumulator::AccumulatorSink;
use crate::error::SinkError;
use crate::hepmc::HepMcSink;
use crate::lhe::LheSink;
use crate::sink::{EventSink, SinkKind, SinkState};

/// Which file-backed sinks to build, and where they write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinkPlan {
    /// HepMC stream destination, `None` when disabled.
    pub hepmc: Option<PathBuf>,
    /// LHE file destination, `None` when disabled.
    pub lhe: Option<PathBuf>,
    /// Accumulator document destination, `None` when disabled.
    pub accumulator: Option<PathBuf>,
}

/// The enabled sinks, always kept in open order (HepMC, LHE, accumulator).
///
/// Disabled sinks are never constructed, so they hold no resources.
#[derive(Default)]
pub struct SinkSet {
    sinks: Vec<Box<dyn EventSink>>,
}

impl SinkSet {
    /// An empty set.
    pub const fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    /// Build file-backed sinks for every destination in `plan`.
    pub fn from_plan(plan: &SinkPlan) -> Self {
        let mut set = Self::new();
        if let Some(path) = &plan.hepmc {
            set.push(Box::new(HepMcSink::create(path.clone())));
        }
        if let Some(path) = &plan.lhe {
            set.push(Box::new(LheSink::create(path.clone())));
        }
        if let Some(path) = &plan.accumulator {
            set.push(Box::new(AccumulatorSink::create(path.clone())));
        }
        set
    }

    /// Add a sink, keeping the set in open order.
    pub fn push(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
        self.sinks.sort_by_key(|s| s.kind());
    }

    /// Number of enabled sinks.
    pub const fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Whether no sink is enabled.
    pub const fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Kind and state of every sink, in open order.
    pub fn states(&self) -> Vec<(SinkKind, SinkState)> {
        self.sinks.iter().map(|s| (s.kind(), s.state())).collect()
    }

    /// Open every sink in order. If one fails, the sinks already opened are
    /// finalized before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns the [`SinkError::Open`] of the first sink that failed.
    pub fn open_all(&mut self, run: &RunInfo) -> Result<(), SinkError> {
        let mut failure = None;
        for sink in &mut self.sinks {
            if let Err(e) = sink.open(run) {
                warn!(kind = %sink.kind(), error = %e, "sink failed to open, closing the others");
                failure = Some(e);
                break;
            }
            debug!(kind = %sink.kind(), "sink opened");
        }
        if let Some(e) = failure {
            let empty = Registry::new(FillMode::Disabled);
            if let Err(cleanup) = self.finalize_all(run, &empty) {
                warn!(error = %cleanup, "cleanup after open failure also failed");
            }
            return Err(e);
        }
        info!(sinks = self.sinks.len(), "output sinks opened");
        Ok(())
    }

    /// Stream one event to every sink, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first [`SinkError::Write`] (or serialization error).
    pub fn write_event(&mut self, event: &Event) -> Result<(), SinkError> {
        for sink in &mut self.sinks {
            sink.write_event(event)?;
        }
        Ok(())
    }

    /// Finalize every sink, even after one fails. Sinks already finalized
    /// are skipped.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered; later sinks are still finalized.
    pub fn finalize_all(&mut self, run: &RunInfo, registry: &Registry) -> Result<(), SinkError> {
        let mut first_error = None;
        for sink in &mut self.sinks {
            if sink.state() == SinkState::Finalized {
                continue;
            }
            let kind = sink.kind();
            match sink.finalize(run, registry) {
                Ok(()) => debug!(%kind, "sink finalized"),
                Err(e) => {
                    warn!(%kind, error = %e, "sink failed to finalize");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl core::fmt::Debug for SinkSet {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SinkSet").field("sinks", &self.states()).finish()
    }
}
