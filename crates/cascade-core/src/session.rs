//! One analysis run: the registry, the analysis pass, and the output sinks,
//! with a single finalization point.
//!
//! [`AnalysisSession`] is the guaranteed-release handle for a run. Every exit
//! path ends in the same idempotent finalize: the normal end of the run, a
//! fatal error inside [`AnalysisSession::run_pass`], and dropping the session
//! without calling [`AnalysisSession::finalize_run`].

use cascade_accumulator::Registry;
use cascade_sinks::{SinkError, SinkKind, SinkSet, SinkState};
use cascade_types::{Event, RunInfo};
use tracing::{info, warn};

use crate::analysis::{AnalysisError, AnalysisPass, PassOutcome};

/// Errors raised by a session. All are fatal for the run.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A sink failed to open, write, or finalize.
    #[error("sink error: {source}")]
    Sink {
        /// The underlying sink error.
        #[from]
        source: SinkError,
    },

    /// The analysis pass failed.
    #[error("analysis error: {source}")]
    Analysis {
        /// The underlying analysis error.
        #[from]
        source: AnalysisError,
    },
}

/// A running analysis with its sinks open.
pub struct AnalysisSession {
    pass: AnalysisPass,
    registry: Registry,
    sinks: SinkSet,
    /// Latest run info seen, used when the session finalizes after a
    /// failure or on drop.
    run: RunInfo,
    events: u64,
    anchors: u64,
    finalized: bool,
}

impl AnalysisSession {
    /// Register the pass's collections and open every sink.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Analysis`] if registration fails, or
    /// [`SessionError::Sink`] if a sink cannot be opened. In both cases the
    /// sinks that did open have already been finalized.
    pub fn start(
        pass: AnalysisPass,
        mut registry: Registry,
        mut sinks: SinkSet,
        run: &RunInfo,
    ) -> Result<Self, SessionError> {
        pass.register(&mut registry)?;
        sinks.open_all(run)?;
        info!(
            collections = registry.len(),
            sinks = sinks.len(),
            fill_mode = ?registry.mode(),
            "analysis session started"
        );
        Ok(Self {
            pass,
            registry,
            sinks,
            run: run.clone(),
            events: 0,
            anchors: 0,
            finalized: false,
        })
    }

    /// Record the source's latest run info. A finalize forced by a failed
    /// pass or by drop writes these values instead of the ones seen at
    /// start.
    pub fn refresh_run_info(&mut self, run: &RunInfo) {
        self.run.clone_from(run);
    }

    /// Stream `event` to every sink, then analyze it.
    ///
    /// # Errors
    ///
    /// Any failure is fatal: every sink is finalized before the error is
    /// returned, and later calls keep failing with a closed-sink error.
    pub fn run_pass(&mut self, event: &Event) -> Result<PassOutcome, SessionError> {
        let result = self.stream_and_analyze(event);
        if let Err(e) = &result {
            warn!(event = event.number, error = %e, "aborting run, finalizing sinks");
            self.finalize_quietly();
        }
        result
    }

    fn stream_and_analyze(&mut self, event: &Event) -> Result<PassOutcome, SessionError> {
        self.sinks.write_event(event)?;
        let outcome = self.pass.run(event, &mut self.registry)?;
        self.events = self.events.saturating_add(1);
        if outcome.has_anchor() {
            self.anchors = self.anchors.saturating_add(1);
        }
        Ok(outcome)
    }

    /// Finalize every sink with the final run info. The accumulator sink
    /// persists the registry here. Calling this again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the first sink error; every sink is still finalized.
    pub fn finalize_run(&mut self, run: &RunInfo) -> Result<(), SessionError> {
        if self.finalized {
            return Ok(());
        }
        self.finalized = true;
        self.run = run.clone();
        self.sinks.finalize_all(run, &self.registry)?;
        info!(
            events = self.events,
            anchors = self.anchors,
            cross_section_pb = run.cross_section_pb,
            "analysis session finalized"
        );
        Ok(())
    }

    fn finalize_quietly(&mut self) {
        let run = self.run.clone();
        if let Err(e) = self.finalize_run(&run) {
            warn!(error = %e, "finalization after failure also failed");
        }
    }

    /// The registry, for inspection and end-of-run summaries.
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Kind and state of every sink.
    pub fn sink_states(&self) -> Vec<(SinkKind, SinkState)> {
        self.sinks.states()
    }

    /// Events streamed and analyzed so far.
    pub const fn events(&self) -> u64 {
        self.events
    }

    /// Events in which an anchor was found.
    pub const fn anchors(&self) -> u64 {
        self.anchors
    }

    /// Whether [`finalize_run`](Self::finalize_run) has run.
    pub const fn is_finalized(&self) -> bool {
        self.finalized
    }
}

impl Drop for AnalysisSession {
    fn drop(&mut self) {
        if !self.finalized {
            warn!("analysis session dropped before finalize_run, finalizing now");
            self.finalize_quietly();
        }
    }
}

impl core::fmt::Debug for AnalysisSession {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AnalysisSession")
            .field("events", &self.events)
            .field("anchors", &self.anchors)
            .field("sinks", &self.sinks)
            .field("finalized", &self.finalized)
            .finish_non_exhaustive()
    }
}
