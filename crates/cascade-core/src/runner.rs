//! The event loop.
//!
//! [`run`] pulls events from an [`EventSource`] until the configured budget
//! is reached, the source runs dry, or generation fails, pushing each one
//! through an [`AnalysisSession`]. A generation failure ends the run early
//! but still produces complete output files; a sink or analysis failure is
//! fatal and is returned after the sinks are finalized.

use cascade_accumulator::{CollectionKind, Registry};
use cascade_sinks::SinkSet;
use cascade_types::RunInfo;
use tracing::{debug, info, warn};

use crate::analysis::AnalysisPass;
use crate::config::CascadeConfig;
use crate::session::{AnalysisSession, SessionError};
use crate::source::EventSource;

/// Errors that can occur during a run.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// The session failed to start, process an event, or finalize.
    #[error("session error: {source}")]
    Session {
        /// The underlying session error.
        #[from]
        source: SessionError,
    },
}

/// Why the event loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The configured number of events was processed.
    EventBudgetReached,
    /// The source had no more events.
    SourceExhausted,
    /// The source reported a generation failure.
    GenerationFailed,
}

/// One line of the end-of-run report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSummary {
    /// Collection name.
    pub name: String,
    /// Collection shape.
    pub kind: CollectionKind,
    /// Human-readable statistics.
    pub detail: String,
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Why the loop stopped.
    pub end_reason: EndReason,
    /// Events streamed and analyzed.
    pub events_processed: u64,
    /// Events in which an anchor was found.
    pub events_with_anchor: u64,
    /// Run info the sinks were finalized with.
    pub run_info: RunInfo,
    /// Per-collection statistics, in registration order.
    pub collections: Vec<CollectionSummary>,
}

/// Run with the sinks described by the config's output section.
///
/// # Errors
///
/// Returns [`RunnerError`] if a sink or the analysis pass fails. Output
/// files are finalized before the error is returned.
pub fn run(config: &CascadeConfig, source: &mut dyn EventSource) -> Result<RunSummary, RunnerError> {
    run_with_sinks(config, source, SinkSet::from_plan(&config.sink_plan()))
}

/// Run with an explicit sink set.
///
/// # Errors
///
/// Same as [`run`].
pub fn run_with_sinks(
    config: &CascadeConfig,
    source: &mut dyn EventSource,
    sinks: SinkSet,
) -> Result<RunSummary, RunnerError> {
    let pass = AnalysisPass::new(config.analysis.clone(), config.histograms.clone());
    let registry = Registry::new(config.fill_mode());
    let mut session = AnalysisSession::start(pass, registry, sinks, &source.run_info())?;

    info!(
        events = config.run.events,
        seed = config.run.seed,
        card = %config.run.card,
        "starting event loop"
    );

    let mut processed = 0_u64;
    let end_reason = loop {
        if processed >= config.run.events {
            break EndReason::EventBudgetReached;
        }
        let event = match source.next_event() {
            Ok(Some(event)) => event,
            Ok(None) => {
                info!(processed, "event source exhausted");
                break EndReason::SourceExhausted;
            }
            Err(e) => {
                warn!(processed, error = %e, "generation failed, ending run early");
                break EndReason::GenerationFailed;
            }
        };

        if processed < config.logging.print_events {
            debug!(event = event.number, listing = %event, "event listing");
        }

        session.refresh_run_info(&source.run_info());
        session.run_pass(&event)?;
        processed = processed.saturating_add(1);

        if processed.checked_rem(config.logging.progress_every) == Some(0) {
            info!(
                processed,
                anchors = session.anchors(),
                "progress"
            );
        }
    };

    let run_info = source.run_info();
    session.finalize_run(&run_info)?;

    let collections = session
        .registry()
        .iter()
        .map(|(name, collection)| CollectionSummary {
            name: name.to_owned(),
            kind: collection.kind(),
            detail: collection.summary(),
        })
        .collect();

    Ok(RunSummary {
        end_reason,
        events_processed: processed,
        events_with_anchor: session.anchors(),
        run_info,
        collections,
    })
}

/// Log the end-of-run report.
pub fn log_run_end(summary: &RunSummary) {
    info!(
        reason = ?summary.end_reason,
        events = summary.events_processed,
        anchors = summary.events_with_anchor,
        cross_section_pb = summary.run_info.cross_section_pb,
        cross_section_error_pb = summary.run_info.cross_section_error_pb,
        "Run ended"
    );

    for c in &summary.collections {
        info!(name = %c.name, kind = %c.kind, "{}", c.detail);
    }

    if summary.events_processed == 0 {
        warn!("Run ended with no events processed");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cascade_types::{Event, FourMomentum, Particle, SYSTEM_PDG_ID};

    use super::*;
    use crate::source::ReplaySource;

    fn anchored(number: u64) -> Event {
        let p = FourMomentum::from_pt_eta_phi_m(30.0, 0.2, 0.4, 125.0);
        Event::new(
            number,
            vec![
                Particle::new(SYSTEM_PDG_ID, -11, 0, p),
                Particle::new(25, -62, 0, p),
            ],
        )
    }

    fn quiet_config(events: u64) -> CascadeConfig {
        let mut config = CascadeConfig::default();
        config.run.events = events;
        config.output.accumulator = false;
        config
    }

    fn source(n: u64) -> ReplaySource {
        ReplaySource::new(
            RunInfo::proton_proton(13_000.0, 1),
            (0..n).map(anchored).collect(),
        )
    }

    #[test]
    fn stops_at_the_event_budget() {
        let summary = run(&quiet_config(3), &mut source(10)).unwrap();
        assert_eq!(summary.end_reason, EndReason::EventBudgetReached);
        assert_eq!(summary.events_processed, 3);
        assert_eq!(summary.events_with_anchor, 3);
        assert_eq!(summary.run_info.accepted_events, 3);
    }

    #[test]
    fn stops_when_the_source_runs_dry() {
        let summary = run(&quiet_config(10), &mut source(4)).unwrap();
        assert_eq!(summary.end_reason, EndReason::SourceExhausted);
        assert_eq!(summary.events_processed, 4);
    }

    #[test]
    fn generation_failure_ends_the_run_cleanly() {
        let mut failing = source(10).failing_at(6);
        let summary = run(&quiet_config(10), &mut failing).unwrap();
        assert_eq!(summary.end_reason, EndReason::GenerationFailed);
        assert_eq!(summary.events_processed, 6);
    }

    #[test]
    fn summary_lists_every_collection() {
        let summary = run(&quiet_config(1), &mut source(1)).unwrap();
        let hpt = summary.collections.iter().find(|c| c.name == "hPt").unwrap();
        assert_eq!(hpt.kind, CollectionKind::Histogram1D);
        assert!(hpt.detail.starts_with("entries=1"));
        assert!(summary.collections.iter().any(|c| c.kind == CollectionKind::Table));
    }

    #[test]
    fn zero_budget_processes_nothing() {
        let summary = run(&quiet_config(0), &mut source(2)).unwrap();
        assert_eq!(summary.end_reason, EndReason::EventBudgetReached);
        assert_eq!(summary.events_processed, 0);
    }
}
