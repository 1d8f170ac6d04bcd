//! Event source trait and a replaying implementation.
//!
//! The run loop pulls events from an [`EventSource`]; the physics engine
//! behind it is out of scope for this crate. [`ReplaySource`] serves a fixed
//! list of events and is what tests and dry runs use.

use std::collections::VecDeque;

use cascade_types::{Event, RunInfo};

/// Errors reported by an event source.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The generator could not produce the requested event.
    #[error("generation failed at event {event}: {message}")]
    Failed {
        /// Number of the event that could not be produced.
        event: u64,
        /// Description of the failure.
        message: String,
    },
}

/// A producer of events.
pub trait EventSource {
    /// Current run-level information. The cross section is refined as
    /// events are produced, so callers should take a fresh snapshot when
    /// they need the final values.
    fn run_info(&self) -> RunInfo;

    /// Produce the next event, or `Ok(None)` when the source is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError`] if the generator fails; the run loop
    /// treats this as an early end of the run rather than a fatal error.
    fn next_event(&mut self) -> Result<Option<Event>, GenerationError>;
}

/// Serves a fixed list of events in order.
#[derive(Debug, Clone)]
pub struct ReplaySource {
    info: RunInfo,
    events: VecDeque<Event>,
    fail_at: Option<u64>,
    served: u64,
}

impl ReplaySource {
    /// Replay `events` under the given run info.
    pub fn new(info: RunInfo, events: Vec<Event>) -> Self {
        Self {
            info,
            events: events.into(),
            fail_at: None,
            served: 0,
        }
    }

    /// Report a generation failure instead of serving the event at
    /// position `position` (0-based).
    #[must_use]
    pub const fn failing_at(mut self, position: u64) -> Self {
        self.fail_at = Some(position);
        self
    }
}

impl EventSource for ReplaySource {
    fn run_info(&self) -> RunInfo {
        self.info.clone()
    }

    fn next_event(&mut self) -> Result<Option<Event>, GenerationError> {
        if self.fail_at == Some(self.served) {
            return Err(GenerationError::Failed {
                event: self.served,
                message: "replay configured to fail here".to_owned(),
            });
        }
        let Some(event) = self.events.pop_front() else {
            return Ok(None);
        };
        self.served = self.served.saturating_add(1);
        self.info.accepted_events = self.served;
        Ok(Some(event))
    }
}
