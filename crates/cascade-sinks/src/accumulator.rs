//! Sink that persists the accumulator registry at the end of the run.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use cascade_accumulator::Registry;
use cascade_types::{Event, RunInfo};
use tracing::{info, warn};

use crate::error::SinkError;
use crate::sink::{EventSink, SinkKind, SinkState, Stream};

/// Writes the registry document when finalized.
///
/// The destination is created at open so that an unwritable path aborts the
/// run before any event is generated.
pub struct AccumulatorSink<W: Write> {
    stream: Stream<W>,
}

impl AccumulatorSink<BufWriter<File>> {
    /// Sink that writes to `path`.
    pub fn create(path: impl Into<PathBuf>) -> Self {
        Self {
            stream: Stream::file(SinkKind::Accumulator, path.into(), BufWriter::new),
        }
    }
}

impl<W: Write + 'static> AccumulatorSink<W> {
    /// Sink over an existing writer. `label` is used in error messages.
    pub fn from_writer(writer: W, label: impl Into<PathBuf>) -> Self {
        Self {
            stream: Stream::writer(SinkKind::Accumulator, label, writer),
        }
    }
}

impl<W: Write> EventSink for AccumulatorSink<W> {
    fn kind(&self) -> SinkKind {
        SinkKind::Accumulator
    }

    fn state(&self) -> SinkState {
        self.stream.state()
    }

    fn open(&mut self, _info: &RunInfo) -> Result<(), SinkError> {
        self.stream.open(|_| Ok(()))
    }

    fn write_event(&mut self, _event: &Event) -> Result<(), SinkError> {
        Ok(())
    }

    fn finalize(&mut self, _info: &RunInfo, registry: &Registry) -> Result<(), SinkError> {
        let Some(mut writer) = self.stream.close() else {
            return Ok(());
        };
        registry.persist(&mut writer)?;
        info!(
            collections = registry.len(),
            run_id = %registry.run_id(),
            "accumulators persisted"
        );
        Ok(())
    }
}

impl<W: Write> Drop for AccumulatorSink<W> {
    fn drop(&mut self) {
        if self.stream.state() == SinkState::Open {
            warn!("accumulator sink dropped before the registry was persisted");
            self.stream.close();
        }
    }
}
