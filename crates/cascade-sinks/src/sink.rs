//! The sink trait and the writer slot shared by the streaming sinks.

use std::fs::File;
use std::io::{Cursor, Seek, SeekFrom, Write};
use std::path::PathBuf;

use cascade_accumulator::Registry;
use cascade_types::{Event, RunInfo};
use tracing::warn;

use crate::error::SinkError;

/// Output destinations, listed in the order they are opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SinkKind {
    /// HepMC-style ASCII event stream.
    HepMc,
    /// Les Houches event file.
    Lhe,
    /// Accumulator registry dump.
    Accumulator,
}

impl core::fmt::Display for SinkKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::HepMc => write!(f, "hepmc"),
            Self::Lhe => write!(f, "lhe"),
            Self::Accumulator => write!(f, "accumulator"),
        }
    }
}

/// Lifecycle state of a sink. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    /// Constructed, nothing written.
    Unopened,
    /// Header written, accepting events.
    Open,
    /// Closed. Further finalize calls are no-ops.
    Finalized,
}

/// An external destination for run output.
///
/// Implementations must make [`finalize`](Self::finalize) idempotent and
/// must leave the sink [`SinkState::Finalized`] even when finalization
/// fails, so cleanup paths can call it unconditionally.
pub trait EventSink {
    /// Which destination this is.
    fn kind(&self) -> SinkKind;

    /// Current lifecycle state.
    fn state(&self) -> SinkState;

    /// Create the destination and write any header derived from `info`.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Open`] if the destination cannot be created or
    /// the header cannot be written.
    fn open(&mut self, info: &RunInfo) -> Result<(), SinkError>;

    /// Stream one event. Sinks that only write at the end ignore this.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Write`] on I/O failure, or [`SinkError::Graph`]
    /// if the event cannot be serialized.
    fn write_event(&mut self, event: &Event) -> Result<(), SinkError>;

    /// Write trailers, persist end-of-run data, and close the destination.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Finalize`] or [`SinkError::Persist`].
    fn finalize(&mut self, info: &RunInfo, registry: &Registry) -> Result<(), SinkError>;
}

/// A seekable writer that can be cut back to an earlier length.
///
/// Streaming sinks use it to drop the part of an event block that was
/// written before a failure, so output never ends in half an event.
pub trait Truncate: Write + Seek {
    /// Discard everything from byte `len` onward and move the cursor there.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    fn truncate_to(&mut self, len: u64) -> std::io::Result<()>;
}

impl Truncate for File {
    fn truncate_to(&mut self, len: u64) -> std::io::Result<()> {
        self.set_len(len)?;
        self.seek(SeekFrom::Start(len)).map(|_| ())
    }
}

impl Truncate for Cursor<Vec<u8>> {
    fn truncate_to(&mut self, len: u64) -> std::io::Result<()> {
        let keep = usize::try_from(len).map_err(std::io::Error::other)?;
        self.get_mut().truncate(keep);
        self.set_position(len);
        Ok(())
    }
}

type Opener<W> = Box<dyn FnOnce() -> std::io::Result<W>>;

/// Writer slot with the open/closed bookkeeping every file-backed sink needs.
pub(crate) struct Stream<W> {
    kind: SinkKind,
    label: PathBuf,
    opener: Option<Opener<W>>,
    writer: Option<W>,
    state: SinkState,
}

impl<W: Write + 'static> Stream<W> {
    /// A stream that creates (or truncates) `path` when opened and hands the
    /// file to `wrap`.
    pub(crate) fn file(kind: SinkKind, path: PathBuf, wrap: fn(File) -> W) -> Self {
        let target = path.clone();
        Self::deferred(kind, path, Box::new(move || File::create(&target).map(wrap)))
    }

    /// A stream over an already constructed writer.
    pub(crate) fn writer(kind: SinkKind, label: impl Into<PathBuf>, writer: W) -> Self {
        Self::deferred(kind, label.into(), Box::new(move || Ok(writer)))
    }
}

impl<W: Write> Stream<W> {

    fn deferred(kind: SinkKind, label: PathBuf, opener: Opener<W>) -> Self {
        Self {
            kind,
            label,
            opener: Some(opener),
            writer: None,
            state: SinkState::Unopened,
        }
    }

    pub(crate) const fn state(&self) -> SinkState {
        self.state
    }

    /// Create the writer and let `write_header` emit the header through it.
    pub(crate) fn open(
        &mut self,
        write_header: impl FnOnce(&mut W) -> std::io::Result<()>,
    ) -> Result<(), SinkError> {
        let Some(opener) = self.opener.take() else {
            return Err(self.open_error(std::io::Error::other("sink was already opened")));
        };
        let mut writer = opener().map_err(|source| self.open_error(source))?;
        if let Err(source) = write_header(&mut writer).and_then(|()| writer.flush()) {
            return Err(self.open_error(source));
        }
        self.writer = Some(writer);
        self.state = SinkState::Open;
        Ok(())
    }

    fn open_error(&self, source: std::io::Error) -> SinkError {
        SinkError::Open {
            kind: self.kind,
            path: self.label.clone(),
            source,
        }
    }

    /// Take the writer out and mark the stream finalized. Returns `None` if
    /// there is nothing to close.
    pub(crate) fn close(&mut self) -> Option<W> {
        self.opener = None;
        self.state = SinkState::Finalized;
        self.writer.take()
    }

    pub(crate) const fn kind(&self) -> SinkKind {
        self.kind
    }
}

impl<W: Truncate> Stream<W> {
    /// Write one whole event block and flush it. If the write fails, the
    /// bytes that did reach the writer are truncated away.
    pub(crate) fn write_block(&mut self, event: u64, block: &[u8]) -> Result<(), SinkError> {
        let kind = self.kind;
        let writer = self.writer.as_mut().ok_or(SinkError::NotOpen { kind })?;
        let write_error = |source| SinkError::Write {
            kind,
            event,
            source,
        };
        let start = writer.stream_position().map_err(write_error)?;
        if let Err(source) = writer.write_all(block).and_then(|()| writer.flush()) {
            if let Err(e) = writer.truncate_to(start) {
                warn!(%kind, event, error = %e, "could not remove partial event block");
            }
            return Err(write_error(source));
        }
        Ok(())
    }
}
