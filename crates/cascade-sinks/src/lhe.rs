//! Les Houches event file writer.
//!
//! The `<init>` block is written when the sink opens, before the run has a
//! cross-section estimate. Its cross-section line has a fixed width so that
//! finalization can overwrite it in place with the refined values.

use std::fmt::Write as _;
use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::PathBuf;

use cascade_accumulator::Registry;
use cascade_graph::parent_map;
use cascade_types::{Event, RunInfo};
use tracing::{debug, warn};

use crate::error::SinkError;
use crate::sink::{EventSink, SinkKind, SinkState, Stream, Truncate};

/// Width of each floating-point field on the cross-section line.
const FIELD_WIDTH: usize = 20;

/// Weighting strategy advertised in the `<init>` block.
const WEIGHTING_STRATEGY: i32 = 3;

/// Streams events as an LHE file.
pub struct LheSink<W: Write + Seek> {
    stream: Stream<W>,
    /// Byte offset of the cross-section line within the writer.
    cross_section_offset: u64,
    /// Run info captured at open, used if the sink is dropped unfinalized.
    info: Option<RunInfo>,
    events: u64,
}

impl LheSink<File> {
    /// Sink that writes to `path`, created when the sink is opened.
    pub fn create(path: impl Into<PathBuf>) -> Self {
        Self::with_stream(Stream::file(SinkKind::Lhe, path.into(), core::convert::identity))
    }
}

impl<W: Write + Seek + 'static> LheSink<W> {
    /// Sink over an existing seekable writer. `label` is used in error messages.
    pub fn from_writer(writer: W, label: impl Into<PathBuf>) -> Self {
        Self::with_stream(Stream::writer(SinkKind::Lhe, label, writer))
    }
}

impl<W: Write + Seek> LheSink<W> {
    const fn with_stream(stream: Stream<W>) -> Self {
        Self {
            stream,
            cross_section_offset: 0,
            info: None,
            events: 0,
        }
    }

    /// Number of events written so far.
    pub const fn events_written(&self) -> u64 {
        self.events
    }

    fn close(&mut self, info: &RunInfo) -> Result<(), SinkError> {
        let kind = self.stream.kind();
        let Some(mut writer) = self.stream.close() else {
            return Ok(());
        };
        let line = cross_section_line(info);
        writer
            .seek(SeekFrom::Start(self.cross_section_offset))
            .and_then(|_| writer.write_all(line.as_bytes()))
            .and_then(|()| writer.seek(SeekFrom::End(0)))
            .and_then(|_| writer.write_all(b"</LesHouchesEvents>\n"))
            .and_then(|()| writer.flush())
            .map_err(|source| SinkError::Finalize { kind, source })?;
        debug!(
            events = self.events,
            cross_section_pb = info.cross_section_pb,
            "lhe file closed with refined cross section"
        );
        Ok(())
    }
}

impl<W: Truncate> EventSink for LheSink<W> {
    fn kind(&self) -> SinkKind {
        SinkKind::Lhe
    }

    fn state(&self) -> SinkState {
        self.stream.state()
    }

    fn open(&mut self, info: &RunInfo) -> Result<(), SinkError> {
        let mut offset = 0;
        self.stream.open(|writer| {
            let start = writer.stream_position()?;
            let prefix = init_prefix(info);
            let prefix_len = u64::try_from(prefix.len()).map_err(std::io::Error::other)?;
            offset = start
                .checked_add(prefix_len)
                .ok_or_else(|| std::io::Error::other("lhe header offset overflow"))?;
            writer.write_all(prefix.as_bytes())?;
            writer.write_all(cross_section_line(info).as_bytes())?;
            writer.write_all(b"</init>\n")
        })?;
        self.cross_section_offset = offset;
        self.info = Some(info.clone());
        Ok(())
    }

    fn write_event(&mut self, event: &Event) -> Result<(), SinkError> {
        let block = render_event(event, self.info.as_ref().map_or(0, |i| i.process_id))?;
        self.stream.write_block(event.number, block.as_bytes())?;
        self.events = self.events.saturating_add(1);
        Ok(())
    }

    fn finalize(&mut self, info: &RunInfo, _registry: &Registry) -> Result<(), SinkError> {
        self.close(info)
    }
}

impl<W: Write + Seek> Drop for LheSink<W> {
    fn drop(&mut self) {
        if self.stream.state() != SinkState::Open {
            return;
        }
        let Some(info) = self.info.take() else {
            return;
        };
        if let Err(e) = self.close(&info) {
            warn!(error = %e, "lhe sink failed to close on drop");
        }
    }
}

/// Everything in the header up to the cross-section line.
fn init_prefix(info: &RunInfo) -> String {
    let [a, b] = info.beams;
    format!(
        "<LesHouchesEvents version=\"1.0\">\n<!--\n  written by cascade-sinks\n-->\n<init>\n \
         {:>9} {:>9} {:.10e} {:.10e} 0 0 0 0 {WEIGHTING_STRATEGY} 1\n",
        a.pdg_id, b.pdg_id, a.energy, b.energy
    )
}

/// The cross-section line, always the same length for a given process id.
fn cross_section_line(info: &RunInfo) -> String {
    let field = |value: f64| format!("{:>FIELD_WIDTH$}", format!("{value:+.10e}"));
    format!(
        " {} {} {} {:>11}\n",
        field(info.cross_section_pb),
        field(info.cross_section_error_pb),
        field(1.0),
        info.process_id
    )
}

/// Render one `<event>` block. Record positions are listing indices; the
/// system record is left out. `mother1` is the first parent and `mother2`
/// the last one when there are several, `0` otherwise.
fn render_event(event: &Event, process_id: i32) -> Result<String, SinkError> {
    let parents = parent_map(event)?;
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(out, "<event>");
    let _ = writeln!(
        out,
        " {:>3} {process_id:>6} {:+.10e} {:+.10e} -1.0000000000e0 -1.0000000000e0",
        event.len().saturating_sub(1),
        event.weight,
        event.scale
    );
    for (index, p) in event.iter().skip(1) {
        let mut mothers = parents
            .get(index)
            .into_iter()
            .flatten()
            .copied()
            .filter(|&m| m != 0);
        let mother1 = mothers.next().unwrap_or(0);
        let mother2 = mothers.last().unwrap_or(0);
        let status = match (p.is_final(), mother1) {
            (true, _) => 1,
            (false, 0) => -1,
            (false, _) => 2,
        };
        let _ = writeln!(
            out,
            " {:>9} {status:>2} {mother1:>4} {mother2:>4}    0    0 {:+.10e} {:+.10e} {:+.10e} {:+.10e} {:+.10e} 0.0000e0 9.0000e0",
            p.pdg_id,
            p.momentum.px,
            p.momentum.py,
            p.momentum.pz,
            p.momentum.e,
            p.mass
        );
    }
    let _ = writeln!(out, "</event>");
    Ok(out)
}
