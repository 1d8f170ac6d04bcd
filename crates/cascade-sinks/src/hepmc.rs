//! HepMC-style ASCII event stream (`IO_GenEvent` framing).
//!
//! Vertices are built from parent sets: all records produced by the same set
//! of parents share one vertex, and each of those parents is an incoming
//! particle of it. Particles keep their listing index as barcode; vertices
//! are numbered `-1, -2, ...` in order of first use. Records produced only by
//! the system record enter as orphan incoming lines of the vertex they feed,
//! or, if they feed none, hang off a root vertex of their own. The system
//! record itself is never written.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use cascade_accumulator::Registry;
use cascade_graph::{DecayGraph, parent_map};
use cascade_types::{Event, RunInfo};
use tracing::{debug, warn};

use crate::error::SinkError;
use crate::sink::{EventSink, SinkKind, SinkState, Stream, Truncate};

const VERSION_LINE: &str = "HepMC::Version 2.06.09";
const START_LISTING: &str = "HepMC::IO_GenEvent-START_EVENT_LISTING";
const END_LISTING: &str = "HepMC::IO_GenEvent-END_EVENT_LISTING";

/// Final-state status code in the written stream.
const STATUS_FINAL: i32 = 1;
/// Decayed-particle status code in the written stream.
const STATUS_DECAYED: i32 = 2;

/// Streams events as HepMC `IO_GenEvent` text.
pub struct HepMcSink<W: Write> {
    stream: Stream<W>,
    process_id: i32,
    cross_section: (f64, f64),
    events: u64,
}

impl HepMcSink<File> {
    /// Sink that writes to `path`, created when the sink is opened. Each
    /// event block goes to the file in a single write.
    pub fn create(path: impl Into<PathBuf>) -> Self {
        Self::with_stream(Stream::file(SinkKind::HepMc, path.into(), core::convert::identity))
    }
}

impl<W: Write + 'static> HepMcSink<W> {
    /// Sink over an existing writer. `label` is used in error messages.
    pub fn from_writer(writer: W, label: impl Into<PathBuf>) -> Self {
        Self::with_stream(Stream::writer(SinkKind::HepMc, label, writer))
    }
}

impl<W: Write> HepMcSink<W> {
    const fn with_stream(stream: Stream<W>) -> Self {
        Self {
            stream,
            process_id: 0,
            cross_section: (0.0, 0.0),
            events: 0,
        }
    }

    /// Number of events written so far.
    pub const fn events_written(&self) -> u64 {
        self.events
    }

    fn close(&mut self) -> Result<(), SinkError> {
        let kind = self.stream.kind();
        let Some(mut writer) = self.stream.close() else {
            return Ok(());
        };
        writer
            .write_all(format!("{END_LISTING}\n").as_bytes())
            .and_then(|()| writer.flush())
            .map_err(|source| SinkError::Finalize { kind, source })?;
        debug!(events = self.events, "hepmc stream closed");
        Ok(())
    }
}

impl<W: Truncate> EventSink for HepMcSink<W> {
    fn kind(&self) -> SinkKind {
        SinkKind::HepMc
    }

    fn state(&self) -> SinkState {
        self.stream.state()
    }

    fn open(&mut self, info: &RunInfo) -> Result<(), SinkError> {
        self.process_id = info.process_id;
        self.cross_section = (info.cross_section_pb, info.cross_section_error_pb);
        self.stream.open(|writer| {
            writer.write_all(format!("\n{VERSION_LINE}\n{START_LISTING}\n").as_bytes())
        })
    }

    fn write_event(&mut self, event: &Event) -> Result<(), SinkError> {
        let block = render_event(event, self.process_id, self.cross_section)?;
        self.stream.write_block(event.number, block.as_bytes())?;
        self.events = self.events.saturating_add(1);
        Ok(())
    }

    fn finalize(&mut self, _info: &RunInfo, _registry: &Registry) -> Result<(), SinkError> {
        self.close()
    }
}

impl<W: Write> Drop for HepMcSink<W> {
    fn drop(&mut self) {
        if self.stream.state() != SinkState::Open {
            return;
        }
        if let Err(e) = self.close() {
            warn!(error = %e, "hepmc sink failed to close on drop");
        }
    }
}

/// One production vertex: the records that feed it and the records it makes.
#[derive(Debug, Default, PartialEq, Eq)]
struct Vertex {
    incoming: Vec<usize>,
    outgoing: Vec<usize>,
}

/// Group the records of `event` into production vertices.
fn vertices(event: &Event) -> Result<Vec<Vertex>, SinkError> {
    let parents = parent_map(event)?;
    let mut vertices: Vec<Vertex> = Vec::new();
    let mut by_parents: BTreeMap<Vec<usize>, usize> = BTreeMap::new();
    let mut top_level = Vec::new();

    for (index, record_parents) in parents.iter().enumerate().skip(1) {
        let incoming: Vec<usize> = record_parents.iter().copied().filter(|&p| p != 0).collect();
        if incoming.is_empty() {
            top_level.push(index);
            continue;
        }
        if let Some(vertex) = by_parents.get(&incoming).and_then(|&at| vertices.get_mut(at)) {
            vertex.outgoing.push(index);
            continue;
        }
        by_parents.insert(incoming.clone(), vertices.len());
        vertices.push(Vertex {
            incoming,
            outgoing: vec![index],
        });
    }

    let stray: Vec<usize> = top_level
        .into_iter()
        .filter(|index| !vertices.iter().any(|v| v.incoming.contains(index)))
        .collect();
    if !stray.is_empty() {
        vertices.push(Vertex {
            incoming: Vec::new(),
            outgoing: stray,
        });
    }
    Ok(vertices)
}

/// Vertex barcode for the vertex at `position`.
fn barcode(position: usize) -> String {
    format!("-{}", position.saturating_add(1))
}

/// Render one event as an `E` block with its vertices and particles.
fn render_event(
    event: &Event,
    process_id: i32,
    (xsec, xsec_err): (f64, f64),
) -> Result<String, SinkError> {
    let vertices = vertices(event)?;

    // A particle ends at the first vertex it feeds.
    let mut end_vertex: Vec<Option<usize>> = vec![None; event.len()];
    let mut produced = vec![false; event.len()];
    for (position, vertex) in vertices.iter().enumerate() {
        for &index in &vertex.incoming {
            if let Some(slot) = end_vertex.get_mut(index) {
                if slot.is_none() {
                    *slot = Some(position);
                }
            }
        }
        for &index in &vertex.outgoing {
            if let Some(flag) = produced.get_mut(index) {
                *flag = true;
            }
        }
    }
    let ends_at = |index: usize| end_vertex.get(index).copied().flatten();

    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(
        out,
        "E {} -1 {:.10e} -1 -1 {process_id} 0 {} 1 2 0 1 {:.10e}",
        event.number,
        event.scale,
        vertices.len(),
        event.weight
    );
    let _ = writeln!(out, "U GEV MM");
    let _ = writeln!(out, "C {xsec:.10e} {xsec_err:.10e}");

    for (position, vertex) in vertices.iter().enumerate() {
        let orphans: Vec<usize> = vertex
            .incoming
            .iter()
            .copied()
            .filter(|&index| !produced.get(index).copied().unwrap_or(false))
            .filter(|&index| ends_at(index) == Some(position))
            .collect();
        let _ = writeln!(
            out,
            "V {} 0 0 0 0 0 {} {} 0",
            barcode(position),
            orphans.len(),
            vertex.outgoing.len()
        );
        for &index in orphans.iter().chain(&vertex.outgoing) {
            render_particle(&mut out, event, index, ends_at(index))?;
        }
    }
    Ok(out)
}

fn render_particle(
    out: &mut String,
    event: &Event,
    index: usize,
    end_vertex: Option<usize>,
) -> Result<(), SinkError> {
    let p = event.record(index)?;
    let end_vertex = end_vertex.map_or_else(|| "0".to_owned(), barcode);
    let status = if p.is_final() { STATUS_FINAL } else { STATUS_DECAYED };
    let theta = p.pt().atan2(p.momentum.pz);
    let _ = writeln!(
        out,
        "P {index} {} {:.10e} {:.10e} {:.10e} {:.10e} {:.10e} {status} {theta:.10e} {:.10e} {end_vertex} 0",
        p.pdg_id,
        p.momentum.px,
        p.momentum.py,
        p.momentum.pz,
        p.momentum.e,
        p.mass,
        p.phi()
    );
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Cursor;

    use cascade_accumulator::FillMode;
    use cascade_types::{FourMomentum, Particle, SYSTEM_PDG_ID};

    use super::*;

    fn decay_event(number: u64) -> Event {
        let p = FourMomentum::new(125.0, 0.0, 0.0, 10.0);
        Event::new(
            number,
            vec![
                Particle::new(SYSTEM_PDG_ID, -11, 0, p),
                Particle::new(25, -62, 0, p).with_children(2, 3),
                Particle::new(13, 1, -3, p),
                Particle::new(-13, 1, 3, p),
            ],
        )
    }

    #[test]
    fn event_block_lists_vertex_and_particles() {
        let block = render_event(&decay_event(7), 9_900, (1.5, 0.1)).unwrap();
        let lines: Vec<&str> = block.lines().collect();
        assert!(lines.first().unwrap().starts_with("E 7 -1"));
        assert_eq!(lines.iter().filter(|l| l.starts_with("V ")).count(), 1);
        assert_eq!(lines.iter().filter(|l| l.starts_with("P ")).count(), 3);
        assert!(lines.contains(&"V -1 0 0 0 0 0 1 2 0"));
    }

    /// system -> beams 1, 2; both beams -> h (3); h -> mu- mu+.
    fn two_beam_event() -> Event {
        let p = FourMomentum::new(125.0, 0.0, 0.0, 10.0);
        Event::new(
            0,
            vec![
                Particle::new(SYSTEM_PDG_ID, -11, 0, p).with_children(1, 2),
                Particle::new(2212, -12, 3, p).with_children(3, 3),
                Particle::new(2212, -12, 3, p).with_children(3, 3),
                Particle::new(25, -62, 0, p).with_children(4, 5),
                Particle::new(13, 1, -3, p),
                Particle::new(-13, 1, 3, p),
            ],
        )
    }

    fn particle_lines(block: &str) -> Vec<Vec<&str>> {
        block
            .lines()
            .filter(|l| l.starts_with("P "))
            .map(|l| l.split_whitespace().collect())
            .collect()
    }

    #[test]
    fn both_beams_feed_the_production_vertex() {
        let block = render_event(&two_beam_event(), 9_900, (1.5, 0.1)).unwrap();
        let lines: Vec<&str> = block.lines().collect();
        assert!(lines.contains(&"V -1 0 0 0 0 0 2 1 0"));
        assert!(lines.contains(&"V -2 0 0 0 0 0 0 2 0"));
        assert_eq!(lines.iter().filter(|l| l.starts_with("V ")).count(), 2);

        let particles = particle_lines(&block);
        let barcodes: Vec<&str> = particles.iter().filter_map(|p| p.get(1).copied()).collect();
        assert_eq!(barcodes, vec!["1", "2", "3", "4", "5"]);
        // Both beams end at the vertex that produces the Higgs.
        for beam in particles.iter().take(2) {
            assert_eq!(beam.get(11), Some(&"-1"));
        }
        assert_eq!(particles.get(2).and_then(|h| h.get(11)), Some(&"-2"));
    }

    #[test]
    fn system_children_without_decays_are_written() {
        let p = FourMomentum::new(5.0, 0.0, 0.0, 5.0);
        let event = Event::new(
            0,
            vec![
                Particle::new(SYSTEM_PDG_ID, -11, 0, p).with_children(1, 2),
                Particle::new(23, -22, 0, p).with_children(3, 3),
                Particle::new(22, 1, 0, p),
                Particle::new(22, 1, 0, p),
            ],
        );
        let block = render_event(&event, 1, (0.0, 0.0)).unwrap();
        assert!(block.lines().any(|l| l == "V -2 0 0 0 0 0 0 1 0"));
        let barcodes: Vec<String> = particle_lines(&block)
            .iter()
            .filter_map(|p| p.get(1).map(|b| (*b).to_owned()))
            .collect();
        assert_eq!(barcodes, vec!["1", "3", "2"]);
    }

    #[test]
    fn stream_has_header_events_and_footer() {
        let mut sink = HepMcSink::from_writer(Cursor::new(Vec::new()), "memory");
        let info = RunInfo::proton_proton(13_000.0, 9_900);
        let registry = Registry::new(FillMode::Disabled);
        sink.open(&info).unwrap();
        sink.write_event(&decay_event(0)).unwrap();
        sink.write_event(&decay_event(1)).unwrap();
        sink.finalize(&info, &registry).unwrap();
        sink.finalize(&info, &registry).unwrap();
        assert_eq!(sink.state(), SinkState::Finalized);
        assert_eq!(sink.events_written(), 2);
    }

    #[test]
    fn writing_before_open_is_rejected() {
        let mut sink = HepMcSink::from_writer(Cursor::new(Vec::new()), "memory");
        let err = sink.write_event(&decay_event(0)).unwrap_err();
        assert!(matches!(err, SinkError::NotOpen { kind: SinkKind::HepMc }));
    }
}
