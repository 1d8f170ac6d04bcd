//! Whole-run behaviour: streamed output and persisted accumulators after a
//! normal run, and what a run aborted part-way leaves behind.

// Persisted documents are inspected with `serde_json::Value` indexing.
#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::cell::{Cell, RefCell};
use std::io::{Cursor, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::rc::Rc;

use cascade_core::{
    AnalysisError, CascadeConfig, EndReason, EventSource, GenerationError, ReplaySource, RunnerError,
    SessionError, run, run_with_sinks,
};
use cascade_graph::GraphError;
use cascade_sinks::{
    AccumulatorSink, HepMcSink, LheSink, SinkError, SinkKind, SinkSet, SinkState, Truncate,
};
use cascade_types::{Event, FourMomentum, Particle, RunInfo, SYSTEM_PDG_ID};

fn scratch_dir(label: &str) -> PathBuf {
    let unique = format!(
        "cascade_core_{label}_{}_{}",
        std::process::id(),
        uuid::Uuid::new_v4().simple()
    );
    let dir = std::env::temp_dir().join(unique);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// h -> a1 a1 -> mu+ mu- mu+ mu-. With `anchored == false` the Higgs
/// carries a non-anchor status.
fn cascade_event(number: u64, anchored: bool) -> Event {
    let h = FourMomentum::from_pt_eta_phi_m(35.0, 0.3, 0.2, 125.0);
    let a = FourMomentum::from_pt_eta_phi_m(45.0, 0.5, 1.2, 15.0);
    let b = FourMomentum::from_pt_eta_phi_m(30.0, -0.4, -1.9, 15.0);
    let mu = |q: i32, pt: f64, eta: f64, phi: f64| {
        let pdg = if q < 0 { 13 } else { -13 };
        Particle::new(pdg, 1, q, FourMomentum::from_pt_eta_phi_m(pt, eta, phi, 0.105))
    };
    let status = if anchored { -62 } else { -22 };
    Event::new(
        number,
        vec![
            Particle::new(SYSTEM_PDG_ID, -11, 0, h),
            Particle::new(25, status, 0, h).with_children(2, 3),
            Particle::new(36, 2, 0, a).with_children(4, 5),
            Particle::new(36, 2, 0, b).with_children(6, 7),
            mu(3, 25.0, 0.4, 1.1),
            mu(-3, 21.0, 0.6, 1.3),
            mu(3, 18.0, -0.3, -2.0),
            mu(-3, 14.0, -0.5, -1.8),
        ],
    )
    .with_weight(1.0)
    .with_scale(125.0)
}

fn replay(events: Vec<Event>) -> ReplaySource {
    ReplaySource::new(RunInfo::proton_proton(13_000.0, 9_900), events)
}

#[test]
fn three_events_with_one_missing_anchor() {
    let dir = scratch_dir("end_to_end");
    let mut config = CascadeConfig::default();
    config.run.events = 3;
    config.output.directory.clone_from(&dir);
    config.output.hepmc = true;
    config.output.lhe = true;
    config.output.accumulator_name = Some("histograms".to_owned());

    let events = vec![
        cascade_event(0, true),
        cascade_event(1, false),
        cascade_event(2, true),
    ];
    let summary = run(&config, &mut replay(events)).unwrap();
    assert_eq!(summary.end_reason, EndReason::EventBudgetReached);
    assert_eq!(summary.events_processed, 3);
    assert_eq!(summary.events_with_anchor, 2);

    let plan = config.sink_plan();
    let hepmc = std::fs::read_to_string(plan.hepmc.unwrap()).unwrap();
    assert_eq!(hepmc.lines().filter(|l| l.starts_with("E ")).count(), 3);
    assert!(hepmc.trim_end().ends_with("END_EVENT_LISTING"));

    let lhe = std::fs::read_to_string(plan.lhe.unwrap()).unwrap();
    assert_eq!(lhe.matches("<event>").count(), 3);
    assert!(lhe.ends_with("</LesHouchesEvents>\n"));

    let json = std::fs::read_to_string(dir.join("histograms.json")).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&json).unwrap();
    let collections = doc["collections"].as_array().unwrap();
    let named = |name: &str| {
        collections
            .iter()
            .find(|c| c["name"] == name)
            .cloned()
            .unwrap()
    };
    assert_eq!(named("hPt")["entries"], 2);
    assert_eq!(named("a1Pt")["entries"], 4);
    assert_eq!(named("a1DecayPt")["entries"], 8);
    assert_eq!(named("hVars")["rows"].as_array().unwrap().len(), 2);

    std::fs::remove_dir_all(&dir).ok();
}

/// In-memory seekable buffer whose writes fail once `armed` is set.
#[derive(Clone, Default)]
struct FlakyBuffer {
    data: Rc<RefCell<Cursor<Vec<u8>>>>,
    armed: Rc<Cell<bool>>,
}

impl FlakyBuffer {
    fn sharing_trigger(armed: &Rc<Cell<bool>>) -> Self {
        Self {
            data: Rc::default(),
            armed: Rc::clone(armed),
        }
    }

    fn text(&self) -> String {
        String::from_utf8(self.data.borrow().get_ref().clone()).unwrap()
    }
}

impl Write for FlakyBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if self.armed.get() {
            return Err(std::io::Error::other("disk full"));
        }
        self.data.borrow_mut().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Seek for FlakyBuffer {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.data.borrow_mut().seek(pos)
    }
}

impl Truncate for FlakyBuffer {
    fn truncate_to(&mut self, len: u64) -> std::io::Result<()> {
        self.data.borrow_mut().truncate_to(len)
    }
}

/// Arms the trigger just before serving the event at `position`, and grows
/// the cross-section estimate by `cross_section_step` per event served.
struct ArmingSource {
    inner: ReplaySource,
    armed: Rc<Cell<bool>>,
    position: u64,
    served: u64,
    cross_section_step: f64,
    cross_section: f64,
}

impl ArmingSource {
    fn new(events: Vec<Event>, armed: &Rc<Cell<bool>>, position: u64) -> Self {
        Self {
            inner: replay(events),
            armed: Rc::clone(armed),
            position,
            served: 0,
            cross_section_step: 0.0,
            cross_section: 0.0,
        }
    }
}

impl EventSource for ArmingSource {
    fn run_info(&self) -> RunInfo {
        let mut info = self.inner.run_info();
        info.cross_section_pb = self.cross_section;
        info
    }

    fn next_event(&mut self) -> Result<Option<Event>, GenerationError> {
        if self.served == self.position {
            self.armed.set(true);
        }
        self.served = self.served.saturating_add(1);
        self.cross_section += self.cross_section_step;
        self.inner.next_event()
    }
}

#[test]
fn write_failure_on_event_five_finalizes_every_sink() {
    let armed = Rc::new(Cell::new(false));
    let hepmc = FlakyBuffer::sharing_trigger(&armed);
    let lhe = FlakyBuffer::sharing_trigger(&armed);
    let accumulator = FlakyBuffer::default();

    let mut sinks = SinkSet::new();
    sinks.push(Box::new(HepMcSink::from_writer(hepmc.clone(), "memory.hepmc")));
    sinks.push(Box::new(LheSink::from_writer(lhe.clone(), "memory.lhe")));
    sinks.push(Box::new(AccumulatorSink::from_writer(
        accumulator.clone(),
        "memory.json",
    )));

    let mut config = CascadeConfig::default();
    config.run.events = 10;
    let mut source = ArmingSource::new((0..10).map(|n| cascade_event(n, true)).collect(), &armed, 4);

    let err = run_with_sinks(&config, &mut source, sinks).unwrap_err();
    assert!(matches!(
        err,
        RunnerError::Session {
            source: SessionError::Sink {
                source: SinkError::Write {
                    kind: SinkKind::HepMc,
                    event: 4,
                    ..
                }
            }
        }
    ));

    // Four complete event blocks and nothing after them.
    let hepmc = hepmc.text();
    assert_eq!(hepmc.lines().filter(|l| l.starts_with("E ")).count(), 4);
    assert!(hepmc.ends_with('\n'));

    let lhe = lhe.text();
    assert_eq!(lhe.matches("<event>").count(), 4);
    assert_eq!(lhe.matches("</event>").count(), 4);

    let doc: serde_json::Value = serde_json::from_str(&accumulator.text()).unwrap();
    let hpt = doc["collections"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["name"] == "hPt")
        .cloned()
        .unwrap();
    assert_eq!(hpt["entries"], 4);
}

#[test]
fn aborted_lhe_reports_the_refined_cross_section() {
    let armed = Rc::new(Cell::new(false));
    let hepmc = FlakyBuffer::sharing_trigger(&armed);
    let lhe = FlakyBuffer::default();

    let mut sinks = SinkSet::new();
    sinks.push(Box::new(HepMcSink::from_writer(hepmc, "memory.hepmc")));
    sinks.push(Box::new(LheSink::from_writer(lhe.clone(), "memory.lhe")));

    let mut config = CascadeConfig::default();
    config.run.events = 10;
    let mut source = ArmingSource::new((0..10).map(|n| cascade_event(n, true)).collect(), &armed, 4);
    source.cross_section_step = 8.5;

    assert!(run_with_sinks(&config, &mut source, sinks).is_err());

    // Five events were served when the run stopped: 5 x 8.5 pb.
    let lhe = lhe.text();
    assert!(lhe.contains("+4.2500000000e1"), "stale cross section in {lhe}");
    assert_eq!(lhe.matches("<event>").count(), 4);
    assert!(lhe.ends_with("</event>\n</LesHouchesEvents>\n"));
}

#[test]
fn rejected_event_contributes_nothing_to_the_accumulators() {
    let accumulator = FlakyBuffer::default();
    let mut sinks = SinkSet::new();
    sinks.push(Box::new(AccumulatorSink::from_writer(
        accumulator.clone(),
        "memory.json",
    )));

    // The third event's anchor lists itself as its only child.
    let mut broken = cascade_event(2, true).particles().to_vec();
    if let Some(anchor) = broken.get_mut(1) {
        *anchor = anchor.with_children(1, 1);
    }
    let events = vec![
        cascade_event(0, true),
        cascade_event(1, true),
        Event::new(2, broken),
    ];

    let mut config = CascadeConfig::default();
    config.run.events = 3;
    let err = run_with_sinks(&config, &mut replay(events), sinks).unwrap_err();
    assert!(matches!(
        err,
        RunnerError::Session {
            source: SessionError::Analysis {
                source: AnalysisError::Graph {
                    source: GraphError::SelfReference { index: 1, .. }
                }
            }
        }
    ));

    let doc: serde_json::Value = serde_json::from_str(&accumulator.text()).unwrap();
    let collections = doc["collections"].as_array().unwrap();
    let named = |name: &str| collections.iter().find(|c| c["name"] == name).cloned().unwrap();
    assert_eq!(named("hPt")["entries"], 2);
    assert_eq!(named("a1Pt")["entries"], 4);
    assert_eq!(named("a1DecayPt")["entries"], 8);
    assert_eq!(named("hVars")["rows"].as_array().unwrap().len(), 2);
}

#[test]
fn abort_leaves_every_sink_finalized() {
    use cascade_accumulator::{FillMode, Registry};
    use cascade_core::{AnalysisPass, AnalysisSession};

    let armed = Rc::new(Cell::new(false));
    let hepmc = FlakyBuffer::sharing_trigger(&armed);
    let lhe = FlakyBuffer::sharing_trigger(&armed);

    let mut sinks = SinkSet::new();
    sinks.push(Box::new(HepMcSink::from_writer(hepmc, "memory.hepmc")));
    sinks.push(Box::new(LheSink::from_writer(lhe, "memory.lhe")));
    sinks.push(Box::new(AccumulatorSink::from_writer(
        FlakyBuffer::default(),
        "memory.json",
    )));

    let config = CascadeConfig::default();
    let run_info = RunInfo::proton_proton(13_000.0, 9_900);
    let mut session = AnalysisSession::start(
        AnalysisPass::new(config.analysis.clone(), config.histograms.clone()),
        Registry::new(FillMode::Enabled),
        sinks,
        &run_info,
    )
    .unwrap();

    for n in 0..4 {
        session.run_pass(&cascade_event(n, true)).unwrap();
    }
    armed.set(true);
    assert!(session.run_pass(&cascade_event(4, true)).is_err());

    assert!(session.is_finalized());
    assert_eq!(
        session.sink_states(),
        vec![
            (SinkKind::HepMc, SinkState::Finalized),
            (SinkKind::Lhe, SinkState::Finalized),
            (SinkKind::Accumulator, SinkState::Finalized),
        ]
    );
    assert_eq!(session.events(), 4);

    // Later events are refused rather than written after the trailer.
    armed.set(false);
    assert!(session.run_pass(&cascade_event(5, true)).is_err());
}
