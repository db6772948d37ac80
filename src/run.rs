use crate::event_builder::{EventRecordBuilder, EventSink};
use crate::exit_counter::BoundaryExitCounter;
use crate::hits::CellHitAggregator;
use crate::process_table::ProcessLabelTable;
use crate::trajectory::{TrajectoryHandle, TrajectoryRecorder};
use anyhow::Result;
use detector_common::{DetectorConfig, EventRecord, PrimaryVertex, ReplayEvent, StepEvent, TrackInfo, TrajectoryPath, Vec3};
use indicatif::{ParallelProgressIterator, ProgressBar};
use log::{debug, info, trace, warn};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

/// State shared by every worker of one run.
pub struct RunContext {
    config: DetectorConfig,
    labels: ProcessLabelTable,
    exits: BoundaryExitCounter,
    /// Workers that may still intern labels; export waits for zero.
    active_workers: AtomicUsize,
}

/// Everything the workers produced, ordered by event id.
#[derive(Debug)]
pub struct RunOutput {
    pub events: Vec<EventRecord>,
    pub trajectories: Vec<TrajectoryPath>,
    pub finished: RunFinished,
}

/// Proof that [`RunContext::run`] has returned. Only `run` can make one.
#[derive(Debug)]
pub struct RunFinished {
    _private: (),
}

impl RunContext {
    pub fn new(config: DetectorConfig) -> Self {
        let exits = BoundaryExitCounter::from_config(&config.boundary, &config.geometry);
        RunContext {
            config,
            labels: ProcessLabelTable::new(),
            exits,
            active_workers: AtomicUsize::new(0),
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn labels(&self) -> &ProcessLabelTable {
        &self.labels
    }

    pub fn exits(&self) -> &BoundaryExitCounter {
        &self.exits
    }

    /// Registers a new worker. It stays registered until dropped.
    pub fn begin_worker(&self) -> Worker<'_> {
        self.active_workers.fetch_add(1, Ordering::AcqRel);
        Worker {
            run: self,
            hits: CellHitAggregator::new(),
            trajectories: TrajectoryRecorder::new(),
            live_tracks: HashMap::new(),
            active_track: None,
            current_event: None,
        }
    }

    pub fn active_workers(&self) -> usize {
        self.active_workers.load(Ordering::Acquire)
    }

    /// Replays `events` across the worker pool and returns once every worker
    /// has finished; returning is the run-end barrier.
    pub fn run(&self, events: &[ReplayEvent], progress: &ProgressBar) -> Result<RunOutput> {
        let mut pool = rayon::ThreadPoolBuilder::new();
        if self.config.run.workers > 0 {
            pool = pool.num_threads(self.config.run.workers);
        }
        let pool = pool.build()?;
        info!("Replaying {} events on {} worker threads.", events.len(), pool.current_num_threads());

        let per_event: Vec<(Vec<EventRecord>, Vec<TrajectoryPath>)> = pool.install(|| {
            events
                .par_iter()
                .progress_with(progress.clone())
                .map_init(
                    || self.begin_worker(),
                    |worker, event| {
                        let mut rows: Vec<EventRecord> = Vec::with_capacity(1);
                        let paths = worker.process_event(event, &mut rows);
                        (rows, paths)
                    },
                )
                .collect()
        });

        let mut output = RunOutput {
            events: Vec::with_capacity(events.len()),
            trajectories: Vec::new(),
            finished: RunFinished { _private: () },
        };
        for (rows, paths) in per_event {
            output.events.extend(rows);
            output.trajectories.extend(paths);
        }
        output.events.sort_by_key(|r| r.event_id);
        output.trajectories.sort_by_key(|t| (t.event_id, t.track_id));
        Ok(output)
    }

    /// Run-end callback. Only the coordinator exports the label table.
    ///
    /// `finished` comes from the [`RunOutput`] of this context's `run`, so the
    /// pool has joined before anything is exported. Workers begun by hand
    /// after that still block the export until they are dropped.
    pub fn end_run(&self, _finished: &RunFinished, is_coordinator: bool) -> Result<Option<BTreeMap<u32, String>>> {
        if !is_coordinator {
            return Ok(None);
        }
        let active = self.active_workers();
        if active > 0 {
            anyhow::bail!("Cannot export process labels while {} worker(s) are still running.", active);
        }
        let mapping = self.labels.export();
        info!("Run finished: {} distinct creator processes, {} boundary exits.", mapping.len(), self.exits.total());
        Ok(Some(mapping))
    }
}

/// Track currently being stepped, and the path its steps extend.
#[derive(Debug, Clone, Copy)]
struct ActiveTrack {
    track_id: i32,
    handle: Option<TrajectoryHandle>,
    /// Set when this segment continues an earlier segment of the same track.
    continues: Option<TrajectoryHandle>,
}

/// Per-thread aggregation context. Processes one event at a time.
pub struct Worker<'run> {
    run: &'run RunContext,
    hits: CellHitAggregator,
    trajectories: TrajectoryRecorder,
    /// track id -> first trajectory of that track in the current event
    live_tracks: HashMap<i32, TrajectoryHandle>,
    active_track: Option<ActiveTrack>,
    current_event: Option<i32>,
}

impl<'run> Worker<'run> {
    pub fn begin_event(&mut self, event_id: i32) {
        assert!(
            self.current_event.is_none(),
            "event {} started before event {:?} ended",
            event_id, self.current_event
        );
        debug_assert!(self.hits.is_empty());
        self.current_event = Some(event_id);
    }

    pub fn begin_track(&mut self, info: &TrackInfo, initial_position: Vec3) {
        // A track left open still has to merge before it is replaced
        self.end_track();
        let config = &self.run.config.trajectory;
        let handle = if config.record && !config.skip_pdg.contains(&info.particle_code) {
            Some(self.trajectories.create_for_track(info.clone(), initial_position))
        } else {
            None
        };

        let continues = match (handle, self.live_tracks.get(&info.track_id).copied()) {
            (Some(_), Some(first)) => Some(first),
            (Some(h), None) => {
                self.live_tracks.insert(info.track_id, h);
                None
            }
            (None, _) => None,
        };
        self.active_track = Some(ActiveTrack { track_id: info.track_id, handle, continues });
    }

    pub fn on_step(&mut self, step: &StepEvent) {
        if step.energy_deposit > 0.0 && !self.run.config.is_known_cell(step.cell_address) {
            trace!("Deposit in cell {} outside the configured array", step.cell_address);
        }
        self.hits.on_step(step);
        if self.run.config.boundary.enabled {
            self.run.exits.on_step(step);
        }
        if let Some(ActiveTrack { track_id, handle: Some(h), .. }) = self.active_track {
            if track_id == step.track_id {
                self.trajectories.append_point(h, step.end_point());
            }
        }
    }

    pub fn end_track(&mut self) {
        match self.active_track.take() {
            Some(ActiveTrack { handle: Some(segment), continues: Some(first), .. }) => {
                self.trajectories.merge(first, segment);
                trace!("Merged resumed segment: {}", self.trajectories.describe(first));
            }
            Some(ActiveTrack { handle: Some(h), .. }) => {
                trace!("{}", self.trajectories.describe(h));
            }
            _ => {}
        }
    }

    /// Event-end callback: drains the hits into one row for `sink` and
    /// releases the event's trajectories.
    pub fn end_event<S: EventSink + ?Sized>(&mut self, vertices: &[PrimaryVertex], sink: &mut S) -> Vec<TrajectoryPath> {
        let event_id = self.current_event.take().expect("end_event called without an open event");
        self.end_track();

        let hits = self.hits.drain();
        EventRecordBuilder::new(&self.run.labels).emit(event_id, &hits, vertices, sink);

        self.live_tracks.clear();
        self.trajectories.drain(event_id)
    }

    /// Delivers one recorded event through the callbacks in transport order.
    pub fn process_event<S: EventSink + ?Sized>(&mut self, event: &ReplayEvent, sink: &mut S) -> Vec<TrajectoryPath> {
        self.begin_event(event.event_id);
        for track in &event.tracks {
            self.begin_track(&track.info, track.initial_position);
            for step in &track.steps {
                if step.track_id != track.info.track_id {
                    warn!(
                        "Event {}: step of track {} listed under track {}",
                        event.event_id, step.track_id, track.info.track_id
                    );
                }
                self.on_step(step);
            }
            self.end_track();
        }
        let paths = self.end_event(&event.primaries, sink);
        debug!("Event {} replayed: {} steps, {} trajectories", event.event_id, event.step_count(), paths.len());
        paths
    }
}

impl Drop for Worker<'_> {
    fn drop(&mut self) {
        self.run.active_workers.fetch_sub(1, Ordering::AcqRel);
    }
}
