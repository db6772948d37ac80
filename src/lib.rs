//! Step-to-record aggregation for a segmented crystal detector.
//!
//! A transport collaborator delivers steps per event; workers fold them into
//! per-cell hits, per-track trajectories and a run-wide exit tally, and emit
//! one [`EventRecord`](detector_common::EventRecord) per event.

pub mod event_builder;
pub mod exit_counter;
pub mod hits;
pub mod output;
pub mod process_table;
pub mod run;
pub mod trajectory;

pub use event_builder::{EventRecordBuilder, EventSink};
pub use exit_counter::BoundaryExitCounter;
pub use hits::{CellHitAggregator, HitRecord};
pub use process_table::ProcessLabelTable;
pub use run::{RunContext, RunFinished, RunOutput, Worker};
pub use trajectory::{TrajectoryError, TrajectoryHandle, TrajectoryRecorder};
