pub mod cell;
pub mod config;
pub mod record;
pub mod step;
pub mod vecmath;

// Re-export key types for easier use by dependent crates
pub use cell::CellIndex;
pub use config::{DetectorConfig, RunConfig, GeometryConfig, BoundaryConfig, TrajectoryConfig, OutputConfig, OutputFormat, OPTICAL_PHOTON_PDG};
pub use record::{EventRecord, TrajectoryPath};
pub use step::{StepEvent, TrackInfo, PrimaryParticle, PrimaryVertex, ReplayTrack, ReplayEvent, PRIMARY_PROCESS};
pub use vecmath::Vec3;
