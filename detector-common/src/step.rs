use serde::{Deserialize, Serialize};
use crate::vecmath::Vec3;

/// Creator process name used for tracks injected by the primary generator.
pub const PRIMARY_PROCESS: &str = "Primary";

/// One interaction step as delivered by the transport collaborator.
///
/// `position`, `global_time`, `momentum_direction` and `kinetic_energy` are
/// taken at the pre-step point. `post_position` is where the step ended; it
/// feeds trajectory recording only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepEvent {
    pub cell_address: i32,
    pub energy_deposit: f64,
    pub position: Vec3,
    #[serde(default)]
    pub post_position: Option<Vec3>,
    pub global_time: f64,
    pub track_id: i32,
    pub parent_id: i32,
    pub particle_code: i32,
    pub momentum_direction: Vec3,
    pub kinetic_energy: f64,
    #[serde(default = "default_creator_process")]
    pub creator_process: String,
    pub step_length: f64,
    #[serde(default)]
    pub pre_volume: String,
    #[serde(default)]
    pub post_volume: String,
    #[serde(default)]
    pub boundary_crossing: bool,
}

fn default_creator_process() -> String {
    PRIMARY_PROCESS.to_string()
}

impl StepEvent {
    /// End point of the step, falling back to the pre-step point when the
    /// replay source did not record one.
    pub fn end_point(&self) -> Vec3 {
        self.post_position.unwrap_or(self.position)
    }
}

/// Static description of a track, captured when the track starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub track_id: i32,
    pub parent_id: i32,
    pub particle_code: i32,
    pub particle_name: String,
    /// Charge in units of the positron charge.
    #[serde(default)]
    pub charge: f64,
    #[serde(default)]
    pub initial_momentum: Vec3,
    #[serde(default)]
    pub initial_kinetic_energy: f64,
}

/// A primary particle attached to a vertex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimaryParticle {
    pub particle_code: i32,
    pub total_energy: f64,
    pub momentum_direction: Vec3,
}

/// A primary vertex: one position, one or more particles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimaryVertex {
    pub position: Vec3,
    pub particles: Vec<PrimaryParticle>,
}

/// One tracked segment in a replayed event. Several segments with the same
/// `track_id` in one event are continuations of the same track (a tracking
/// interruption) and get merged into the first segment's trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayTrack {
    pub info: TrackInfo,
    pub initial_position: Vec3,
    pub steps: Vec<StepEvent>,
}

/// A recorded simulated event, in the order the transport delivered it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayEvent {
    pub event_id: i32,
    #[serde(default)]
    pub primaries: Vec<PrimaryVertex>,
    #[serde(default)]
    pub tracks: Vec<ReplayTrack>,
}

impl ReplayEvent {
    /// Total number of steps across all track segments.
    pub fn step_count(&self) -> usize {
        self.tracks.iter().map(|t| t.steps.len()).sum()
    }
}
