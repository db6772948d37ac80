use serde::{Deserialize, Serialize};
use crate::vecmath::Vec3;

/// One output row per simulated event.
///
/// Per-hit columns all have length `hit_count`; per-primary columns all have
/// the length of the event's primary particle list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_id: i32,
    /// Sum of the energy of every included hit (MeV).
    pub total_energy: f64,
    pub hit_count: u32,

    // Per-hit columns
    pub cell_address: Vec<i32>,
    pub energy: Vec<f64>,
    /// Earliest global time of any contributing step (ns).
    pub time: Vec<f64>,
    pub pos_x: Vec<f64>,
    pub pos_y: Vec<f64>,
    pub pos_z: Vec<f64>,
    pub particle_code: Vec<i32>,
    pub track_id: Vec<i32>,
    pub parent_id: Vec<i32>,
    pub dir_x: Vec<f64>,
    pub dir_y: Vec<f64>,
    pub dir_z: Vec<f64>,
    pub kinetic_energy: Vec<f64>,
    /// Creator process id; decode with the run's process map file.
    pub process_id: Vec<u32>,
    pub track_length: Vec<f64>,

    // Per-primary columns
    pub primary_particle_code: Vec<i32>,
    pub primary_energy: Vec<f64>,
    pub primary_pos_x: Vec<f64>,
    pub primary_pos_y: Vec<f64>,
    pub primary_pos_z: Vec<f64>,
    pub primary_dir_x: Vec<f64>,
    pub primary_dir_y: Vec<f64>,
    pub primary_dir_z: Vec<f64>,
}

impl EventRecord {
    /// Number of primary particles recorded for the event.
    pub fn primary_count(&self) -> usize {
        self.primary_particle_code.len()
    }

    /// Index of the hit for `cell_address`, if the event has one.
    pub fn hit_index(&self, cell_address: i32) -> Option<usize> {
        self.cell_address.iter().position(|&c| c == cell_address)
    }

    /// Checks that all parallel columns agree on their lengths.
    pub fn columns_consistent(&self) -> bool {
        let n = self.hit_count as usize;
        let hit_lens = [
            self.cell_address.len(), self.energy.len(), self.time.len(),
            self.pos_x.len(), self.pos_y.len(), self.pos_z.len(),
            self.particle_code.len(), self.track_id.len(), self.parent_id.len(),
            self.dir_x.len(), self.dir_y.len(), self.dir_z.len(),
            self.kinetic_energy.len(), self.process_id.len(), self.track_length.len(),
        ];
        let p = self.primary_count();
        let primary_lens = [
            self.primary_energy.len(),
            self.primary_pos_x.len(), self.primary_pos_y.len(), self.primary_pos_z.len(),
            self.primary_dir_x.len(), self.primary_dir_y.len(), self.primary_dir_z.len(),
        ];
        hit_lens.iter().all(|&l| l == n) && primary_lens.iter().all(|&l| l == p)
    }
}

/// A finished track path, ready for rendering or storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPath {
    pub event_id: i32,
    pub track_id: i32,
    pub parent_id: i32,
    pub particle_code: i32,
    pub particle_name: String,
    /// Display color as 8-bit sRGB.
    pub color: [u8; 3],
    pub points: Vec<Vec3>,
}
