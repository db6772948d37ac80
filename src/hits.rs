use detector_common::{StepEvent, Vec3};
use log::trace;
use std::collections::HashMap;

/// Energy deposit and provenance for one crystal within one event.
///
/// Provenance fields come from the first depositing step and are never
/// updated afterwards; only the energy, the track length and the earliest
/// time keep changing.
#[derive(Debug, Clone, PartialEq)]
pub struct HitRecord {
    pub cell_address: i32,
    pub accumulated_energy: f64,
    pub earliest_time: f64,
    pub position: Vec3,
    pub origin_track_id: i32,
    pub parent_id: i32,
    pub particle_code: i32,
    pub momentum_direction: Vec3,
    pub kinetic_energy: f64,
    pub creator_process: String,
    pub accumulated_track_length: f64,
}

impl HitRecord {
    fn from_step(step: &StepEvent) -> Self {
        HitRecord {
            cell_address: step.cell_address,
            accumulated_energy: step.energy_deposit,
            earliest_time: step.global_time,
            position: step.position,
            origin_track_id: step.track_id,
            parent_id: step.parent_id,
            particle_code: step.particle_code,
            momentum_direction: step.momentum_direction,
            kinetic_energy: step.kinetic_energy,
            creator_process: step.creator_process.clone(),
            accumulated_track_length: step.step_length,
        }
    }
}

/// Per-event deduplication of steps into at most one [`HitRecord`] per cell.
///
/// Owned by a single worker and driven sequentially; call [`drain`](Self::drain)
/// exactly once at the end of every event.
#[derive(Debug, Default)]
pub struct CellHitAggregator {
    /// Records in creation order.
    hits: Vec<HitRecord>,
    /// cell address -> index into `hits`
    index: HashMap<i32, usize>,
}

impl CellHitAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one step into the current event. Steps that deposit no energy
    /// (zero, negative or NaN) are ignored.
    pub fn on_step(&mut self, step: &StepEvent) {
        if !(step.energy_deposit > 0.0) {
            return;
        }

        match self.index.get(&step.cell_address) {
            Some(&i) => {
                let hit = &mut self.hits[i];
                hit.accumulated_energy += step.energy_deposit;
                hit.accumulated_track_length += step.step_length;
                if step.global_time < hit.earliest_time {
                    hit.earliest_time = step.global_time;
                }
            }
            None => {
                trace!(
                    "New hit in cell {} from track {} ({}), edep {:.4}",
                    step.cell_address, step.track_id, step.creator_process, step.energy_deposit
                );
                self.index.insert(step.cell_address, self.hits.len());
                self.hits.push(HitRecord::from_step(step));
            }
        }
    }

    /// Looks up the current record for a cell. A cell that has not been hit
    /// in this event simply has nothing to report.
    pub fn get(&self, cell_address: i32) -> Option<&HitRecord> {
        self.index.get(&cell_address).map(|&i| &self.hits[i])
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Hands out every record in creation order and leaves the aggregator
    /// empty for the next event.
    pub fn drain(&mut self) -> Vec<HitRecord> {
        self.index.clear();
        std::mem::take(&mut self.hits)
    }
}
