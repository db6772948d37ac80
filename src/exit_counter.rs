use anyhow::{Context, Result};
use dashmap::DashMap;
use detector_common::{BoundaryConfig, CellIndex, GeometryConfig, StepEvent};
use log::{info, trace};
use std::path::Path;

/// Run-scoped tally of one particle species leaving each crystal.
///
/// Shared by all workers; each cell's count is incremented under that key's
/// shard lock. Counts persist across events until [`reset`](Self::reset).
#[derive(Debug)]
pub struct BoundaryExitCounter {
    species_pdg: i32,
    sensitive_volume: String,
    surrounding_volume: String,
    counts: DashMap<i32, u64>,
}

impl BoundaryExitCounter {
    pub fn new(species_pdg: i32, sensitive_volume: impl Into<String>, surrounding_volume: impl Into<String>) -> Self {
        BoundaryExitCounter {
            species_pdg,
            sensitive_volume: sensitive_volume.into(),
            surrounding_volume: surrounding_volume.into(),
            counts: DashMap::new(),
        }
    }

    pub fn from_config(boundary: &BoundaryConfig, geometry: &GeometryConfig) -> Self {
        Self::new(boundary.species_pdg, geometry.sensitive_volume.clone(), geometry.surrounding_volume.clone())
    }

    /// Counts the step if it carries the tracked species out of a crystal
    /// into the surrounding volume.
    pub fn on_step(&self, step: &StepEvent) {
        if !step.boundary_crossing
            || step.particle_code != self.species_pdg
            || step.pre_volume != self.sensitive_volume
            || step.post_volume != self.surrounding_volume
        {
            return;
        }
        // Cell address is resolved from the pre-step point, i.e. the crystal being left.
        *self.counts.entry(step.cell_address).or_insert(0) += 1;
        trace!("Exit from cell {} (track {})", step.cell_address, step.track_id);
    }

    pub fn count(&self, cell_address: i32) -> u64 {
        self.counts.get(&cell_address).map(|c| *c).unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().map(|entry| *entry.value()).sum()
    }

    /// Clears every count.
    pub fn reset(&self) {
        self.counts.clear();
    }

    /// `(cell_address, count)` pairs sorted by cell address.
    pub fn snapshot(&self) -> Vec<(i32, u64)> {
        let mut pairs: Vec<(i32, u64)> = self.counts.iter().map(|e| (*e.key(), *e.value())).collect();
        pairs.sort_unstable_by_key(|&(cell, _)| cell);
        pairs
    }

    /// Writes the counts as CSV with decoded crystal indices. Addresses
    /// outside the `XXYYZZ` layout get empty index columns.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path_ref = path.as_ref();
        let mut writer = csv::Writer::from_path(path_ref)
            .with_context(|| format!("Failed to create exit count file '{}'", path_ref.display()))?;
        writer.write_record(["cell_address", "ix", "iy", "iz", "count"])?;
        let snapshot = self.snapshot();
        for &(cell, count) in &snapshot {
            let (ix, iy, iz) = match CellIndex::from_address(cell) {
                Some(c) => (c.ix.to_string(), c.iy.to_string(), c.iz.to_string()),
                None => (String::new(), String::new(), String::new()),
            };
            writer.write_record([cell.to_string(), ix, iy, iz, count.to_string()])?;
        }
        writer.flush()?;
        info!("Exit counts for {} cells saved to {}", snapshot.len(), path_ref.display());
        Ok(())
    }
}
