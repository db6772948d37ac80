use crate::hits::HitRecord;
use crate::process_table::ProcessLabelTable;
use detector_common::{EventRecord, PrimaryVertex};
use log::{debug, warn};

/// Destination for finished event rows.
pub trait EventSink {
    fn push(&mut self, record: EventRecord);
}

impl EventSink for Vec<EventRecord> {
    fn push(&mut self, record: EventRecord) {
        Vec::push(self, record);
    }
}

/// Turns one event's drained hits and primary vertices into an [`EventRecord`].
///
/// Holds no state between events; process names are resolved through the
/// run's shared label table.
#[derive(Clone, Copy)]
pub struct EventRecordBuilder<'a> {
    labels: &'a ProcessLabelTable,
}

impl<'a> EventRecordBuilder<'a> {
    pub fn new(labels: &'a ProcessLabelTable) -> Self {
        EventRecordBuilder { labels }
    }

    /// Builds the row. Hits without positive energy are left out of every column.
    pub fn build(&self, event_id: i32, hits: &[HitRecord], vertices: &[PrimaryVertex]) -> EventRecord {
        let mut record = EventRecord { event_id, ..Default::default() };

        // --- Primary particles: one entry per particle, sharing its vertex position ---
        if vertices.is_empty() {
            warn!("Event {} has no primary vertex.", event_id);
        }
        for vertex in vertices {
            for particle in &vertex.particles {
                record.primary_particle_code.push(particle.particle_code);
                record.primary_energy.push(particle.total_energy);
                record.primary_pos_x.push(vertex.position.x);
                record.primary_pos_y.push(vertex.position.y);
                record.primary_pos_z.push(vertex.position.z);
                record.primary_dir_x.push(particle.momentum_direction.x);
                record.primary_dir_y.push(particle.momentum_direction.y);
                record.primary_dir_z.push(particle.momentum_direction.z);
            }
        }

        // --- Hits ---
        for hit in hits.iter().filter(|h| h.accumulated_energy > 0.0) {
            record.total_energy += hit.accumulated_energy;
            record.cell_address.push(hit.cell_address);
            record.energy.push(hit.accumulated_energy);
            record.time.push(hit.earliest_time);
            record.pos_x.push(hit.position.x);
            record.pos_y.push(hit.position.y);
            record.pos_z.push(hit.position.z);
            record.particle_code.push(hit.particle_code);
            record.track_id.push(hit.origin_track_id);
            record.parent_id.push(hit.parent_id);
            record.dir_x.push(hit.momentum_direction.x);
            record.dir_y.push(hit.momentum_direction.y);
            record.dir_z.push(hit.momentum_direction.z);
            record.kinetic_energy.push(hit.kinetic_energy);
            record.process_id.push(self.labels.intern(&hit.creator_process));
            record.track_length.push(hit.accumulated_track_length);
        }
        record.hit_count = record.cell_address.len() as u32;

        debug!(
            "Event {}: {} hits, total edep {:.4} MeV, {} primaries",
            event_id, record.hit_count, record.total_energy, record.primary_count()
        );
        record
    }

    /// Builds the row and appends it to `sink`.
    pub fn emit<S: EventSink + ?Sized>(&self, event_id: i32, hits: &[HitRecord], vertices: &[PrimaryVertex], sink: &mut S) {
        sink.push(self.build(event_id, hits, vertices));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hits::tests::step;
    use crate::hits::CellHitAggregator;
    use detector_common::{PrimaryParticle, Vec3};

    fn vertex() -> PrimaryVertex {
        PrimaryVertex {
            position: Vec3::new(0.0, 0.0, -100.0),
            particles: vec![
                PrimaryParticle { particle_code: 11, total_energy: 5.511, momentum_direction: Vec3::new(0.0, 0.0, 1.0) },
                PrimaryParticle { particle_code: -11, total_energy: 3.511, momentum_direction: Vec3::new(0.0, 1.0, 0.0) },
            ],
        }
    }

    #[test]
    fn test_three_step_event() {
        let labels = ProcessLabelTable::new();
        let mut agg = CellHitAggregator::new();
        agg.on_step(&step(5, 0.2, 1.0));
        agg.on_step(&step(5, 0.3, 0.5));
        agg.on_step(&step(7, 0.1, 2.0));

        let hits = agg.drain();
        let record = EventRecordBuilder::new(&labels).build(0, &hits, &[vertex()]);

        assert_eq!(record.hit_count, 2);
        assert!((record.total_energy - 0.6).abs() < 1e-12);
        let i5 = record.hit_index(5).unwrap();
        assert!((record.energy[i5] - 0.5).abs() < 1e-12);
        assert_eq!(record.time[i5], 0.5);
        let i7 = record.hit_index(7).unwrap();
        assert!((record.energy[i7] - 0.1).abs() < 1e-12);
        assert_eq!(record.time[i7], 2.0);
        assert!(record.columns_consistent());
        assert!(agg.is_empty());
    }

    #[test]
    fn test_primary_columns_follow_particles() {
        let labels = ProcessLabelTable::new();
        let record = EventRecordBuilder::new(&labels).build(3, &[], &[vertex()]);
        assert_eq!(record.hit_count, 0);
        assert_eq!(record.total_energy, 0.0);
        assert_eq!(record.primary_particle_code, vec![11, -11]);
        assert_eq!(record.primary_pos_z, vec![-100.0, -100.0]);
        assert_eq!(record.primary_dir_y, vec![0.0, 1.0]);
        assert!(record.columns_consistent());
    }

    #[test]
    fn test_non_positive_hits_are_excluded() {
        let labels = ProcessLabelTable::new();
        let mut agg = CellHitAggregator::new();
        agg.on_step(&step(1, 0.4, 0.0));
        agg.on_step(&step(2, 0.2, 0.0));
        let mut hits = agg.drain();
        hits[1].accumulated_energy = 0.0;

        let record = EventRecordBuilder::new(&labels).build(1, &hits, &[]);
        assert_eq!(record.hit_count, 1);
        assert_eq!(record.cell_address, vec![1]);
        assert!((record.total_energy - 0.4).abs() < 1e-12);
        assert!(record.columns_consistent());
    }

    #[test]
    fn test_process_ids_resolve_through_table() {
        let labels = ProcessLabelTable::new();
        labels.intern("Primary");
        let mut agg = CellHitAggregator::new();
        let mut a = step(1, 0.1, 0.0);
        a.creator_process = "compt".to_string();
        let b = step(2, 0.1, 0.0);
        let mut c = step(3, 0.1, 0.0);
        c.creator_process = "compt".to_string();
        for s in [&a, &b, &c] {
            agg.on_step(s);
        }

        let mut sink: Vec<EventRecord> = Vec::new();
        EventRecordBuilder::new(&labels).emit(9, &agg.drain(), &[], &mut sink);
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].process_id, vec![1, 0, 1]);
        assert_eq!(labels.export()[&1], "compt");
    }
}
