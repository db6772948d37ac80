use detector_common::{TrackInfo, TrajectoryPath, Vec3};
use palette::Srgb;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrajectoryError {
    #[error("trajectory point {index} out of range (trajectory has {len} points)")]
    OutOfRange { index: usize, len: usize },
}

/// Reference to a path inside a [`TrajectoryRecorder`].
///
/// Only valid until the recorder is next drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrajectoryHandle {
    index: usize,
    epoch: u32,
}

#[derive(Debug)]
struct Slot {
    info: Option<TrackInfo>,
    points: Vec<Vec3>,
    /// Set once the points were handed to another path.
    merged: bool,
}

/// Arena of per-track point paths for the event a worker is processing.
#[derive(Debug, Default)]
pub struct TrajectoryRecorder {
    slots: Vec<Slot>,
    epoch: u32,
}

impl TrajectoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts an anonymous path seeded with one point.
    pub fn create(&mut self, initial_position: Vec3) -> TrajectoryHandle {
        self.insert(None, initial_position)
    }

    /// Starts the path of a track, seeded with its starting point.
    pub fn create_for_track(&mut self, info: TrackInfo, initial_position: Vec3) -> TrajectoryHandle {
        self.insert(Some(info), initial_position)
    }

    fn insert(&mut self, info: Option<TrackInfo>, initial_position: Vec3) -> TrajectoryHandle {
        let index = self.slots.len();
        self.slots.push(Slot { info, points: vec![initial_position], merged: false });
        TrajectoryHandle { index, epoch: self.epoch }
    }

    fn slot(&self, handle: TrajectoryHandle) -> &Slot {
        assert_eq!(handle.epoch, self.epoch, "stale trajectory handle used after drain");
        &self.slots[handle.index]
    }

    fn assert_live(&self, handle: TrajectoryHandle) {
        assert!(!self.slot(handle).merged, "trajectory {} was merged away and cannot be modified", handle.index);
    }

    /// Mutable access for live paths only; merged paths are detached for good.
    fn live_slot_mut(&mut self, handle: TrajectoryHandle) -> &mut Slot {
        self.assert_live(handle);
        &mut self.slots[handle.index]
    }

    pub fn append_point(&mut self, handle: TrajectoryHandle, position: Vec3) {
        self.live_slot_mut(handle).points.push(position);
    }

    /// Moves every point of `source`, in order, to the end of `target`.
    /// `source` is left empty and detached.
    pub fn merge(&mut self, target: TrajectoryHandle, source: TrajectoryHandle) {
        assert_ne!(target, source, "cannot merge a trajectory into itself");
        self.assert_live(target);
        let moved = {
            let source_slot = self.live_slot_mut(source);
            source_slot.merged = true;
            std::mem::take(&mut source_slot.points)
        };
        self.live_slot_mut(target).points.extend(moved);
    }

    pub fn is_merged(&self, handle: TrajectoryHandle) -> bool {
        self.slot(handle).merged
    }

    pub fn point_count(&self, handle: TrajectoryHandle) -> usize {
        self.slot(handle).points.len()
    }

    pub fn point_at(&self, handle: TrajectoryHandle, i: usize) -> Result<Vec3, TrajectoryError> {
        let points = &self.slot(handle).points;
        points.get(i).copied().ok_or(TrajectoryError::OutOfRange { index: i, len: points.len() })
    }

    pub fn points(&self, handle: TrajectoryHandle) -> &[Vec3] {
        &self.slot(handle).points
    }

    pub fn track_info(&self, handle: TrajectoryHandle) -> Option<&TrackInfo> {
        self.slot(handle).info.as_ref()
    }

    /// One-line description of a path.
    pub fn describe(&self, handle: TrajectoryHandle) -> String {
        let slot = self.slot(handle);
        match &slot.info {
            Some(info) => format!(
                "Trajectory: TrackID={}, ParentID={}, Particle={}, PDGEncoding={}, Charge={} e, Points={}",
                info.track_id, info.parent_id, info.particle_name, info.particle_code, info.charge, slot.points.len()
            ),
            None => format!("Trajectory: (untracked), Points={}", slot.points.len()),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Releases every live path in creation order and invalidates all
    /// outstanding handles. Merged-away paths are dropped.
    pub fn drain(&mut self, event_id: i32) -> Vec<TrajectoryPath> {
        self.epoch = self.epoch.wrapping_add(1);
        std::mem::take(&mut self.slots)
            .into_iter()
            .filter(|slot| !slot.merged)
            .map(|slot| {
                let info = slot.info.unwrap_or_else(|| TrackInfo {
                    track_id: -1,
                    parent_id: -1,
                    particle_code: 0,
                    particle_name: String::new(),
                    charge: 0.0,
                    initial_momentum: Vec3::zero(),
                    initial_kinetic_energy: 0.0,
                });
                let (r, g, b) = track_color(&info.particle_name).into_components();
                TrajectoryPath {
                    event_id,
                    track_id: info.track_id,
                    parent_id: info.parent_id,
                    particle_code: info.particle_code,
                    particle_name: info.particle_name,
                    color: [r, g, b],
                    points: slot.points,
                }
            })
            .collect()
    }
}

/// Display color for a particle species.
pub fn track_color(particle_name: &str) -> Srgb<u8> {
    let rgb: Srgb<f32> = match particle_name {
        "e-" => Srgb::new(0.0, 0.0, 1.0),
        "e+" => Srgb::new(1.0, 0.0, 0.0),
        "gamma" => Srgb::new(0.0, 1.0, 0.0),
        "proton" => Srgb::new(1.0, 1.0, 0.0),
        "alpha" | "opticalphoton" => Srgb::new(0.0, 1.0, 1.0),
        _ => Srgb::new(1.0, 1.0, 1.0),
    };
    rgb.into_format()
}
