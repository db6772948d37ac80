use anyhow::{Context, Result};
use detector_common::OutputFormat;
use log::info;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// `<base>_<suffix>.<ext>` for the configured format.
pub fn output_path(base_filename: &str, suffix: &str, format: OutputFormat) -> PathBuf {
    PathBuf::from(format!("{}_{}.{}", base_filename, suffix, format.extension()))
}

/// Serializes `data` to `path` in the given format.
pub fn write_data<T: Serialize + ?Sized, P: AsRef<Path>>(path: P, data: &T, format: OutputFormat) -> Result<()> {
    let path_ref = path.as_ref();
    let file = File::create(path_ref)
        .with_context(|| format!("Error creating output file '{}'", path_ref.display()))?;
    let mut writer = BufWriter::new(file);

    match format {
        OutputFormat::Json => {
            serde_json::to_writer(&mut writer, data)
                .with_context(|| format!("Error serializing to JSON '{}'", path_ref.display()))?;
        }
        OutputFormat::Bincode => {
            bincode::serialize_into(&mut writer, data)
                .with_context(|| format!("Error serializing to bincode '{}'", path_ref.display()))?;
        }
        OutputFormat::Messagepack => {
            rmp_serde::encode::write(&mut writer, data)
                .with_context(|| format!("Error serializing to MessagePack '{}'", path_ref.display()))?;
        }
    }
    writer.flush()?;

    info!("Saved {} ({:?} format)", path_ref.display(), format);
    Ok(())
}

/// Reads a value written by [`write_data`] (or any producer of the same format).
pub fn read_data<T: DeserializeOwned, P: AsRef<Path>>(path: P, format: OutputFormat) -> Result<T> {
    let path_ref = path.as_ref();
    let file = File::open(path_ref)
        .with_context(|| format!("Failed to open '{}'", path_ref.display()))?;
    let reader = BufReader::new(file);

    let value = match format {
        OutputFormat::Json => serde_json::from_reader(reader)
            .with_context(|| format!("Failed to parse JSON from '{}'", path_ref.display()))?,
        OutputFormat::Bincode => bincode::deserialize_from(reader)
            .with_context(|| format!("Failed to decode bincode from '{}'", path_ref.display()))?,
        OutputFormat::Messagepack => rmp_serde::from_read(reader)
            .with_context(|| format!("Failed to decode MessagePack from '{}'", path_ref.display()))?,
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use detector_common::{EventRecord, ReplayEvent};

    #[test]
    fn test_output_path() {
        assert_eq!(output_path("out/csi", "events", OutputFormat::Bincode), PathBuf::from("out/csi_events.bin"));
        assert_eq!(output_path("csi", "trajectories", OutputFormat::Json), PathBuf::from("csi_trajectories.json"));
    }

    #[test]
    fn test_events_survive_every_format() {
        let dir = tempfile::tempdir().unwrap();
        let record = EventRecord {
            event_id: 4,
            total_energy: 1.25,
            hit_count: 1,
            cell_address: vec![10101],
            energy: vec![1.25],
            process_id: vec![0],
            ..Default::default()
        };
        for format in [OutputFormat::Json, OutputFormat::Bincode, OutputFormat::Messagepack] {
            let path = output_path(dir.path().join("run").to_str().unwrap(), "events", format);
            write_data(&path, &vec![record.clone()], format).unwrap();
            let back: Vec<EventRecord> = read_data(&path, format).unwrap();
            assert_eq!(back, vec![record.clone()]);
        }
    }

    #[test]
    fn test_replay_json_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("replay.json");
        let json = r#"[{"event_id": 0, "tracks": [{
            "info": {"track_id": 1, "parent_id": 0, "particle_code": 11, "particle_name": "e-"},
            "initial_position": {"x": 0.0, "y": 0.0, "z": 0.0},
            "steps": [{"cell_address": 5, "energy_deposit": 0.2,
                       "position": {"x": 0.0, "y": 0.0, "z": 1.0}, "global_time": 1.0,
                       "track_id": 1, "parent_id": 0, "particle_code": 11,
                       "momentum_direction": {"x": 0.0, "y": 0.0, "z": 1.0},
                       "kinetic_energy": 2.0, "step_length": 0.5}]
        }]}]"#;
        std::fs::write(&path, json).unwrap();

        let events: Vec<ReplayEvent> = read_data(&path, OutputFormat::Json).unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].primaries.is_empty());
        let step = &events[0].tracks[0].steps[0];
        assert_eq!(step.creator_process, "Primary");
        assert!(!step.boundary_crossing);
        assert_eq!(step.end_point(), step.position);
    }
}
