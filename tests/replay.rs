use detector_common::{
    DetectorConfig, EventRecord, OutputFormat, PrimaryParticle, PrimaryVertex, ReplayEvent, ReplayTrack, StepEvent,
    TrackInfo, Vec3, OPTICAL_PHOTON_PDG,
};
use detector_engine::output::{output_path, read_data, write_data};
use detector_engine::process_table::{read_process_map, write_process_map};
use detector_engine::RunContext;
use indicatif::ProgressBar;

fn step(track: &TrackInfo, cell: i32, edep: f64, time: f64, process: &str) -> StepEvent {
    StepEvent {
        cell_address: cell,
        energy_deposit: edep,
        position: Vec3::new(0.0, 0.0, time),
        post_position: Some(Vec3::new(0.0, 0.0, time + 1.0)),
        global_time: time,
        track_id: track.track_id,
        parent_id: track.parent_id,
        particle_code: track.particle_code,
        momentum_direction: Vec3::new(0.0, 0.0, 1.0),
        kinetic_energy: 1.0,
        creator_process: process.to_string(),
        step_length: 0.5,
        pre_volume: "CsI".to_string(),
        post_volume: "CsI".to_string(),
        boundary_crossing: false,
    }
}

fn track(track_id: i32, parent_id: i32, particle_code: i32, name: &str) -> TrackInfo {
    TrackInfo {
        track_id,
        parent_id,
        particle_code,
        particle_name: name.to_string(),
        charge: 0.0,
        initial_momentum: Vec3::zero(),
        initial_kinetic_energy: 0.0,
    }
}

/// Gamma converts: the primary deposits in one crystal, the secondaries in a
/// neighbour, and an optical photon escapes.
fn event(event_id: i32) -> ReplayEvent {
    let gamma = track(1, 0, 22, "gamma");
    let electron = track(2, 1, 11, "e-");
    let positron = track(3, 1, -11, "e+");
    let photon = track(4, 2, OPTICAL_PHOTON_PDG, "opticalphoton");

    let mut escape = step(&photon, 20304, 0.0, 7.0, "Scintillation");
    escape.boundary_crossing = true;
    escape.post_volume = "World".to_string();

    ReplayEvent {
        event_id,
        primaries: vec![PrimaryVertex {
            position: Vec3::new(0.0, 0.0, -200.0),
            particles: vec![PrimaryParticle { particle_code: 22, total_energy: 10.0, momentum_direction: Vec3::new(0.0, 0.0, 1.0) }],
        }],
        tracks: vec![
            ReplayTrack {
                steps: vec![step(&gamma, 20304, 0.0, 1.0, "Primary"), step(&gamma, 20304, 0.05, 1.2, "Primary")],
                info: gamma,
                initial_position: Vec3::new(0.0, 0.0, -200.0),
            },
            ReplayTrack {
                steps: vec![step(&electron, 20305, 2.0, 1.4, "conv"), step(&electron, 20304, 1.0, 1.3, "conv")],
                info: electron,
                initial_position: Vec3::zero(),
            },
            ReplayTrack {
                steps: vec![step(&positron, 20305, 3.0, 1.1, "conv")],
                info: positron,
                initial_position: Vec3::zero(),
            },
            ReplayTrack { steps: vec![escape], info: photon, initial_position: Vec3::zero() },
        ],
    }
}

#[test]
fn replay_file_to_records_and_process_map() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("steps.msgpack");
    let events: Vec<ReplayEvent> = (0..10).map(event).collect();
    write_data(&input, &events, OutputFormat::from_path(&input).unwrap()).unwrap();

    let base = dir.path().join("csi");
    let config = DetectorConfig::parse(&format!(
        "[run]\nworkers = 3\n[output]\nbase_filename = \"{}\"\nformat = \"bincode\"\n",
        base.display()
    ))
    .unwrap();

    let replayed: Vec<ReplayEvent> = read_data(&input, OutputFormat::Messagepack).unwrap();
    let run = RunContext::new(config);
    let output = run.run(&replayed, &ProgressBar::hidden()).unwrap();
    let mapping = run.end_run(&output.finished, true).unwrap().unwrap();

    let events_path = output_path(base.to_str().unwrap(), "events", OutputFormat::Bincode);
    write_data(&events_path, &output.events, OutputFormat::Bincode).unwrap();
    let map_path = dir.path().join("ProcessIDMap.txt");
    write_process_map(&map_path, &mapping).unwrap();

    let records: Vec<EventRecord> = read_data(&events_path, OutputFormat::Bincode).unwrap();
    let decoded = read_process_map(&map_path).unwrap();
    assert_eq!(records.len(), 10);
    assert_eq!(decoded.len(), 2);

    for record in &records {
        assert!(record.columns_consistent());
        assert_eq!(record.hit_count, 2);
        assert!((record.total_energy - 6.05).abs() < 1e-9);

        // Crystal 20304: first deposit came from the gamma, the electron only adds energy
        let i = record.hit_index(20304).unwrap();
        assert!((record.energy[i] - 1.05).abs() < 1e-9);
        assert_eq!(record.time[i], 1.2);
        assert_eq!(record.particle_code[i], 22);
        assert_eq!(record.track_id[i], 1);
        assert_eq!(decoded[&record.process_id[i]], "Primary");
        assert!((record.track_length[i] - 1.0).abs() < 1e-9);

        // Crystal 20305: electron first, positron's earlier time lowers the hit time
        let j = record.hit_index(20305).unwrap();
        assert!((record.energy[j] - 5.0).abs() < 1e-9);
        assert_eq!(record.time[j], 1.1);
        assert_eq!(record.particle_code[j], 11);
        assert_eq!(record.parent_id[j], 1);
        assert_eq!(decoded[&record.process_id[j]], "conv");

        assert_eq!(record.primary_particle_code, vec![22]);
        assert_eq!(record.primary_pos_z, vec![-200.0]);
    }

    assert_eq!(run.exits().count(20304), 10);
    assert_eq!(output.trajectories.len(), 40);
    let gamma_path = &output.trajectories[0];
    assert_eq!(gamma_path.track_id, 1);
    assert_eq!(gamma_path.points.len(), 3);
    assert_eq!(gamma_path.color, [0, 255, 0]);
}
