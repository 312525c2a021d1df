use nalgebra::Vector3;
use surface_probe::core_modules::camera_model::CameraIntrinsics;
use surface_probe::core_modules::recording::{CsvFileSink, RecordOutcome};
use surface_probe::{Command, LoopControl, ProbeConfig, ProbePipeline};

/// Depth of the plane `n . X = d` seen through each pixel.
fn plane(k: CameraIntrinsics, n: Vector3<f64>, d: f64) -> impl Fn(i32, i32) -> Option<f64> {
    move |col, row| {
        if !(0..640).contains(&col) || !(0..480).contains(&row) {
            return None;
        }
        let ray = Vector3::new(
            (f64::from(col) - k.cx) / k.fx,
            (f64::from(row) - k.cy) / k.fy,
            1.0,
        );
        Some(d / n.dot(&ray))
    }
}

#[test]
fn tilted_plane_is_measured_and_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("surface_normal.csv");
    let config = ProbeConfig {
        output_path: output.clone(),
        ..ProbeConfig::default()
    };
    let frame = plane(config.depth_intrinsics(), Vector3::new(-0.5, 0.0, 1.0), 1.0);
    let mut pipeline = ProbePipeline::new(config, CsvFileSink::new(&output), output.display().to_string());

    let report = pipeline.process(&frame).unwrap();
    let n = report.normal.unwrap();
    let expected = Vector3::new(0.5, 0.0, -1.0).normalize();
    assert!((n - expected).norm() < 1e-9, "got {n:?}");
    assert!(report.overlay.is_ok());
    assert!(!output.exists());

    assert_eq!(pipeline.handle(Command::StartRecording), LoopControl::Continue);
    let mut last = RecordOutcome::Idle;
    for _ in 0..400 {
        last = pipeline.process(&frame).unwrap().recording;
    }
    assert_eq!(last, RecordOutcome::Finished { count: 400 });
    assert!(!pipeline.session().is_active());
    assert_eq!(pipeline.session().count(), 0);

    let contents = std::fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 1200);

    let z_row: Vec<f64> = lines[2].split(',').map(|f| f.parse().unwrap()).collect();
    assert_eq!(z_row.len(), 10);
    assert_eq!(z_row[9], -0.895);
    assert!(z_row[..9].iter().all(|z| *z > 0.0));

    // Nothing more is written once the session has closed.
    pipeline.process(&frame).unwrap();
    let again = std::fs::read_to_string(&output).unwrap();
    assert_eq!(again.lines().count(), 1200);
}

#[test]
fn stopping_midway_keeps_rows_already_written() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("partial.csv");
    let config = ProbeConfig::default();
    let frame = plane(config.depth_intrinsics(), Vector3::new(0.0, 0.0, 1.0), 0.6);
    let mut pipeline = ProbePipeline::new(config, CsvFileSink::new(&output), "partial.csv");

    pipeline.handle(Command::StartRecording);
    for _ in 0..5 {
        pipeline.process(&frame).unwrap();
    }
    pipeline.handle(Command::StopRecording);
    pipeline.process(&frame).unwrap();

    let contents = std::fs::read_to_string(&output).unwrap();
    assert_eq!(contents.lines().count(), 15);
    assert_eq!(pipeline.handle(Command::Quit), LoopControl::Exit);
}
