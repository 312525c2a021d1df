// THEORY:
// The `pipeline` module is the top-level API of the probe. A `ProbePipeline` is
// the loop context: it holds the configuration, the fixed sample footprint, the
// recording session and the sink the session writes to. The viewer hands it one
// depth frame per iteration and gets back a `FrameReport` describing everything
// it needs to draw; keyboard commands are routed back into it with `handle`.
//
// Per frame:
// 1.  **Sample**: read depth at the nine footprint pixels and deproject them.
// 2.  **Estimate**: fold the nine points into a unit normal (or a typed error
//     when the patch is degenerate).
// 3.  **Overlay**: project the normal into the color image as a segment (or a
//     typed error when it cannot be drawn this frame).
// 4.  **Record**: hand the frame to the recording session, which writes it only
//     while a session is active and below its cap.

use crate::config::ProbeConfig;
use crate::core_modules::camera_model::{NormalSegment, ProjectionError};
use crate::core_modules::depth_frame::{DepthFrame, deproject_samples};
use crate::core_modules::normal_estimator::{NormalError, Point3, estimate_normal_with};
use crate::core_modules::recording::{FrameRecord, RecordOutcome, RecordingSession, SampleSink};
use crate::core_modules::region_sampler::{PixelCoord, SAMPLE_COUNT, sample_offsets};
use crate::error::ProbeError;
use log::{debug, info, warn};

/// Operator commands, bound to keys in the viewer window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    StartRecording,
    StopRecording,
    Snapshot,
    Quit,
}

impl Command {
    /// Maps a key code (as returned by a GUI key poll) to a command.
    pub fn from_key(key: i32) -> Option<Self> {
        if key < 0 {
            return None;
        }
        match u8::try_from(key & 0xFF).ok()? {
            b's' => Some(Self::StartRecording),
            b'e' => Some(Self::StopRecording),
            b'p' => Some(Self::Snapshot),
            b'q' => Some(Self::Quit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Exit,
}

/// Everything computed for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub pixels: [PixelCoord; SAMPLE_COUNT],
    pub points: [Point3; SAMPLE_COUNT],
    pub normal: Result<Point3, NormalError>,
    pub overlay: Result<NormalSegment, OverlayError>,
    pub recording: RecordOutcome,
}

/// Why no normal segment can be drawn for a frame.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum OverlayError {
    #[error(transparent)]
    NoNormal(#[from] NormalError),
    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

pub struct ProbePipeline<S: SampleSink> {
    config: ProbeConfig,
    pixels: [PixelCoord; SAMPLE_COUNT],
    session: RecordingSession,
    sink: S,
    sink_name: String,
    frame_count: u64,
}

impl<S: SampleSink> ProbePipeline<S> {
    /// `sink_name` is only used in error messages.
    pub fn new(config: ProbeConfig, sink: S, sink_name: impl Into<String>) -> Self {
        let pixels = sample_offsets(config.center(), config.edge);
        let session = RecordingSession::new(config.record_cap);
        Self {
            config,
            pixels,
            session,
            sink,
            sink_name: sink_name.into(),
            frame_count: 0,
        }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// The footprint pixels, center first.
    pub fn pixels(&self) -> &[PixelCoord; SAMPLE_COUNT] {
        &self.pixels
    }

    pub fn session(&self) -> &RecordingSession {
        &self.session
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Runs one frame through the probe.
    pub fn process<D: DepthFrame + ?Sized>(&mut self, depth: &D) -> Result<FrameReport, ProbeError> {
        self.frame_count += 1;

        let points = deproject_samples(
            depth,
            &self.pixels,
            &self.config.depth_intrinsics(),
            self.config.hole_filling,
        );

        let normal = estimate_normal_with(&points, self.config.orientation);
        let overlay = match &normal {
            Ok(n) => NormalSegment::project(
                &self.config.overlay_intrinsics,
                &points[0],
                n,
                self.config.normal_arrow_length,
            )
            .map_err(OverlayError::from),
            Err(e) => Err(OverlayError::from(*e)),
        };
        match &overlay {
            Ok(_) => {}
            Err(OverlayError::NoNormal(e)) => debug!("frame {}: {e}", self.frame_count),
            Err(OverlayError::Projection(e)) => warn!("frame {}: {e}", self.frame_count),
        }

        let record = if self.session.is_active() {
            normal.as_ref().ok().map(|n| FrameRecord::new(points, n))
        } else {
            None
        };
        let recording = self
            .session
            .record(&mut self.sink, record.as_ref())
            .map_err(|source| ProbeError::Record {
                path: self.sink_name.clone(),
                source,
            })?;
        if recording == RecordOutcome::Skipped {
            warn!("frame {}: degenerate patch, not recorded", self.frame_count);
        }

        Ok(FrameReport {
            pixels: self.pixels,
            points,
            normal,
            overlay,
            recording,
        })
    }

    /// Applies an operator command. Snapshots are the caller's job.
    pub fn handle(&mut self, command: Command) -> LoopControl {
        match command {
            Command::StartRecording => self.session.start(),
            Command::StopRecording => self.session.stop(),
            Command::Snapshot => {}
            Command::Quit => {
                info!("quit");
                return LoopControl::Exit;
            }
        }
        LoopControl::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wall(depth: f64) -> impl Fn(i32, i32) -> Option<f64> {
        move |col, row| ((0..640).contains(&col) && (0..480).contains(&row)).then_some(depth)
    }

    fn pipeline() -> ProbePipeline<Vec<FrameRecord>> {
        ProbePipeline::new(ProbeConfig::default(), Vec::new(), "memory")
    }

    #[test]
    fn keys_map_to_commands() {
        assert_eq!(Command::from_key(i32::from(b's')), Some(Command::StartRecording));
        assert_eq!(Command::from_key(i32::from(b'e')), Some(Command::StopRecording));
        assert_eq!(Command::from_key(i32::from(b'q')), Some(Command::Quit));
        assert_eq!(Command::from_key(i32::from(b'p')), Some(Command::Snapshot));
        assert_eq!(Command::from_key(0x100 | i32::from(b'q')), Some(Command::Quit));
        assert_eq!(Command::from_key(-1), None);
        assert_eq!(Command::from_key(i32::from(b'x')), None);
    }

    #[test]
    fn quit_exits_and_other_commands_continue() {
        let mut p = pipeline();
        assert_eq!(p.handle(Command::StartRecording), LoopControl::Continue);
        assert!(p.session().is_active());
        assert_eq!(p.handle(Command::Snapshot), LoopControl::Continue);
        assert_eq!(p.handle(Command::StopRecording), LoopControl::Continue);
        assert!(!p.session().is_active());
        assert_eq!(p.handle(Command::Quit), LoopControl::Exit);
    }

    #[test]
    fn flat_wall_gives_a_camera_facing_normal() {
        let mut p = pipeline();
        let report = p.process(&wall(0.8)).unwrap();
        let n = report.normal.unwrap();
        assert!((n.z + 1.0).abs() < 1e-9);
        assert!(report.overlay.is_ok());
        assert_eq!(report.recording, RecordOutcome::Idle);
        assert_eq!(report.pixels[0], PixelCoord::new(320.0, 240.0));
    }

    #[test]
    fn empty_depth_is_degenerate_and_not_drawn() {
        let mut p = pipeline();
        p.handle(Command::StartRecording);
        let report = p.process(&wall(0.0)).unwrap();
        assert_eq!(report.normal, Err(NormalError::Degenerate));
        assert_eq!(report.overlay, Err(OverlayError::NoNormal(NormalError::Degenerate)));
        assert_eq!(report.recording, RecordOutcome::Skipped);
        assert!(p.sink().is_empty());
    }

    #[test]
    fn samples_are_read_raw_by_default() {
        // A hole under the center pixel, with valid depth all around it.
        let frame = |col: i32, row: i32| -> Option<f64> {
            Some(if (col, row) == (320, 240) { 0.0 } else { 2.0 })
        };
        let mut p = pipeline();
        let report = p.process(&frame).unwrap();
        assert_eq!(report.points[0].z, 0.0);
        assert!(report.points[1..].iter().all(|pt| pt.z == 2.0));

        let config = ProbeConfig {
            hole_filling: true,
            ..ProbeConfig::default()
        };
        let mut filled = ProbePipeline::new(config, Vec::new(), "memory");
        assert_eq!(filled.process(&frame).unwrap().points[0].z, 2.0);
    }

    #[test]
    fn unprojectable_arrow_is_still_recorded() {
        // The arrow tip lands at z = 0.02 - 0.04, behind the camera.
        let mut p = pipeline();
        p.handle(Command::StartRecording);
        let report = p.process(&wall(0.02)).unwrap();
        assert!(report.normal.is_ok());
        assert!(matches!(
            report.overlay,
            Err(OverlayError::Projection(ProjectionError::BehindCamera(_)))
        ));
        assert_eq!(report.recording, RecordOutcome::Recorded { count: 1 });
        assert_eq!(p.sink().len(), 1);
    }

    #[test]
    fn idle_frames_never_reach_the_sink() {
        let mut p = pipeline();
        for _ in 0..3 {
            assert_eq!(p.process(&wall(0.9)).unwrap().recording, RecordOutcome::Idle);
        }
        assert!(p.sink().is_empty());
        p.handle(Command::StartRecording);
        assert_eq!(
            p.process(&wall(0.9)).unwrap().recording,
            RecordOutcome::Recorded { count: 1 }
        );
        assert_eq!(p.sink().len(), 1);
    }

    #[test]
    fn recording_stops_by_itself() {
        let config = ProbeConfig {
            record_cap: 3,
            ..ProbeConfig::default()
        };
        let mut p = ProbePipeline::new(config, Vec::new(), "memory");
        p.handle(Command::StartRecording);
        let outcomes: Vec<RecordOutcome> = (0..4)
            .map(|_| p.process(&wall(1.0)).unwrap().recording)
            .collect();
        assert_eq!(
            outcomes,
            vec![
                RecordOutcome::Recorded { count: 1 },
                RecordOutcome::Recorded { count: 2 },
                RecordOutcome::Finished { count: 3 },
                RecordOutcome::Idle,
            ]
        );
        assert_eq!(p.sink().len(), 3);
        assert_eq!(p.frame_count(), 4);
    }
}
