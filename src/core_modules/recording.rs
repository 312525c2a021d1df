// THEORY:
// The `recording` module owns the only long-lived mutable state of the probe: the
// recording session. A session is switched on by the operator, appends one
// `FrameRecord` per processed frame, and switches itself off once it has written
// `cap` frames. Stopping by hand also resets the counter.
//
// Records go to a `SampleSink`. The file sink opens its target in append mode for
// every frame and closes it straight away, so a crash loses at most the frame in
// flight. Each frame becomes three CSV rows (x, y, z); every row holds the nine
// sample coordinates followed by the matching normal component rounded down to
// three decimals.

use crate::core_modules::normal_estimator::Point3;
use crate::core_modules::region_sampler::SAMPLE_COUNT;
use crate::core_modules::rounding::floor_round;
use log::info;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Default number of frames recorded per session.
pub const DEFAULT_RECORD_CAP: u32 = 400;

/// Decimal places kept for the normal components in a record.
pub const NORMAL_PRECISION: i32 = 3;

/// One frame's worth of samples, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRecord {
    pub points: [Point3; SAMPLE_COUNT],
    /// Normal components already rounded with `floor_round`.
    pub normal: Point3,
}

impl FrameRecord {
    pub fn new(points: [Point3; SAMPLE_COUNT], normal: &Point3) -> Self {
        Self {
            points,
            normal: normal.map(|c| floor_round(c, NORMAL_PRECISION)),
        }
    }

    /// The three rows (x, y, z) of this record.
    pub fn rows(&self) -> [Vec<f64>; 3] {
        std::array::from_fn(|axis| {
            self.points
                .iter()
                .map(|p| p[axis])
                .chain(std::iter::once(self.normal[axis]))
                .collect()
        })
    }

    pub fn write_csv<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for row in self.rows() {
            let line = row.iter().map(f64::to_string).collect::<Vec<_>>().join(",");
            writeln!(out, "{line}")?;
        }
        Ok(())
    }
}

/// Destination for recorded frames.
pub trait SampleSink {
    fn append(&mut self, record: &FrameRecord) -> io::Result<()>;
}

/// Appends records to a CSV file, reopening it for every frame.
#[derive(Debug, Clone)]
pub struct CsvFileSink {
    path: PathBuf,
}

impl CsvFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SampleSink for CsvFileSink {
    fn append(&mut self, record: &FrameRecord) -> io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        record.write_csv(&mut file)?;
        file.flush()
    }
}

impl SampleSink for Vec<FrameRecord> {
    fn append(&mut self, record: &FrameRecord) -> io::Result<()> {
        self.push(record.clone());
        Ok(())
    }
}

/// What happened to the current frame with respect to recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// No session is active.
    Idle,
    /// The frame was written; `count` frames so far in this session.
    Recorded { count: u32 },
    /// The frame was written and it filled the session, which is now closed.
    Finished { count: u32 },
    /// A session is active but this frame had nothing valid to write.
    Skipped,
}

/// Bounded, operator-toggled recording state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingSession {
    active: bool,
    count: u32,
    cap: u32,
}

impl RecordingSession {
    pub fn new(cap: u32) -> Self {
        Self {
            active: false,
            count: 0,
            cap,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn cap(&self) -> u32 {
        self.cap
    }

    /// Turns recording on. Restarting an active session keeps its count.
    pub fn start(&mut self) {
        self.active = true;
        info!("start recording data");
    }

    /// Turns recording off and resets the counter.
    pub fn stop(&mut self) {
        self.active = false;
        self.count = 0;
        info!("end recording data");
    }

    /// Writes `record` if a session is active, closing the session at the cap.
    pub fn record<S: SampleSink + ?Sized>(
        &mut self,
        sink: &mut S,
        record: Option<&FrameRecord>,
    ) -> io::Result<RecordOutcome> {
        if !self.active {
            return Ok(RecordOutcome::Idle);
        }
        let Some(record) = record else {
            return Ok(RecordOutcome::Skipped);
        };

        sink.append(record)?;
        self.count += 1;

        if self.count >= self.cap {
            let count = self.count;
            self.active = false;
            self.count = 0;
            info!("finish recording ({count} frames)");
            return Ok(RecordOutcome::Finished { count });
        }
        Ok(RecordOutcome::Recorded { count: self.count })
    }
}

impl Default for RecordingSession {
    fn default() -> Self {
        Self::new(DEFAULT_RECORD_CAP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;
    use std::fs;

    fn sample_record() -> FrameRecord {
        let mut points = [Vector3::zeros(); SAMPLE_COUNT];
        for (i, p) in points.iter_mut().enumerate() {
            *p = Vector3::new(i as f64 * 0.5, -(i as f64), 1.0 + i as f64 * 0.25);
        }
        FrameRecord::new(points, &Vector3::new(0.1234, -0.1234, -0.9848))
    }

    #[test]
    fn idle_session_writes_nothing() {
        let mut session = RecordingSession::default();
        let mut sink: Vec<FrameRecord> = Vec::new();
        let outcome = session.record(&mut sink, Some(&sample_record())).unwrap();
        assert_eq!(outcome, RecordOutcome::Idle);
        assert!(sink.is_empty());
    }

    #[test]
    fn session_closes_itself_at_the_cap() {
        let mut session = RecordingSession::new(400);
        let mut sink: Vec<FrameRecord> = Vec::new();
        let record = sample_record();
        session.start();

        for expected in 1..400 {
            let outcome = session.record(&mut sink, Some(&record)).unwrap();
            assert_eq!(outcome, RecordOutcome::Recorded { count: expected });
        }
        assert!(session.is_active());

        let outcome = session.record(&mut sink, Some(&record)).unwrap();
        assert_eq!(outcome, RecordOutcome::Finished { count: 400 });
        assert!(!session.is_active());
        assert_eq!(session.count(), 0);
        assert_eq!(sink.len(), 400);

        let outcome = session.record(&mut sink, Some(&record)).unwrap();
        assert_eq!(outcome, RecordOutcome::Idle);
        assert_eq!(sink.len(), 400);
    }

    #[test]
    fn stop_resets_the_counter() {
        let mut session = RecordingSession::new(10);
        let mut sink: Vec<FrameRecord> = Vec::new();
        session.start();
        for _ in 0..3 {
            session.record(&mut sink, Some(&sample_record())).unwrap();
        }
        session.stop();
        assert!(!session.is_active());
        assert_eq!(session.count(), 0);

        session.start();
        let outcome = session.record(&mut sink, Some(&sample_record())).unwrap();
        assert_eq!(outcome, RecordOutcome::Recorded { count: 1 });
    }

    #[test]
    fn restarting_keeps_the_count() {
        let mut session = RecordingSession::new(10);
        let mut sink: Vec<FrameRecord> = Vec::new();
        session.start();
        session.record(&mut sink, Some(&sample_record())).unwrap();
        session.start();
        assert_eq!(session.count(), 1);
    }

    #[test]
    fn frames_without_a_record_do_not_count() {
        let mut session = RecordingSession::new(10);
        let mut sink: Vec<FrameRecord> = Vec::new();
        session.start();
        assert_eq!(session.record(&mut sink, None).unwrap(), RecordOutcome::Skipped);
        assert_eq!(session.count(), 0);
        assert!(sink.is_empty());
    }

    #[test]
    fn record_rounds_normal_down() {
        let record = sample_record();
        assert_eq!(record.normal, Vector3::new(0.123, -0.124, -0.985));
    }

    #[test]
    fn rows_hold_nine_samples_and_one_normal_component() {
        let rows = sample_record().rows();
        for (axis, row) in rows.iter().enumerate() {
            assert_eq!(row.len(), SAMPLE_COUNT + 1);
            assert_eq!(row[0], sample_record().points[0][axis]);
        }
        assert_eq!(rows[0][SAMPLE_COUNT], 0.123);
        assert_eq!(rows[2][SAMPLE_COUNT], -0.985);
    }

    #[test]
    fn file_sink_appends_three_lines_per_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("surface_normal.csv");
        let mut sink = CsvFileSink::new(&path);
        let record = sample_record();

        sink.append(&record).unwrap();
        sink.append(&record).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "0,0.5,1,1.5,2,2.5,3,3.5,4,0.123");
        assert_eq!(lines[3], lines[0]);
        assert!(lines.iter().all(|l| l.split(',').count() == SAMPLE_COUNT + 1));
    }
}
