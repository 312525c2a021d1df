use opencv::{
    core::{self, Mat, Point, Scalar},
    imgproc,
    prelude::*,
};
use std::path::Path;
use surface_probe::core_modules::camera_model::NormalSegment;
use surface_probe::core_modules::depth_frame::fill_holes;
use surface_probe::core_modules::recording::RecordingSession;
use surface_probe::core_modules::utils::image_helper;
use surface_probe::FrameReport;

/// Scale from raw depth units to 8-bit before colorizing.
const DEPTH_COLORMAP_ALPHA: f64 = 0.03;

fn sample_color() -> Scalar {
    Scalar::new(30.0, 90.0, 30.0, 0.0)
}

fn normal_color() -> Scalar {
    Scalar::new(200.0, 20.0, 20.0, 0.0)
}

fn recording_color() -> Scalar {
    Scalar::new(0.0, 0.0, 255.0, 0.0) // Red
}

/// Marks the nine sample pixels.
pub fn draw_samples(image: &mut Mat, report: &FrameReport) -> opencv::Result<()> {
    for pixel in &report.pixels {
        let (col, row) = pixel.to_pixel();
        imgproc::circle(image, Point::new(col, row), 2, sample_color(), -1, imgproc::LINE_8, 0)?;
    }
    Ok(())
}

pub fn draw_normal(image: &mut Mat, segment: &NormalSegment) -> opencv::Result<()> {
    imgproc::line(
        image,
        Point::new(segment.start.0, segment.start.1),
        Point::new(segment.end.0, segment.end.1),
        normal_color(),
        2,
        imgproc::LINE_8,
        0,
    )
}

/// Draws a "REC n/cap" tag in the top-left corner while a session is active.
pub fn draw_recording_status(image: &mut Mat, session: &RecordingSession) -> opencv::Result<()> {
    if !session.is_active() {
        return Ok(());
    }
    let text = format!("REC {}/{}", session.count(), session.cap());
    imgproc::put_text(
        image,
        &text,
        Point::new(10, 25),
        imgproc::FONT_HERSHEY_SIMPLEX,
        0.7,
        recording_color(),
        2,
        imgproc::LINE_8,
        false,
    )
}

/// JET-colorized copy of a raw depth map, optionally with holes filled from
/// their farthest neighbour first.
pub fn depth_colormap(depth: &Mat, fill: bool) -> opencv::Result<Mat> {
    let source = if fill {
        let mut filled = depth.try_clone()?;
        let width = usize::try_from(depth.cols()).unwrap_or_default();
        let buf = fill_holes(filled.data_typed::<u16>()?, width);
        filled.data_typed_mut::<u16>()?.copy_from_slice(&buf);
        filled
    } else {
        depth.try_clone()?
    };
    let mut scaled = Mat::default();
    core::convert_scale_abs(&source, &mut scaled, DEPTH_COLORMAP_ALPHA, 0.0)?;
    let mut colored = Mat::default();
    imgproc::apply_color_map(&scaled, &mut colored, imgproc::COLORMAP_JET)?;
    Ok(colored)
}

pub fn stack_vertically(top: &Mat, bottom: &Mat) -> opencv::Result<Mat> {
    let mut stacked = Mat::default();
    core::vconcat2(top, bottom, &mut stacked)?;
    Ok(stacked)
}

/// Saves a BGR frame as PNG.
pub fn save_snapshot(image: &Mat, path: &Path) -> anyhow::Result<()> {
    // Convert the OpenCV Mat (BGR) to a packed RGBA buffer for the encoder.
    let mut rgba = Mat::default();
    imgproc::cvt_color(image, &mut rgba, imgproc::COLOR_BGR2RGBA, 0)?;
    let width = u32::try_from(rgba.cols())?;
    let height = u32::try_from(rgba.rows())?;
    image_helper::save(path, width, height, rgba.data_bytes()?)?;
    Ok(())
}
