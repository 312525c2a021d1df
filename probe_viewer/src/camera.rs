use anyhow::{Context, bail};
use log::{info, warn};
use opencv::{
    core::Mat,
    highgui,
    prelude::*,
    videoio::{self, VideoCapture},
};
use surface_probe::core_modules::camera_model::CameraIntrinsics;
use surface_probe::core_modules::depth_frame::DepthFrame;

/// A color frame and the depth map registered to it.
pub struct FramePair {
    /// BGR8.
    pub color: Mat,
    /// Raw 16-bit depth units.
    pub depth: Mat,
}

/// An OpenNI2 depth camera with depth registered to the color viewpoint.
/// The stream is released on drop.
pub struct DepthCamera {
    capture: VideoCapture,
}

impl DepthCamera {
    /// Opens `device` and requests `width`x`height` streams.
    ///
    /// The driver may ignore the request; delivered sizes are checked per frame.
    pub fn open(device: i32, width: u32, height: u32) -> anyhow::Result<Self> {
        let mut capture = VideoCapture::new(device, videoio::CAP_OPENNI2)
            .with_context(|| format!("failed to open OpenNI2 device {device}"))?;
        if !capture.is_opened()? {
            bail!("no depth camera found at OpenNI2 device {device}");
        }
        if !capture.set(videoio::CAP_OPENNI_DEPTH_GENERATOR_REGISTRATION, 1.0)? {
            warn!("camera refused depth-to-color registration, overlay may be offset");
        }
        let size_accepted = capture.set(videoio::CAP_PROP_FRAME_WIDTH, f64::from(width))?
            && capture.set(videoio::CAP_PROP_FRAME_HEIGHT, f64::from(height))?;
        if !size_accepted {
            warn!("camera refused a {width}x{height} stream request, keeping its default mode");
        }
        info!("opened OpenNI2 device {device}");
        Ok(Self { capture })
    }

    /// Depth intrinsics derived from the driver's focal length, if it reports one.
    pub fn driver_intrinsics(&self, width: u32, height: u32) -> opencv::Result<Option<CameraIntrinsics>> {
        let focal = self.capture.get(videoio::CAP_OPENNI_DEPTH_GENERATOR_FOCAL_LENGTH)?;
        if focal.is_finite() && focal > 0.0 {
            Ok(Some(CameraIntrinsics::from_focal_length(focal, width, height)))
        } else {
            Ok(None)
        }
    }

    /// Blocks until the driver delivers the next frame pair.
    ///
    /// Returns `None` when either stream came back empty for this iteration.
    pub fn next_frames(&mut self) -> opencv::Result<Option<FramePair>> {
        if !self.capture.grab()? {
            return Ok(None);
        }
        let mut depth = Mat::default();
        let mut color = Mat::default();
        let got_depth = self.capture.retrieve(&mut depth, videoio::CAP_OPENNI_DEPTH_MAP)?;
        let got_color = self.capture.retrieve(&mut color, videoio::CAP_OPENNI_BGR_IMAGE)?;
        if !got_depth || !got_color || depth.empty() || color.empty() {
            return Ok(None);
        }
        Ok(Some(FramePair { color, depth }))
    }
}

impl Drop for DepthCamera {
    fn drop(&mut self) {
        match self.capture.release() {
            Ok(()) => info!("camera stream stopped"),
            Err(e) => warn!("failed to release camera: {e}"),
        }
    }
}

/// Depth map view in metres.
pub struct MatDepth<'a> {
    mat: &'a Mat,
    scale: f64,
}

impl<'a> MatDepth<'a> {
    pub fn new(mat: &'a Mat, scale: f64) -> Self {
        Self { mat, scale }
    }
}

impl DepthFrame for MatDepth<'_> {
    fn depth_at(&self, col: i32, row: i32) -> Option<f64> {
        if col < 0 || row < 0 || col >= self.mat.cols() || row >= self.mat.rows() {
            return None;
        }
        self.mat
            .at_2d::<u16>(row, col)
            .ok()
            .map(|raw| f64::from(*raw) * self.scale)
    }
}

/// The display window. Destroyed on drop.
pub struct Window {
    name: String,
}

impl Window {
    pub fn open(name: &str) -> opencv::Result<Self> {
        highgui::named_window(name, highgui::WINDOW_AUTOSIZE)?;
        Ok(Self {
            name: name.to_owned(),
        })
    }

    pub fn show(&self, image: &Mat) -> opencv::Result<()> {
        highgui::imshow(&self.name, image)
    }

    /// Polls the keyboard for 1 ms; -1 when no key was pressed.
    pub fn poll_key(&self) -> opencv::Result<i32> {
        highgui::wait_key(1)
    }
}

impl Drop for Window {
    fn drop(&mut self) {
        if let Err(e) = highgui::destroy_all_windows() {
            warn!("failed to close window {}: {e}", self.name);
        }
    }
}
