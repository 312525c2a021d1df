// THEORY:
// `ProbeConfig` gathers every tunable of the probe in one place. The defaults
// reproduce the stock setup: a 640x480 stream, a 14 px footprint at the image
// center, 400 frames per recording session written to `./surface_normal.csv`,
// millimetre depth units, and the calibrated overlay intrinsics. Samples are read
// from the raw depth map; only the colorized depth view is hole filled.
//
// When `depth_intrinsics` is left out, deprojection uses whatever the viewer
// learns from the camera driver, falling back to the overlay intrinsics.
//
// A TOML file may override any subset of fields; missing fields keep their
// defaults. The viewer's command line flags are applied on top of that.

use crate::core_modules::camera_model::{CameraIntrinsics, DEFAULT_ARROW_LENGTH};
use crate::core_modules::normal_estimator::Orientation;
use crate::core_modules::recording::DEFAULT_RECORD_CAP;
use crate::core_modules::region_sampler::{DEFAULT_EDGE, PixelCoord};
use crate::error::{ConfigError, ProbeError};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProbeConfig {
    /// Color/depth stream width in pixels.
    pub frame_width: u32,
    /// Color/depth stream height in pixels.
    pub frame_height: u32,
    /// Center of the sample footprint, `[col, row]`.
    pub center: [f64; 2],
    /// Side of the square footprint in pixels.
    pub edge: f64,
    /// Frames per recording session.
    pub record_cap: u32,
    pub output_path: PathBuf,
    /// Length of the drawn normal, in metres.
    pub normal_arrow_length: f64,
    /// Metres per raw depth unit.
    pub depth_scale: f64,
    /// Hole-fill the depth read at sample pixels.
    pub hole_filling: bool,
    /// Hole-fill the depth map before colorizing it for display.
    pub view_hole_filling: bool,
    pub orientation: Orientation,
    /// Intrinsics used to draw the overlay.
    pub overlay_intrinsics: CameraIntrinsics,
    /// Intrinsics of the depth stream, used for deprojection.
    pub depth_intrinsics: Option<CameraIntrinsics>,
    /// Stack a colorized depth view under the color image.
    pub show_depth: bool,
    pub window_name: String,
    pub snapshot_dir: PathBuf,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            frame_width: 640,
            frame_height: 480,
            center: [320.0, 240.0],
            edge: DEFAULT_EDGE,
            record_cap: DEFAULT_RECORD_CAP,
            output_path: PathBuf::from("./surface_normal.csv"),
            normal_arrow_length: DEFAULT_ARROW_LENGTH,
            depth_scale: 0.001,
            hole_filling: false,
            view_hole_filling: true,
            orientation: Orientation::PerTriangle,
            overlay_intrinsics: CameraIntrinsics::OVERLAY_640X480,
            depth_intrinsics: None,
            show_depth: false,
            window_name: String::from("RealSense"),
            snapshot_dir: PathBuf::from("."),
        }
    }
}

impl ProbeConfig {
    /// Reads and validates a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn center(&self) -> PixelCoord {
        PixelCoord::new(self.center[0], self.center[1])
    }

    /// Intrinsics used to deproject sample pixels.
    pub fn depth_intrinsics(&self) -> CameraIntrinsics {
        self.depth_intrinsics.unwrap_or(self.overlay_intrinsics)
    }

    /// Fails when the camera delivers frames of a size other than configured.
    pub fn check_frame_size(&self, width: i32, height: i32) -> Result<(), ProbeError> {
        let expected = (self.frame_width, self.frame_height);
        let matches = u32::try_from(width).is_ok_and(|w| w == expected.0)
            && u32::try_from(height).is_ok_and(|h| h == expected.1);
        if matches {
            Ok(())
        } else {
            Err(ProbeError::FrameSize {
                expected,
                actual: (width, height),
            })
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if !(self.edge.is_finite() && self.edge > 0.0) {
            return invalid(format!("edge must be positive, got {}", self.edge));
        }
        if self.record_cap == 0 {
            return invalid("record_cap must be at least 1".into());
        }
        if !(self.depth_scale.is_finite() && self.depth_scale > 0.0) {
            return invalid(format!("depth_scale must be positive, got {}", self.depth_scale));
        }
        if !(self.normal_arrow_length.is_finite() && self.normal_arrow_length > 0.0) {
            return invalid(format!(
                "normal_arrow_length must be positive, got {}",
                self.normal_arrow_length
            ));
        }
        let depth_intrinsics = self.depth_intrinsics();
        for (name, k) in [
            ("overlay_intrinsics", &self.overlay_intrinsics),
            ("depth_intrinsics", &depth_intrinsics),
        ] {
            if !(k.fx > 0.0 && k.fy > 0.0) {
                return invalid(format!("{name} focal lengths must be positive"));
            }
        }

        let half = self.edge / 2.0;
        let [col, row] = self.center;
        let width = f64::from(self.frame_width);
        let height = f64::from(self.frame_height);
        if col - half < 0.0 || row - half < 0.0 || col + half >= width || row + half >= height {
            return invalid(format!(
                "footprint of edge {} around ({col}, {row}) leaves the {}x{} frame",
                self.edge, self.frame_width, self.frame_height
            ));
        }
        Ok(())
    }
}
