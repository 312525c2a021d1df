// THEORY:
// This file is the entry point for the `surface_probe` library crate. It exposes
// the camera-independent part of the surface probe: the sampling pattern, the
// normal estimator, the camera model used for (de)projection, and the recording
// session. The live viewer (`probe_viewer`) owns the camera and the window and
// drives everything through the `ProbePipeline` exported from `pipeline`.
//
// Nothing in here touches a device, so every piece can be exercised with
// synthetic depth data.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod pipeline;

pub use config::ProbeConfig;
pub use error::ProbeError;
pub use pipeline::{Command, FrameReport, LoopControl, OverlayError, ProbePipeline};
