pub mod camera_model;
pub mod depth_frame;
pub mod normal_estimator;
pub mod recording;
pub mod region_sampler;
pub mod rounding;
pub mod utils;
