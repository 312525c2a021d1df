mod camera;
mod overlay;

use anyhow::bail;
use camera::{DepthCamera, MatDepth, Window};
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;
use surface_probe::core_modules::recording::CsvFileSink;
use surface_probe::core_modules::utils::image_helper;
use surface_probe::{Command, LoopControl, ProbeConfig, ProbePipeline};

/// Consecutive empty frames tolerated before the camera is considered gone.
const MAX_CONSECUTIVE_MISSES: u32 = 150;

/// Live surface normal probe for an OpenNI2 depth camera.
#[derive(Debug, Parser)]
#[command(author, version, about = "Overlay and record the surface normal under a fixed image patch")]
struct Args {
    /// Optional TOML config. Defaults are used if omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// CSV file the samples are appended to (overrides the config).
    #[arg(long)]
    output: Option<PathBuf>,

    /// OpenNI2 device index.
    #[arg(long, default_value_t = 0)]
    device: i32,

    /// Stack a colorized depth view under the color image.
    #[arg(long)]
    show_depth: bool,
}

fn load_config(args: &Args) -> anyhow::Result<ProbeConfig> {
    let mut config = match &args.config {
        Some(path) => ProbeConfig::load(path)?,
        None => ProbeConfig::default(),
    };
    if let Some(output) = &args.output {
        config.output_path = output.clone();
    }
    config.show_depth |= args.show_depth;
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    // --- 1. Logging & Argument Parsing ---
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let mut config = load_config(&args)?;

    // --- 2. Camera & Window ---
    // Both are torn down on drop, whichever way `run` returns.
    let mut camera = DepthCamera::open(args.device, config.frame_width, config.frame_height)?;
    if config.depth_intrinsics.is_none() {
        match camera.driver_intrinsics(config.frame_width, config.frame_height)? {
            Some(intrinsics) => {
                info!("depth intrinsics from driver focal length: {intrinsics:?}");
                config.depth_intrinsics = Some(intrinsics);
            }
            None => warn!("driver reports no focal length, deprojecting with the overlay intrinsics"),
        }
    }
    let window = Window::open(&config.window_name)?;

    // --- 3. Probe Pipeline ---
    let sink = CsvFileSink::new(&config.output_path);
    let sink_name = config.output_path.display().to_string();
    let mut pipeline = ProbePipeline::new(config, sink, sink_name);

    info!("s -> start recording | e -> end recording | p -> snapshot | q -> quit");
    run(&mut camera, &window, &mut pipeline)
}

fn run(
    camera: &mut DepthCamera,
    window: &Window,
    pipeline: &mut ProbePipeline<CsvFileSink>,
) -> anyhow::Result<()> {
    let mut misses = 0u32;
    let mut snapshots = 0u32;

    loop {
        // --- 4. Frame Acquisition ---
        let Some(frames) = camera.next_frames()? else {
            misses += 1;
            if misses >= MAX_CONSECUTIVE_MISSES {
                bail!("camera delivered no frames for {misses} iterations");
            }
            continue;
        };
        misses = 0;
        pipeline.config().check_frame_size(frames.color.cols(), frames.color.rows())?;
        pipeline.config().check_frame_size(frames.depth.cols(), frames.depth.rows())?;

        // --- 5. Probe ---
        let depth = MatDepth::new(&frames.depth, pipeline.config().depth_scale);
        let report = pipeline.process(&depth)?;

        // --- 6. Visualization ---
        let mut canvas = frames.color;
        overlay::draw_samples(&mut canvas, &report)?;
        if let Ok(segment) = &report.overlay {
            overlay::draw_normal(&mut canvas, segment)?;
        }
        overlay::draw_recording_status(&mut canvas, pipeline.session())?;
        if pipeline.config().show_depth {
            let colormap = overlay::depth_colormap(&frames.depth, pipeline.config().view_hole_filling)?;
            canvas = overlay::stack_vertically(&canvas, &colormap)?;
        }
        window.show(&canvas)?;

        // --- 7. Keyboard ---
        let Some(command) = Command::from_key(window.poll_key()?) else {
            continue;
        };
        if command == Command::Snapshot {
            let path = image_helper::snapshot_path(&pipeline.config().snapshot_dir, snapshots);
            overlay::save_snapshot(&canvas, &path)?;
            snapshots += 1;
            info!("saved snapshot {}", path.display());
        }
        if pipeline.handle(command) == LoopControl::Exit {
            return Ok(());
        }
    }
}
