use image::ImageEncoder;
use image::error::{ParameterError, ParameterErrorKind};
use std::path::{Path, PathBuf};

/// Writes a tightly packed RGBA8 buffer as a PNG.
pub fn save(path: &Path, width: u32, height: u32, buffer: &[u8]) -> Result<(), image::ImageError> {
    if buffer.len() as u64 != u64::from(width) * u64::from(height) * 4 {
        return Err(image::ImageError::Parameter(ParameterError::from_kind(
            ParameterErrorKind::DimensionMismatch,
        )));
    }
    let output = std::fs::File::create(path)?;
    let encoder = image::codecs::png::PngEncoder::new(output);

    encoder.write_image(buffer, width, height, image::ExtendedColorType::Rgba8)?;

    Ok(())
}

/// Name for the `index`-th snapshot inside `dir`.
pub fn snapshot_path(dir: &Path, index: u32) -> PathBuf {
    dir.join(format!("surface_probe_{index:04}.png"))
}
