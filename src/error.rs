use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors that end the probe loop.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to append samples to {path}: {source}")]
    Record {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("camera delivers {actual:?} (width, height) frames, expected {expected:?}")]
    FrameSize {
        expected: (u32, u32),
        actual: (i32, i32),
    },
}
