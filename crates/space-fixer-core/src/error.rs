use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Remote API error ({status}): {message}")]
    Remote { status: u16, message: String },

    #[error("Transcode error: {0}")]
    Transcode(String),

    #[error("Device bridge error: {0}")]
    DeviceBridge(String),

    /// Missing destination or source paths. Raised before any remote call.
    #[error("Setup error: {0}")]
    Setup(String),

    #[error("{0}")]
    Other(String),
}
