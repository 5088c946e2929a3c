use thiserror::Error;

/// Errors raised by the GPU-agnostic core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid dimensions {width}x{height}: both must be non-zero")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("{what} capacity of {capacity} exceeded")]
    CapacityExceeded { what: &'static str, capacity: usize },

    #[error("unsupported: {0}")]
    Unsupported(String),
}

pub type Result<T> = std::result::Result<T, Error>;
