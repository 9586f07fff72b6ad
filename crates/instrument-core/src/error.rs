use thiserror::Error;

/// Failures the core reports to its caller. Every variant is recoverable:
/// callers degrade (fallback cloud, disabled input port) and keep running.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    #[error("compute capability unavailable: {0}")]
    CapabilityUnavailable(String),
    #[error("input device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("transient render failure: {0}")]
    TransientRenderFailure(String),
    #[error("simulation backend failed: {0}")]
    BackendFailure(String),
    #[error("cell ({col}, {row}) is outside the 12x3 grid")]
    CellOutOfRange { col: usize, row: usize },
}

pub type CoreResult<T> = Result<T, CoreError>;
