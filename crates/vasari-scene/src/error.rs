use thiserror::Error;
use vasari_io::IoError;
use vasari_surface::SurfaceError;

/// Errors raised while parsing or running an inline script.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScriptError {
    #[error("script parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("script verb '{0}' is not permitted")]
    Denied(String),

    #[error("undefined variable ${0}")]
    Undefined(String),

    #[error("type error: {0}")]
    Type(String),
}

/// A `Data` list that yielded no keys.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataRecordError {
    #[error("Unknown data format.")]
    UnknownFormat,
}

/// Reasons a navigation request could not be served.
#[derive(Error, Debug)]
pub enum NavigationError {
    #[error("'{0}' is not a namespace:kind:name path")]
    InvalidPath(String),

    #[error("unknown content kind '{0}'")]
    UnknownKind(String),

    #[error("no peer configured for namespace '{0}'")]
    UnknownPeer(String),

    #[error("HTTP/404 Error fetching resource.")]
    Fetch(#[from] IoError),
}

/// Errors surfaced to the host by the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error(transparent)]
    Surface(#[from] SurfaceError),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
