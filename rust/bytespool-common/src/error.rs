use thiserror::Error;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    pub fn config(message: impl Into<String>) -> Error {
        Error(
            ErrorKind::Configuration {
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn invalid_state(operation: impl Into<String>, state: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidState {
                operation: operation.into(),
                state: state.into(),
            }
            .into(),
        )
    }

    pub fn capacity_exceeded(capacity: u64, written: u64, requested: u64) -> Error {
        Error(
            ErrorKind::CapacityExceeded {
                capacity,
                written,
                requested,
            }
            .into(),
        )
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Error {
        Error(
            ErrorKind::Io {
                context: context.into(),
                source,
            }
            .into(),
        )
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("invalid configuration: {message}")]
    Configuration { message: String },

    #[error("invalid operation '{operation}' in state '{state}'")]
    InvalidState { operation: String, state: String },

    #[error("capacity {capacity} exceeded: {written} bytes written, {requested} more requested")]
    CapacityExceeded {
        capacity: u64,
        written: u64,
        requested: u64,
    },

    #[error("IO error for '{context}': {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::io("", e)
    }
}

impl From<Error> for std::io::Error {
    fn from(e: Error) -> Self {
        match e.into_kind() {
            ErrorKind::Io { source, .. } => source,
            kind => std::io::Error::new(std::io::ErrorKind::Other, kind),
        }
    }
}
