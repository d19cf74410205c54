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

    /// Whether this error reports malformed serialized input (as opposed to a
    /// failure of the underlying reader or writer).
    pub fn is_invalid_format(&self) -> bool {
        matches!(self.kind(), ErrorKind::InvalidFormat { .. })
    }

    pub fn invalid_arg(name: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidArgument {
                name: name.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn invalid_format(element: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidFormat {
                element: element.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn empty_container(operation: impl Into<String>) -> Error {
        Error(
            ErrorKind::EmptyContainer {
                operation: operation.into(),
            }
            .into(),
        )
    }

    pub fn out_of_range(index: u64, cardinality: u64) -> Error {
        Error(ErrorKind::OutOfRange { index, cardinality }.into())
    }

    pub fn overflow(message: impl Into<String>) -> Error {
        Error(
            ErrorKind::Overflow {
                message: message.into(),
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
    #[error("invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },

    #[error("{operation} called on an empty set")]
    EmptyContainer { operation: String },

    #[error("index {index} is out of range for cardinality {cardinality}")]
    OutOfRange { index: u64, cardinality: u64 },

    #[error("invalid serialized format for '{element}': {message}")]
    InvalidFormat { element: String, message: String },

    #[error("value overflow: {message}")]
    Overflow { message: String },

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
