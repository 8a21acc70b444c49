use thiserror::Error;

/// The error type shared by all kvlog crates.
///
/// The payload is boxed to keep `Result<T>` a single pointer wide on the
/// success path.
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

    /// The stream ended before the named element could be fully read.
    pub fn truncated(element: impl Into<String>) -> Error {
        Error(
            ErrorKind::Truncated {
                element: element.into(),
            }
            .into(),
        )
    }

    /// The stream violated the framing protocol while decoding the named
    /// element.
    pub fn protocol(element: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::Protocol {
                element: element.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    /// The stream is well formed but uses a feature this implementation
    /// does not support.
    pub fn not_supported(element: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::NotSupported {
                element: element.into(),
                message: message.into(),
            }
            .into(),
        )
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

    pub fn not_permitted(name: impl Into<String>) -> Error {
        Error(ErrorKind::NotPermitted { name: name.into() }.into())
    }

    /// A unit handler callback reported a failure; the code is propagated
    /// verbatim.
    pub fn handler(code: u32) -> Error {
        Error(ErrorKind::Handler { code }.into())
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

    /// Whether this error indicates a cleanly truncated stream rather than
    /// a corrupted one.
    pub fn is_truncated(&self) -> bool {
        matches!(self.kind(), ErrorKind::Truncated { .. })
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("stream ended before '{element}' could be read")]
    Truncated { element: String },

    #[error("protocol violation in '{element}': {message}")]
    Protocol { element: String, message: String },

    #[error("unsupported protocol feature '{element}': {message}")]
    NotSupported { element: String, message: String },

    #[error("invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },

    #[error("operation not permitted: {name}")]
    NotPermitted { name: String },

    #[error("unit handler failed with code {code}")]
    Handler { code: u32 },

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
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::truncated("stream")
        } else {
            Error::io("", e)
        }
    }
}
