use lyx2lyx_parser::ParseError;
use thiserror::Error;

/// Error raised anywhere along a conversion run
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Invalid LyX file: {0}")]
    InvalidFile(String),

    #[error("Format {0} not supported")]
    UnsupportedFormat(u32),

    #[error("The conversion to an older format ({format}) is not implemented by module {module}")]
    RevertNotImplemented { module: String, format: u32 },

    #[error("Malformed LyX document: {0}")]
    Malformed(String),

    #[error("An error occurred in {format}, {step}: {source}")]
    Step {
        format: u32,
        step: &'static str,
        #[source]
        source: Box<ConvertError>,
    },

    #[error("Unknown encoding '{0}'")]
    UnknownEncoding(String),

    #[error("Line {line} cannot be decoded as {encoding}")]
    Decode { encoding: String, line: usize },

    #[error("Format registry is inconsistent: {0}")]
    Registry(String),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConvertError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }

    pub fn invalid_file(message: impl Into<String>) -> Self {
        Self::InvalidFile(message.into())
    }

    /// True for errors no amount of best-effort handling can work around.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedFormat(_)
                | Self::RevertNotImplemented { .. }
                | Self::Registry(_)
                | Self::UnknownEncoding(_)
                | Self::Decode { .. }
                | Self::Io(_)
        )
    }
}
