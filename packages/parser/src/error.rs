use thiserror::Error;

pub type ParseResult<T> = Result<T, ParseError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid format designation '{value}'")]
    InvalidFormat { value: String },

    #[error("Missing \\lyxformat declaration")]
    MissingFormat,

    #[error("Malformed line {line}: {message}")]
    MalformedLine { line: usize, message: String },
}

impl ParseError {
    pub fn invalid_format(value: impl Into<String>) -> Self {
        Self::InvalidFormat {
            value: value.into(),
        }
    }

    pub fn malformed_line(line: usize, message: impl Into<String>) -> Self {
        Self::MalformedLine {
            line,
            message: message.into(),
        }
    }
}
