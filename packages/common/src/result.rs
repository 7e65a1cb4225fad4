use crate::error::ConvertError;

/// Common Result type alias
pub type ConvertResult<T> = Result<T, ConvertError>;
