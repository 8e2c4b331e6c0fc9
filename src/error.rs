use thiserror::Error;

/// Errors raised while loading or validating controller parameters.
///
/// The control law itself never fails; everything that can go wrong is
/// caught here, before the first tick.
#[derive(Error, Debug)]
pub enum ParamError {
    /// Parameter file could not be read
    #[error("failed to read parameter file: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed line in a text parameter file
    #[error("parse error on line {line}: {message}")]
    Parse {
        /// 1-based line number
        line: usize,
        /// What was wrong with the line
        message: String,
    },

    /// Name not present in a fixed parameter table
    #[error("unknown parameter: {0}")]
    UnknownParameter(String),

    /// Value outside the range the controller can run with
    #[error("invalid parameter {name} = {value}: {reason}")]
    Invalid {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },
}

/// Type alias for Result with ParamError
pub type ParamResult<T> = Result<T, ParamError>;

pub(crate) fn parse_error(line: usize, message: impl Into<String>) -> ParamError {
    ParamError::Parse {
        line,
        message: message.into(),
    }
}
