use std::{error, fmt, io};

// -------------------------------------------------------------------------------------------------

/// Provides an enumeration of all possible errors reported by grainscope.
#[derive(Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    ParameterError(String),
    SendError(String),
    AudioDecodingError(Box<dyn error::Error + Send + Sync>),
    OutputDeviceError(Box<dyn error::Error + Send + Sync>),
    IoError(io::Error),
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParameterError(str) => write!(f, "Invalid parameter: {str}"),
            Self::SendError(str) => write!(f, "Failed to send channel message: {str}"),
            Self::AudioDecodingError(err) | Self::OutputDeviceError(err) => err.fmt(f),
            Self::IoError(err) => err.fmt(f),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IoError(err)
    }
}

// -------------------------------------------------------------------------------------------------
