use thiserror::Error;

/// Failures of the byte channel the sensor is attached to.
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Failed to open {path}: {source}")]
    TransportOpen {
        path: String,
        #[source]
        source: serialport::Error,
    },

    #[error("Serial transport error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Line is not valid UTF-8")]
    Decode,

    #[error("Line exceeded {limit} bytes, dropped")]
    LineTooLong { limit: usize },

    #[error("Channel is closed")]
    Closed,
}

/// Why a raw line could not be turned into an orientation sample.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Expected at least 3 comma-separated fields, found {found}")]
    MalformedFieldCount { found: usize },

    #[error("Field {field} is not a number: {value:?}")]
    MalformedNumeric { field: &'static str, value: String },
}
