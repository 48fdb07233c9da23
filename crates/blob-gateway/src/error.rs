//! Error types for the blob gateway

use std::fmt;

#[derive(Debug)]
pub enum GatewayError {
    Config(String),
    Io(Box<std::io::Error>),
    Store(blob_store::StoreError),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Config(msg) => write!(f, "configuration error: {}", msg),
            GatewayError::Io(err) => write!(f, "IO error: {}", err),
            GatewayError::Store(err) => write!(f, "store error: {}", err),
        }
    }
}

impl std::error::Error for GatewayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GatewayError::Io(err) => Some(err.as_ref()),
            GatewayError::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        GatewayError::Io(Box::new(err))
    }
}

impl From<blob_store::StoreError> for GatewayError {
    fn from(err: blob_store::StoreError) -> Self {
        GatewayError::Store(err)
    }
}

impl From<tracing_subscriber::filter::ParseError> for GatewayError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        GatewayError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
