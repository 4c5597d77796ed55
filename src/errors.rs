//! Errors that can occur when encoding, decoding or laying out foreign data.

use alloc::string::{String, ToString};
use core::fmt;

/// Error that can occur when reading and parsing bytes.
#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
#[cfg_attr(feature = "std", error("{0}"))]
pub struct ReadError(pub String);

/// Errors that can occur when marshaling values and records across the foreign boundary.
#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum MarshalError {
    /// The heap could not satisfy an allocation of the given number of bytes.
    #[cfg_attr(feature = "std", error("out of memory: allocation of {0} bytes failed"))]
    OutOfMemory(usize),
    /// A payload does not have the length or shape its declared type requires.
    #[cfg_attr(feature = "std", error("invalid data: {0}"))]
    InvalidData(String),
    /// A type discriminant is not recognized.
    #[cfg_attr(feature = "std", error("unsupported type: {0:#x}"))]
    UnsupportedType(u32),
    /// A record was built with a structurally invalid combination of fields.
    #[cfg_attr(feature = "std", error("invalid configuration: {0}"))]
    InvalidConfiguration(String),
    #[cfg_attr(feature = "std", error("invalid bytes: {0}"))]
    InvalidBytes(ReadError),
}
impl From<ReadError> for MarshalError {
    fn from(error: ReadError) -> Self { MarshalError::InvalidBytes(error) }
}

impl MarshalError {
    pub(crate) fn invalid_data<D: fmt::Display>(message: D) -> Self {
        MarshalError::InvalidData(message.to_string())
    }

    pub(crate) fn invalid_configuration<D: fmt::Display>(message: D) -> Self {
        MarshalError::InvalidConfiguration(message.to_string())
    }
}
