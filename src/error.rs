/*!
A common error type used across the whole stack, in the style of the rest of the crate: a small
set of `thiserror`-derived enums plus free constructor functions so call sites read as
`return invalid_header_value("LOCATION", v).into()`.
*/

use quick_xml::Error as XmlError;
use reqwest::Error as HttpError;
use std::fmt::Display;
use std::io::Error as IoError;
use std::str::Utf8Error;
use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// Public Types
// ------------------------------------------------------------------------------------------------

///
/// This provides a common error type across the stack.
///
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    NetworkTransport(#[from] IoError),

    #[error(transparent)]
    Messaging(#[from] HttpError),

    #[error(transparent)]
    MessageFormat(#[from] MessageFormatError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("An operation you attempted returned an error status `{status}` (Operation: `{operation}`)")]
    OperationFailed { operation: String, status: String },

    #[error("An operation you attempted is not supported (Operation: `{operation}`)")]
    UnsupportedOperation { operation: String },

    #[error("The requested entity was not found (Kind: `{kind}`, Key: `{key}`)")]
    NotFound { kind: String, key: String },

    #[error("The session or subscription has already been closed or has expired")]
    Closed,
}

///
/// Errors raised from the two UPnP application protocols layered over HTTP: SOAP action
/// invocation and GENA eventing. Both carry a wire-level status plus a human description.
///
#[derive(Clone, Debug, Error)]
pub enum ProtocolError {
    #[error("SOAP fault (code: `{code}`): {description}")]
    Soap { code: i32, description: String },

    #[error("GENA error (http status: `{status}`): {description}")]
    Gena { status: u16, description: String },
}

#[derive(Clone, Copy, Debug, Error)]
pub enum ValueSource {
    Socket,
    Header,
    Field,
}

#[derive(Debug, Error)]
pub enum MessageFormatError {
    #[error(transparent)]
    XmlFormat(#[from] XmlError),

    #[error(transparent)]
    SourceEncoding(#[from] Utf8Error),

    #[error("The version in a `{source}` did not match the supported version `{target}`")]
    VersionMismatch { source: ValueSource, target: String },

    #[error("A required {source} `{name}` was either missing or empty")]
    MissingRequiredValue { source: ValueSource, name: String },

    #[error("The {source} `{name}` value did not match the expected type (Expected: `{expected}`, Found: `{found}`)")]
    ValueTypeMismatch {
        source: ValueSource,
        name: String,
        expected: String,
        found: String,
    },

    #[error("The {source} `{name}` was incorrectly formatted (Value: `{value}`)")]
    InvalidValue {
        source: ValueSource,
        name: String,
        value: String,
    },

    #[error("The value provided is not valid for type `{for_type}` (Value: `{value}`)")]
    InvalidValueForType { for_type: String, value: String },
}

// ------------------------------------------------------------------------------------------------
// Public Functions
// ------------------------------------------------------------------------------------------------

pub fn missing_required_header<S>(name: S) -> MessageFormatError
where
    S: Into<String>,
{
    MessageFormatError::MissingRequiredValue {
        source: ValueSource::Header,
        name: name.into(),
    }
}

pub fn header_type_mismatch<S1, S2, S3>(name: S1, expected: S2, found: S3) -> MessageFormatError
where
    S1: Into<String>,
    S2: Into<String>,
    S3: Into<String>,
{
    MessageFormatError::ValueTypeMismatch {
        source: ValueSource::Header,
        name: name.into(),
        expected: expected.into(),
        found: found.into(),
    }
}

pub fn invalid_header_value<S1, S2>(name: S1, value: S2) -> MessageFormatError
where
    S1: Into<String>,
    S2: Into<String>,
{
    MessageFormatError::InvalidValue {
        source: ValueSource::Header,
        name: name.into(),
        value: value.into(),
    }
}

pub fn missing_required_field<S>(name: S) -> MessageFormatError
where
    S: Into<String>,
{
    MessageFormatError::MissingRequiredValue {
        source: ValueSource::Field,
        name: name.into(),
    }
}

pub fn invalid_field_value<S1, S2>(name: S1, value: S2) -> MessageFormatError
where
    S1: Into<String>,
    S2: Into<String>,
{
    MessageFormatError::InvalidValue {
        source: ValueSource::Field,
        name: name.into(),
        value: value.into(),
    }
}

pub fn invalid_value_for_type<S1, S2>(for_type: S1, value: S2) -> MessageFormatError
where
    S1: Into<String>,
    S2: Into<String>,
{
    MessageFormatError::InvalidValueForType {
        for_type: for_type.into(),
        value: value.into(),
    }
}

pub fn unsupported_operation<S1>(operation: S1) -> Error
where
    S1: Into<String>,
{
    Error::UnsupportedOperation {
        operation: operation.into(),
    }
}

pub fn not_found<S1, S2>(kind: S1, key: S2) -> Error
where
    S1: Into<String>,
    S2: Into<String>,
{
    Error::NotFound {
        kind: kind.into(),
        key: key.into(),
    }
}

pub fn soap_fault(code: i32, description: impl Into<String>) -> Error {
    Error::Protocol(ProtocolError::Soap {
        code,
        description: description.into(),
    })
}

pub fn gena_error(status: u16, description: impl Into<String>) -> Error {
    Error::Protocol(ProtocolError::Gena {
        status,
        description: description.into(),
    })
}

pub fn xml_error(e: XmlError) -> Error {
    Error::MessageFormat(MessageFormatError::XmlFormat(e))
}

// ------------------------------------------------------------------------------------------------
// Implementations
// ------------------------------------------------------------------------------------------------

impl Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                ValueSource::Socket => "socket",
                ValueSource::Header => "message header",
                ValueSource::Field => "message field",
            }
        )
    }
}

// ------------------------------------------------------------------------------------------------

impl<T> From<MessageFormatError> for std::result::Result<T, MessageFormatError> {
    fn from(e: MessageFormatError) -> Self {
        Err(e)
    }
}

impl<T> From<MessageFormatError> for std::result::Result<T, Error> {
    fn from(e: MessageFormatError) -> Self {
        Err(Error::MessageFormat(e))
    }
}

impl<T> From<Error> for std::result::Result<T, Error> {
    fn from(e: Error) -> Self {
        Err(e)
    }
}
