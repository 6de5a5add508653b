use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Field holding the review text in JSON payloads unless configured otherwise
pub const DEFAULT_TEXT_FIELD: &str = "reviews.text";

/// A record exactly as delivered by a source partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// Undecoded payload bytes
    pub payload: Vec<u8>,
    /// Offset of this record within its partition, if the source has one
    pub offset: Option<u64>,
    /// Arrival timestamp in milliseconds since the unix epoch
    pub timestamp: Option<i64>,
}

impl RawRecord {
    /// Create a record without metadata
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            offset: None,
            timestamp: None,
        }
    }

    /// Attach a partition offset
    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Attach an arrival timestamp
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// A decoded review. Immutable once read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    text: String,
    offset: Option<u64>,
    timestamp: Option<i64>,
}

impl Record {
    /// Create a record from review text without metadata
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            offset: None,
            timestamp: None,
        }
    }

    /// Decode a raw record according to the payload format
    pub fn decode(raw: &RawRecord, format: &PayloadFormat) -> Result<Self, DecodeError> {
        let text = format.extract_text(&raw.payload)?;
        Ok(Self {
            text,
            offset: raw.offset,
            timestamp: raw.timestamp,
        })
    }

    /// The review text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Partition offset, if known
    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    /// Arrival timestamp in milliseconds since the unix epoch, if known
    pub fn timestamp(&self) -> Option<i64> {
        self.timestamp
    }
}

/// How record payloads encode the review text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayloadFormat {
    /// A JSON object with the text stored as a string under `field`
    Json {
        /// Name of the field holding the review text
        field: String,
    },
    /// The payload is the UTF-8 encoded text itself
    PlainText,
}

impl Default for PayloadFormat {
    fn default() -> Self {
        PayloadFormat::Json {
            field: DEFAULT_TEXT_FIELD.to_owned(),
        }
    }
}

impl PayloadFormat {
    fn extract_text(&self, payload: &[u8]) -> Result<String, DecodeError> {
        match self {
            PayloadFormat::PlainText => std::str::from_utf8(payload)
                .map(str::to_owned)
                .map_err(DecodeError::Utf8),
            PayloadFormat::Json { field } => {
                let value: serde_json::Value =
                    serde_json::from_slice(payload).map_err(DecodeError::Json)?;
                match value.get(field) {
                    Some(serde_json::Value::String(text)) => Ok(text.clone()),
                    Some(_) => Err(DecodeError::NotAString(field.clone())),
                    None => Err(DecodeError::MissingField(field.clone())),
                }
            }
        }
    }
}

impl FromStr for PayloadFormat {
    type Err = DecodeError;

    /// Parses `text` or `json` (default field) or `json:<field>`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            None if s.eq_ignore_ascii_case("text") => Ok(PayloadFormat::PlainText),
            None if s.eq_ignore_ascii_case("json") => Ok(PayloadFormat::default()),
            Some((kind, field)) if kind.eq_ignore_ascii_case("json") && !field.is_empty() => {
                Ok(PayloadFormat::Json {
                    field: field.to_owned(),
                })
            }
            _ => Err(DecodeError::UnknownFormat(s.to_owned())),
        }
    }
}

/// Reasons a payload can not be turned into a [Record]
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Payload is not valid UTF-8")]
    Utf8(#[source] std::str::Utf8Error),
    #[error("Payload is not valid JSON")]
    Json(#[source] serde_json::Error),
    #[error("Payload has no field `{0}`")]
    MissingField(String),
    #[error("Payload field `{0}` is not a string")]
    NotAString(String),
    #[error("Unknown payload format `{0}`, expected `text`, `json` or `json:<field>`")]
    UnknownFormat(String),
}
