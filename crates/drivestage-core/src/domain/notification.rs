//! File notices and inbound payload decoding
//!
//! Every inbound message, whatever its wire shape, is normalized into a
//! single [`FileNotice`] before it reaches the pipeline. The shapes seen in
//! practice are modelled as the [`InboundPayload`] tagged union, with one
//! adapter per variant:
//!
//! | Variant | Example body |
//! |---|---|
//! | `RawJson` | `{"resourceId": "F1", "fileName": "a.txt"}` or `{"kind": "...", "id": "...", "resourceId": "F1"}` |
//! | `Base64Envelope` | `{"data": "<base64 JSON notice, base64 id, or plain id>"}` |
//! | `BrokerEnvelope` | `{"message": {"data": "<base64>", "messageId": "..."}, "subscription": "..."}` |

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::errors::DomainError;
use super::newtypes::FileId;

// ============================================================================
// FileNotice
// ============================================================================

/// Where a notice came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeSource {
    /// Drive change channel pushed to the watcher
    DriveChannel,
    /// Poll-mode folder scan
    Poll,
    /// Plain JSON POST (webhook relay)
    Webhook,
    /// `{"data": ...}` envelope
    DataEnvelope,
    /// Pub/Sub push subscription envelope
    PubSub,
    /// Operator-triggered (CLI)
    Manual,
}

impl fmt::Display for NoticeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NoticeSource::DriveChannel => "drive_channel",
            NoticeSource::Poll => "poll",
            NoticeSource::Webhook => "webhook",
            NoticeSource::DataEnvelope => "data_envelope",
            NoticeSource::PubSub => "pubsub",
            NoticeSource::Manual => "manual",
        };
        f.write_str(s)
    }
}

/// Normalized notification identifying one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNotice {
    pub file_id: FileId,
    pub file_name: Option<String>,
    pub source: NoticeSource,
}

impl FileNotice {
    pub fn new(file_id: FileId, file_name: Option<String>, source: NoticeSource) -> Self {
        Self {
            file_id,
            file_name,
            source,
        }
    }

    /// Wire form relayed from the watcher to the mover
    pub fn to_wire(&self) -> WireNotice {
        WireNotice {
            file_name: self.file_name.clone(),
            resource_id: self.file_id.as_str().to_string(),
        }
    }
}

/// JSON shape relayed between roles: `{"fileName": "...", "resourceId": "..."}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireNotice {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    pub resource_id: String,
}

// ============================================================================
// PayloadError
// ============================================================================

/// Reasons an inbound body could not be turned into a [`FileNotice`]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("Empty request body")]
    Empty,

    #[error("Body is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("Unrecognized payload shape: expected resourceId, data or message")]
    UnrecognizedShape,

    #[error("Invalid base64 data: {0}")]
    InvalidBase64(String),

    #[error("Payload does not carry a file identifier")]
    MissingFileId,

    #[error(transparent)]
    InvalidFileId(#[from] DomainError),
}

// ============================================================================
// InboundPayload
// ============================================================================

/// Plain JSON notice: either the relayed `{fileName, resourceId}` or a
/// channel notification `{kind, id, resourceId}`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawNotice {
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
}

/// `{"data": "..."}` envelope
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DataEnvelope {
    pub data: String,
}

/// Pub/Sub push subscription envelope
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BrokerEnvelope {
    pub message: BrokerMessage,
    #[serde(default)]
    pub subscription: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerMessage {
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub publish_time: Option<String>,
}

/// The payload shapes accepted on inbound endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundPayload {
    RawJson(RawNotice),
    Base64Envelope(DataEnvelope),
    BrokerEnvelope(BrokerEnvelope),
}

impl InboundPayload {
    /// Classifies a JSON body by its top-level keys.
    ///
    /// `message` selects the broker envelope, `data` the base64 envelope,
    /// and anything else is read as a raw notice.
    pub fn parse(body: &[u8]) -> Result<Self, PayloadError> {
        if body.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(PayloadError::Empty);
        }

        let value: serde_json::Value =
            serde_json::from_slice(body).map_err(|e| PayloadError::InvalidJson(e.to_string()))?;

        let object = value.as_object().ok_or(PayloadError::UnrecognizedShape)?;

        let shape_err = |e: serde_json::Error| PayloadError::InvalidJson(e.to_string());

        if object.contains_key("message") {
            serde_json::from_value(value)
                .map(InboundPayload::BrokerEnvelope)
                .map_err(shape_err)
        } else if object.contains_key("data") {
            serde_json::from_value(value)
                .map(InboundPayload::Base64Envelope)
                .map_err(shape_err)
        } else if object.contains_key("resourceId") {
            serde_json::from_value(value)
                .map(InboundPayload::RawJson)
                .map_err(shape_err)
        } else {
            Err(PayloadError::UnrecognizedShape)
        }
    }

    /// Normalizes this payload into a [`FileNotice`]
    pub fn into_notice(self) -> Result<FileNotice, PayloadError> {
        match self {
            InboundPayload::RawJson(raw) => from_raw(raw),
            InboundPayload::Base64Envelope(env) => from_data_envelope(env),
            InboundPayload::BrokerEnvelope(env) => from_broker_envelope(env),
        }
    }
}

/// Parses and normalizes a request body in one step
pub fn decode_notice(body: &[u8]) -> Result<FileNotice, PayloadError> {
    InboundPayload::parse(body)?.into_notice()
}

fn from_raw(raw: RawNotice) -> Result<FileNotice, PayloadError> {
    let source = if raw.kind.is_some() {
        NoticeSource::DriveChannel
    } else {
        NoticeSource::Webhook
    };
    let id = raw
        .resource_id
        .filter(|s| !s.trim().is_empty())
        .ok_or(PayloadError::MissingFileId)?;
    let file_id: FileId = id.parse()?;
    Ok(FileNotice::new(file_id, raw.file_name, source))
}

fn from_data_envelope(env: DataEnvelope) -> Result<FileNotice, PayloadError> {
    let data = env.data.trim();
    if data.is_empty() {
        return Err(PayloadError::MissingFileId);
    }

    let decoded = STANDARD
        .decode(data)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok());

    // A base64-wrapped JSON notice wins, then the plain identifier, then a
    // base64-wrapped identifier.
    if let Some(text) = decoded.as_deref() {
        if let Ok(wire) = serde_json::from_str::<WireNotice>(text) {
            return from_wire(wire, NoticeSource::DataEnvelope);
        }
    }

    if let Ok(file_id) = data.parse::<FileId>() {
        return Ok(FileNotice::new(file_id, None, NoticeSource::DataEnvelope));
    }

    match decoded {
        Some(text) => {
            let file_id: FileId = text.parse()?;
            Ok(FileNotice::new(file_id, None, NoticeSource::DataEnvelope))
        }
        None => Err(PayloadError::InvalidBase64(data.to_string())),
    }
}

fn from_broker_envelope(env: BrokerEnvelope) -> Result<FileNotice, PayloadError> {
    let data = env.message.data.ok_or(PayloadError::MissingFileId)?;
    let bytes = STANDARD
        .decode(data.trim())
        .map_err(|e| PayloadError::InvalidBase64(e.to_string()))?;
    let text =
        String::from_utf8(bytes).map_err(|e| PayloadError::InvalidBase64(e.to_string()))?;

    match serde_json::from_str::<WireNotice>(&text) {
        Ok(wire) => from_wire(wire, NoticeSource::PubSub),
        Err(_) => {
            let file_id: FileId = text.parse()?;
            Ok(FileNotice::new(file_id, None, NoticeSource::PubSub))
        }
    }
}

fn from_wire(wire: WireNotice, source: NoticeSource) -> Result<FileNotice, PayloadError> {
    let file_id: FileId = wire.resource_id.parse()?;
    Ok(FileNotice::new(file_id, wire.file_name, source))
}
