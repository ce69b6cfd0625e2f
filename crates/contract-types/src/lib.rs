//! Shared types for the contract signing engine
//!
//! This crate provides the data model shared between the placeholder
//! detector, the signature compositor, and the signing session:
//! payload classification, slot status, the durable variable map, and
//! the common error type.

use std::collections::BTreeMap;

use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Literal marker text denoting an unfilled signature slot.
pub const PLACEHOLDER_TOKEN: &str = "var[{{signature}}]";

/// Data-URI prefix identifying an inline image payload.
pub const DATA_URI_IMAGE_PREFIX: &str = "data:image/";

/// Key prefix for signature payload entries in the variable map.
pub const SIGNATURE_KEY_PREFIX: &str = "signature_";

/// Key prefix for per-slot font overrides in the variable map.
pub const FONT_KEY_PREFIX: &str = "signature_font_";

#[derive(Error, Debug)]
pub enum ContractSignError {
    #[error("Invalid signature payload: {0}")]
    InvalidPayload(String),

    #[error("Slot index {index} out of range: document has {total} slots")]
    SlotOutOfRange { index: usize, total: usize },

    #[error("Malformed variable map: {0}")]
    MalformedMap(String),

    #[error("Store operation failed: {0}")]
    Store(String),
}

/// Classification of a raw payload string from the variable map.
///
/// The map stores raw strings; classification is a pure function of the
/// string content. An empty string is the sentinel for a slot that was
/// reserved but not signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignaturePayload {
    /// Inline image, encoded as a `data:image/...` URI.
    Image,
    /// Typed signature text, rendered with a decorative font.
    Text,
    /// Empty sentinel; the slot stays discoverable as a placeholder.
    Empty,
}

impl SignaturePayload {
    pub fn classify(raw: &str) -> Self {
        if raw.is_empty() {
            Self::Empty
        } else if raw.starts_with(DATA_URI_IMAGE_PREFIX) {
            Self::Image
        } else {
            Self::Text
        }
    }
}

/// A detected signature slot: its document-order index and whether it
/// already holds a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotStatus {
    pub index: usize,
    pub filled: bool,
}

/// Validate an inline image payload: data-URI prefix plus a decodable
/// base64 body.
pub fn validate_image_payload(raw: &str) -> Result<(), ContractSignError> {
    if !raw.starts_with(DATA_URI_IMAGE_PREFIX) {
        return Err(ContractSignError::InvalidPayload(
            "missing data:image/ prefix".to_string(),
        ));
    }

    let encoded = raw
        .split_once(";base64,")
        .map(|(_, rest)| rest)
        .ok_or_else(|| ContractSignError::InvalidPayload("missing base64 marker".to_string()))?;

    if encoded.is_empty() {
        return Err(ContractSignError::InvalidPayload(
            "empty image body".to_string(),
        ));
    }

    base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| ContractSignError::InvalidPayload(format!("invalid base64 image data: {}", e)))?;

    Ok(())
}

/// Durable key→payload record used to regenerate the rendered document.
///
/// Entries follow the `signature_<n>` naming scheme, with optional
/// `signature_font_<n>` overrides for typed signatures. This map, not
/// the rendered HTML, is the source of truth: the rendered document is
/// always rebuilt in full from the clean template plus this map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableMap {
    entries: BTreeMap<String, String>,
}

impl VariableMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a variable map from its stored JSON form. An empty or
    /// whitespace-only string is an empty map, not an error.
    pub fn from_json(json: &str) -> Result<Self, ContractSignError> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(json).map_err(|e| ContractSignError::MalformedMap(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, ContractSignError> {
        serde_json::to_string(&self.entries)
            .map_err(|e| ContractSignError::MalformedMap(e.to_string()))
    }

    pub fn set_signature(&mut self, index: usize, payload: &str) {
        self.entries
            .insert(format!("{}{}", SIGNATURE_KEY_PREFIX, index), payload.to_string());
    }

    pub fn set_font(&mut self, index: usize, font: &str) {
        self.entries
            .insert(format!("{}{}", FONT_KEY_PREFIX, index), font.to_string());
    }

    pub fn signature(&self, index: usize) -> Option<&str> {
        self.entries
            .get(&format!("{}{}", SIGNATURE_KEY_PREFIX, index))
            .map(String::as_str)
    }

    pub fn font_for(&self, index: usize) -> Option<&str> {
        self.entries
            .get(&format!("{}{}", FONT_KEY_PREFIX, index))
            .map(String::as_str)
    }

    /// Signature entries in ascending numeric index order (parsed from
    /// the key suffix, not lexicographic: `signature_10` sorts after
    /// `signature_2`). Font override keys are excluded.
    pub fn signature_entries(&self) -> Vec<(usize, &str)> {
        let mut entries: Vec<(usize, &str)> = self
            .entries
            .iter()
            .filter(|(key, _)| !key.starts_with(FONT_KEY_PREFIX))
            .filter_map(|(key, value)| {
                key.strip_prefix(SIGNATURE_KEY_PREFIX)
                    .and_then(|suffix| suffix.parse::<usize>().ok())
                    .map(|index| (index, value.as_str()))
            })
            .collect();
        entries.sort_by_key(|(index, _)| *index);
        entries
    }

    /// Number of entries holding an actual signature (non-empty payload).
    pub fn filled_count(&self) -> usize {
        self.signature_entries()
            .iter()
            .filter(|(_, payload)| !payload.is_empty())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
