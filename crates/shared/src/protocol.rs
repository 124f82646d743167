use std::{fmt, str::FromStr};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{ser::SerializeMap, Deserialize, Serialize, Serializer};

use crate::{
    domain::{Answer, QuestionId},
    error::EncodedImageError,
};

pub const ANALYZE_PATH: &str = "/api/analyze";

/// Inline image as a `data:<mime>;base64,<payload>` URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EncodedImage(String);

impl EncodedImage {
    pub fn from_bytes(mime_type: &str, bytes: &[u8]) -> Self {
        Self(format!("data:{mime_type};base64,{}", STANDARD.encode(bytes)))
    }

    pub fn parse(raw: impl Into<String>) -> Result<Self, EncodedImageError> {
        let raw = raw.into();
        let (mime_type, payload) = split_data_url(&raw).ok_or(EncodedImageError::NotADataUrl)?;
        if mime_type.is_empty() {
            return Err(EncodedImageError::MissingMimeType);
        }
        STANDARD.decode(payload)?;
        Ok(Self(raw))
    }

    pub fn mime_type(&self) -> &str {
        split_data_url(&self.0).map(|(mime, _)| mime).unwrap_or_default()
    }

    pub fn payload_b64(&self) -> &str {
        split_data_url(&self.0)
            .map(|(_, payload)| payload)
            .unwrap_or_default()
    }

    pub fn decode(&self) -> Result<Vec<u8>, EncodedImageError> {
        Ok(STANDARD.decode(self.payload_b64())?)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn split_data_url(raw: &str) -> Option<(&str, &str)> {
    raw.strip_prefix("data:")?.split_once(";base64,")
}

impl TryFrom<String> for EncodedImage {
    type Error = EncodedImageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<EncodedImage> for String {
    fn from(value: EncodedImage) -> Self {
        value.0
    }
}

/// How answers are keyed inside `responses`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKeys {
    /// Stable short identifiers such as `stress_level`.
    #[default]
    Id,
    /// Full question text, for services that predate the identifiers.
    Prompt,
}

impl ResponseKeys {
    pub fn key_for(self, id: QuestionId) -> &'static str {
        match self {
            ResponseKeys::Id => id.key(),
            ResponseKeys::Prompt => id.spec().prompt,
        }
    }
}

impl FromStr for ResponseKeys {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "id" => Ok(ResponseKeys::Id),
            "prompt" => Ok(ResponseKeys::Prompt),
            other => Err(format!("unknown response key style '{other}' (use id or prompt)")),
        }
    }
}

impl fmt::Display for ResponseKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseKeys::Id => f.write_str("id"),
            ResponseKeys::Prompt => f.write_str("prompt"),
        }
    }
}

/// Ordered `responses` object; serialized as a JSON map in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseMap(Vec<(String, Answer)>);

impl ResponseMap {
    pub fn new(entries: Vec<(String, Answer)>) -> Self {
        Self(entries)
    }

    pub fn get(&self, key: &str) -> Option<&Answer> {
        self.0
            .iter()
            .find(|(candidate, _)| candidate == key)
            .map(|(_, answer)| answer)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for ResponseMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, answer) in &self.0 {
            map.serialize_entry(key, answer)?;
        }
        map.end()
    }
}

/// Request body for `POST /api/analyze`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    pub name: String,
    pub email: String,
    pub responses: ResponseMap,
    pub logo_base64: Option<EncodedImage>,
}
