//! Code execution results.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An inline image produced by executed code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct InlineImage {
    /// MIME type, e.g. `image/png`.
    pub mime: String,
    /// Decoded image bytes; base64 on the wire.
    #[serde(serialize_with = "encode_base64", deserialize_with = "decode_base64")]
    pub data: Vec<u8>,
}

impl InlineImage {
    /// Decode a wire image whose payload is base64 text.
    ///
    /// Returns `None` when `data` is not valid base64.
    #[must_use]
    pub fn from_base64(mime: impl Into<String>, data: &str) -> Option<Self> {
        let bytes = STANDARD.decode(data.trim()).ok()?;
        Some(Self {
            mime: mime.into(),
            data: bytes,
        })
    }
}

fn encode_base64<S>(data: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&STANDARD.encode(data))
}

fn decode_base64<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    STANDARD
        .decode(raw.trim())
        .map_err(serde::de::Error::custom)
}

/// Outcome of one code execution. Immutable once attached to a turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ExecutionResult {
    /// Whether the code ran without raising.
    pub success: bool,
    /// Captured standard output.
    #[serde(default)]
    pub stdout: String,
    /// Error text when the run failed.
    #[serde(default)]
    pub error: Option<String>,
    /// Images in emission order.
    #[serde(default)]
    pub images: Vec<InlineImage>,
}

/// A code sub-turn: the code sent for execution and, once closed, its result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct CodeExecution {
    /// Source code executed.
    pub code: String,
    /// Result, present once the sub-turn has been closed.
    #[serde(default)]
    pub result: Option<ExecutionResult>,
}

impl CodeExecution {
    /// Open a sub-turn for `code` with no result yet.
    #[must_use]
    pub fn started(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            result: None,
        }
    }

    /// Whether a result has been attached.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.result.is_some()
    }
}
