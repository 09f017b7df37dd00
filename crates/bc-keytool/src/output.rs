//! Output formatting for CLI results
//!
//! Two formats are supported:
//! - Text: human-readable tables and lines (default)
//! - JSON: a stable envelope for scripting
//!
//! Binary payloads are carried as base64 ("armor") wherever they are not
//! written raw.

use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bc_core::keystore::KeyInfo;
use bc_crypto::PublicKeyBytes;
use comfy_table::{presets::UTF8_FULL, Table};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown output format: {s}")),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Standard JSON response wrapper
#[derive(Debug, Serialize)]
pub struct JsonResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Machine-readable failure code, e.g. `AUTHENTICATION_FAILED`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// RFC 3339 timestamp
    pub timestamp: String,
    pub command: String,
}

impl<T: Serialize> JsonResponse<T> {
    pub fn success(data: T, command: &str) -> Self {
        Self {
            success: true,
            data: Some(data),
            code: None,
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
            command: command.to_string(),
        }
    }
}

impl JsonResponse<()> {
    pub fn error(code: &str, message: &str, command: &str) -> Self {
        Self {
            success: false,
            data: None,
            code: Some(code.to_string()),
            error: Some(message.to_string()),
            timestamp: chrono::Utc::now().to_rfc3339(),
            command: command.to_string(),
        }
    }
}

/// Identity details for `identity show`
#[derive(Debug, Clone, Serialize)]
pub struct IdentityOutput {
    pub alias: String,
    pub public_key: String,
    pub fingerprint: String,
    pub curve: String,
    pub security_level: String,
    pub created_at: String,
    pub not_before: String,
    pub not_after: String,
    pub signing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signing_public_key: Option<String>,
}

impl IdentityOutput {
    pub fn new(public_key: &PublicKeyBytes, info: &KeyInfo, signing_key: Option<[u8; 32]>) -> Self {
        Self {
            alias: info.alias.clone(),
            public_key: public_key.to_hex(),
            fingerprint: public_key.fingerprint(),
            curve: format!("{:?}", info.curve),
            security_level: info.security_level.to_string(),
            created_at: info.created_at.to_rfc3339(),
            not_before: info.validity.not_before.to_rfc3339(),
            not_after: info.validity.not_after.to_rfc3339(),
            signing: info.usage.signing,
            signing_public_key: signing_key.map(hex::encode),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicKeyOutput {
    pub public_key: String,
    pub fingerprint: String,
    /// Set when this call provisioned or confirmed the identity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<&'static str>,
}

impl PublicKeyOutput {
    pub fn new(public_key: &PublicKeyBytes) -> Self {
        Self {
            public_key: public_key.to_hex(),
            fingerprint: public_key.fingerprint(),
            state: None,
        }
    }

    pub fn with_state(mut self, state: &'static str) -> Self {
        self.state = Some(state);
        self
    }
}

/// A binary result, either inline (base64) or written to a file
#[derive(Debug, Clone, Serialize)]
pub struct PayloadOutput {
    pub bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Hex master key, only when the tool generated it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master_key: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MasterKeyOutput {
    pub master_key: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignatureOutput {
    pub signature: String,
    pub signing_key: String,
}

impl SignatureOutput {
    pub fn new(signature: &[u8; 64], signing_key: &[u8; 32]) -> Self {
        Self {
            signature: hex::encode(signature),
            signing_key: hex::encode(signing_key),
        }
    }
}

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    pub fn format_identity(&self, identity: &IdentityOutput) -> String {
        match self.format {
            OutputFormat::Text => identity_table(identity),
            OutputFormat::Json => to_json(&JsonResponse::success(identity, "identity show")),
        }
    }

    pub fn format_public_key(&self, key: &PublicKeyOutput, command: &str) -> String {
        match self.format {
            OutputFormat::Text => match key.state {
                Some(state) => format!("{} ({state})\nfingerprint: {}", key.public_key, key.fingerprint),
                None => key.public_key.clone(),
            },
            OutputFormat::Json => to_json(&JsonResponse::success(key, command)),
        }
    }

    /// Text form is only used when a payload went to a file.
    pub fn format_payload(&self, payload: &PayloadOutput, command: &str) -> String {
        match self.format {
            OutputFormat::Text => {
                let mut out = match (&payload.path, &payload.base64) {
                    (Some(path), _) => format!("Wrote {} bytes to {path}", payload.bytes),
                    (None, Some(b64)) => b64.clone(),
                    (None, None) => format!("{} bytes", payload.bytes),
                };
                if let Some(key) = &payload.master_key {
                    out.push_str(&format!("\nmaster key: {key}"));
                }
                out
            }
            OutputFormat::Json => to_json(&JsonResponse::success(payload, command)),
        }
    }

    pub fn format_master_key(&self, key_hex: &str, command: &str) -> String {
        match self.format {
            OutputFormat::Text => key_hex.to_string(),
            OutputFormat::Json => to_json(&JsonResponse::success(
                MasterKeyOutput {
                    master_key: key_hex.to_string(),
                },
                command,
            )),
        }
    }

    pub fn format_signature(&self, sig: &SignatureOutput, command: &str) -> String {
        match self.format {
            OutputFormat::Text => sig.signature.clone(),
            OutputFormat::Json => to_json(&JsonResponse::success(sig, command)),
        }
    }

    pub fn format_error(&self, code: &str, message: &str, command: &str) -> String {
        match self.format {
            OutputFormat::Text => format!("Error: {code}: {message}"),
            OutputFormat::Json => to_json(&JsonResponse::<()>::error(code, message, command)),
        }
    }
}

fn identity_table(identity: &IdentityOutput) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Field", "Value"]);
    table.add_row(vec!["Alias", identity.alias.as_str()]);
    table.add_row(vec!["Public key", identity.public_key.as_str()]);
    table.add_row(vec!["Fingerprint", identity.fingerprint.as_str()]);
    table.add_row(vec!["Curve", identity.curve.as_str()]);
    table.add_row(vec!["Security level", identity.security_level.as_str()]);
    table.add_row(vec!["Created", identity.created_at.as_str()]);
    table.add_row(vec!["Valid from", identity.not_before.as_str()]);
    table.add_row(vec!["Valid until", identity.not_after.as_str()]);
    table.add_row(vec![
        "Signing key",
        identity.signing_public_key.as_deref().unwrap_or("none"),
    ]);
    table.to_string()
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("{{\"success\":false,\"error\":\"serialization failed: {e}\"}}"))
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("invalid hex: {0}")]
    Hex(String),

    #[error("invalid base64: {0}")]
    Base64(String),
}

pub fn armor(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode base64, ignoring surrounding and embedded whitespace.
pub fn dearmor(text: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let compact: Vec<u8> = text
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    STANDARD
        .decode(compact)
        .map_err(|e| DecodeError::Base64(e.to_string()))
}

/// Parse a hex argument, with or without a `0x` prefix.
pub fn parse_hex(arg: &str) -> Result<Vec<u8>, DecodeError> {
    let trimmed = arg.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    hex::decode(digits).map_err(|e| DecodeError::Hex(e.to_string()))
}
