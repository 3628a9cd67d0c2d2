//! Relay request parsing: raw JSON body → typed [`RelayRequest`].
//!
//! Shapes and type-checks only. Nothing here touches the network or verifies
//! signatures; the hub contract does that on-chain.

use alloy::hex;
use alloy::primitives::{keccak256, Address, Bytes, B256, U256};
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;

use crate::contracts::Forward;

const FORWARD_FIELDS: [&str; 8] = [
    "from", "to", "value", "space", "nonce", "deadline", "dataHash", "caller",
];

/// Structural rejection of a request body.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("malformed body: {0}")]
    MalformedBody(String),
    #[error("missing field: {0}")]
    MissingField(&'static str),
}

/// The signed Forward authorization, as submitted by the client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authorization {
    pub from: Address,
    pub to: Address,
    #[serde(deserialize_with = "uint_from_json")]
    pub value: U256,
    #[serde(deserialize_with = "u32_from_json")]
    pub space: u32,
    #[serde(deserialize_with = "uint_from_json")]
    pub nonce: U256,
    #[serde(deserialize_with = "uint_from_json")]
    pub deadline: U256,
    pub data_hash: B256,
    pub caller: Address,
}

impl Authorization {
    /// Deadline clamped to `u64`; anything larger never expires in practice.
    pub fn deadline_secs(&self) -> u64 {
        u64::try_from(self.deadline).unwrap_or(u64::MAX)
    }

    pub fn is_expired_at(&self, now_secs: u64) -> bool {
        now_secs > self.deadline_secs()
    }
}

impl From<&Authorization> for Forward {
    fn from(a: &Authorization) -> Self {
        Forward {
            from: a.from,
            to: a.to,
            value: a.value,
            space: a.space,
            nonce: a.nonce,
            deadline: a.deadline,
            dataHash: a.data_hash,
            caller: a.caller,
        }
    }
}

/// Identifies one authorization slot for the duplicate-submission guard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestKey(String);

impl RequestKey {
    pub fn new(from: Address, space: u32, nonce: U256) -> Self {
        Self(format!("{from}-{space}-{nonce}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A structurally valid `POST /relay` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayRequest {
    pub forward: Authorization,
    pub signature: Bytes,
    pub call_data: Bytes,
}

impl RelayRequest {
    pub fn key(&self) -> RequestKey {
        RequestKey::new(self.forward.from, self.forward.space, self.forward.nonce)
    }

    /// keccak256 of the encoded call; must equal `forward.dataHash`.
    pub fn content_hash(&self) -> B256 {
        keccak256(&self.call_data)
    }

    /// Parse and type-check a raw request body.
    pub fn parse(body: &[u8]) -> Result<Self, ValidationError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| ValidationError::MalformedBody(format!("invalid JSON: {e}")))?;
        Self::from_json(&value)
    }

    pub fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let obj = value.as_object().ok_or_else(|| {
            ValidationError::MalformedBody("request must be a JSON object".into())
        })?;

        let forward = obj
            .get("forward")
            .filter(|v| !v.is_null())
            .ok_or(ValidationError::MissingField("forward"))?;
        let signature = required_str(obj, "signature")?;
        let call_data = required_str(obj, "callData")?;

        let forward_obj = forward
            .as_object()
            .ok_or_else(|| ValidationError::MalformedBody("forward must be an object".into()))?;
        for field in FORWARD_FIELDS {
            if forward_obj.get(field).map_or(true, Value::is_null) {
                return Err(ValidationError::MissingField(forward_field_path(field)));
            }
        }

        let forward: Authorization = serde_json::from_value(forward.clone())
            .map_err(|e| ValidationError::MalformedBody(format!("forward: {e}")))?;

        Ok(Self {
            forward,
            signature: decode_hex("signature", signature)?,
            call_data: decode_hex("callData", call_data)?,
        })
    }
}

fn required_str<'a>(
    obj: &'a serde_json::Map<String, Value>,
    field: &'static str,
) -> Result<&'a str, ValidationError> {
    match obj.get(field) {
        None | Some(Value::Null) => Err(ValidationError::MissingField(field)),
        Some(Value::String(s)) if s.trim().is_empty() => Err(ValidationError::MissingField(field)),
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(ValidationError::MalformedBody(format!(
            "{field} must be a hex string"
        ))),
    }
}

fn decode_hex(field: &str, s: &str) -> Result<Bytes, ValidationError> {
    hex::decode(s.trim())
        .map(Bytes::from)
        .map_err(|e| ValidationError::MalformedBody(format!("invalid {field} format: {e}")))
}

fn forward_field_path(field: &str) -> &'static str {
    match field {
        "from" => "forward.from",
        "to" => "forward.to",
        "value" => "forward.value",
        "space" => "forward.space",
        "nonce" => "forward.nonce",
        "deadline" => "forward.deadline",
        "dataHash" => "forward.dataHash",
        _ => "forward.caller",
    }
}

/// Accepts a JSON integer, a decimal string, or a `0x` hex string.
fn uint_from_json<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| de::Error::custom(format!("{n} is not an unsigned integer"))),
        Value::String(s) => s
            .trim()
            .parse::<U256>()
            .map_err(|e| de::Error::custom(format!("invalid integer {s:?}: {e}"))),
        other => Err(de::Error::custom(format!(
            "expected integer or string, got {other}"
        ))),
    }
}

fn u32_from_json<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let wide = uint_from_json(deserializer)?;
    u32::try_from(wide).map_err(|_| de::Error::custom(format!("{wide} does not fit in uint32")))
}
