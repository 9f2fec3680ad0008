//! Gateway frame codec.
//!
//! Frames are JSON objects `{op, d, t?, s?}`. Outbound text is compact and
//! pure ASCII: every non-ASCII character is written as a lowercase `\uXXXX`
//! escape, using surrogate pairs outside the BMP.

use std::io;

use serde::{Deserialize, Serialize};
use serde_json::ser::Formatter;
use serde_json::{Value, json};

use crate::errors::CodecError;

/// Gateway operation code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u64", into = "u64")]
pub enum OpCode {
    /// `0`: an event dispatch.
    Dispatch,
    /// `1`: keep-alive.
    Heartbeat,
    /// `2`: session handshake.
    Identify,
    /// Anything else; passed through unchanged.
    Other(u64),
}

impl From<u64> for OpCode {
    fn from(op: u64) -> Self {
        match op {
            0 => Self::Dispatch,
            1 => Self::Heartbeat,
            2 => Self::Identify,
            other => Self::Other(other),
        }
    }
}

impl From<OpCode> for u64 {
    fn from(op: OpCode) -> Self {
        match op {
            OpCode::Dispatch => 0,
            OpCode::Heartbeat => 1,
            OpCode::Identify => 2,
            OpCode::Other(other) => other,
        }
    }
}

/// A frame received from the gateway.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InboundFrame {
    /// Operation code.
    pub op: OpCode,
    /// Event name, present on dispatch frames.
    #[serde(rename = "t", default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    /// Payload.
    #[serde(rename = "d", default)]
    pub payload: Value,
    /// Sequence number, when the gateway sends one.
    #[serde(rename = "s", default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
}

/// A control frame sent to the gateway.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutboundFrame {
    /// Operation code.
    pub op: OpCode,
    /// Payload.
    #[serde(rename = "d")]
    pub payload: Value,
}

/// Client identity reported in the handshake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentifyProperties {
    /// Operating system.
    pub os: String,
    /// Browser / library name.
    pub browser: String,
    /// Device name.
    pub device: String,
    /// Gateway protocol version.
    pub version: u8,
}

impl From<&parley_settings::GatewaySettings> for IdentifyProperties {
    fn from(gw: &parley_settings::GatewaySettings) -> Self {
        Self {
            os: gw.os.clone(),
            browser: gw.browser.clone(),
            device: gw.device.clone(),
            version: gw.version,
        }
    }
}

impl Default for IdentifyProperties {
    fn default() -> Self {
        Self::from(&parley_settings::GatewaySettings::default())
    }
}

/// Build the `op: 2` handshake frame.
pub fn identify(token: &str, props: &IdentifyProperties) -> OutboundFrame {
    OutboundFrame {
        op: OpCode::Identify,
        payload: json!({
            "token": token,
            "properties": {
                "$os": props.os,
                "$browser": props.browser,
                "$device": props.device,
                "$referrer": "",
                "$referring_domain": "",
            },
            "v": props.version,
        }),
    }
}

/// Build the `op: 1` keep-alive frame for a unix timestamp in seconds.
pub fn heartbeat(timestamp: i64) -> OutboundFrame {
    OutboundFrame {
        op: OpCode::Heartbeat,
        payload: Value::from(timestamp),
    }
}

/// Parse gateway text into a frame.
pub fn decode(text: &str) -> Result<InboundFrame, CodecError> {
    Ok(serde_json::from_str(text)?)
}

/// Serialize any value to compact, ASCII-only JSON.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, CodecError> {
    let mut out = Vec::with_capacity(128);
    let mut ser = serde_json::Serializer::with_formatter(&mut out, AsciiFormatter);
    value.serialize(&mut ser)?;
    Ok(String::from_utf8(out)?)
}

/// Compact formatter that escapes non-ASCII characters.
struct AsciiFormatter;

impl Formatter for AsciiFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let bytes = fragment.as_bytes();
        let mut start = 0;
        for (idx, ch) in fragment.char_indices() {
            if ch.is_ascii() {
                continue;
            }
            writer.write_all(&bytes[start..idx])?;
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{unit:04x}")?;
            }
            start = idx + ch.len_utf8();
        }
        writer.write_all(&bytes[start..])
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
