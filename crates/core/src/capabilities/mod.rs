//! RTP capability data model.
//!
//! Two families of types live here. The *plain* capability types
//! describe what one endpoint can send or receive, as advertised in a
//! session description or a room capability document. The *extended*
//! types are the result of reconciling a local and a remote capability
//! set: each codec and header extension is annotated with both the
//! send-side and receive-side identifiers agreed during negotiation.

mod extract;
mod negotiation;

pub use extract::extract_rtp_capabilities;
pub use negotiation::{
    effective_rtp_capabilities, get_extended_rtp_capabilities, get_rtp_capabilities,
};

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Media kind of a codec, track or header extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Audio => f.write_str("audio"),
            MediaKind::Video => f.write_str("video"),
        }
    }
}

/// Codec-specific parameter value: parsed documents carry either text
/// or integers (`apt=96`, `profile-level-id=42e01f`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Integer(i64),
    String(String),
}

impl ParamValue {
    /// The integer value, if this parameter holds one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            ParamValue::Integer(n) => Some(*n),
            ParamValue::String(_) => None,
        }
    }
}

/// Codec-specific parameters keyed by parameter name.
pub type CodecParameters = BTreeMap<String, ParamValue>;

/// One RTCP feedback mechanism supported for a codec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtcpFeedback {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
}

impl RtcpFeedback {
    pub fn new(kind: impl Into<String>, parameter: Option<&str>) -> Self {
        Self {
            kind: kind.into(),
            parameter: parameter.map(str::to_string),
        }
    }
}

/// A codec one endpoint advertises.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpCodecCapability {
    pub name: String,
    /// `<kind>/<name>`, e.g. `audio/opus`.
    pub mime_type: String,
    pub kind: MediaKind,
    pub clock_rate: u32,
    pub preferred_payload_type: u8,
    /// Channel count; only meaningful for audio codecs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<u8>,
    #[serde(default)]
    pub rtcp_feedback: Vec<RtcpFeedback>,
    #[serde(default)]
    pub parameters: CodecParameters,
}

impl RtpCodecCapability {
    /// Whether this is the `rtx` retransmission pseudo-codec.
    pub fn is_rtx(&self) -> bool {
        self.name.eq_ignore_ascii_case("rtx")
    }

    /// The associated payload type (`apt`) of an `rtx` entry.
    pub fn apt(&self) -> Option<u8> {
        self.parameters
            .get("apt")
            .and_then(ParamValue::as_integer)
            .and_then(|n| u8::try_from(n).ok())
    }
}

/// A header extension one endpoint advertises.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpHeaderExtension {
    /// Media kind this extension applies to; absent means either.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<MediaKind>,
    pub uri: String,
    pub preferred_id: u16,
}

/// A full capability set as advertised by one endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpCapabilities {
    #[serde(default)]
    pub codecs: Vec<RtpCodecCapability>,
    #[serde(default)]
    pub header_extensions: Vec<RtpHeaderExtension>,
    #[serde(default)]
    pub fec_mechanisms: Vec<String>,
}

/// A codec after reconciliation: the remote's declared payload types on
/// both directions, plus linked RTX payload types when both sides carry
/// a matching `rtx` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedRtpCodec {
    pub name: String,
    pub mime_type: String,
    pub kind: MediaKind,
    pub clock_rate: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<u8>,
    pub send_payload_type: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_rtx_payload_type: Option<u8>,
    pub recv_payload_type: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recv_rtx_payload_type: Option<u8>,
    #[serde(default)]
    pub rtcp_feedback: Vec<RtcpFeedback>,
    #[serde(default)]
    pub parameters: CodecParameters,
}

/// A header extension after reconciliation: the local id is used when
/// sending, the remote id when receiving.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedRtpHeaderExtension {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<MediaKind>,
    pub uri: String,
    pub send_id: u16,
    pub recv_id: u16,
}

/// The reconciled capability set for a local/remote pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedRtpCapabilities {
    #[serde(default)]
    pub codecs: Vec<ExtendedRtpCodec>,
    #[serde(default)]
    pub header_extensions: Vec<ExtendedRtpHeaderExtension>,
    #[serde(default)]
    pub fec_mechanisms: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_value_round_trips_untagged() {
        let params: CodecParameters = serde_json::from_value(serde_json::json!({
            "apt": 96,
            "profile-level-id": "42e01f"
        }))
        .unwrap();
        assert_eq!(params.get("apt"), Some(&ParamValue::Integer(96)));
        assert_eq!(
            params.get("profile-level-id"),
            Some(&ParamValue::String("42e01f".to_string()))
        );
    }

    #[test]
    fn rtx_apt_lookup() {
        let codec: RtpCodecCapability = serde_json::from_value(serde_json::json!({
            "name": "rtx",
            "mimeType": "video/rtx",
            "kind": "video",
            "clockRate": 90000,
            "preferredPayloadType": 97,
            "parameters": {"apt": 96}
        }))
        .unwrap();
        assert!(codec.is_rtx());
        assert_eq!(codec.apt(), Some(96));
    }

    #[test]
    fn media_kind_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(MediaKind::Audio).unwrap(),
            serde_json::json!("audio")
        );
        assert_eq!(MediaKind::Video.to_string(), "video");
    }
}
