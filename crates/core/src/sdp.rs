//! Structured session-description documents.
//!
//! The client never parses or emits SDP text itself; an external
//! collaborator hands it an already-parsed document in the conventional
//! JSON shape (a `media` array whose sections carry `rtp`, `fmtp`,
//! `rtcpFb` and `ext` entries). These types give that document a fixed
//! schema so capability extraction can walk it without stringly-typed
//! lookups.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::capabilities::ParamValue;

/// A parsed session description: the subset of the document the
/// capability core reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SdpDocument {
    /// Media sections in document order.
    #[serde(default)]
    pub media: Vec<MediaSection>,
}

/// One `m=` section of a parsed session description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaSection {
    /// Section kind as written in the document (`audio`, `video`,
    /// `application`, ...). Kept as text; extraction filters on it.
    #[serde(rename = "type")]
    pub kind: String,

    /// Media identifier tag grouping this section, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mid: Option<String>,

    /// rtpmap entries: payload type to codec binding.
    #[serde(default)]
    pub rtp: Vec<RtpMapEntry>,

    /// fmtp entries: per-payload-type format parameters.
    #[serde(default)]
    pub fmtp: Vec<FmtpEntry>,

    /// rtcp-fb entries: per-payload-type RTCP feedback.
    #[serde(default)]
    pub rtcp_fb: Vec<RtcpFbEntry>,

    /// extmap entries: header extensions negotiated for this section.
    #[serde(default)]
    pub ext: Vec<ExtMapEntry>,
}

/// One rtpmap line: `a=rtpmap:<payload> <codec>/<rate>[/<encoding>]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RtpMapEntry {
    pub payload: u8,
    pub codec: String,
    pub rate: u32,
    /// Channel count for audio codecs (`opus/48000/2` -> 2).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<u8>,
}

/// One fmtp line, config still unsplit (`minptime=10;useinbandfec=1`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FmtpEntry {
    pub payload: u8,
    pub config: String,
}

/// One rtcp-fb line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RtcpFbEntry {
    /// Target payload type. Parsers emit either a number or a string,
    /// and the wildcard `"*"` applies to every codec in the section.
    pub payload: FbPayload,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
}

/// rtcp-fb payload target as found in parsed documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FbPayload {
    Number(u8),
    Text(String),
}

impl FbPayload {
    /// The concrete payload type this entry targets, or `None` for the
    /// wildcard and for text that is not a payload number.
    pub fn as_payload_type(&self) -> Option<u8> {
        match self {
            FbPayload::Number(pt) => Some(*pt),
            FbPayload::Text(s) => s.parse().ok(),
        }
    }
}

/// One extmap line: `a=extmap:<value> <uri>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtMapEntry {
    pub value: u16,
    pub uri: String,
}

/// Split an fmtp config string (`key=value;key=value`) into parameters.
///
/// Values that parse as integers are stored as integers, everything
/// else as text. Entries without `=` map to an empty string value.
pub fn parse_fmtp_config(config: &str) -> BTreeMap<String, ParamValue> {
    let mut parameters = BTreeMap::new();
    for part in config.split(';') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (key, value) = match part.split_once('=') {
            Some((k, v)) => (k.trim(), v.trim()),
            None => (part, ""),
        };
        let value = match value.parse::<i64>() {
            Ok(n) => ParamValue::Integer(n),
            Err(_) => ParamValue::String(value.to_string()),
        };
        parameters.insert(key.to_string(), value);
    }
    parameters
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fmtp_config_splits_into_typed_parameters() {
        let params = parse_fmtp_config("minptime=10;useinbandfec=1;profile-id=x42");
        assert_eq!(params.get("minptime"), Some(&ParamValue::Integer(10)));
        assert_eq!(params.get("useinbandfec"), Some(&ParamValue::Integer(1)));
        assert_eq!(
            params.get("profile-id"),
            Some(&ParamValue::String("x42".to_string()))
        );
    }

    #[test]
    fn fmtp_config_tolerates_blanks_and_bare_keys() {
        let params = parse_fmtp_config(" stereo=1; ;cbr");
        assert_eq!(params.get("stereo"), Some(&ParamValue::Integer(1)));
        assert_eq!(params.get("cbr"), Some(&ParamValue::String(String::new())));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn document_deserializes_from_parsed_json() {
        let doc: SdpDocument = serde_json::from_value(serde_json::json!({
            "media": [{
                "type": "audio",
                "mid": "0",
                "rtp": [{"payload": 111, "codec": "opus", "rate": 48000, "encoding": 2}],
                "fmtp": [{"payload": 111, "config": "minptime=10"}],
                "rtcpFb": [{"payload": "111", "type": "transport-cc"}],
                "ext": [{"value": 1, "uri": "urn:ietf:params:rtp-hdrext:ssrc-audio-level"}]
            }]
        }))
        .unwrap();

        assert_eq!(doc.media.len(), 1);
        let section = &doc.media[0];
        assert_eq!(section.kind, "audio");
        assert_eq!(section.rtp[0].encoding, Some(2));
        assert_eq!(section.rtcp_fb[0].payload.as_payload_type(), Some(111));
    }

    #[test]
    fn wildcard_feedback_target_has_no_payload_type() {
        let target = FbPayload::Text("*".to_string());
        assert_eq!(target.as_payload_type(), None);
    }
}
