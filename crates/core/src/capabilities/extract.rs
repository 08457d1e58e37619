//! Capability extraction from a parsed session description.

use std::collections::BTreeMap;

use super::{MediaKind, RtcpFeedback, RtpCapabilities, RtpCodecCapability, RtpHeaderExtension};
use crate::sdp::{parse_fmtp_config, SdpDocument};

/// Extract the RTP capabilities advertised by a parsed session
/// description.
///
/// Only the first audio section and the first video section are
/// considered; later sections of the same kind are ignored (one stream
/// per kind). For each kept section the codec list is built from the
/// rtpmap entries, then enriched with fmtp parameters and rtcp-fb
/// entries targeting the same payload type. Header extensions are
/// collected from every kept section in section order. Codecs come out
/// in ascending payload-type order.
pub fn extract_rtp_capabilities(sdp: &SdpDocument) -> RtpCapabilities {
    // Codecs keyed by payload type, shared across the kept sections.
    let mut codecs_by_pt: BTreeMap<u8, RtpCodecCapability> = BTreeMap::new();
    let mut header_extensions: Vec<RtpHeaderExtension> = Vec::new();

    let mut got_audio = false;
    let mut got_video = false;

    for section in &sdp.media {
        let kind = match section.kind.as_str() {
            "audio" => {
                if got_audio {
                    continue;
                }
                got_audio = true;
                MediaKind::Audio
            }
            "video" => {
                if got_video {
                    continue;
                }
                got_video = true;
                MediaKind::Video
            }
            _ => continue,
        };

        for rtp in &section.rtp {
            let channels = match kind {
                MediaKind::Audio => Some(rtp.encoding.unwrap_or(1)),
                MediaKind::Video => None,
            };
            codecs_by_pt
                .entry(rtp.payload)
                .or_insert_with(|| RtpCodecCapability {
                    name: rtp.codec.clone(),
                    mime_type: format!("{}/{}", kind, rtp.codec),
                    kind,
                    clock_rate: rtp.rate,
                    preferred_payload_type: rtp.payload,
                    channels,
                    rtcp_feedback: Vec::new(),
                    parameters: BTreeMap::new(),
                });
        }

        for fmtp in &section.fmtp {
            if let Some(codec) = codecs_by_pt.get_mut(&fmtp.payload) {
                codec.parameters = parse_fmtp_config(&fmtp.config);
            }
        }

        for fb in &section.rtcp_fb {
            // Wildcard targets do not attach to any single codec.
            let Some(payload) = fb.payload.as_payload_type() else {
                continue;
            };
            if let Some(codec) = codecs_by_pt.get_mut(&payload) {
                codec
                    .rtcp_feedback
                    .push(RtcpFeedback::new(fb.kind.clone(), fb.subtype.as_deref()));
            }
        }

        for ext in &section.ext {
            header_extensions.push(RtpHeaderExtension {
                kind: Some(kind),
                uri: ext.uri.clone(),
                preferred_id: ext.value,
            });
        }
    }

    RtpCapabilities {
        codecs: codecs_by_pt.into_values().collect(),
        header_extensions,
        fec_mechanisms: Vec::new(),
    }
}
