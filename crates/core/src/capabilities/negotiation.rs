//! Capability negotiation: reconciling local and remote RTP
//! capabilities into an extended set and projecting that set back into
//! an advertisable one.
//!
//! All transforms are pure. A remote codec with no local match is
//! simply excluded; exclusion is an expected negotiation outcome, not
//! an error.

use super::{
    CodecParameters, ExtendedRtpCapabilities, ExtendedRtpCodec, ExtendedRtpHeaderExtension,
    ParamValue, RtcpFeedback, RtpCapabilities, RtpCodecCapability, RtpHeaderExtension,
};
use crate::sdp::SdpDocument;

/// Reconcile local capabilities with a remote peer's advertisement.
///
/// Codecs are matched in the remote's order (remote preference wins)
/// and annotated with the local payload type for the send direction and
/// the remote payload type for the receive direction. The `rtx`
/// pseudo-codec never becomes an extended codec itself; a second pass
/// links each side's `rtx` entry to its primary codec through the `apt`
/// parameter. Header extensions match on URI (and kind, when both sides
/// declare one).
pub fn get_extended_rtp_capabilities(
    local_caps: &RtpCapabilities,
    remote_caps: &RtpCapabilities,
) -> ExtendedRtpCapabilities {
    let mut codecs: Vec<ExtendedRtpCodec> = Vec::new();

    // Match media codecs, keeping the order preferred by the remote.
    for remote_codec in &remote_caps.codecs {
        if remote_codec.is_rtx() {
            continue;
        }

        let Some(local_codec) = local_caps
            .codecs
            .iter()
            .find(|local| match_codecs(local, remote_codec))
        else {
            continue;
        };

        codecs.push(ExtendedRtpCodec {
            name: remote_codec.name.clone(),
            mime_type: remote_codec.mime_type.clone(),
            kind: remote_codec.kind,
            clock_rate: remote_codec.clock_rate,
            channels: remote_codec.channels,
            send_payload_type: local_codec.preferred_payload_type,
            send_rtx_payload_type: None,
            recv_payload_type: remote_codec.preferred_payload_type,
            recv_rtx_payload_type: None,
            rtcp_feedback: reduce_rtcp_feedback(local_codec, remote_codec),
            parameters: remote_codec.parameters.clone(),
        });
    }

    // Link RTX codecs through their `apt` parameter.
    for codec in &mut codecs {
        let local_rtx = local_caps
            .codecs
            .iter()
            .find(|c| c.is_rtx() && c.apt() == Some(codec.send_payload_type));
        let remote_rtx = remote_caps
            .codecs
            .iter()
            .find(|c| c.is_rtx() && c.apt() == Some(codec.recv_payload_type));

        if let (Some(local_rtx), Some(remote_rtx)) = (local_rtx, remote_rtx) {
            codec.send_rtx_payload_type = Some(local_rtx.preferred_payload_type);
            codec.recv_rtx_payload_type = Some(remote_rtx.preferred_payload_type);
        }
    }

    let mut header_extensions: Vec<ExtendedRtpHeaderExtension> = Vec::new();
    for remote_ext in &remote_caps.header_extensions {
        let Some(local_ext) = local_caps
            .header_extensions
            .iter()
            .find(|local| match_header_extensions(local, remote_ext))
        else {
            continue;
        };

        header_extensions.push(ExtendedRtpHeaderExtension {
            kind: remote_ext.kind,
            uri: remote_ext.uri.clone(),
            send_id: local_ext.preferred_id,
            recv_id: remote_ext.preferred_id,
        });
    }

    ExtendedRtpCapabilities {
        codecs,
        header_extensions,
        fec_mechanisms: Vec::new(),
    }
}

/// Project an extended capability set back into a plain one using the
/// receive-side identifiers.
///
/// Each codec with a receive RTX payload type also yields a synthesized
/// `rtx` pseudo-codec whose `apt` parameter points at the primary
/// codec's receive payload type.
pub fn get_rtp_capabilities(extended: &ExtendedRtpCapabilities) -> RtpCapabilities {
    let mut codecs: Vec<RtpCodecCapability> = Vec::new();

    for codec in &extended.codecs {
        codecs.push(RtpCodecCapability {
            name: codec.name.clone(),
            mime_type: codec.mime_type.clone(),
            kind: codec.kind,
            clock_rate: codec.clock_rate,
            preferred_payload_type: codec.recv_payload_type,
            channels: codec.channels,
            rtcp_feedback: codec.rtcp_feedback.clone(),
            parameters: codec.parameters.clone(),
        });

        if let Some(rtx_payload_type) = codec.recv_rtx_payload_type {
            let mut parameters = CodecParameters::new();
            parameters.insert(
                "apt".to_string(),
                ParamValue::Integer(i64::from(codec.recv_payload_type)),
            );
            codecs.push(RtpCodecCapability {
                name: "rtx".to_string(),
                mime_type: format!("{}/rtx", codec.kind),
                kind: codec.kind,
                clock_rate: codec.clock_rate,
                preferred_payload_type: rtx_payload_type,
                channels: None,
                rtcp_feedback: Vec::new(),
                parameters,
            });
        }
    }

    let header_extensions = extended
        .header_extensions
        .iter()
        .map(|ext| RtpHeaderExtension {
            kind: ext.kind,
            uri: ext.uri.clone(),
            preferred_id: ext.recv_id,
        })
        .collect();

    RtpCapabilities {
        codecs,
        header_extensions,
        fec_mechanisms: extended.fec_mechanisms.clone(),
    }
}

/// The capabilities a client should advertise for a local session
/// description against a remote capability document: extract, extend,
/// project.
pub fn effective_rtp_capabilities(
    local_sdp: &SdpDocument,
    remote_caps: &RtpCapabilities,
) -> RtpCapabilities {
    let local_caps = super::extract_rtp_capabilities(local_sdp);
    let extended = get_extended_rtp_capabilities(&local_caps, remote_caps);
    get_rtp_capabilities(&extended)
}

/// Whether two advertised codecs are the same codec for negotiation
/// purposes: case-insensitive mime type, equal clock rate, and equal
/// channel counts when either side declares one.
fn match_codecs(a: &RtpCodecCapability, b: &RtpCodecCapability) -> bool {
    if !a.mime_type.eq_ignore_ascii_case(&b.mime_type) {
        return false;
    }
    if a.clock_rate != b.clock_rate {
        return false;
    }
    // A declared channel count must be declared, and equal, on both
    // sides.
    a.channels == b.channels
}

/// Whether two header extensions refer to the same mechanism: same URI,
/// and same kind when both sides declare one.
fn match_header_extensions(a: &RtpHeaderExtension, b: &RtpHeaderExtension) -> bool {
    if let (Some(a_kind), Some(b_kind)) = (a.kind, b.kind) {
        if a_kind != b_kind {
            return false;
        }
    }
    a.uri == b.uri
}

/// RTCP feedback entries present in both codecs, keyed on
/// (type, parameter), in `a`'s order.
fn reduce_rtcp_feedback(a: &RtpCodecCapability, b: &RtpCodecCapability) -> Vec<RtcpFeedback> {
    a.rtcp_feedback
        .iter()
        .filter(|a_fb| {
            b.rtcp_feedback
                .iter()
                .any(|b_fb| b_fb.kind == a_fb.kind && b_fb.parameter == a_fb.parameter)
        })
        .cloned()
        .collect()
}
