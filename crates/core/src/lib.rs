//! Capability model and negotiation algorithms for roomcall.
//!
//! This crate holds the pure half of the client: the structured
//! session-description document, the RTP capability data model, and the
//! transforms that reconcile what the local media engine can do with
//! what a remote peer advertises. Nothing here performs I/O; the
//! signaling and orchestration layers live in `roomcall-client`.

pub mod capabilities;
pub mod error;
pub mod sdp;

pub use capabilities::{
    effective_rtp_capabilities, extract_rtp_capabilities, get_extended_rtp_capabilities,
    get_rtp_capabilities, ExtendedRtpCapabilities, ExtendedRtpCodec,
    ExtendedRtpHeaderExtension, MediaKind, ParamValue, RtcpFeedback, RtpCapabilities,
    RtpCodecCapability, RtpHeaderExtension,
};
pub use error::{Error, Result};
pub use sdp::{ExtMapEntry, FmtpEntry, MediaSection, RtcpFbEntry, RtpMapEntry, SdpDocument};
