//! Consumer record validation.

use crate::error::{Error, Result};
use crate::signaling::{ConsumerEntry, ConsumerRecord};

/// Validate a server consumer record into a table entry.
///
/// A usable record carries an id, a kind, and an RTP-parameters block
/// whose first encoding yields an SSRC; anything less aborts this
/// consumer's round without touching session state. The RTX SSRC and
/// CNAME are captured when present. The local track id is derived
/// deterministically from kind and id.
pub fn validate_consumer(record: &ConsumerRecord) -> Result<(u32, ConsumerEntry)> {
    let id = record.id.ok_or(Error::MissingField("id"))?;
    let kind = record.kind.ok_or(Error::MissingField("kind"))?;
    let rtp_parameters = record
        .rtp_parameters
        .as_ref()
        .ok_or(Error::MissingField("rtpParameters"))?;
    let encoding = rtp_parameters
        .encodings
        .first()
        .ok_or(Error::MissingField("encodings"))?;
    let ssrc = encoding.ssrc.ok_or(Error::MissingField("ssrc"))?;

    let entry = ConsumerEntry {
        kind,
        track_id: format!("consumer-{kind}-{id}"),
        ssrc,
        rtx_ssrc: encoding.rtx.as_ref().and_then(|rtx| rtx.ssrc),
        cname: rtp_parameters
            .rtcp
            .as_ref()
            .and_then(|rtcp| rtcp.cname.clone()),
    };
    Ok((id, entry))
}
