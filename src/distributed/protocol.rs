//! Envelope protocol between ranks
//!
//! Every transfer between two ranks travels as an [`Envelope`]: the source rank, a
//! logical channel tag, and a bincode-encoded payload. Envelopes are pushed onto the
//! destination rank's inbox; the receiving [`Communicator`](super::Communicator)
//! matches them against posted receives by exact `(source, tag)`.
//!
//! # Tag Space
//!
//! ```text
//! 0 ..= MAX_USER_TAG          user channels (aggregation strategies, applications)
//! MAX_USER_TAG+1 ..= u32::MAX reserved for collectives (barrier, reduce)
//! ```
//!
//! Keeping collective traffic in a separate tag range guarantees that a reduction
//! in flight can never be matched by a user receive, and vice versa.
//!
//! # Payload Format
//!
//! ```text
//! [N bytes: bincode-serialized value]
//! ```
//!
//! There is no length prefix: an envelope always carries exactly one value.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Identity of a participant, in `[0, size)`
pub type Rank = usize;

/// Logical channel identifier
pub type Tag = u32;

/// Largest tag available to callers
pub const MAX_USER_TAG: Tag = 0x7FFF_FFFF;

/// Barrier fan-in (reserved)
pub(crate) const BARRIER_GATHER_TAG: Tag = 0x8000_0001;

/// Barrier release (reserved)
pub(crate) const BARRIER_RELEASE_TAG: Tag = 0x8000_0002;

/// Reduction fan-in (reserved)
pub(crate) const REDUCE_TAG: Tag = 0x8000_0010;

/// One message in transit between two ranks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Sending rank
    pub source: Rank,
    /// Logical channel
    pub tag: Tag,
    /// bincode-encoded value
    pub payload: Vec<u8>,
}

impl Envelope {
    /// Whether this envelope satisfies a receive posted for `(source, tag)`
    #[inline]
    pub fn matches(&self, source: Rank, tag: Tag) -> bool {
        self.source == source && self.tag == tag
    }
}

/// Item delivered to a rank's inbox
#[derive(Debug)]
pub(crate) enum Packet {
    /// Point-to-point or collective traffic
    Message(Envelope),
    /// Supervisor abort; wakes a rank blocked on its inbox
    Abort,
}

/// Reject tags reserved for collectives
pub fn check_user_tag(tag: Tag) -> Result<()> {
    if tag > MAX_USER_TAG {
        return Err(Error::ReservedTag(tag));
    }
    Ok(())
}

/// Serialize a value into an envelope payload
pub fn encode_payload<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

/// Deserialize an envelope payload
pub fn decode_payload<T: DeserializeOwned>(payload: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_matches_exact_pair() {
        let env = Envelope {
            source: 2,
            tag: 7,
            payload: vec![],
        };

        assert!(env.matches(2, 7));
        assert!(!env.matches(1, 7));
        assert!(!env.matches(2, 8));
    }

    #[test]
    fn test_payload_codec() {
        let payload = encode_payload(&(785u64, 1000u64)).unwrap();
        let (count, trials): (u64, u64) = decode_payload(&payload).unwrap();

        assert_eq!(count, 785);
        assert_eq!(trials, 1000);
    }

    #[test]
    fn test_decode_truncated_payload_fails() {
        let payload = encode_payload(&12345u64).unwrap();
        let result: Result<u64> = decode_payload(&payload[..3]);

        assert!(matches!(result, Err(Error::Codec(_))));
    }

    #[test]
    fn test_reserved_tags_rejected() {
        assert!(check_user_tag(0).is_ok());
        assert!(check_user_tag(MAX_USER_TAG).is_ok());
        assert!(matches!(
            check_user_tag(REDUCE_TAG),
            Err(Error::ReservedTag(REDUCE_TAG))
        ));
        assert!(check_user_tag(BARRIER_GATHER_TAG).is_err());
        assert!(check_user_tag(BARRIER_RELEASE_TAG).is_err());
    }
}
