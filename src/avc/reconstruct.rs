//! Re-framing the length-prefixed access units of an `mdat` payload.
//!
//! The walk is strictly forward: each 4-byte big-endian prefix is judged by a
//! [`RecoveryPolicy`], and the first prefix that is not a complete unit ends
//! the walk. No start-code resynchronization is attempted, as AVCC payload
//! bytes may contain start-code patterns of their own.

use super::annexb::ElementaryStream;
use crate::bits::reader::peek_u32;
use crate::errors::ContainerError;
use crate::mp4::MdatRegion;
use log::{debug, info, warn};

/// Width of an AVCC length prefix
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// What a policy makes of one length prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixVerdict {
    /// A whole unit of the declared length follows
    Complete,
    /// A genuine prefix whose unit was cut off by the end of the payload
    Truncated,
    /// Not a length prefix; the rest of the payload is taken as one raw unit
    Untrusted,
}

/// Decides how far a length prefix can be trusted.
///
/// `remaining` is the number of payload bytes after the prefix. A `Complete`
/// verdict for a prefix that overshoots `remaining` is read as `Truncated`.
pub trait RecoveryPolicy {
    fn judge(&self, declared_length: u32, remaining: usize) -> PrefixVerdict;
}

/// Trust every prefix until it is structurally impossible.
///
/// A prefix is absurd when it is zero or overshoots the remaining bytes by
/// more than the remaining bytes themselves; anything smaller that still
/// overshoots is a unit cut off by the interrupted write.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrustLengthPrefix;

impl RecoveryPolicy for TrustLengthPrefix {
    fn judge(&self, declared_length: u32, remaining: usize) -> PrefixVerdict {
        let declared = declared_length as u64;
        let remaining = remaining as u64;
        if declared == 0 || declared > remaining.saturating_mul(2) {
            PrefixVerdict::Untrusted
        } else if declared <= remaining {
            PrefixVerdict::Complete
        } else {
            PrefixVerdict::Truncated
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitFraming {
    LengthPrefixed,
    /// Bytes following an untrusted prefix, always counted as truncated
    Raw,
}

/// One NAL unit lifted out of the payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessUnit<'a> {
    /// Offset of the length prefix within the payload
    pub offset: usize,
    /// Prefix value as stored in the file
    pub prefix: u32,
    pub data: &'a [u8],
    pub framing: UnitFraming,
}

impl AccessUnit<'_> {
    /// Length the unit claims; for raw units, the bytes taken
    pub fn declared_length(&self) -> usize {
        match self.framing {
            UnitFraming::LengthPrefixed => self.prefix as usize,
            UnitFraming::Raw => self.data.len(),
        }
    }

    pub fn available_length(&self) -> usize {
        self.data.len()
    }

    /// True for a unit cut short by its prefix, and for every raw unit
    pub fn is_truncated(&self) -> bool {
        match self.framing {
            UnitFraming::LengthPrefixed => self.available_length() < self.declared_length(),
            UnitFraming::Raw => true,
        }
    }
}

/// Why the walk ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Payload consumed exactly
    Exhausted,
    /// Fewer bytes left than a length prefix needs; discarded
    TrailingBytes { count: usize },
    /// Final unit shorter than its prefix declares
    TruncatedUnit {
        offset: usize,
        declared: u32,
        available: usize,
    },
    /// Prefix rejected by the policy; the rest went out as a raw unit
    UntrustedPrefix { offset: usize, declared: u32 },
}

impl StopReason {
    /// True when the walk ended at damage rather than at a unit boundary
    pub fn is_partial(&self) -> bool {
        matches!(
            self,
            StopReason::TruncatedUnit { .. } | StopReason::UntrustedPrefix { .. }
        )
    }
}

/// Iterator over the access units of a payload.
///
/// States: scanning while `stop` is `None`, a unit is emitted per `next`, and
/// `Stopped` once `stop` is set, after which it only yields `None`.
pub struct AccessUnits<'a, P> {
    payload: &'a [u8],
    policy: P,
    cursor: usize,
    stop: Option<StopReason>,
}

impl<'a, P: RecoveryPolicy> AccessUnits<'a, P> {
    pub fn new(payload: &'a [u8], policy: P) -> Self {
        Self {
            payload,
            policy,
            cursor: 0,
            stop: None,
        }
    }

    /// Reason the walk ended, `None` while still scanning
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop
    }

    fn halt(&mut self, reason: StopReason) {
        self.cursor = self.payload.len();
        self.stop = Some(reason);
    }
}

impl<'a, P: RecoveryPolicy> Iterator for AccessUnits<'a, P> {
    type Item = AccessUnit<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.stop.is_some() {
            return None;
        }

        let payload = self.payload;
        let offset = self.cursor;
        let left = payload.len() - offset;
        let Some(declared) = peek_u32(payload, offset) else {
            let reason = if left == 0 {
                StopReason::Exhausted
            } else {
                debug!("Discarding {} trailing bytes at offset {}", left, offset);
                StopReason::TrailingBytes { count: left }
            };
            self.halt(reason);
            return None;
        };

        let body = offset + LENGTH_PREFIX_SIZE;
        let remaining = payload.len() - body;
        let verdict = match self.policy.judge(declared, remaining) {
            PrefixVerdict::Complete if declared as usize > remaining => PrefixVerdict::Truncated,
            verdict => verdict,
        };
        match verdict {
            PrefixVerdict::Complete => {
                let end = body + declared as usize;
                self.cursor = end;
                Some(AccessUnit {
                    offset,
                    prefix: declared,
                    data: &payload[body..end],
                    framing: UnitFraming::LengthPrefixed,
                })
            }
            PrefixVerdict::Truncated => {
                warn!(
                    "Unit at offset {} declares {} bytes but only {} remain, saving what we have",
                    offset, declared, remaining
                );
                self.halt(StopReason::TruncatedUnit {
                    offset,
                    declared,
                    available: remaining,
                });
                Some(AccessUnit {
                    offset,
                    prefix: declared,
                    data: &payload[body..],
                    framing: UnitFraming::LengthPrefixed,
                })
            }
            PrefixVerdict::Untrusted => {
                warn!(
                    "Suspicious NAL length {} at offset {} ({} bytes remain), taking the rest as one unit",
                    declared, offset, remaining
                );
                self.halt(StopReason::UntrustedPrefix { offset, declared });
                (remaining > 0).then(|| AccessUnit {
                    offset,
                    prefix: declared,
                    data: &payload[body..],
                    framing: UnitFraming::Raw,
                })
            }
        }
    }
}

/// Units recovered from one payload and why the walk ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconstruction<'a> {
    pub units: Vec<AccessUnit<'a>>,
    pub stop: StopReason,
}

impl Reconstruction<'_> {
    pub fn is_partial(&self) -> bool {
        self.stop.is_partial()
    }

    pub fn last_unit_truncated(&self) -> bool {
        self.units.last().is_some_and(AccessUnit::is_truncated)
    }

    /// Annex-B stream of exactly the recovered units
    pub fn to_elementary_stream(&self) -> ElementaryStream {
        let mut stream = ElementaryStream::with_capacity(self.annexb_len());
        for unit in &self.units {
            stream.push_unit(unit.data);
        }
        stream
    }

    fn annexb_len(&self) -> usize {
        self.units
            .iter()
            .map(|u| u.data.len() + LENGTH_PREFIX_SIZE)
            .sum()
    }
}

/// Walk a payload with the given policy.
pub fn reconstruct_with<P: RecoveryPolicy>(payload: &[u8], policy: P) -> Reconstruction<'_> {
    let mut walk = AccessUnits::new(payload, policy);
    let units: Vec<_> = walk.by_ref().collect();
    let stop = walk.stop_reason().unwrap_or(StopReason::Exhausted);
    Reconstruction { units, stop }
}

/// Walk a payload trusting length prefixes until structurally impossible.
pub fn reconstruct(payload: &[u8]) -> Reconstruction<'_> {
    reconstruct_with(payload, TrustLengthPrefix)
}

/// Reconstruct the units of a located mdat region, failing when there are none.
pub fn reconstruct_mdat<'a, P: RecoveryPolicy>(
    data: &'a [u8],
    region: &MdatRegion,
    policy: P,
) -> Result<Reconstruction<'a>, ContainerError> {
    let rec = reconstruct_with(region.payload(data), policy);
    if rec.units.is_empty() {
        return Err(ContainerError::NoAccessUnits {
            payload_offset: region.start as u64,
            payload_length: region.len() as u64,
        });
    }
    info!(
        "Extracted {} NAL units from mdat ({:?})",
        rec.units.len(),
        rec.stop
    );
    Ok(rec)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn avcc(units: &[&[u8]]) -> Vec<u8> {
        let mut out = Vec::new();
        for u in units {
            out.extend_from_slice(&(u.len() as u32).to_be_bytes());
            out.extend_from_slice(u);
        }
        out
    }

    #[test]
    fn test_policy_verdicts() {
        let p = TrustLengthPrefix;
        assert_eq!(p.judge(0, 100), PrefixVerdict::Untrusted);
        assert_eq!(p.judge(1, 100), PrefixVerdict::Complete);
        assert_eq!(p.judge(100, 100), PrefixVerdict::Complete);
        assert_eq!(p.judge(101, 100), PrefixVerdict::Truncated);
        assert_eq!(p.judge(200, 100), PrefixVerdict::Truncated);
        assert_eq!(p.judge(201, 100), PrefixVerdict::Untrusted);
        assert_eq!(p.judge(u32::MAX, 0), PrefixVerdict::Untrusted);
    }

    #[test]
    fn test_clean_payload() {
        let payload = avcc(&[&[0x67, 1, 2], &[0x65; 9], &[0x41]]);
        let rec = reconstruct(&payload);
        assert_eq!(rec.units.len(), 3);
        assert_eq!(rec.stop, StopReason::Exhausted);
        assert_eq!(rec.units[1].offset, 7);
        assert_eq!(rec.units[1].data, &[0x65; 9]);
        assert!(!rec.is_partial());
        assert!(!rec.last_unit_truncated());
    }

    #[test]
    fn test_truncated_final_unit() {
        let mut payload = avcc(&[&[0x65; 16]]);
        payload.extend_from_slice(&32u32.to_be_bytes());
        payload.extend_from_slice(&[0x41; 20]);

        let rec = reconstruct(&payload);
        assert_eq!(rec.units.len(), 2);
        let last = &rec.units[1];
        assert_eq!(last.framing, UnitFraming::LengthPrefixed);
        assert_eq!(last.declared_length(), 32);
        assert_eq!(last.available_length(), 20);
        assert!(rec.last_unit_truncated());
        assert_eq!(
            rec.stop,
            StopReason::TruncatedUnit {
                offset: 20,
                declared: 32,
                available: 20
            }
        );
    }

    #[test]
    fn test_zero_prefix_takes_rest_raw() {
        let mut payload = avcc(&[&[0x65; 4]]);
        payload.extend_from_slice(&[0, 0, 0, 0]);
        payload.extend_from_slice(&[0xaa; 6]);

        let rec = reconstruct(&payload);
        assert_eq!(rec.units.len(), 2);
        assert_eq!(rec.units[1].framing, UnitFraming::Raw);
        assert_eq!(rec.units[1].data, &[0xaa; 6]);
        assert!(rec.units[1].is_truncated());
        assert!(rec.last_unit_truncated());
        assert_eq!(
            rec.stop,
            StopReason::UntrustedPrefix {
                offset: 8,
                declared: 0
            }
        );
    }

    #[test]
    fn test_garbage_prefix_takes_rest_raw() {
        let mut payload = avcc(&[&[0x65; 4]]);
        payload.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef, 1, 2, 3]);

        let rec = reconstruct(&payload);
        assert_eq!(rec.units.len(), 2);
        assert_eq!(rec.units[1].data, &[1, 2, 3]);
        assert!(rec.is_partial());
    }

    #[test]
    fn test_dangling_prefix_emits_nothing() {
        let mut payload = avcc(&[&[0x65; 4]]);
        payload.extend_from_slice(&[0, 0, 0, 9]);

        let rec = reconstruct(&payload);
        assert_eq!(rec.units.len(), 1);
        assert_eq!(
            rec.stop,
            StopReason::UntrustedPrefix {
                offset: 8,
                declared: 9
            }
        );
    }

    #[test]
    fn test_trailing_bytes_discarded() {
        let mut payload = avcc(&[&[0x65; 4]]);
        payload.extend_from_slice(&[0, 0, 1]);

        let rec = reconstruct(&payload);
        assert_eq!(rec.units.len(), 1);
        assert_eq!(rec.stop, StopReason::TrailingBytes { count: 3 });
        assert!(!rec.is_partial());
    }

    #[test]
    fn test_start_code_inside_payload_is_not_split() {
        let unit = [0x65, 0x00, 0x00, 0x00, 0x01, 0x67, 0x00, 0x00, 0x01, 0x68];
        let payload = avcc(&[&unit]);
        let rec = reconstruct(&payload);
        assert_eq!(rec.units.len(), 1);
        assert_eq!(rec.units[0].data, &unit);
    }

    #[test]
    fn test_iterator_stays_stopped() {
        let payload = avcc(&[&[0x65; 2]]);
        let mut walk = AccessUnits::new(&payload, TrustLengthPrefix);
        assert!(walk.stop_reason().is_none());
        assert!(walk.next().is_some());
        assert!(walk.next().is_none());
        assert_eq!(walk.stop_reason(), Some(StopReason::Exhausted));
        assert!(walk.next().is_none());
    }

    #[test]
    fn test_custom_policy_plugs_in() {
        struct RejectAll;
        impl RecoveryPolicy for RejectAll {
            fn judge(&self, _: u32, _: usize) -> PrefixVerdict {
                PrefixVerdict::Untrusted
            }
        }
        let payload = avcc(&[&[0x65; 2], &[0x41; 2]]);
        let rec = reconstruct_with(&payload, RejectAll);
        assert_eq!(rec.units.len(), 1);
        assert_eq!(rec.units[0].data.len(), payload.len() - 4);
    }

    #[test]
    fn test_annexb_output() {
        let payload = avcc(&[&[0x65, 0x01], &[0x41]]);
        let stream = reconstruct(&payload).to_elementary_stream();
        assert_eq!(
            stream.as_bytes(),
            &[0, 0, 0, 1, 0x65, 0x01, 0, 0, 0, 1, 0x41]
        );
        assert_eq!(stream.unit_count(), 2);
    }

    #[test]
    fn test_overshooting_complete_verdict_is_truncation() {
        struct AlwaysComplete;
        impl RecoveryPolicy for AlwaysComplete {
            fn judge(&self, _: u32, _: usize) -> PrefixVerdict {
                PrefixVerdict::Complete
            }
        }
        let mut payload = avcc(&[&[0x65; 3]]);
        payload.extend_from_slice(&[0xff, 0xff, 0xff, 0xff, 0x41, 0x9a]);

        let rec = reconstruct_with(&payload, AlwaysComplete);
        assert_eq!(rec.units.len(), 2);
        assert_eq!(rec.units[1].data, &[0x41, 0x9a]);
        assert_eq!(
            rec.stop,
            StopReason::TruncatedUnit {
                offset: 7,
                declared: u32::MAX,
                available: 2
            }
        );
    }
}
