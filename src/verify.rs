//! Hit verification.
//!
//! A hot-loop hit is only a fingerprint match and may be a collision, so
//! nothing is reported before the key is rebuilt from scratch: apply the
//! increment, the sign, the endomorphism multiplier, recompute the point
//! through the trusted library path and re-encode the full address. The
//! candidate may also be the opposite key (same X, negated Y), so a failed
//! check retries with n - k before being dropped as a false positive.

use log::debug;

use crate::encoder;
use crate::lookup::{fingerprint, LookupIndex};
use crate::secp::{public_key, Point, Scalar, LAMBDA, LAMBDA2};

/// Emission tag of a candidate: everything needed to recover the exact
/// originating scalar. Kept together from emission through verification.
#[derive(Debug, Clone, Copy)]
pub struct HitTag {
    /// Offset of the scalar from the worker's base key.
    pub incr: u32,
    /// Endomorphism branch: scalar was multiplied by lambda^endo.
    pub endo: u8,
    /// Y-negated candidate; the key is n - (base + incr).
    pub negated: bool,
    /// Compression mode for the reported WIF.
    pub compressed: bool,
    /// First five fingerprint words of the candidate X.
    pub fingerprint: [u32; 5],
}

/// A hit that survived re-verification.
#[derive(Debug, Clone)]
pub struct VerifiedHit {
    pub thread_id: usize,
    pub pattern: usize,
    pub address: String,
    pub wif: String,
    pub hex: String,
}

pub struct HitVerifier<'a> {
    index: &'a LookupIndex,
    start_pub: Option<Point>,
}

impl<'a> HitVerifier<'a> {
    pub fn new(index: &'a LookupIndex, start_pub: Option<Point>) -> Self {
        Self { index, start_pub }
    }

    /// Recompute the candidate point for key `k`. With a start_pub offset
    /// the offset point undergoes the same sign/endomorphism transform the
    /// candidate did.
    fn candidate_point(&self, k: &Scalar, endo: u8, negated: bool) -> Point {
        let p = public_key(k);
        match &self.start_pub {
            None => p,
            Some(sp) => {
                let mut sp = *sp;
                if negated {
                    sp = sp.neg();
                }
                sp = match endo {
                    1 => sp.endomorphism1(),
                    2 => sp.endomorphism2(),
                    _ => sp,
                };
                p.add(&sp)
            }
        }
    }

    /// Verify a hot-loop hit against the pattern that matched it.
    /// Returns the verified record, or None for a false positive.
    pub fn verify(
        &self,
        thread_id: usize,
        base: &Scalar,
        tag: &HitTag,
        pattern_id: usize,
    ) -> Option<VerifiedHit> {
        let mut k = base.add_u64(tag.incr as u64);
        if tag.negated {
            k = k.neg();
        }
        k = match tag.endo {
            1 => k.mul(&LAMBDA),
            2 => k.mul(&LAMBDA2),
            _ => k,
        };

        let pattern = self.index.pattern(pattern_id);
        let mut point = self.candidate_point(&k, tag.endo, tag.negated);
        let mut ok = fingerprint(&point.x.to_bytes()) == tag.fingerprint;

        if !ok {
            // opposite key: (n - k)·G has the same X
            k = k.neg();
            point = self.candidate_point(&k, tag.endo, !tag.negated);
            ok = fingerprint(&point.x.to_bytes()) == tag.fingerprint;
        }

        let address = encoder::npub(&point.x.to_bytes());
        if !ok || !pattern.matches_suffix(encoder::npub_suffix(&address)) {
            debug!(
                "false positive dropped: pattern={:?} incr={} endo={} negated={} addr={}",
                pattern.raw(),
                tag.incr,
                tag.endo,
                tag.negated,
                address
            );
            return None;
        }

        let key_bytes = k.to_bytes();
        Some(VerifiedHit {
            thread_id,
            pattern: pattern_id,
            address,
            wif: encoder::wif(&key_bytes, tag.compressed),
            hex: hex::encode(key_bytes),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::Pattern;

    fn index_for(pat: &str) -> LookupIndex {
        LookupIndex::build(vec![Pattern::parse(pat).unwrap()]).unwrap()
    }

    fn tag_for(x: &[u8; 32], incr: u32, endo: u8, negated: bool) -> HitTag {
        HitTag {
            incr,
            endo,
            negated,
            compressed: true,
            fingerprint: fingerprint(x),
        }
    }

    #[test]
    fn plain_hit_reconstructs_base_plus_incr() {
        // k = 1: npub starts with "0xlx"
        let idx = index_for("0xlx");
        let verifier = HitVerifier::new(&idx, None);
        let base = Scalar::ZERO.sub(&Scalar::from_u64(4)); // n - 4
        let k = base.add_u64(5); // = 1
        let x = public_key(&k).x.to_bytes();
        let hit = verifier
            .verify(0, &base, &tag_for(&x, 5, 0, false), 0)
            .expect("genuine hit must verify");
        assert!(hit.address.starts_with("npub10xlx"));
        assert_eq!(
            hit.hex,
            "0000000000000000000000000000000000000000000000000000000000000001"
        );
    }

    #[test]
    fn endomorphism_hit_multiplies_by_lambda() {
        let k = Scalar::from_u64(2);
        let lk = LAMBDA.mul(&k);
        let x = public_key(&lk).x.to_bytes();
        let suffix: String = (0..6).map(|i| encoder::data_char(&x, i) as char).collect();
        let idx = index_for(&suffix);
        let verifier = HitVerifier::new(&idx, None);
        let hit = verifier
            .verify(0, &Scalar::ONE, &tag_for(&x, 1, 1, false), 0)
            .expect("endo hit must verify");
        assert_eq!(hit.hex, hex::encode(lk.to_bytes()));
    }

    #[test]
    fn negated_hit_reconstructs_n_minus_k() {
        let k = Scalar::from_u64(3);
        let x = public_key(&k).x.to_bytes(); // same X as (n-3)·G
        let suffix: String = (0..6).map(|i| encoder::data_char(&x, i) as char).collect();
        let idx = index_for(&suffix);
        let verifier = HitVerifier::new(&idx, None);
        let hit = verifier
            .verify(0, &Scalar::ONE, &tag_for(&x, 2, 0, true), 0)
            .expect("negated hit must verify");
        assert_eq!(hit.hex, hex::encode(k.neg().to_bytes()));
    }

    #[test]
    fn fingerprint_collision_is_dropped() {
        // tag points at a scalar whose X does not carry this fingerprint
        let idx = index_for("0xlx");
        let verifier = HitVerifier::new(&idx, None);
        let bogus = tag_for(&[0x55u8; 32], 7, 0, false);
        assert!(verifier.verify(0, &Scalar::ONE, &bogus, 0).is_none());
    }

    #[test]
    fn start_pub_offsets_the_candidate() {
        // search relative to SP = 10·G with base 5: candidate = 15·G
        let sp = public_key(&Scalar::from_u64(10));
        let x = public_key(&Scalar::from_u64(15)).x.to_bytes();
        let suffix: String = (0..6).map(|i| encoder::data_char(&x, i) as char).collect();
        let idx = index_for(&suffix);
        let verifier = HitVerifier::new(&idx, Some(sp));
        let hit = verifier
            .verify(0, &Scalar::from_u64(4), &tag_for(&x, 1, 0, false), 0)
            .expect("offset hit must verify");
        // the reported key is partial: 5, not 15
        assert_eq!(
            hit.hex,
            "0000000000000000000000000000000000000000000000000000000000000005"
        );
    }
}
