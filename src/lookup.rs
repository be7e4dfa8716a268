//! Pattern normalization and the two-level prefix index.
//!
//! The index is built once from the user's patterns and read-only
//! afterwards: a 65 536-entry first level keyed by the leading 16 bits of
//! the candidate encoding, an ascending per-bucket run of 32-bit secondary
//! fingerprints, and a linear scan list for wildcard or very short
//! patterns. Candidates that miss the first level are rejected with a
//! single indexed load.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::encoder::{self, CHARSET, NPUB_DATA_LEN};
use crate::error::{EngineError, Result};

/// Minimum literal length for the two-level lookup: four data characters
/// (20 bits) pin the 16-bit first-level key.
const MIN_BUCKET_CHARS: usize = 4;

/// Seven characters (35 bits) pin the full 32-bit secondary fingerprint.
const FULL_WORD_CHARS: usize = 7;

#[inline]
fn char_value(c: u8) -> Option<u8> {
    CHARSET.iter().position(|&x| x == c).map(|i| i as u8)
}

/// First five 32-bit words of a candidate's encoding stream, little-endian
/// word packing; word 0's low 16 bits are the first-level key.
#[inline]
pub fn fingerprint(x: &[u8; 32]) -> [u32; 5] {
    let mut words = [0u32; 5];
    for (i, w) in words.iter_mut().enumerate() {
        *w = u32::from_le_bytes(x[i * 4..i * 4 + 4].try_into().unwrap());
    }
    words
}

/// A normalized search pattern over the Bech32 data alphabet.
///
/// Tokens are data characters plus `?` (exactly one character) and a
/// trailing `*` (matches the rest). The `npub` HRP and `1` separator are
/// stripped during parsing and never compared.
#[derive(Debug, Clone)]
pub struct Pattern {
    raw: String,
    tokens: Vec<u8>,
    wildcard: bool,
}

impl Pattern {
    pub fn parse(input: &str) -> Result<Self> {
        let mut s = input;
        if s.get(..4).is_some_and(|head| head.eq_ignore_ascii_case("npub")) {
            s = &s[4..];
        }
        s = s.strip_prefix('1').unwrap_or(s);

        if s.is_empty() {
            return Err(EngineError::PatternInvalid(
                input.to_string(),
                "empty after stripping the npub prefix".into(),
            ));
        }

        let mut tokens = Vec::with_capacity(s.len());
        let mut wildcard = false;
        for &c in s.as_bytes() {
            match c {
                b'*' => {
                    // matches-rest: anything after the star is unreachable
                    tokens.push(b'*');
                    wildcard = true;
                    break;
                }
                b'?' => {
                    tokens.push(b'?');
                    wildcard = true;
                }
                c if char_value(c).is_some() => tokens.push(c),
                c => {
                    return Err(EngineError::PatternInvalid(
                        input.to_string(),
                        format!(
                            "invalid character {:?}; allowed: lowercase {} plus '?' and '*'",
                            c as char,
                            std::str::from_utf8(CHARSET).unwrap()
                        ),
                    ));
                }
            }
        }

        let positions = tokens.iter().filter(|&&t| t != b'*').count();
        if positions > NPUB_DATA_LEN {
            return Err(EngineError::PatternInvalid(
                input.to_string(),
                format!("longer than the {NPUB_DATA_LEN}-character npub data part"),
            ));
        }

        Ok(Self {
            raw: input.to_string(),
            tokens,
            wildcard,
        })
    }

    /// The pattern as the user supplied it.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Normalized data-part tokens.
    pub fn suffix(&self) -> &[u8] {
        &self.tokens
    }

    fn bucketable(&self) -> bool {
        !self.wildcard && self.tokens.len() >= MIN_BUCKET_CHARS
    }

    /// Expected number of candidates per match, 2^(5·len).
    /// Wildcard patterns have no closed-form difficulty.
    pub fn difficulty(&self) -> Option<f64> {
        if self.wildcard {
            None
        } else {
            Some((2f64).powi(5 * self.tokens.len() as i32))
        }
    }

    /// Match directly against the X coordinate, decoding only the data
    /// characters the pattern actually constrains.
    pub fn matches_x(&self, x: &[u8; 32]) -> bool {
        for (i, &t) in self.tokens.iter().enumerate() {
            match t {
                b'*' => return true,
                b'?' => continue,
                c => {
                    if encoder::data_char(x, i) != c {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Match against an already-encoded data suffix (verification path).
    pub fn matches_suffix(&self, suffix: &str) -> bool {
        let s = suffix.as_bytes();
        for (i, &t) in self.tokens.iter().enumerate() {
            match t {
                b'*' => return true,
                b'?' => {
                    if i >= s.len() {
                        return false;
                    }
                }
                c => {
                    if i >= s.len() || s[i] != c {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// 16-bit first-level key: the first two encoding bytes in
    /// little-endian word order. Only defined for bucketable patterns.
    fn bucket16(&self) -> u16 {
        debug_assert!(self.bucketable());
        let v: Vec<u8> = self.tokens[..MIN_BUCKET_CHARS]
            .iter()
            .map(|&c| char_value(c).unwrap())
            .collect();
        let b0 = (v[0] << 3) | (v[1] >> 2);
        let b1 = ((v[1] & 0x03) << 6) | (v[2] << 1) | (v[3] >> 4);
        u16::from_le_bytes([b0, b1])
    }

    /// Every 32-bit secondary fingerprint consistent with this pattern.
    /// Patterns of 4-6 characters leave 2..12 free bits; enumerating the
    /// completions keeps the binary search free of false negatives.
    fn word0_completions(&self) -> Vec<u32> {
        debug_assert!(self.bucketable());
        let take = self.tokens.len().min(FULL_WORD_CHARS);
        let mut acc: u64 = 0;
        let mut bits = 0u32;
        for &c in &self.tokens[..take] {
            acc = (acc << 5) | char_value(c).unwrap() as u64;
            bits += 5;
        }
        if bits >= 32 {
            let be = (acc >> (bits - 32)) as u32;
            vec![be.swap_bytes()]
        } else {
            let free = 32 - bits;
            let base = (acc as u32) << free;
            (0..1u32 << free).map(|m| (base | m).swap_bytes()).collect()
        }
    }
}

pub struct PatternEntry {
    pub pattern: Pattern,
    pub found: AtomicBool,
}

#[derive(Clone, Default)]
struct Bucket {
    start: u32,
    len: u32,
    ids: Vec<u32>,
}

/// Prebuilt two-level prefix index. Build once, query many, read-only;
/// the per-pattern `found` flags are the only mutable state.
pub struct LookupIndex {
    buckets: Vec<Bucket>,
    sorted32: Vec<u32>,
    scan: Vec<u32>,
    entries: Vec<PatternEntry>,
}

impl LookupIndex {
    pub fn build(patterns: Vec<Pattern>) -> Result<Self> {
        if patterns.is_empty() {
            return Err(EngineError::PatternInvalid(
                String::new(),
                "nothing to search".into(),
            ));
        }

        let entries: Vec<PatternEntry> = patterns
            .into_iter()
            .map(|pattern| PatternEntry {
                pattern,
                found: AtomicBool::new(false),
            })
            .collect();

        let mut scan = Vec::new();
        let mut grouped: BTreeMap<u16, (Vec<u32>, Vec<u32>)> = BTreeMap::new();
        for (id, e) in entries.iter().enumerate() {
            if e.pattern.bucketable() {
                let slot = grouped.entry(e.pattern.bucket16()).or_default();
                slot.0.extend(e.pattern.word0_completions());
                slot.1.push(id as u32);
            } else {
                scan.push(id as u32);
            }
        }

        let mut buckets = vec![Bucket::default(); 0x10000];
        let mut sorted32 = Vec::new();
        for (key, (mut words, ids)) in grouped {
            words.sort_unstable();
            words.dedup();
            buckets[key as usize] = Bucket {
                start: sorted32.len() as u32,
                len: words.len() as u32,
                ids,
            };
            sorted32.extend_from_slice(&words);
        }

        Ok(Self {
            buckets,
            sorted32,
            scan,
            entries,
        })
    }

    /// Match a candidate X against the pattern set. The common case is a
    /// single load and an empty-bucket reject; data characters are only
    /// decoded after a secondary-fingerprint hit or for wildcard patterns.
    #[inline]
    pub fn match_x(&self, x: &[u8; 32], skip_found: bool) -> Option<usize> {
        let w0 = u32::from_le_bytes(x[0..4].try_into().unwrap());
        let bucket = &self.buckets[(w0 & 0xFFFF) as usize];
        if bucket.len != 0 {
            let run = &self.sorted32[bucket.start as usize..(bucket.start + bucket.len) as usize];
            if run.binary_search(&w0).is_ok() {
                for &id in &bucket.ids {
                    let e = &self.entries[id as usize];
                    if skip_found && e.found.load(Ordering::Relaxed) {
                        continue;
                    }
                    if e.pattern.matches_x(x) {
                        return Some(id as usize);
                    }
                }
            }
        }
        for &id in &self.scan {
            let e = &self.entries[id as usize];
            if skip_found && e.found.load(Ordering::Relaxed) {
                continue;
            }
            if e.pattern.matches_x(x) {
                return Some(id as usize);
            }
        }
        None
    }

    pub fn entries(&self) -> &[PatternEntry] {
        &self.entries
    }

    pub fn pattern(&self, id: usize) -> &Pattern {
        &self.entries[id].pattern
    }

    /// false -> true only; returns whether this call made the transition.
    pub fn mark_found(&self, id: usize) -> bool {
        !self.entries[id].found.swap(true, Ordering::SeqCst)
    }

    pub fn all_found(&self) -> bool {
        self.entries
            .iter()
            .all(|e| e.found.load(Ordering::Relaxed))
    }

    /// Minimum difficulty over the not-yet-found literal patterns.
    pub fn min_difficulty(&self) -> Option<f64> {
        self.entries
            .iter()
            .filter(|e| !e.found.load(Ordering::Relaxed))
            .filter_map(|e| e.pattern.difficulty())
            .min_by(|a, b| a.total_cmp(b))
    }
}
