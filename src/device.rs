//! Host side of the accelerator contract.
//!
//! A device worker reports candidate hits through a shared array of 32-bit
//! words: word 0 is the hit count, then fixed 8-word records. The host
//! decodes records, reconstructs keys and re-verifies exactly like the CPU
//! path. Kernels themselves are not part of this crate; `probe` exists so
//! the caller can degrade to CPU with a warning instead of failing.

use crate::error::{EngineError, Result};

/// Words per hit record.
pub const ITEM_WORDS: usize = 8;

/// Raw hit as a device reports it: the owning device thread, the signed
/// increment (sign carries the Y-negation), the endomorphism branch, the
/// compression mode and the first five fingerprint words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceHit {
    pub thread_id: u32,
    pub incr: i16,
    pub endo: u8,
    pub compressed: bool,
    pub fingerprint: [u32; 5],
}

impl DeviceHit {
    /// Record layout: (thread_id, packed_tag, fingerprint[5], padding)
    /// with packed_tag = (incr << 16) | (mode << 15) | endo.
    pub fn pack(&self) -> [u32; ITEM_WORDS] {
        let tag = ((self.incr as u16 as u32) << 16)
            | ((self.compressed as u32) << 15)
            | (self.endo as u32);
        let mut words = [0u32; ITEM_WORDS];
        words[0] = self.thread_id;
        words[1] = tag;
        words[2..7].copy_from_slice(&self.fingerprint);
        words
    }

    pub fn unpack(words: &[u32; ITEM_WORDS]) -> Self {
        let tag = words[1];
        let mut fingerprint = [0u32; 5];
        fingerprint.copy_from_slice(&words[2..7]);
        Self {
            thread_id: words[0],
            incr: (tag >> 16) as u16 as i16,
            endo: (tag & 0x3) as u8,
            compressed: tag & (1 << 15) != 0,
            fingerprint,
        }
    }
}

/// Host-side mirror of the device output buffer: capacity `max_found`
/// records, overflow hits are dropped and must be re-enqueued by the host
/// on the next launch.
pub struct HitBuffer {
    words: Vec<u32>,
    max_found: u32,
}

impl HitBuffer {
    pub fn new(max_found: u32) -> Self {
        Self {
            words: vec![0u32; 1 + max_found as usize * ITEM_WORDS],
            max_found,
        }
    }

    pub fn hit_count(&self) -> u32 {
        self.words[0].min(self.max_found)
    }

    /// True count as the device incremented it, including dropped hits.
    pub fn reported_count(&self) -> u32 {
        self.words[0]
    }

    pub fn push(&mut self, hit: &DeviceHit) -> bool {
        let pos = self.words[0];
        self.words[0] += 1;
        if pos >= self.max_found {
            return false;
        }
        let off = 1 + pos as usize * ITEM_WORDS;
        self.words[off..off + ITEM_WORDS].copy_from_slice(&hit.pack());
        true
    }

    pub fn drain(&mut self) -> Vec<DeviceHit> {
        let count = self.hit_count() as usize;
        let hits = (0..count)
            .map(|i| {
                let off = 1 + i * ITEM_WORDS;
                let words: [u32; ITEM_WORDS] =
                    self.words[off..off + ITEM_WORDS].try_into().unwrap();
                DeviceHit::unpack(&words)
            })
            .collect();
        self.words[0] = 0;
        hits
    }
}

/// Probe for a usable accelerator. This build carries no device backend,
/// so the caller always falls back to the CPU engine.
pub fn probe() -> Result<()> {
    Err(EngineError::DeviceUnavailable(
        "no accelerator backend compiled into this build".into(),
    ))
}
