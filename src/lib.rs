//! npubgrind: brute-force vanity key search for Nostr npub prefixes.
//!
//! The engine sweeps contiguous private-key ranges with one batched
//! modular inverse per 1024 points, expands every point into six
//! candidates via the secp256k1 endomorphism and curve symmetry, rejects
//! non-matches through a two-level prefix index, and re-verifies every hit
//! from scratch before reporting it.
//!
//! - `secp`: field/scalar/point arithmetic sized for the batch loop
//! - `group`: the generator table and the batched group engine
//! - `encoder` + `lookup`: candidate encoding and the prefix index
//! - `searcher` + `verify` + `output`: workers, verification, reporting
//! - `device`: host side of the accelerator hit-buffer contract

pub mod cli;
pub mod device;
pub mod encoder;
pub mod error;
pub mod group;
pub mod lookup;
pub mod output;
pub mod searcher;
pub mod secp;
pub mod seed;
pub mod verify;

pub use error::{EngineError, Result};
