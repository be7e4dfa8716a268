//! Candidate encodings.
//!
//! The hot path never builds a full npub string: `data_char` reads single
//! Bech32 data characters straight out of the big-endian X coordinate, so
//! rejection costs a few shifts. The checksummed `npub1…` string is only
//! assembled for verified hits, via the bech32 crate.
//!
//! The legacy hash encodings (P2PKH / P2SH-P2WPKH / witness-v0 / WIF) are
//! kept for hit reporting and the hash-based search path.

use bech32::{u5, Variant};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use crate::secp::Point;

/// Bech32 data alphabet.
pub const CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";

/// Human-readable part of the Nostr public key encoding.
pub const NPUB_HRP: &str = "npub";

/// Number of data characters carrying the 32-byte X (ceil(256 / 5)).
pub const NPUB_DATA_LEN: usize = 52;

/// The i-th Bech32 data character of the big-endian X, i < 52.
/// 5-bit groups are taken MSB-first; the final group is zero-padded.
#[inline(always)]
pub fn data_char(x: &[u8; 32], i: usize) -> u8 {
    debug_assert!(i < NPUB_DATA_LEN);
    let bit = i * 5;
    let byte = bit / 8;
    let off = bit % 8;
    let hi = (x[byte] as u16) << 8;
    let lo = if byte + 1 < 32 { x[byte + 1] as u16 } else { 0 };
    let v = ((hi | lo) >> (11 - off)) & 0x1F;
    CHARSET[v as usize]
}

/// Fill `out` with the first `out.len()` data characters of X.
pub fn data_chars(x: &[u8; 32], out: &mut [u8]) {
    for (i, c) in out.iter_mut().enumerate() {
        *c = data_char(x, i);
    }
}

/// Full checksummed npub for a 32-byte X.
pub fn npub(x: &[u8; 32]) -> String {
    let converted = bech32::convert_bits(x, 8, 5, true).expect("8->5 regroup cannot fail");
    let data: Vec<u5> = converted
        .iter()
        .map(|&b| u5::try_from_u8(b).expect("convert_bits yields 5-bit values"))
        .collect();
    bech32::encode(NPUB_HRP, data, Variant::Bech32).expect("npub is a valid HRP")
}

/// Data part of an npub, without HRP, separator or checksum.
pub fn npub_suffix(addr: &str) -> &str {
    let s = addr.strip_prefix("npub1").unwrap_or(addr);
    if s.len() >= 6 {
        &s[..s.len() - 6]
    } else {
        s
    }
}

/// HASH160 = RIPEMD160(SHA256(data))
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    let ripemd = Ripemd160::digest(sha);
    let mut out = [0u8; 20];
    out.copy_from_slice(&ripemd);
    out
}

/// HASH160 of a point's SEC1 serialization.
pub fn point_hash160(p: &Point, compressed: bool) -> [u8; 20] {
    if compressed {
        hash160(&p.to_compressed())
    } else {
        hash160(&p.to_uncompressed())
    }
}

fn base58_check(version: u8, payload: &[u8; 20]) -> String {
    let mut data = Vec::with_capacity(25);
    data.push(version);
    data.extend_from_slice(payload);
    let checksum = Sha256::digest(Sha256::digest(&data));
    data.extend_from_slice(&checksum[..4]);
    bs58::encode(data).into_string()
}

/// Legacy P2PKH address (1...).
pub fn p2pkh_address(pubkey_hash: &[u8; 20]) -> String {
    base58_check(0x00, pubkey_hash)
}

/// P2SH-wrapped witness script hash: HASH160(OP_0 PUSH20 pubkey_hash).
pub fn p2sh_script_hash(pubkey_hash: &[u8; 20]) -> [u8; 20] {
    let mut script = [0u8; 22];
    script[0] = 0x00; // OP_0
    script[1] = 0x14; // PUSH 20
    script[2..22].copy_from_slice(pubkey_hash);
    hash160(&script)
}

/// P2SH address (3...) over the wrapped witness script.
pub fn p2sh_address(script_hash: &[u8; 20]) -> String {
    base58_check(0x05, script_hash)
}

/// Native SegWit v0 address (bc1q...).
pub fn p2wpkh_address(pubkey_hash: &[u8; 20]) -> String {
    let converted = bech32::convert_bits(pubkey_hash, 8, 5, true).expect("8->5 regroup");
    let mut data = vec![u5::try_from_u8(0).expect("witness version 0")];
    for b in converted {
        data.push(u5::try_from_u8(b).expect("convert_bits yields 5-bit values"));
    }
    bech32::encode("bc", data, Variant::Bech32).expect("bc is a valid HRP")
}

/// Private key to WIF. The compression flag must match how the public key
/// was serialized; the wrong flag derives a different address.
pub fn wif(key: &[u8; 32], compressed: bool) -> String {
    let mut data = Vec::with_capacity(38);
    data.push(0x80); // mainnet
    data.extend_from_slice(key);
    if compressed {
        data.push(0x01);
    }
    let checksum = Sha256::digest(Sha256::digest(&data));
    data.extend_from_slice(&checksum[..4]);
    bs58::encode(data).into_string()
}
