//! End-to-end search behavior: a tiny bounded search, exact scalar
//! recovery for all six candidate tags, and the lookup rejection paths.

use std::sync::Arc;
use std::time::Duration;

use npubgrind::encoder;
use npubgrind::group::{GroupEngine, GRP_SIZE, HALF_GRP};
use npubgrind::lookup::{fingerprint, LookupIndex, Pattern};
use npubgrind::output::RecordSink;
use npubgrind::searcher::{SearchConfig, Searcher};
use npubgrind::secp::{batch_inverse, public_key, FieldElement, Point, Scalar, BETA, BETA2, LAMBDA, LAMBDA2};
use npubgrind::verify::{HitTag, HitVerifier};

fn index_for(patterns: &[&str]) -> Arc<LookupIndex> {
    Arc::new(
        LookupIndex::build(patterns.iter().map(|p| Pattern::parse(p).unwrap()).collect()).unwrap(),
    )
}

/// Tiny search: one worker, one cheap pattern, stop on find. The search
/// must terminate on its own and every reported key must re-derive to an
/// npub with the requested prefix.
#[test]
fn tiny_search_finds_and_verifies_a_key() {
    let index = index_for(&["npub1q"]);
    let config = SearchConfig {
        threads: 1,
        stop_on_find: true,
        quiet: true,
        ..Default::default()
    };
    let searcher = Arc::new(
        Searcher::new(
            config,
            Arc::clone(&index),
            "test-seed",
            None,
            RecordSink::stdout(false),
        )
        .unwrap(),
    );

    let (tx, rx) = crossbeam_channel::unbounded();
    let runner = Arc::clone(&searcher);
    let handle = std::thread::spawn(move || runner.run(tx).unwrap());

    let hit = rx
        .recv_timeout(Duration::from_secs(60))
        .expect("a one-character pattern must hit within the first groups");
    handle.join().unwrap();

    assert!(hit.address.starts_with("npub1q"), "got {}", hit.address);
    assert!(index.all_found());

    // independent re-derivation of the reported key
    let key_bytes: [u8; 32] = hex::decode(&hit.hex).unwrap().try_into().unwrap();
    let k = Scalar::from_bytes(&key_bytes);
    let p = public_key(&k);
    let addr = encoder::npub(&p.x.to_bytes());
    assert_eq!(addr, hit.address);
    assert_eq!(encoder::data_char(&p.x.to_bytes(), 0), b'q');
}

/// Every (endo, sign) tag must recover the exact originating scalar:
/// lambda^e * (base + t) for sign +, lambda^e * (n - (base + t)) for -.
#[test]
fn candidate_tags_recover_exact_scalars() {
    let base = Scalar::from_u64(900_000);
    let t = 17u32;
    let k = base.add_u64(t as u64);
    let point = public_key(&k);

    let xs = [
        point.x.to_bytes(),
        point.x.mul(&BETA).to_bytes(),
        point.x.mul(&BETA2).to_bytes(),
    ];
    let lambdas = [Scalar::ONE, LAMBDA, LAMBDA2];

    for negated in [false, true] {
        for endo in 0usize..3 {
            let expected = {
                let signed = if negated { k.neg() } else { k };
                lambdas[endo].mul(&signed)
            };
            let x = &xs[endo];
            let suffix: String = (0..8).map(|i| encoder::data_char(x, i) as char).collect();
            let index = index_for(&[&suffix]);
            let verifier = HitVerifier::new(&index, None);
            let tag = HitTag {
                incr: t,
                endo: endo as u8,
                negated,
                compressed: true,
                fingerprint: fingerprint(x),
            };
            let hit = verifier
                .verify(0, &base, &tag, 0)
                .unwrap_or_else(|| panic!("tag endo={endo} negated={negated} must verify"));
            assert_eq!(
                hit.hex,
                hex::encode(expected.to_bytes()),
                "endo={endo} negated={negated}"
            );
            // the recovered key really produces the candidate X
            assert_eq!(public_key(&expected).x.to_bytes(), *x);
        }
    }
}

/// An artificial candidate sharing a pattern's 16-bit bucket but not its
/// 32-bit fingerprint traverses the binary search, misses, and never
/// reaches verification.
#[test]
fn same_bucket_fingerprint_collision_is_rejected() {
    let x = public_key(&Scalar::ONE).x.to_bytes();
    let prefix: String = (0..9).map(|i| encoder::data_char(&x, i) as char).collect();
    let index = index_for(&[&prefix]);
    assert_eq!(index.match_x(&x, false), Some(0));

    let mut forged = x;
    forged[2] ^= 0x01; // beyond the 16-bit bucket, inside word 0
    assert_eq!(
        fingerprint(&forged)[0] & 0xFFFF,
        fingerprint(&x)[0] & 0xFFFF,
        "forgery must stay in the same bucket"
    );
    assert_eq!(index.match_x(&forged, false), None);
}

/// The group engine and a straight scalar-multiplication sweep must agree
/// on every point, so no pattern match can be lost inside a group.
#[test]
fn group_sweep_covers_every_scalar_exactly_once() {
    let engine = GroupEngine::new();
    let base = Scalar::from_u64(31_000_000);
    let start_p = public_key(&base.add_u64(HALF_GRP as u64));

    let mut pts = vec![Point::INFINITY; GRP_SIZE];
    let mut dx = vec![FieldElement::ZERO; HALF_GRP + 1];
    let mut dx_inv = vec![FieldElement::ZERO; HALF_GRP + 1];
    engine
        .fill_group(&start_p, &mut pts, &mut dx, &mut dx_inv)
        .unwrap();

    for (t, p) in pts.iter().enumerate().step_by(97) {
        assert_eq!(*p, public_key(&base.add_u64(t as u64)), "offset {t}");
    }
}

/// Grouped inverse identity over a large batch (the group engine relies on
/// elementwise a * inv(a) = 1 across the whole array).
#[test]
fn batch_inverse_identity_over_1024_elements() {
    use rand::RngCore;
    let mut rng = rand::thread_rng();
    let vals: Vec<FieldElement> = (0..1024)
        .map(|_| {
            let mut bytes = [0u8; 32];
            rng.fill_bytes(&mut bytes);
            bytes[0] &= 0x7F;
            let fe = FieldElement::from_bytes(&bytes);
            if fe.is_zero() {
                FieldElement::ONE
            } else {
                fe
            }
        })
        .collect();
    let mut out = vec![FieldElement::ZERO; vals.len()];
    batch_inverse(&vals, &mut out).unwrap();
    for (v, inv) in vals.iter().zip(&out) {
        assert_eq!(v.mul(inv), FieldElement::ONE);
    }
}

/// Pattern normalization: with/without HRP and separator, the same
/// internal suffix matches the same candidates.
#[test]
fn normalized_pattern_variants_match_identically() {
    let x = public_key(&Scalar::ONE).x.to_bytes();
    for input in ["npub10xlx", "0xlx", "10xlx", "NPUB10xlx"] {
        let index = index_for(&[input]);
        assert_eq!(index.match_x(&x, false), Some(0), "input {input:?}");
    }
}
