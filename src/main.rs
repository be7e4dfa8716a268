use std::sync::Arc;
use std::time::Instant;

use chrono::Local;
use clap::Parser;
use log::warn;

use npubgrind::cli::Args;
use npubgrind::lookup::{LookupIndex, Pattern};
use npubgrind::output::RecordSink;
use npubgrind::searcher::{format_num, format_speed, format_time, SearchConfig, Searcher};
use npubgrind::secp::{self, public_key, Scalar, BETA, G, LAMBDA, LAMBDA2};
use npubgrind::{device, encoder, seed};

/// Sanity checks before any key is swept. A broken constant or encoder
/// here would silently miss every match, so failure refuses to start.
fn run_self_test() -> bool {
    let mut ok = true;
    let mut check = |name: &str, pass: bool| {
        if pass {
            println!("  [✓] {name}");
        } else {
            eprintln!("  [✗] {name}");
            ok = false;
        }
    };

    check("beta^3 = 1 mod p", BETA.mul(&BETA).mul(&BETA) == secp::FieldElement::ONE);
    check("lambda^3 = 1 mod n", LAMBDA.mul(&LAMBDA2) == Scalar::ONE);
    check(
        "lambda*G = (beta*G.x, G.y)",
        public_key(&LAMBDA) == G.endomorphism1(),
    );

    let g = public_key(&Scalar::ONE);
    check(
        "npub encoding of G",
        encoder::npub(&g.x.to_bytes())
            == "npub10xlxvlhemja6c4dqv22uapctqupfhlxm9h8z3k2e72q4k9hcz7vqpkge6d",
    );

    let mut one = [0u8; 32];
    one[31] = 1;
    check(
        "WIF encoding",
        encoder::wif(&one, true) == "KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn",
    );
    check(
        "seed derivation",
        seed::derive_start_key("test-seed").map(|k| hex::encode(k.to_bytes())).ok().as_deref()
            == Some("81fd917d86fbc2b569a255b1c2904aa2800ba5e4d5b36f4fecb1d5a3ba9ae4bf"),
    );

    ok
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    println!("npubgrind v{}", env!("CARGO_PKG_VERSION"));
    println!("[•] Self-test");
    if !run_self_test() {
        eprintln!("[✗] Self-test failed; refusing to search with broken math");
        std::process::exit(1);
    }

    // Any invalid pattern rejects startup.
    let parsed: npubgrind::Result<Vec<Pattern>> =
        args.patterns.iter().map(|p| Pattern::parse(p)).collect();
    let patterns = match parsed {
        Ok(p) => p,
        Err(e) => {
            eprintln!("[✗] {e}");
            std::process::exit(1);
        }
    };

    let start_pub = match &args.start_pub {
        None => None,
        Some(hex_key) => {
            let parsed = hex::decode(hex_key)
                .ok()
                .and_then(|bytes| secp::parse_public_key(&bytes));
            match parsed {
                Some(p) => Some(p),
                None => {
                    eprintln!("[✗] --start-pub is not a valid SEC1 public key");
                    std::process::exit(1);
                }
            }
        }
    };

    if args.gpu {
        if let Err(e) = device::probe() {
            warn!("{e}; continuing with CPU workers only");
            eprintln!("[!] {e}; continuing with CPU workers only");
        }
    }

    let index = match LookupIndex::build(patterns) {
        Ok(idx) => Arc::new(idx),
        Err(e) => {
            eprintln!("[✗] {e}");
            std::process::exit(1);
        }
    };

    let seed_string = args.seed.clone().unwrap_or_else(seed::random_seed);
    let sink = match &args.output {
        Some(path) => RecordSink::file(path.clone(), start_pub.is_some()),
        None => RecordSink::stdout(start_pub.is_some()),
    };

    let config = SearchConfig {
        threads: args.threads.unwrap_or(0),
        mode: args.mode.into(),
        stop_on_find: args.stop_on_find,
        rekey: args.rekey,
        max_found: args.max_found,
        quiet: false,
    };

    let searcher = match Searcher::new(config, Arc::clone(&index), &seed_string, start_pub, sink) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            eprintln!("[✗] {e}");
            std::process::exit(1);
        }
    };

    // Banner, in the spirit of the classic vanity searchers.
    if index.entries().len() == 1 {
        let pattern = index.pattern(0);
        if let Some(d) = pattern.difficulty() {
            println!("Difficulty: {d:.0}");
        }
        println!("Search: {}", pattern.raw());
    } else {
        println!("Search: {} patterns", index.entries().len());
    }
    println!("Start {}", Local::now().format("%a %b %e %T %Y"));
    if args.rekey > 0 {
        println!("Base Key: randomly changed every {} Mkeys", args.rekey);
    } else {
        println!("Base Key: {}", hex::encode(searcher.start_key().to_bytes()));
    }
    println!("Number of CPU threads: {}", searcher.threads());

    let stop = searcher.stop_flag();
    if let Err(e) = ctrlc::set_handler(move || {
        println!("\n[!] Stopping at the next group boundary...");
        stop.store(true, std::sync::atomic::Ordering::SeqCst);
    }) {
        warn!("cannot install Ctrl-C handler: {e}");
    }

    let (hits_tx, hits_rx) = crossbeam_channel::unbounded();
    let start = Instant::now();
    if let Err(e) = searcher.run(hits_tx) {
        eprintln!("[✗] {e}");
        std::process::exit(1);
    }

    let elapsed = start.elapsed().as_secs_f64();
    let total = searcher.total_keys();
    let found = hits_rx.try_iter().count();
    println!(
        "\n[Done] {} keys in {} @ {} | {} verified hit{}",
        format_num(total),
        format_time(elapsed),
        format_speed(total as f64 / elapsed.max(f64::EPSILON)),
        found,
        if found == 1 { "" } else { "s" }
    );
}
