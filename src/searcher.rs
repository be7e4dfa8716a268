//! The search driver: worker threads, scalar cursors, rekeying and stats.
//!
//! Each worker owns a cursor (base scalar + group counter) and loops over
//! groups: one grouped inverse per 1024 points, six tagged candidates per
//! point. Workers poll the stop and rekey flags only at group tops; the
//! only shared mutable state is the output sink mutex, the per-pattern
//! found flags and the per-worker counters.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;

use crate::error::{EngineError, Result};
use crate::group::{GroupEngine, GRP_SIZE, HALF_GRP};
use crate::lookup::{fingerprint, LookupIndex};
use crate::output::RecordSink;
use crate::secp::{public_key, FieldElement, Point, Scalar, BETA, BETA2};
use crate::seed;
use crate::verify::{HitTag, HitVerifier, VerifiedHit};

/// Legacy hash-path compression mode. The npub encoding is X-only, so the
/// mode only selects the WIF flavor of reported keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Compressed,
    Uncompressed,
    Both,
}

impl SearchMode {
    fn compressed(self) -> bool {
        !matches!(self, SearchMode::Uncompressed)
    }
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Worker threads; 0 = all available cores.
    pub threads: usize,
    pub mode: SearchMode,
    pub stop_on_find: bool,
    /// Rekey every `rekey` million keys; 0 disables.
    pub rekey: u64,
    /// Device hit-buffer capacity (accelerator workers only).
    pub max_found: u32,
    /// Suppress the progress line (tests).
    pub quiet: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            mode: SearchMode::Compressed,
            stop_on_find: false,
            rekey: 0,
            max_found: 65536,
            quiet: false,
        }
    }
}

pub struct Searcher {
    config: SearchConfig,
    index: Arc<LookupIndex>,
    start_key: Scalar,
    start_pub: Option<Point>,
    threads: usize,
    stop: Arc<AtomicBool>,
    rekey_requests: Vec<AtomicBool>,
    counters: Vec<AtomicU64>,
    found_count: AtomicU64,
    sink: Mutex<RecordSink>,
}

impl Searcher {
    pub fn new(
        config: SearchConfig,
        index: Arc<LookupIndex>,
        seed: &str,
        start_pub: Option<Point>,
        sink: RecordSink,
    ) -> Result<Self> {
        let start_key = seed::derive_start_key(seed)?;
        let threads = if config.threads == 0 {
            std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4)
        } else {
            config.threads
        };
        Ok(Self {
            config,
            index,
            start_key,
            start_pub,
            threads,
            stop: Arc::new(AtomicBool::new(false)),
            rekey_requests: (0..threads).map(|_| AtomicBool::new(false)).collect(),
            counters: (0..threads).map(|_| AtomicU64::new(0)).collect(),
            found_count: AtomicU64::new(0),
            sink: Mutex::new(sink),
        })
    }

    pub fn start_key(&self) -> &Scalar {
        &self.start_key
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Keys processed so far, summed over workers (relaxed snapshot).
    pub fn total_keys(&self) -> u64 {
        self.counters
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .sum()
    }

    pub fn found(&self) -> u64 {
        self.found_count.load(Ordering::Relaxed)
    }

    /// Run until every pattern is found (with stop_on_find) or `stop` is
    /// raised. Verified hits go to the sink and to `hits_tx`. Blocks.
    pub fn run(&self, hits_tx: Sender<VerifiedHit>) -> Result<()> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads + 1) // workers + stats
            .build()
            .map_err(|e| {
                EngineError::InternalInvariantBroken(format!("thread pool setup failed: {e}"))
            })?;

        pool.scope(|s| {
            for w in 0..self.threads {
                let tx = hits_tx.clone();
                s.spawn(move |_| self.worker(w, &tx));
            }
            s.spawn(|_| self.stats_loop());
        });
        Ok(())
    }

    /// Worker base key: startKey + (w << 64) keeps workers collision-free
    /// for ~2^64 iterations. Under rekeying, every base is random.
    fn initial_key(&self, thread_id: usize) -> Scalar {
        if self.config.rekey > 0 {
            random_base_key()
        } else {
            self.start_key
                .add(&Scalar::new([0, thread_id as u64, 0, 0]))
        }
    }

    /// Center point of the current group: (key + G/2)·G, plus the caller's
    /// public offset when searching partial keys.
    fn center_point(&self, key: &Scalar) -> Point {
        let mut p = public_key(&key.add_u64(HALF_GRP as u64));
        if let Some(sp) = &self.start_pub {
            p = p.add(sp);
        }
        p
    }

    fn worker(&self, thread_id: usize, hits_tx: &Sender<VerifiedHit>) {
        let engine = GroupEngine::new();
        let verifier = HitVerifier::new(&self.index, self.start_pub);

        let mut key = self.initial_key(thread_id);
        let mut start_p = self.center_point(&key);

        let mut pts = vec![Point::INFINITY; GRP_SIZE];
        let mut dx = vec![FieldElement::ZERO; HALF_GRP + 1];
        let mut dx_inv = vec![FieldElement::ZERO; HALF_GRP + 1];

        while !self.stop.load(Ordering::Relaxed) {
            if self.rekey_requests[thread_id].swap(false, Ordering::Relaxed) {
                key = random_base_key();
                start_p = self.center_point(&key);
            }

            let next = match engine.fill_group(&start_p, &mut pts, &mut dx, &mut dx_inv) {
                Ok(next) => next,
                Err(_) => {
                    // ~2^-256 per delta; resynchronize one scalar further
                    key = key.add_u64(1);
                    start_p = self.center_point(&key);
                    continue;
                }
            };

            for (t, point) in pts.iter().enumerate() {
                if self.stop.load(Ordering::Relaxed) {
                    break;
                }
                self.check_candidates(thread_id, &key, t as u32, point, &verifier, hits_tx);
            }

            self.counters[thread_id].fetch_add((6 * GRP_SIZE) as u64, Ordering::Relaxed);
            key = key.add_u64(GRP_SIZE as u64);
            start_p = next;
        }
    }

    /// Six candidates per scalar: {P, βP, β²P} then their Y-negations,
    /// each tagged with (endo, sign) so the exact key is recoverable.
    fn check_candidates(
        &self,
        thread_id: usize,
        base: &Scalar,
        incr: u32,
        point: &Point,
        verifier: &HitVerifier,
        hits_tx: &Sender<VerifiedHit>,
    ) {
        let x0 = point.x.to_bytes();
        let x1 = point.x.mul(&BETA).to_bytes();
        let x2 = point.x.mul(&BETA2).to_bytes();
        let compressed = self.config.mode.compressed();

        for negated in [false, true] {
            for (endo, xb) in [(0u8, &x0), (1u8, &x1), (2u8, &x2)] {
                let Some(pattern_id) = self.index.match_x(xb, self.config.stop_on_find) else {
                    continue;
                };
                let tag = HitTag {
                    incr,
                    endo,
                    negated,
                    compressed,
                    fingerprint: fingerprint(xb),
                };
                if let Some(hit) = verifier.verify(thread_id, base, &tag, pattern_id) {
                    self.deliver(hit, hits_tx);
                }
            }
        }
    }

    fn deliver(&self, hit: VerifiedHit, hits_tx: &Sender<VerifiedHit>) {
        self.index.mark_found(hit.pattern);
        self.found_count.fetch_add(1, Ordering::Relaxed);
        {
            let mut sink = self.sink.lock().expect("sink mutex poisoned");
            sink.write(&hit);
        }
        let _ = hits_tx.send(hit);
        if self.config.stop_on_find && self.index.all_found() {
            self.stop.store(true, Ordering::SeqCst);
        }
    }

    /// Progress line plus rekey scheduling. Runs alongside the workers and
    /// exits when the stop flag is raised.
    fn stats_loop(&self) {
        use std::io::Write;

        let mut last_print = Instant::now();
        let mut last_count = 0u64;
        let mut last_rekey = 0u64;
        let mut rate_filter: Vec<f64> = Vec::with_capacity(8);

        while !self.stop.load(Ordering::Relaxed) {
            std::thread::sleep(Duration::from_millis(250));
            let count = self.total_keys();

            if self.config.rekey > 0 && count - last_rekey > 1_000_000 * self.config.rekey {
                for flag in &self.rekey_requests {
                    flag.store(true, Ordering::Relaxed);
                }
                last_rekey = count;
            }

            if self.config.quiet || last_print.elapsed() < Duration::from_millis(2000) {
                continue;
            }

            let rate = (count - last_count) as f64 / last_print.elapsed().as_secs_f64();
            if rate_filter.len() == 8 {
                rate_filter.remove(0);
            }
            rate_filter.push(rate);
            let avg = rate_filter.iter().sum::<f64>() / rate_filter.len() as f64;

            print!(
                "\r[{}][Total 2^{:.2}]{}[Found {}]  ",
                format_speed(avg),
                (count.max(1) as f64).log2(),
                self.expected_time(avg, count as f64),
                self.found()
            );
            let _ = std::io::stdout().flush();

            last_print = Instant::now();
            last_count = count;
        }
    }

    /// Success probability so far and time to the next probability
    /// milestone, from the minimum open-pattern difficulty.
    fn expected_time(&self, rate: f64, count: f64) -> String {
        let Some(difficulty) = self.index.min_difficulty() else {
            return String::new();
        };
        if rate <= 0.0 {
            return String::new();
        }
        let p = 1.0 / difficulty;
        let cp = 1.0 - (1.0 - p).powf(count);
        let mut out = format!("[Prob {:.1}%]", cp * 100.0);

        let mut desired = 0.5;
        while desired < cp {
            desired += 0.1;
        }
        if desired >= 0.99 {
            desired = 0.99;
        }
        let mut tries = (1.0 - desired).ln() / (1.0 - p).ln();
        if tries.is_infinite() {
            // ln(1-p) underflows for huge difficulties
            tries = (1.0 - desired).ln() / -p;
        }
        let secs = ((tries - count) / rate).max(0.0);
        let days = secs / 86_400.0;
        if days >= 1.0 {
            let years = days / 365.0;
            if years > 1.0 {
                out.push_str(&format!("[{:.0}% in {:.1}y]", desired * 100.0, years));
            } else {
                out.push_str(&format!("[{:.0}% in {:.1}d]", desired * 100.0, days));
            }
        } else {
            let t = secs as u64;
            out.push_str(&format!(
                "[{:.0}% in {:02}:{:02}:{:02}]",
                desired * 100.0,
                t / 3600,
                (t % 3600) / 60,
                t % 60
            ));
        }
        out
    }
}

/// Uniform random base key for rekeying; clearing the top bit keeps
/// key + STEP_SIZE below n without a range check per group.
fn random_base_key() -> Scalar {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes[0] &= 0x7F;
    if bytes.iter().all(|&b| b == 0) {
        bytes[31] = 1;
    }
    Scalar::from_bytes(&bytes)
}

pub fn format_num(n: u64) -> String {
    let s = n.to_string();
    let mut out = String::new();
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

pub fn format_speed(rate: f64) -> String {
    if rate >= 1e9 {
        format!("{:.2} Gkey/s", rate / 1e9)
    } else if rate >= 1e6 {
        format!("{:.2} Mkey/s", rate / 1e6)
    } else if rate >= 1e3 {
        format!("{:.1} Kkey/s", rate / 1e3)
    } else {
        format!("{rate:.0} key/s")
    }
}

pub fn format_time(secs: f64) -> String {
    if secs < 60.0 {
        format!("{secs:.0}s")
    } else if secs < 3600.0 {
        format!("{:.0}m{:.0}s", secs / 60.0, secs % 60.0)
    } else {
        format!("{:.0}h{:.0}m", secs / 3600.0, (secs % 3600.0) / 60.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::Pattern;

    fn searcher(patterns: &[&str], config: SearchConfig) -> Searcher {
        let index = Arc::new(
            LookupIndex::build(patterns.iter().map(|p| Pattern::parse(p).unwrap()).collect())
                .unwrap(),
        );
        Searcher::new(config, index, "test-seed", None, RecordSink::stdout(false)).unwrap()
    }

    #[test]
    fn workers_get_disjoint_base_keys() {
        let s = searcher(
            &["qqqq"],
            SearchConfig {
                threads: 4,
                quiet: true,
                ..Default::default()
            },
        );
        let k0 = s.initial_key(0);
        let k1 = s.initial_key(1);
        assert_eq!(k0, *s.start_key());
        // worker 1 starts 2^64 keys later
        assert_eq!(k1.sub(&k0), Scalar::new([0, 1, 0, 0]));
    }

    #[test]
    fn rekey_bases_are_random() {
        let s = searcher(
            &["qqqq"],
            SearchConfig {
                threads: 1,
                rekey: 1,
                quiet: true,
                ..Default::default()
            },
        );
        assert_ne!(s.initial_key(0), s.initial_key(0));
    }

    #[test]
    fn format_helpers() {
        assert_eq!(format_num(1234567), "1,234,567");
        assert_eq!(format_speed(2_500_000.0), "2.50 Mkey/s");
        assert_eq!(format_time(45.0), "45s");
    }
}
