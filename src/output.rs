//! The verified-hit record sink.
//!
//! Workers serialize on a mutex around this sink; it is the only shared
//! write path in the engine. Records go to a file in append mode when one
//! was requested, otherwise stdout. A failing file write warns once and
//! permanently falls back to stdout so hits are never lost.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use log::warn;

use crate::verify::VerifiedHit;

enum Target {
    Stdout,
    File(PathBuf),
}

pub struct RecordSink {
    target: Target,
    /// Report the private key as partial (search ran with a start_pub
    /// offset, so the full key is caller-key + reported-key).
    partial: bool,
}

impl RecordSink {
    pub fn stdout(partial: bool) -> Self {
        Self {
            target: Target::Stdout,
            partial,
        }
    }

    pub fn file(path: PathBuf, partial: bool) -> Self {
        Self {
            target: Target::File(path),
            partial,
        }
    }

    fn format(&self, hit: &VerifiedHit) -> String {
        if self.partial {
            format!("PubAddress: {}\nPartialPriv: {}\n", hit.address, hit.wif)
        } else {
            format!(
                "PubAddress: {}\nPriv (WIF): {}\nPriv (HEX): 0x{}\n",
                hit.address, hit.wif, hit.hex
            )
        }
    }

    pub fn write(&mut self, hit: &VerifiedHit) {
        let record = self.format(hit);
        if let Target::File(path) = &self.target {
            let result = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .and_then(|mut f| f.write_all(record.as_bytes()));
            match result {
                Ok(()) => return,
                Err(e) => {
                    warn!("cannot write {}: {e}; falling back to stdout", path.display());
                    self.target = Target::Stdout;
                }
            }
        }
        print!("\n{record}");
        let _ = std::io::stdout().flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit() -> VerifiedHit {
        VerifiedHit {
            thread_id: 0,
            pattern: 0,
            address: "npub1qtest".into(),
            wif: "Kwif".into(),
            hex: "ab".repeat(32),
        }
    }

    #[test]
    fn record_format() {
        let sink = RecordSink::stdout(false);
        let text = sink.format(&hit());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "PubAddress: npub1qtest");
        assert!(lines[1].starts_with("Priv (WIF): "));
        assert!(lines[2].starts_with("Priv (HEX): 0x"));
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn partial_record_omits_private_lines() {
        let sink = RecordSink::stdout(true);
        let text = sink.format(&hit());
        assert!(text.contains("PartialPriv: "));
        assert!(!text.contains("Priv (HEX)"));
    }

    #[test]
    fn file_sink_appends_records() {
        let path = std::env::temp_dir().join(format!("npubgrind-sink-{}", std::process::id()));
        let _ = std::fs::remove_file(&path);
        let mut sink = RecordSink::file(path.clone(), false);
        sink.write(&hit());
        sink.write(&hit());
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("PubAddress: ").count(), 2);
        // records are not separated by blank lines
        assert!(!content.contains("\n\n"));
        let _ = std::fs::remove_file(&path);
    }
}
