//! Builds the root window from `hnsd` log output.
//!
//! Relevant lines look like
//!
//! ```text
//! chain (136260): tree_root 0f3c...9a timestamp 1667396404
//! chain (136261):  rejected: bad-diffbits
//! ```
//!
//! A tree-root line is held back until the next one arrives, because the
//! block it announces may still be rejected.

use std::io::BufRead;

use tracing::{debug, trace, warn};

use super::{RootEntry, TrustedRootWindow};

#[derive(Debug, Clone, PartialEq, Eq)]
enum ChainLine {
    TreeRoot {
        height: u32,
        tree_root: String,
        timestamp: u64,
    },
    Rejected {
        height: u32,
    },
}

/// Returns the height and the text after `chain (<height>):`
fn split_chain_prefix(line: &str) -> Option<(u32, &str)> {
    let start = line.find("chain (")? + "chain (".len();
    let rest = &line[start..];
    let close = rest.find(')')?;
    let height = rest[..close].parse().ok()?;
    let tail = rest[close + 1..].strip_prefix(':')?;
    Some((height, tail))
}

fn parse_line(line: &str) -> Option<ChainLine> {
    let (height, tail) = split_chain_prefix(line)?;

    if tail.starts_with(' ') && tail.trim_start().starts_with("rejected:") {
        return Some(ChainLine::Rejected { height });
    }

    let mut fields = tail.strip_prefix(' ')?.split_whitespace();
    if fields.next()? != "tree_root" {
        return None;
    }
    let tree_root = fields.next()?;
    if !tree_root.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    if fields.next()? != "timestamp" {
        return None;
    }
    let timestamp = fields.next()?.parse().ok()?;

    Some(ChainLine::TreeRoot {
        height,
        tree_root: tree_root.to_string(),
        timestamp,
    })
}

/// Feeds `hnsd` output lines into a [`TrustedRootWindow`]
#[derive(Debug, Clone)]
pub struct HnsdIngester {
    window: TrustedRootWindow,
    pending: Option<RootEntry>,
}

impl HnsdIngester {
    /// Continue from an existing window, e.g. the one on disk
    pub fn new(window: TrustedRootWindow) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    /// Process one line. Returns the entry committed by it, if any.
    pub fn ingest_line(&mut self, line: &str) -> Option<RootEntry> {
        match parse_line(line)? {
            ChainLine::Rejected { height } => {
                if let Some(pending) = self.pending.take() {
                    debug!(
                        "Block {} rejected, discarding pending root from height {}",
                        height, pending.height
                    );
                }
                None
            }
            ChainLine::TreeRoot {
                height,
                tree_root,
                timestamp,
            } => {
                let entry = match RootEntry::new(height, timestamp, &tree_root) {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!("Skipping block {}: {}", height, e);
                        return None;
                    }
                };
                trace!("Pending tree root {} at height {}", entry.tree_root, height);
                let committed = self.pending.replace(entry)?;
                self.commit(committed)
            }
        }
    }

    fn commit(&mut self, entry: RootEntry) -> Option<RootEntry> {
        if self.window.push(entry.clone()) {
            Some(entry)
        } else {
            None
        }
    }

    /// Read lines until EOF. Unreadable lines are skipped.
    pub fn ingest_reader<R: BufRead>(&mut self, reader: R) -> usize {
        let mut committed = 0;
        for line in reader.lines() {
            match line {
                Ok(line) => committed += self.ingest_line(&line).is_some() as usize,
                Err(e) => warn!("Skipping unreadable hnsd output: {}", e),
            }
        }
        committed
    }

    /// Commit the pending entry, e.g. once the output has ended.
    pub fn flush(&mut self) -> Option<RootEntry> {
        let pending = self.pending.take()?;
        self.commit(pending)
    }

    /// Commit the pending entry and return the window.
    pub fn finish(mut self) -> TrustedRootWindow {
        self.flush();
        self.window
    }

    pub fn window(&self) -> &TrustedRootWindow {
        &self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root(n: u8) -> String {
        hex::encode([n; 32])
    }

    #[test]
    fn test_parse_lines() {
        let line = format!("chain (136260): tree_root {} timestamp 1667396404", root(1));
        assert_eq!(
            parse_line(&line),
            Some(ChainLine::TreeRoot {
                height: 136260,
                tree_root: root(1),
                timestamp: 1667396404,
            })
        );
        assert_eq!(
            parse_line("chain (136261):  rejected: bad-diffbits"),
            Some(ChainLine::Rejected { height: 136261 })
        );
        assert_eq!(parse_line("pool: connected to peer"), None);
        assert_eq!(parse_line("chain (x): tree_root aa timestamp 1"), None);
        assert_eq!(parse_line("chain (1): tree_root zz timestamp 1"), None);
    }

    #[test]
    fn test_pending_entry_committed_by_next_line() {
        let mut ingester = HnsdIngester::new(TrustedRootWindow::default());
        let first = format!("chain (1): tree_root {} timestamp 10", root(1));
        let second = format!("chain (2): tree_root {} timestamp 20", root(2));

        assert_eq!(ingester.ingest_line(&first), None);
        assert_eq!(ingester.ingest_line(&second).map(|e| e.height), Some(1));
        assert_eq!(ingester.window().len(), 1);
        assert_eq!(ingester.finish().len(), 2);
    }

    #[test]
    fn test_flush_counts_trailing_root() {
        let output = format!(
            "chain (1): tree_root {} timestamp 10\n\
             chain (2): tree_root {} timestamp 20\n",
            root(1),
            root(2)
        );
        let mut ingester = HnsdIngester::new(TrustedRootWindow::default());
        let committed = ingester.ingest_reader(output.as_bytes());
        assert_eq!(committed, 1);

        assert_eq!(ingester.flush().map(|e| e.height), Some(2));
        assert_eq!(ingester.flush(), None);
        assert_eq!(ingester.window().len(), 2);
    }

    #[test]
    fn test_rejected_block_discarded() {
        let output = format!(
            "chain (1): tree_root {}  timestamp 10\n\
             chain (2): tree_root {} timestamp 20\n\
             chain (2):  rejected: bad-prevblk\n\
             chain (2): tree_root {} timestamp 21\n",
            root(1),
            root(2),
            root(3)
        );
        let mut ingester = HnsdIngester::new(TrustedRootWindow::default());
        ingester.ingest_reader(output.as_bytes());
        let window = ingester.finish();

        let heights: Vec<(u32, u64)> = window.iter().map(|e| (e.height, e.timestamp)).collect();
        assert_eq!(heights, vec![(1, 10), (2, 21)]);
    }
}
