use std::path::{Path, PathBuf};

use crossbeam_channel::Sender;
use glob::Pattern;
use tracing::{debug, warn};
use walkdir::WalkDir;

use shardsearch_core::config::WalkErrorPolicy;

use crate::cancel::{CancellationToken, Interrupted};
use crate::error::{Error, Result};

/// Compiles a file-name glob such as `*.jsonl`.
pub fn compile_pattern(pattern: &str) -> Result<Pattern> {
    Pattern::new(pattern).map_err(|e| Error::InvalidPattern { pattern: pattern.to_string(), message: e.to_string() })
}

/// Fails when `root` cannot be listed (or, for a file, opened).
pub fn check_root(root: &Path) -> Result<()> {
    let readable = if root.is_file() { std::fs::File::open(root).map(drop) } else { std::fs::read_dir(root).map(drop) };
    readable.map_err(|source| Error::RootUnreadable { path: root.to_path_buf(), source })
}

/// Walks `root` in file-name order and sends every regular file whose name
/// matches `pattern`. Returns the number of files sent.
///
/// Stops early, without error, when the receivers are gone.
pub fn discover(
    root: &Path,
    pattern: &Pattern,
    policy: WalkErrorPolicy,
    tx: &Sender<PathBuf>,
    cancel: &CancellationToken,
) -> Result<usize> {
    check_root(root)?;
    let mut sent = 0usize;
    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        if cancel.is_cancelled() { return Err(Error::Cancelled); }
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if policy == WalkErrorPolicy::Skip => {
                warn!(error = %e, "skipping unreadable entry");
                continue;
            }
            Err(e) => return Err(Error::Discovery(e.to_string())),
        };
        if !entry.file_type().is_file() { continue; }
        if !pattern.matches(&entry.file_name().to_string_lossy()) { continue; }
        match cancel.send(tx, entry.into_path()) {
            Ok(()) => sent += 1,
            Err(Interrupted::Cancelled) => return Err(Error::Cancelled),
            Err(Interrupted::Disconnected) => break,
        }
    }
    debug!(root = %root.display(), files = sent, "discovery finished");
    Ok(sent)
}
