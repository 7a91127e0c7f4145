//! Backing-file naming.
//!
//! Arena files are named after the current UNIX time in milliseconds,
//! written in lower hex (`18c5a9f0b21`). When that name is taken the
//! candidate is bumped until a free one turns up.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Resolve the directory backing files are created in.
///
/// Tries to create `preferred`; falls back to the current directory when it
/// cannot be created.
pub fn resolve_dir(preferred: &Path) -> PathBuf {
    match std::fs::create_dir_all(preferred) {
        Ok(()) => preferred.to_path_buf(),
        Err(e) => {
            let fallback = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            tracing::warn!(
                dir = %preferred.display(),
                fallback = %fallback.display(),
                error = %e,
                "Arena directory unavailable, using current directory"
            );
            fallback
        }
    }
}

/// Pick an unused backing-file path inside `dir`.
pub fn unique_path(dir: &Path) -> PathBuf {
    let mut candidate = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default();

    loop {
        let path = dir.join(format!("{:x}", candidate));
        if !path.exists() {
            return path;
        }
        candidate = candidate.wrapping_add(1);
    }
}
