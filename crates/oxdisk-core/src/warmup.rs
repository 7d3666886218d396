//! Pre-flight cache priming with a per-target throttle.

use crate::config::WarmupConfig;
use crate::workload::random_buffer;
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, warn};

const WARMUP_SEED: u64 = 0x57A2_3D0F;

/// What a warmup call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarmupOutcome {
    /// Wrote, read back and deleted the warmup file.
    Performed,
    /// Same target was warmed within the throttle window.
    Throttled,
    /// The warmup file could not be created or written.
    Aborted,
    Disabled,
}

/// The most recent warmup attempt.
#[derive(Debug)]
struct LastWarmup {
    path: PathBuf,
    at: Instant,
    performed: bool,
}

/// Writes a buffer of pseudo-random bytes to the target, reads it back and
/// deletes it, so the first measured pass does not pay for cold caches.
pub struct Warmup {
    config: WarmupConfig,
    last: Mutex<Option<LastWarmup>>,
}

impl Warmup {
    pub fn new(config: WarmupConfig) -> Self {
        Self {
            config,
            last: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &WarmupConfig {
        &self.config
    }

    /// Warm `target` unless the immediately preceding attempt warmed the
    /// same target within the throttle window.
    ///
    /// Never fails: problems are logged and reported as [`WarmupOutcome::Aborted`].
    pub fn run(&self, target: &Path) -> WarmupOutcome {
        if !self.config.enabled {
            return WarmupOutcome::Disabled;
        }

        let mut last = self.last.lock();
        if let Some(prev) = last.as_ref()
            && prev.performed
            && prev.path == target
            && prev.at.elapsed() < self.config.throttle
        {
            debug!(path = %target.display(), "Warmup throttled");
            return WarmupOutcome::Throttled;
        }

        let outcome = self.cycle(target);
        *last = Some(LastWarmup {
            path: target.to_path_buf(),
            at: Instant::now(),
            performed: outcome == WarmupOutcome::Performed,
        });
        outcome
    }

    fn cycle(&self, target: &Path) -> WarmupOutcome {
        let Ok(buffer) = random_buffer(self.config.size_bytes, WARMUP_SEED) else {
            debug!(bytes = self.config.size_bytes, "Warmup buffer allocation failed");
            return WarmupOutcome::Aborted;
        };
        let path = target.join(format!(".oxdisk_warmup_{}", std::process::id()));

        let Ok(mut file) = File::create(&path) else {
            debug!(path = %path.display(), "Cannot open warmup file, skipping warmup");
            return WarmupOutcome::Aborted;
        };
        if let Err(e) = file.write_all(&buffer).and_then(|()| file.sync_all()) {
            debug!(error = %e, "Warmup write failed");
            drop(file);
            remove_warmup_file(&path);
            return WarmupOutcome::Aborted;
        }
        drop(file);

        let mut readback = Vec::new();
        let read = File::open(&path).and_then(|mut f| f.read_to_end(&mut readback));
        if let Err(e) = read {
            debug!(error = %e, "Warmup read-back failed");
        }

        remove_warmup_file(&path);
        debug!(path = %target.display(), bytes = buffer.len(), "Warmup complete");
        WarmupOutcome::Performed
    }
}

fn remove_warmup_file(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        warn!(path = %path.display(), error = %e, "Failed to delete warmup file");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(throttle: Duration) -> WarmupConfig {
        WarmupConfig {
            enabled: true,
            size_bytes: 64 * 1024,
            throttle,
        }
    }

    #[test]
    fn test_second_call_within_window_is_throttled() {
        let dir = tempfile::tempdir().unwrap();
        let warmup = Warmup::new(config(Duration::from_secs(60)));

        assert_eq!(warmup.run(dir.path()), WarmupOutcome::Performed);
        assert_eq!(warmup.run(dir.path()), WarmupOutcome::Throttled);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_other_target_is_not_throttled() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let warmup = Warmup::new(config(Duration::from_secs(60)));

        assert_eq!(warmup.run(a.path()), WarmupOutcome::Performed);
        assert_eq!(warmup.run(b.path()), WarmupOutcome::Performed);
        // Only the immediately preceding target counts.
        assert_eq!(warmup.run(a.path()), WarmupOutcome::Performed);
    }

    #[test]
    fn test_aborted_attempt_in_between_resets_throttle() {
        let a = tempfile::tempdir().unwrap();
        let missing = a.path().join("missing");
        let warmup = Warmup::new(config(Duration::from_secs(60)));

        assert_eq!(warmup.run(a.path()), WarmupOutcome::Performed);
        assert_eq!(warmup.run(&missing), WarmupOutcome::Aborted);
        assert_eq!(warmup.run(a.path()), WarmupOutcome::Performed);
        assert_eq!(warmup.run(a.path()), WarmupOutcome::Throttled);
    }

    #[test]
    fn test_expired_window_warms_again() {
        let dir = tempfile::tempdir().unwrap();
        let warmup = Warmup::new(config(Duration::ZERO));

        assert_eq!(warmup.run(dir.path()), WarmupOutcome::Performed);
        assert_eq!(warmup.run(dir.path()), WarmupOutcome::Performed);
    }

    #[test]
    fn test_unwritable_target_aborts_quietly() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        let warmup = Warmup::new(config(Duration::from_secs(60)));

        assert_eq!(warmup.run(&missing), WarmupOutcome::Aborted);
        // An aborted warmup does not arm the throttle.
        assert_eq!(warmup.run(&missing), WarmupOutcome::Aborted);
    }

    #[test]
    fn test_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let warmup = Warmup::new(WarmupConfig {
            enabled: false,
            ..WarmupConfig::default()
        });
        assert_eq!(warmup.run(dir.path()), WarmupOutcome::Disabled);
    }
}
