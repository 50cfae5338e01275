//! Stateful Logger (component A).
//!
//! Wraps `tracing` emission with change-only dedupe: the same `(key, value)`
//! pair logged twice in a row is suppressed after the first emission, so a
//! noisy poll loop produces one line instead of thousands. An optional
//! rotating file sink mirrors the console output.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::Utc;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Critical,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LoggerStats {
    pub emitted: u64,
    pub suppressed: u64,
    pub below_threshold: u64,
}

struct CacheEntry {
    hash: u64,
    count: u64,
}

/// Rotating file sink. Rotation is atomic: a new file is opened and the
/// handle swapped before the old one is dropped/closed.
struct FileSink {
    dir: PathBuf,
    prefix: String,
    max_bytes: u64,
    max_files: usize,
    current: Option<std::fs::File>,
    current_path: Option<PathBuf>,
    written: u64,
    /// Set once a write fails; the sink then silently no-ops forever
    /// (console output is unaffected).
    degraded: bool,
}

impl FileSink {
    fn new(dir: PathBuf, prefix: String, max_bytes: u64, max_files: usize) -> Self {
        Self {
            dir,
            prefix,
            max_bytes,
            max_files,
            current: None,
            current_path: None,
            written: 0,
            degraded: false,
        }
    }

    fn ensure_open(&mut self) -> std::io::Result<()> {
        if self.current.is_some() {
            return Ok(());
        }
        std::fs::create_dir_all(&self.dir)?;
        let name = format!(
            "{}-{}.log",
            self.prefix,
            Utc::now().format("%Y%m%dT%H%M%S%3fZ")
        );
        let path = self.dir.join(name);
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        self.current = Some(file);
        self.current_path = Some(path);
        self.written = 0;
        self.prune_old_files();
        Ok(())
    }

    fn prune_old_files(&self) {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return;
        };
        let mut files: Vec<_> = entries
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.file_name()
                    .to_string_lossy()
                    .starts_with(&format!("{}-", self.prefix))
            })
            .collect();
        if files.len() <= self.max_files {
            return;
        }
        files.sort_by_key(|e| e.file_name());
        let excess = files.len() - self.max_files;
        for entry in files.into_iter().take(excess) {
            let _ = std::fs::remove_file(entry.path());
        }
    }

    fn write_line(&mut self, line: &str) {
        if self.degraded {
            return;
        }
        let result = (|| -> std::io::Result<()> {
            self.ensure_open()?;
            if self.written >= self.max_bytes {
                // Rotate: open the next file before dropping the old handle.
                self.current = None;
                self.ensure_open()?;
            }
            let file = self.current.as_mut().expect("just ensured open");
            writeln!(file, "{line}")?;
            self.written += line.len() as u64 + 1;
            Ok(())
        })();
        if result.is_err() {
            self.degraded = true;
        }
    }
}

/// Dedupe-by-hash logger. Cheap to clone: construct once per process and
/// share via `Arc`.
pub struct StatefulLogger {
    min_level: LogLevel,
    cache: Mutex<HashMap<String, CacheEntry>>,
    file_sink: Option<Mutex<FileSink>>,
    emitted: AtomicU64,
    suppressed: AtomicU64,
    below_threshold: AtomicU64,
}

impl StatefulLogger {
    pub fn new(min_level: LogLevel) -> Self {
        Self {
            min_level,
            cache: Mutex::new(HashMap::new()),
            file_sink: None,
            emitted: AtomicU64::new(0),
            suppressed: AtomicU64::new(0),
            below_threshold: AtomicU64::new(0),
        }
    }

    /// Attach a rotating file sink. `max_bytes` default 10 MiB, `max_files`
    /// default 30.
    pub fn with_file_sink(mut self, dir: PathBuf, max_bytes: u64, max_files: usize) -> Self {
        self.file_sink = Some(Mutex::new(FileSink::new(
            dir,
            "regime-engine".to_string(),
            max_bytes,
            max_files,
        )));
        self
    }

    fn stable_hash(key: &str, value: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        value.hash(&mut hasher);
        hasher.finish()
    }

    /// Returns `true` iff the entry was actually emitted.
    pub fn log<T: Serialize>(&self, key: &str, value: &T, level: LogLevel) -> bool {
        self.log_inner(key, value, level, false)
    }

    /// Bypasses dedupe suppression for exactly this call.
    pub fn force<T: Serialize>(&self, key: &str, value: &T, level: LogLevel) -> bool {
        self.log_inner(key, value, level, true)
    }

    fn log_inner<T: Serialize>(&self, key: &str, value: &T, level: LogLevel, forced: bool) -> bool {
        let serialized = serde_json::to_string(value).unwrap_or_else(|_| "null".to_string());
        let hash = Self::stable_hash(key, &serialized);

        let mut emit = forced;
        {
            let mut cache = self.cache.lock().expect("logger cache poisoned");
            match cache.get_mut(key) {
                Some(entry) if entry.hash == hash => {
                    entry.count += 1;
                    if !forced {
                        self.suppressed.fetch_add(1, Ordering::Relaxed);
                        return false;
                    }
                }
                Some(entry) => {
                    entry.hash = hash;
                    entry.count = 1;
                    emit = true;
                }
                None => {
                    cache.insert(key.to_string(), CacheEntry { hash, count: 1 });
                    emit = true;
                }
            }
        }

        if !emit {
            return false;
        }

        if level < self.min_level {
            self.below_threshold.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        self.emit(key, &serialized, level);
        self.emitted.fetch_add(1, Ordering::Relaxed);
        true
    }

    fn emit(&self, key: &str, serialized: &str, level: LogLevel) {
        match level {
            LogLevel::Debug => tracing::debug!(key, value = serialized, "log"),
            LogLevel::Info => tracing::info!(key, value = serialized, "log"),
            LogLevel::Warn => tracing::warn!(key, value = serialized, "log"),
            LogLevel::Error => tracing::error!(key, value = serialized, "log"),
            LogLevel::Critical => tracing::error!(key, value = serialized, critical = true, "log"),
        }
        if let Some(sink) = &self.file_sink {
            let line = format!(
                "{} {:?} {key} {serialized}",
                Utc::now().to_rfc3339(),
                level
            );
            sink.lock().expect("file sink poisoned").write_line(&line);
        }
    }

    pub fn debug<T: Serialize>(&self, key: &str, value: &T) -> bool {
        self.log(key, value, LogLevel::Debug)
    }
    pub fn info<T: Serialize>(&self, key: &str, value: &T) -> bool {
        self.log(key, value, LogLevel::Info)
    }
    pub fn warn<T: Serialize>(&self, key: &str, value: &T) -> bool {
        self.log(key, value, LogLevel::Warn)
    }
    pub fn error<T: Serialize>(&self, key: &str, value: &T) -> bool {
        self.log(key, value, LogLevel::Error)
    }
    pub fn critical<T: Serialize>(&self, key: &str, value: &T) -> bool {
        self.log(key, value, LogLevel::Critical)
    }

    pub fn clear_state_cache(&self) {
        self.cache.lock().expect("logger cache poisoned").clear();
    }

    /// Snapshot of `key -> emission count` for every key seen so far.
    pub fn get_state_cache(&self) -> HashMap<String, u64> {
        self.cache
            .lock()
            .expect("logger cache poisoned")
            .iter()
            .map(|(k, v)| (k.clone(), v.count))
            .collect()
    }

    pub fn get_stats(&self) -> LoggerStats {
        LoggerStats {
            emitted: self.emitted.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            below_threshold: self.below_threshold.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_identical_value_is_suppressed() {
        let logger = StatefulLogger::new(LogLevel::Debug);
        assert!(logger.log("k", &"v", LogLevel::Info));
        assert!(!logger.log("k", &"v", LogLevel::Info));
        assert_eq!(logger.get_stats().suppressed, 1);
    }

    #[test]
    fn changed_value_emits_again() {
        let logger = StatefulLogger::new(LogLevel::Debug);
        assert!(logger.log("k", &"v1", LogLevel::Info));
        assert!(logger.log("k", &"v2", LogLevel::Info));
    }

    #[test]
    fn force_bypasses_suppression() {
        let logger = StatefulLogger::new(LogLevel::Debug);
        assert!(logger.log("k", &"v", LogLevel::Info));
        assert!(logger.force("k", &"v", LogLevel::Info));
    }

    #[test]
    fn below_threshold_is_dropped_but_cache_still_updates() {
        let logger = StatefulLogger::new(LogLevel::Error);
        assert!(!logger.log("k", &"v", LogLevel::Info));
        assert_eq!(logger.get_stats().below_threshold, 1);
        // Cache recorded the key even though nothing was emitted.
        assert_eq!(logger.get_state_cache().get("k"), Some(&1));
    }

    #[test]
    fn stable_hash_is_deterministic() {
        assert_eq!(
            StatefulLogger::stable_hash("k", "v"),
            StatefulLogger::stable_hash("k", "v")
        );
        assert_ne!(
            StatefulLogger::stable_hash("k", "v1"),
            StatefulLogger::stable_hash("k", "v2")
        );
    }
}
