//! Optional chunk batching, env-gated: buffers text chunks until a
//! size or time threshold is crossed, then emits a single
//! `stream_chunk`. Always flushes residue before `stream_end`.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct BatchingConfig {
    pub enabled: bool,
    pub min_chunk_size: usize,
    pub batch_interval: Duration,
}

impl BatchingConfig {
    pub fn from_env() -> Self {
        let enabled = std::env::var("ENABLE_CHAT_BATCHING").map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);
        let min_chunk_size = std::env::var("CHAT_MIN_CHUNK_SIZE").ok().and_then(|v| v.parse().ok()).unwrap_or(64);
        let interval_ms: u64 = std::env::var("CHAT_BATCH_INTERVAL_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(100);
        Self { enabled, min_chunk_size, batch_interval: Duration::from_millis(interval_ms) }
    }

    pub fn disabled() -> Self {
        Self { enabled: false, min_chunk_size: 0, batch_interval: Duration::ZERO }
    }
}

pub struct ChunkBatcher {
    config: BatchingConfig,
    buffer: String,
    last_flush: Instant,
}

impl ChunkBatcher {
    pub fn new(config: BatchingConfig) -> Self {
        Self { config, buffer: String::new(), last_flush: Instant::now() }
    }

    /// Appends `text`; returns `Some(batch)` when the size or time
    /// threshold is crossed (or batching is disabled, in which case
    /// every push flushes immediately).
    pub fn push(&mut self, text: String) -> Option<String> {
        if !self.config.enabled {
            return Some(text);
        }
        self.buffer.push_str(&text);
        if self.buffer.len() >= self.config.min_chunk_size || self.last_flush.elapsed() >= self.config.batch_interval {
            self.last_flush = Instant::now();
            Some(std::mem::take(&mut self.buffer))
        } else {
            None
        }
    }

    pub fn flush(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            None
        } else {
            self.last_flush = Instant::now();
            Some(std::mem::take(&mut self.buffer))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_batcher_flushes_every_push() {
        let mut batcher = ChunkBatcher::new(BatchingConfig::disabled());
        assert_eq!(batcher.push("hi".to_string()), Some("hi".to_string()));
    }

    #[test]
    fn enabled_batcher_holds_until_size_threshold() {
        let config = BatchingConfig { enabled: true, min_chunk_size: 10, batch_interval: Duration::from_secs(600) };
        let mut batcher = ChunkBatcher::new(config);
        assert_eq!(batcher.push("abc".to_string()), None);
        assert_eq!(batcher.push("defghijk".to_string()), Some("abcdefghijk".to_string()));
    }

    #[test]
    fn flush_drains_residue() {
        let config = BatchingConfig { enabled: true, min_chunk_size: 1000, batch_interval: Duration::from_secs(600) };
        let mut batcher = ChunkBatcher::new(config);
        batcher.push("leftover".to_string());
        assert_eq!(batcher.flush(), Some("leftover".to_string()));
        assert_eq!(batcher.flush(), None);
    }
}
