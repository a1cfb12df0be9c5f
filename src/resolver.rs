use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use log::debug;

use crate::error::ResolveError;
use crate::models::{PlayerSong, Privilege, QualityHint, ResolvedSong, SongKey, StreamInfo};
use crate::queue::playlist::Playlist;

/// Metadata service that turns a song identity into a playable stream
#[async_trait]
pub trait StreamResolver: Send + Sync {
    /// Resolve `key` into its stream. The returned song may carry fresher
    /// metadata than the playlist copy.
    async fn resolve(&self, key: &SongKey, quality: QualityHint) -> Result<ResolvedSong, ResolveError>;
}

#[derive(Debug, Clone)]
struct CatalogEntry {
    song: PlayerSong,
    stream: StreamInfo,
}

/// In-memory resolver over a fixed set of songs, with optional artificial
/// latency and scripted failures.
#[derive(Debug, Default)]
pub struct CatalogResolver {
    entries: RwLock<HashMap<SongKey, CatalogEntry>>,
    latency: Duration,
    /// Remaining network failures per key before it resolves normally
    failures: Mutex<HashMap<SongKey, u32>>,
    calls: AtomicUsize,
}

impl CatalogResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn from_playlist(playlist: &Playlist) -> Self {
        let resolver = Self::new();
        for entry in &playlist.songs {
            resolver.insert(entry.song(), entry.stream());
        }
        resolver
    }

    pub fn insert(&self, song: PlayerSong, stream: StreamInfo) {
        let mut entries = self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.insert(song.key(), CatalogEntry { song, stream });
    }

    /// Make the next `times` resolutions of `key` fail with a network error
    pub fn fail_times(&self, key: &SongKey, times: u32) {
        self.failures().insert(key.clone(), times);
    }

    /// Total number of resolve calls served
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn failures(&self) -> MutexGuard<'_, HashMap<SongKey, u32>> {
        self.failures.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn take_failure(&self, key: &SongKey) -> bool {
        let mut failures = self.failures();
        match failures.get_mut(key) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl StreamResolver for CatalogResolver {
    async fn resolve(&self, key: &SongKey, quality: QualityHint) -> Result<ResolvedSong, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if self.take_failure(key) {
            return Err(ResolveError::Network(format!("request for {} timed out", key)));
        }

        let entry = {
            let entries = self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner());
            entries.get(key).cloned()
        };
        let entry = entry.ok_or_else(|| ResolveError::NotFound { key: key.to_string() })?;

        if entry.song.privilege == Privilege::Deny {
            return Err(ResolveError::Denied { key: key.to_string() });
        }

        debug!("Resolved {} at {} quality", key, quality.as_str());
        let mut stream = entry.stream;
        stream.playable_url = format!("{}?quality={}", stream.playable_url, quality.as_str());

        Ok(ResolvedSong {
            song: entry.song,
            stream,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Provider;

    fn catalog() -> CatalogResolver {
        let resolver = CatalogResolver::new();
        resolver.insert(
            PlayerSong::new("1", Provider::Netease, "One"),
            StreamInfo::new("https://one", Duration::from_secs(3)),
        );
        let mut denied = PlayerSong::new("2", Provider::Netease, "Two");
        denied.privilege = Privilege::Deny;
        resolver.insert(denied, StreamInfo::new("https://two", Duration::from_secs(3)));
        resolver
    }

    #[tokio::test]
    async fn test_resolve_known_song() {
        let resolver = catalog();
        let key = SongKey::new("1", Provider::Netease);

        let resolved = resolver.resolve(&key, QualityHint::Lossless).await.unwrap();

        assert_eq!(resolved.song.name, "One");
        assert_eq!(resolved.stream.playable_url, "https://one?quality=lossless");
        assert_eq!(resolver.call_count(), 1);
    }

    #[tokio::test]
    async fn test_resolve_unknown_and_denied() {
        let resolver = catalog();

        let err = resolver
            .resolve(&SongKey::new("9", Provider::Netease), QualityHint::High)
            .await
            .unwrap_err();
        assert_eq!(err, ResolveError::NotFound { key: "9|netease".to_string() });

        let err = resolver
            .resolve(&SongKey::new("2", Provider::Netease), QualityHint::High)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::Denied { .. }));
    }

    #[tokio::test]
    async fn test_scripted_failures_run_out() {
        let resolver = catalog();
        let key = SongKey::new("1", Provider::Netease);
        resolver.fail_times(&key, 2);

        assert!(resolver.resolve(&key, QualityHint::High).await.is_err());
        assert!(resolver.resolve(&key, QualityHint::High).await.is_err());
        assert!(resolver.resolve(&key, QualityHint::High).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_applied() {
        let resolver = catalog().with_latency(Duration::from_millis(300));
        let started = tokio::time::Instant::now();

        resolver
            .resolve(&SongKey::new("1", Provider::Netease), QualityHint::High)
            .await
            .unwrap();

        assert_eq!(started.elapsed(), Duration::from_millis(300));
    }
}
