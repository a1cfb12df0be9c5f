use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};
use log::trace;

use crate::error::ResolveError;
use crate::models::{PlayerSong, QualityHint, ResolvedSong, SongKey};
use crate::resolver::StreamResolver;

type ResolveOutput = Result<ResolvedSong, ResolveError>;
type ResolveInner = BoxFuture<'static, ResolveOutput>;

/// Handle on an in-flight stream resolution. Clones share one request.
pub type SharedResolve = Shared<ResolveInner>;

#[derive(Default)]
struct InFlight {
    next_generation: u64,
    entries: HashMap<SongKey, (u64, WeakShared<ResolveInner>)>,
}

/// Resolves upcoming songs, sharing each in-flight request between every
/// subscriber that asks for the same song.
///
/// The cache only holds weak handles: when the last subscriber drops its
/// handle the request is cancelled, and the next ask starts a fresh one.
pub struct PreloadPipeline {
    resolver: Arc<dyn StreamResolver>,
    quality: QualityHint,
    in_flight: Arc<Mutex<InFlight>>,
}

impl PreloadPipeline {
    pub fn new(resolver: Arc<dyn StreamResolver>, quality: QualityHint) -> Self {
        Self {
            resolver,
            quality,
            in_flight: Arc::new(Mutex::new(InFlight::default())),
        }
    }

    pub fn set_quality(&mut self, quality: QualityHint) {
        self.quality = quality;
    }

    pub fn resolve(&self, song: &PlayerSong) -> SharedResolve {
        let key = song.key();
        let mut in_flight = lock(&self.in_flight);

        if let Some(shared) = in_flight.entries.get(&key).and_then(|(_, weak)| weak.upgrade()) {
            trace!("Joining in-flight resolution for {}", key);
            return shared;
        }

        in_flight.next_generation += 1;
        let generation = in_flight.next_generation;
        let resolver = Arc::clone(&self.resolver);
        let cache = Arc::clone(&self.in_flight);
        let quality = self.quality;
        let request_key = key.clone();

        let shared = async move {
            let result = resolver.resolve(&request_key, quality).await;
            let mut in_flight = lock(&cache);
            if matches!(in_flight.entries.get(&request_key), Some((g, _)) if *g == generation) {
                in_flight.entries.remove(&request_key);
            }
            result
        }
        .boxed()
        .shared();

        if let Some(weak) = shared.downgrade() {
            in_flight.entries.insert(key, (generation, weak));
        }
        shared
    }

    /// Forget the cached request for `key`. Existing subscribers keep it.
    pub fn cancel(&self, key: &SongKey) {
        lock(&self.in_flight).entries.remove(key);
    }

    /// Number of requests that still have a live subscriber
    pub fn in_flight_len(&self) -> usize {
        lock(&self.in_flight)
            .entries
            .values()
            .filter(|(_, weak)| weak.upgrade().is_some())
            .count()
    }
}

fn lock(in_flight: &Mutex<InFlight>) -> MutexGuard<'_, InFlight> {
    in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Provider, StreamInfo};
    use crate::resolver::CatalogResolver;
    use std::time::Duration;
    use tokio_test::{assert_pending, assert_ready, task};

    fn song(id: &str) -> PlayerSong {
        PlayerSong::new(id, Provider::Netease, format!("Song {}", id))
    }

    fn pipeline(latency: Duration) -> (PreloadPipeline, Arc<CatalogResolver>) {
        let resolver = Arc::new(CatalogResolver::new().with_latency(latency));
        for id in ["a", "b"] {
            resolver.insert(song(id), StreamInfo::new(format!("https://{}", id), Duration::from_secs(60)));
        }
        let pipeline = PreloadPipeline::new(resolver.clone(), QualityHint::High);
        (pipeline, resolver)
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_requests_share_one_resolution() {
        let (pipeline, resolver) = pipeline(Duration::from_millis(100));

        let first = pipeline.resolve(&song("a"));
        let second = pipeline.resolve(&song("a"));
        assert_eq!(pipeline.in_flight_len(), 1);

        let (a, b) = tokio::join!(first, second);

        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(resolver.call_count(), 1);
        assert_eq!(pipeline.in_flight_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_resolution_is_not_reused() {
        let (pipeline, resolver) = pipeline(Duration::ZERO);

        pipeline.resolve(&song("a")).await.unwrap();
        pipeline.resolve(&song("a")).await.unwrap();

        assert_eq!(resolver.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_all_subscribers_cancels() {
        let (pipeline, resolver) = pipeline(Duration::from_secs(1));

        let mut pending = task::spawn(pipeline.resolve(&song("b")));
        assert_pending!(pending.poll());
        assert_eq!(resolver.call_count(), 1);
        drop(pending);

        assert_eq!(pipeline.in_flight_len(), 0);

        let mut fresh = task::spawn(pipeline.resolve(&song("b")));
        assert_pending!(fresh.poll());
        assert_eq!(resolver.call_count(), 2);

        tokio::time::advance(Duration::from_secs(1)).await;
        let resolved = assert_ready!(fresh.poll());
        assert_eq!(resolved.unwrap().song.name, "Song b");
    }

    #[tokio::test]
    async fn test_failure_reaches_every_subscriber() {
        let (pipeline, _resolver) = pipeline(Duration::ZERO);
        let unknown = song("zzz");

        let first = pipeline.resolve(&unknown);
        let second = pipeline.resolve(&unknown);

        assert!(matches!(first.await, Err(ResolveError::NotFound { .. })));
        assert!(matches!(second.await, Err(ResolveError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_cancel_forgets_entry() {
        let (pipeline, _resolver) = pipeline(Duration::from_secs(5));
        let _handle = pipeline.resolve(&song("a"));
        assert_eq!(pipeline.in_flight_len(), 1);

        pipeline.cancel(&song("a").key());

        assert_eq!(pipeline.in_flight_len(), 0);
    }
}
