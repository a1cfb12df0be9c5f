pub mod preload;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::{abortable, AbortHandle, BoxFuture, FutureExt, Shared};
use log::debug;

use crate::channel::{Channel, ChannelFactory, ChannelId};
use crate::error::PreloadError;
use crate::logging::{OperationTimer, PlayerLogger};
use crate::models::{FadeConfig, PlayerSong, QualityHint, SongKey, StreamInfo};
use crate::resolver::StreamResolver;

pub use preload::{PreloadPipeline, SharedResolve};

const SLOW_PRELOAD: Duration = Duration::from_secs(1);

/// A channel with a song's stream loaded into it, ready for lay-in
#[derive(Debug, Clone)]
pub struct LoadedChannel {
    /// Metadata as returned by the resolver
    pub song: PlayerSong,
    pub stream: StreamInfo,
    /// The resolver's metadata differs from the playlist copy
    pub changed: bool,
    pub channel: Arc<dyn Channel>,
}

pub type LoadFuture = Shared<BoxFuture<'static, Result<LoadedChannel, PreloadError>>>;

/// Right to feed a stream into an entry's channel.
///
/// Revoked when the entry is released. The load runs under the lease lock,
/// so once `revoke` returns no superseded load can rebind the channel, even
/// if its task is on another worker.
#[derive(Debug, Clone)]
struct BindingLease(Arc<Mutex<bool>>);

impl BindingLease {
    fn new() -> Self {
        Self(Arc::new(Mutex::new(true)))
    }

    fn revoke(&self) {
        *self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = false;
    }

    fn bind<T>(&self, load: impl FnOnce() -> Result<T, PreloadError>) -> Result<T, PreloadError> {
        let live = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !*live {
            return Err(PreloadError::Cancelled);
        }
        load()
    }
}

/// A song bound to a channel, with the preload feeding it
#[derive(Clone)]
pub struct PoolEntry {
    pub song: PlayerSong,
    pub channel: Arc<dyn Channel>,
    pub load: LoadFuture,
    pub fade: FadeConfig,
    subscription: AbortHandle,
    lease: BindingLease,
}

impl PoolEntry {
    pub fn key(&self) -> SongKey {
        self.song.key()
    }

    /// The preload ended in an error; the entry cannot be played as is
    pub fn is_failed(&self) -> bool {
        matches!(self.load.peek(), Some(Err(_)))
    }
}

/// Bounded set of reusable channels.
///
/// At most one entry exists per song key, and a channel is either bound to
/// an entry or idle on the free list, never both.
pub struct ResourcePool {
    factory: Arc<dyn ChannelFactory>,
    preload: PreloadPipeline,
    entries: HashMap<SongKey, PoolEntry>,
    free: Vec<Arc<dyn Channel>>,
    free_capacity: usize,
    logger: PlayerLogger,
}

impl ResourcePool {
    pub fn new(
        factory: Arc<dyn ChannelFactory>,
        resolver: Arc<dyn StreamResolver>,
        quality: QualityHint,
        free_capacity: usize,
        logger: PlayerLogger,
    ) -> Self {
        Self {
            factory,
            preload: PreloadPipeline::new(resolver, quality),
            entries: HashMap::new(),
            free: Vec::new(),
            free_capacity,
            logger,
        }
    }

    /// Keep exactly `desired` in the pool: release everything else and start
    /// preloading whatever is missing.
    pub fn reconcile(&mut self, desired: &[PlayerSong], fade: FadeConfig) {
        let keep: HashSet<SongKey> = desired.iter().map(PlayerSong::key).collect();
        let stale: Vec<SongKey> = self
            .entries
            .keys()
            .filter(|key| !keep.contains(*key))
            .cloned()
            .collect();

        for key in stale {
            self.release(&key);
        }
        for song in desired {
            self.acquire(song, fade);
        }
    }

    /// Entry for `song`, reusing a usable existing one.
    ///
    /// A playing channel is always usable. A silent one is rebuilt when its
    /// fade snapshot no longer matches or its preload failed.
    pub fn acquire(&mut self, song: &PlayerSong, fade: FadeConfig) -> PoolEntry {
        let key = song.key();
        if let Some(entry) = self.entries.get(&key) {
            let playing = !entry.channel.is_paused();
            if playing || (entry.fade == fade && !entry.is_failed()) {
                return entry.clone();
            }
            debug!(
                "Rebuilding stale entry for {} (fade changed: {}, failed: {})",
                key,
                entry.fade != fade,
                entry.is_failed()
            );
            self.release(&key);
        }
        self.create_entry(song, fade)
    }

    /// Unbind `key`'s channel and return it to the free list. No-op if absent.
    pub fn release(&mut self, key: &SongKey) {
        let Some(entry) = self.entries.remove(key) else {
            return;
        };

        entry.lease.revoke();
        entry.subscription.abort();
        self.preload.cancel(key);
        entry.channel.release();

        let recycled = self.free.len() < self.free_capacity;
        self.logger
            .log_channel_released(entry.channel.id().0, &key.to_string(), recycled);
        if recycled {
            self.free.push(entry.channel);
        }
    }

    fn create_entry(&mut self, song: &PlayerSong, fade: FadeConfig) -> PoolEntry {
        let (channel, reused) = match self.free.pop() {
            Some(channel) => (channel, true),
            None => (self.factory.create(), false),
        };
        let key = song.key();
        self.logger.log_channel_allocated(channel.id().0, reused);
        self.logger.log_preload_started(&key.to_string(), channel.id().0);

        let resolve = self.preload.resolve(song);
        let target = Arc::clone(&channel);
        let original = song.clone();
        let logger = self.logger.clone();
        let lease = BindingLease::new();
        let binding = lease.clone();

        let (work, subscription) = abortable(async move {
            let timer = OperationTimer::new(format!("Preload of {}", key), &logger);
            let resolved = resolve.await?;
            binding.bind(|| Ok(target.load(&key, &resolved.stream, fade)?))?;

            let took = timer.finish_with_threshold(SLOW_PRELOAD);
            logger.log_preload_resolved(&key.to_string(), took);

            Ok::<_, PreloadError>(LoadedChannel {
                changed: resolved.song != original,
                song: resolved.song,
                stream: resolved.stream,
                channel: target,
            })
        });

        let load: LoadFuture = work
            .map(|result| result.unwrap_or(Err(PreloadError::Cancelled)))
            .boxed()
            .shared();

        // Eager subscription: the preload runs whether or not anyone awaits it
        tokio::spawn(load.clone().map(|_| ()));

        let entry = PoolEntry {
            song: song.clone(),
            channel,
            load,
            fade,
            subscription,
            lease,
        };
        self.entries.insert(song.key(), entry.clone());
        entry
    }

    pub fn entry(&self, key: &SongKey) -> Option<&PoolEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &SongKey) -> bool {
        self.entries.contains_key(key)
    }

    /// True iff `key`'s entry holds the channel `id`
    pub fn is_bound(&self, id: ChannelId, key: &SongKey) -> bool {
        self.entries
            .get(key)
            .map(|entry| entry.channel.id() == id)
            .unwrap_or(false)
    }

    pub fn bound_len(&self) -> usize {
        self.entries.len()
    }

    pub fn free_len(&self) -> usize {
        self.free.len()
    }

    pub fn bound_channel_ids(&self) -> Vec<ChannelId> {
        let mut ids: Vec<ChannelId> = self.entries.values().map(|e| e.channel.id()).collect();
        ids.sort();
        ids
    }

    pub fn free_channel_ids(&self) -> Vec<ChannelId> {
        let mut ids: Vec<ChannelId> = self.free.iter().map(|c| c.id()).collect();
        ids.sort();
        ids
    }

    pub fn bound_keys(&self) -> Vec<SongKey> {
        self.entries.keys().cloned().collect()
    }

    pub fn set_free_capacity(&mut self, capacity: usize) {
        self.free_capacity = capacity;
        self.free.truncate(capacity);
    }

    pub fn set_quality(&mut self, quality: QualityHint) {
        self.preload.set_quality(quality);
    }

    /// Release every entry and drop all idle channels
    pub fn shutdown(&mut self) {
        let keys: Vec<SongKey> = self.entries.keys().cloned().collect();
        for key in keys {
            self.release(&key);
        }
        self.free.clear();
        debug!("Resource pool shut down");
    }
}
