use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, trace};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use super::{Channel, ChannelEvent, ChannelFactory, ChannelId, PositionTracker};
use crate::error::ChannelError;
use crate::models::{FadeConfig, SongKey, StreamInfo};

/// Streams whose URL starts with this never decode and report an error on lay-in
pub const FAILING_URL_PREFIX: &str = "fail:";

const EVENT_CAPACITY: usize = 32;
const FAILURE_DELAY: Duration = Duration::from_millis(20);

#[derive(Debug)]
struct ChannelState {
    key: Option<SongKey>,
    stream: Option<StreamInfo>,
    fade: FadeConfig,
    tracker: PositionTracker,
    /// Bumped whenever scheduled events must no longer fire
    generation: u64,
    timeline: Option<JoinHandle<()>>,
}

impl ChannelState {
    fn cancel_scheduled(&mut self) {
        self.generation += 1;
        if let Some(handle) = self.timeline.take() {
            handle.abort();
        }
    }
}

/// Clock-driven stand-in for a platform audio element.
///
/// Plays a stream for its duration on the tokio clock and reports the same
/// lifecycle a real element would: `Played` on lay-in, `FadeTrigger` at the
/// fade-out offset, `Ended` at the end.
#[derive(Debug)]
pub struct SimulatedChannel {
    id: ChannelId,
    events: broadcast::Sender<ChannelEvent>,
    state: Arc<Mutex<ChannelState>>,
}

impl SimulatedChannel {
    pub fn new(id: ChannelId) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            id,
            events,
            state: Arc::new(Mutex::new(ChannelState {
                key: None,
                stream: None,
                fade: FadeConfig::default(),
                tracker: PositionTracker::new(),
                generation: 0,
                timeline: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ChannelState> {
        lock_state(&self.state)
    }

    pub fn fade(&self) -> FadeConfig {
        self.lock().fade
    }

    fn start_timeline(&self, state: &mut ChannelState) {
        state.cancel_scheduled();
        let generation = state.generation;
        let remaining = state.tracker.remaining();
        let offset = state.fade.fade_out_offset();
        let shared = Arc::clone(&self.state);
        let events = self.events.clone();

        state.timeline = Some(tokio::spawn(async move {
            if !offset.is_zero() && remaining > offset {
                sleep(remaining - offset).await;
                if !emit_if_current(&shared, &events, generation, ChannelEvent::FadeTrigger, false) {
                    return;
                }
                sleep(offset).await;
            } else {
                sleep(remaining).await;
            }
            emit_if_current(&shared, &events, generation, ChannelEvent::Ended, true);
        }));
    }
}

fn lock_state(state: &Mutex<ChannelState>) -> MutexGuard<'_, ChannelState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Send `event` unless the schedule it belongs to was cancelled. `stop`
/// freezes the channel as it would be after the audio finished.
fn emit_if_current(
    state: &Mutex<ChannelState>,
    events: &broadcast::Sender<ChannelEvent>,
    generation: u64,
    event: ChannelEvent,
    stop: bool,
) -> bool {
    let mut guard = lock_state(state);
    if guard.generation != generation {
        return false;
    }
    if stop {
        guard.cancel_scheduled();
        guard.tracker.pause();
    }
    trace!("Channel emitting {:?}", event);
    // No subscribers is fine
    let _ = events.send(event);
    true
}

impl Channel for SimulatedChannel {
    fn id(&self) -> ChannelId {
        self.id
    }

    fn load(&self, key: &SongKey, stream: &StreamInfo, fade: FadeConfig) -> Result<(), ChannelError> {
        let mut state = self.lock();
        state.cancel_scheduled();
        state.key = Some(key.clone());
        state.tracker.load(stream.duration);
        state.stream = Some(stream.clone());
        state.fade = fade;
        debug!("Channel {} loaded {} ({})", self.id, key, stream.playable_url);
        Ok(())
    }

    fn lay_in(&self, from: Option<Duration>) -> Result<(), ChannelError> {
        let mut state = self.lock();
        let stream = state.stream.clone().ok_or(ChannelError::NoSource)?;

        if stream.playable_url.starts_with(FAILING_URL_PREFIX) {
            state.cancel_scheduled();
            let generation = state.generation;
            let shared = Arc::clone(&self.state);
            let events = self.events.clone();
            let error = ChannelError::Decode(format!("cannot decode {}", stream.playable_url));
            state.timeline = Some(tokio::spawn(async move {
                sleep(FAILURE_DELAY).await;
                emit_if_current(&shared, &events, generation, ChannelEvent::Error(error), false);
            }));
            return Ok(());
        }

        state.tracker.resume(from);
        trace!(
            "Channel {} fading in over {}ms from {:?}",
            self.id,
            state.fade.fade_in_ms,
            state.tracker.current_position()
        );
        self.start_timeline(&mut state);
        let _ = self.events.send(ChannelEvent::Played);
        Ok(())
    }

    fn lay_out(&self) {
        let state = self.lock();
        let generation = state.generation;
        let fade_out = state.fade.fade_out().min(state.tracker.remaining());
        let shared = Arc::clone(&self.state);
        let events = self.events.clone();
        drop(state);

        tokio::spawn(async move {
            sleep(fade_out).await;
            emit_if_current(&shared, &events, generation, ChannelEvent::FadeComplete, true);
        });
    }

    fn pause(&self) {
        let mut state = self.lock();
        state.cancel_scheduled();
        state.tracker.pause();
    }

    fn seek(&self, position: Duration) -> Result<(), ChannelError> {
        let mut state = self.lock();
        if state.stream.is_none() {
            return Err(ChannelError::NoSource);
        }
        state.tracker.seek(position).map_err(ChannelError::Seek)?;
        if state.tracker.is_running() {
            self.start_timeline(&mut state);
        }
        Ok(())
    }

    fn release(&self) {
        let mut state = self.lock();
        state.cancel_scheduled();
        state.key = None;
        state.stream = None;
        state.tracker.clear();
        drop(state);
        let _ = self.events.send(ChannelEvent::Released);
    }

    fn is_paused(&self) -> bool {
        !self.lock().tracker.is_running()
    }

    fn bound_key(&self) -> Option<SongKey> {
        self.lock().key.clone()
    }

    fn position(&self) -> Duration {
        self.lock().tracker.current_position()
    }

    fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.events.subscribe()
    }
}

/// Hands out [`SimulatedChannel`]s with increasing ids
#[derive(Debug, Default)]
pub struct SimulatedChannelFactory {
    next_id: AtomicU64,
    created: AtomicUsize,
}

impl SimulatedChannelFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of channels constructed so far
    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl ChannelFactory for SimulatedChannelFactory {
    fn create(&self) -> Arc<dyn Channel> {
        let id = ChannelId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.created.fetch_add(1, Ordering::SeqCst);
        Arc::new(SimulatedChannel::new(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Provider;
    use tokio::time::{timeout, Instant};

    fn stream(url: &str, secs: u64) -> StreamInfo {
        StreamInfo::new(url, Duration::from_secs(secs))
    }

    fn key() -> SongKey {
        SongKey::new("1", Provider::Netease)
    }

    #[tokio::test(start_paused = true)]
    async fn test_plays_through_to_end() {
        let channel = SimulatedChannel::new(ChannelId(1));
        channel.load(&key(), &stream("https://a", 5), FadeConfig::default()).unwrap();
        let mut events = channel.subscribe();
        let started = Instant::now();

        channel.lay_in(None).unwrap();

        assert_eq!(events.recv().await.unwrap(), ChannelEvent::Played);
        assert!(!channel.is_paused());
        assert_eq!(events.recv().await.unwrap(), ChannelEvent::Ended);
        assert_eq!(started.elapsed(), Duration::from_secs(5));
        assert!(channel.is_paused());
        assert_eq!(channel.position(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fade_trigger_before_end() {
        let channel = SimulatedChannel::new(ChannelId(1));
        let fade = FadeConfig {
            fade_in_ms: 0,
            fade_out_offset_ms: 2000,
            fade_out_ms: 1000,
        };
        channel.load(&key(), &stream("https://a", 10), fade).unwrap();
        let mut events = channel.subscribe();
        let started = Instant::now();

        channel.lay_in(None).unwrap();
        assert_eq!(events.recv().await.unwrap(), ChannelEvent::Played);
        assert_eq!(events.recv().await.unwrap(), ChannelEvent::FadeTrigger);
        assert_eq!(started.elapsed(), Duration::from_secs(8));

        channel.lay_out();
        assert_eq!(events.recv().await.unwrap(), ChannelEvent::FadeComplete);
        assert_eq!(started.elapsed(), Duration::from_secs(9));
        assert!(channel.is_paused());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_stream_reports_error() {
        let channel = SimulatedChannel::new(ChannelId(1));
        channel.load(&key(), &stream("fail:https://a", 5), FadeConfig::default()).unwrap();
        let mut events = channel.subscribe();

        channel.lay_in(None).unwrap();

        match events.recv().await.unwrap() {
            ChannelEvent::Error(ChannelError::Decode(msg)) => assert!(msg.contains("fail:")),
            other => panic!("expected decode error, got {:?}", other),
        }
        assert!(channel.is_paused());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_cancels_end() {
        let channel = SimulatedChannel::new(ChannelId(1));
        channel.load(&key(), &stream("https://a", 5), FadeConfig::default()).unwrap();
        let mut events = channel.subscribe();

        channel.lay_in(None).unwrap();
        assert_eq!(events.recv().await.unwrap(), ChannelEvent::Played);

        tokio::time::advance(Duration::from_secs(2)).await;
        channel.pause();

        assert!(timeout(Duration::from_secs(30), events.recv()).await.is_err());
        assert_eq!(channel.position(), Duration::from_secs(2));

        // Resume picks up where it stopped
        channel.lay_in(None).unwrap();
        assert_eq!(events.recv().await.unwrap(), ChannelEvent::Played);
        let resumed = Instant::now();
        assert_eq!(events.recv().await.unwrap(), ChannelEvent::Ended);
        assert_eq!(resumed.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lay_in_from_start_offset() {
        let channel = SimulatedChannel::new(ChannelId(1));
        channel.load(&key(), &stream("https://a", 10), FadeConfig::default()).unwrap();

        channel.lay_in(Some(Duration::from_secs(4))).unwrap();

        assert_eq!(channel.position(), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_lay_in_without_source() {
        let channel = SimulatedChannel::new(ChannelId(1));
        assert_eq!(channel.lay_in(None), Err(ChannelError::NoSource));
        assert_eq!(channel.seek(Duration::ZERO), Err(ChannelError::NoSource));
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_unbinds_and_notifies() {
        let channel = SimulatedChannel::new(ChannelId(1));
        channel.load(&key(), &stream("https://a", 5), FadeConfig::default()).unwrap();
        let mut events = channel.subscribe();
        channel.lay_in(None).unwrap();
        assert_eq!(events.recv().await.unwrap(), ChannelEvent::Played);

        channel.release();

        assert_eq!(events.recv().await.unwrap(), ChannelEvent::Released);
        assert_eq!(channel.bound_key(), None);
        assert!(channel.is_paused());
        assert!(timeout(Duration::from_secs(30), events.recv()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_seek_restarts_timeline() {
        let channel = SimulatedChannel::new(ChannelId(1));
        channel.load(&key(), &stream("https://a", 10), FadeConfig::default()).unwrap();
        let mut events = channel.subscribe();
        channel.lay_in(None).unwrap();
        assert_eq!(events.recv().await.unwrap(), ChannelEvent::Played);

        channel.seek(Duration::from_secs(9)).unwrap();
        let sought = Instant::now();

        assert_eq!(events.recv().await.unwrap(), ChannelEvent::Ended);
        assert_eq!(sought.elapsed(), Duration::from_secs(1));
        assert!(matches!(
            channel.seek(Duration::from_secs(11)),
            Err(ChannelError::Seek(_))
        ));
    }

    #[test]
    fn test_factory_assigns_unique_ids() {
        let factory = SimulatedChannelFactory::new();
        let a = factory.create();
        let b = factory.create();

        assert_ne!(a.id(), b.id());
        assert_eq!(factory.created_count(), 2);
    }
}
