use log::{info, warn, error, debug, trace};
use std::time::Duration;
use std::sync::{Arc, Mutex, MutexGuard};
use std::collections::VecDeque;
use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Player event for logging and debugging
#[derive(Debug, Clone)]
pub struct PlayerEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: PlayerEventType,
    pub duration: Option<Duration>,
    pub details: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEventType {
    PlaybackStarted,
    PlaybackPaused,
    TrackChanged,
    PreloadStarted,
    PreloadResolved,
    ChannelAllocated,
    ChannelReleased,
    ChannelError,
    StreamResolutionError,
    RetryScheduled,
    TrackSkipped,
    AutoPaused,
    PerformanceWarning,
}

impl PlayerEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerEventType::PlaybackStarted => "PLAYBACK_STARTED",
            PlayerEventType::PlaybackPaused => "PLAYBACK_PAUSED",
            PlayerEventType::TrackChanged => "TRACK_CHANGED",
            PlayerEventType::PreloadStarted => "PRELOAD_STARTED",
            PlayerEventType::PreloadResolved => "PRELOAD_RESOLVED",
            PlayerEventType::ChannelAllocated => "CHANNEL_ALLOCATED",
            PlayerEventType::ChannelReleased => "CHANNEL_RELEASED",
            PlayerEventType::ChannelError => "CHANNEL_ERROR",
            PlayerEventType::StreamResolutionError => "STREAM_RESOLUTION_ERROR",
            PlayerEventType::RetryScheduled => "RETRY_SCHEDULED",
            PlayerEventType::TrackSkipped => "TRACK_SKIPPED",
            PlayerEventType::AutoPaused => "AUTO_PAUSED",
            PlayerEventType::PerformanceWarning => "PERFORMANCE_WARNING",
        }
    }
}

/// Logger for playback engine operations. Forwards to the `log` facade and
/// keeps a bounded in-memory history for the status display and tests.
#[derive(Clone)]
pub struct PlayerLogger {
    events: Arc<Mutex<VecDeque<PlayerEvent>>>,
    max_events: usize,
}

impl Default for PlayerLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerLogger {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::new())),
            max_events: 1000,
        }
    }

    /// Initialize logging system with the level from `POOLPLAY_LOG_LEVEL`,
    /// falling back to `default_level`
    pub fn init(default_level: &str) -> Result<(), Box<dyn std::error::Error>> {
        let log_level = std::env::var("POOLPLAY_LOG_LEVEL")
            .unwrap_or_else(|_| default_level.to_string());

        let mut builder = env_logger::Builder::new();

        builder.format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "{} [{}] [{}:{}] {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        });

        match log_level.to_lowercase().as_str() {
            "trace" => builder.filter_level(log::LevelFilter::Trace),
            "debug" => builder.filter_level(log::LevelFilter::Debug),
            "info" => builder.filter_level(log::LevelFilter::Info),
            "warn" => builder.filter_level(log::LevelFilter::Warn),
            "error" => builder.filter_level(log::LevelFilter::Error),
            _ => builder.filter_level(log::LevelFilter::Info),
        };

        builder.try_init()?;

        info!("poolplay logging initialized with level: {}", log_level);
        Ok(())
    }

    fn history(&self) -> MutexGuard<'_, VecDeque<PlayerEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn log_event(&self, event_type: PlayerEventType, details: String, duration: Option<Duration>) {
        match event_type {
            PlayerEventType::PlaybackStarted
            | PlayerEventType::PlaybackPaused
            | PlayerEventType::TrackChanged
            | PlayerEventType::TrackSkipped => {
                info!("[{}] {}", event_type.as_str(), details);
            }
            PlayerEventType::PreloadStarted
            | PlayerEventType::ChannelAllocated
            | PlayerEventType::ChannelReleased => {
                debug!("[{}] {}", event_type.as_str(), details);
            }
            PlayerEventType::PreloadResolved => {
                debug!("[{}] {} (took: {:?})", event_type.as_str(), details, duration);
            }
            PlayerEventType::RetryScheduled | PlayerEventType::AutoPaused => {
                warn!("[{}] {}", event_type.as_str(), details);
            }
            PlayerEventType::ChannelError | PlayerEventType::StreamResolutionError => {
                error!("[{}] {}", event_type.as_str(), details);
            }
            PlayerEventType::PerformanceWarning => {
                warn!("[{}] {} (duration: {:?})", event_type.as_str(), details, duration);
            }
        }

        let mut events = self.history();
        events.push_back(PlayerEvent {
            timestamp: Utc::now(),
            event_type,
            duration,
            details,
        });
        while events.len() > self.max_events {
            events.pop_front();
        }
    }

    pub fn log_playback_started(&self, song: &str, position: Duration) {
        self.log_event(
            PlayerEventType::PlaybackStarted,
            format!("Started playing: {} from {:.2}s", song, position.as_secs_f64()),
            None,
        );
    }

    pub fn log_playback_paused(&self, song: Option<&str>) {
        let details = match song {
            Some(song) => format!("Playback paused on '{}'", song),
            None => "Playback paused".to_string(),
        };
        self.log_event(PlayerEventType::PlaybackPaused, details, None);
    }

    pub fn log_track_changed(&self, from_track: Option<&str>, to_track: &str, index: usize) {
        let details = match from_track {
            Some(from) => format!("Track changed from '{}' to '{}' (#{})", from, to_track, index + 1),
            None => format!("Track selected: '{}' (#{})", to_track, index + 1),
        };
        self.log_event(PlayerEventType::TrackChanged, details, None);
    }

    pub fn log_preload_started(&self, key: &str, channel_id: u64) {
        self.log_event(
            PlayerEventType::PreloadStarted,
            format!("Preloading {} on channel {}", key, channel_id),
            None,
        );
    }

    pub fn log_preload_resolved(&self, key: &str, took: Duration) {
        self.log_event(
            PlayerEventType::PreloadResolved,
            format!("Stream ready for {}", key),
            Some(took),
        );
    }

    pub fn log_channel_allocated(&self, channel_id: u64, reused: bool) {
        let source = if reused { "free list" } else { "factory" };
        self.log_event(
            PlayerEventType::ChannelAllocated,
            format!("Channel {} allocated from {}", channel_id, source),
            None,
        );
    }

    pub fn log_channel_released(&self, channel_id: u64, key: &str, recycled: bool) {
        self.log_event(
            PlayerEventType::ChannelReleased,
            format!(
                "Channel {} released from {} ({})",
                channel_id,
                key,
                if recycled { "recycled" } else { "dropped" }
            ),
            None,
        );
    }

    pub fn log_channel_error(&self, key: &str, error: &str) {
        self.log_event(
            PlayerEventType::ChannelError,
            format!("Playback error for {}: {}", key, error),
            None,
        );
    }

    pub fn log_stream_resolution_error(&self, key: &str, error: &str) {
        self.log_event(
            PlayerEventType::StreamResolutionError,
            format!("Could not resolve stream for {}: {}", key, error),
            None,
        );
    }

    pub fn log_retry_scheduled(&self, attempt: u32, delay: Duration) {
        self.log_event(
            PlayerEventType::RetryScheduled,
            format!("Retry attempt {} in {}ms", attempt, delay.as_millis()),
            Some(delay),
        );
    }

    pub fn log_track_skipped(&self, key: &str, errors: u32) {
        self.log_event(
            PlayerEventType::TrackSkipped,
            format!("Skipping {} after {} errors", key, errors),
            None,
        );
    }

    pub fn log_auto_paused(&self, continuous_errors: u32) {
        self.log_event(
            PlayerEventType::AutoPaused,
            format!("Paused after {} consecutive errors", continuous_errors),
            None,
        );
    }

    pub fn log_performance_warning(&self, operation: &str, duration: Duration, threshold: Duration) {
        self.log_event(
            PlayerEventType::PerformanceWarning,
            format!(
                "{} took {}ms (threshold: {}ms)",
                operation,
                duration.as_millis(),
                threshold.as_millis()
            ),
            Some(duration),
        );
    }

    /// Get recent events for debugging
    pub fn get_recent_events(&self, count: usize) -> Vec<PlayerEvent> {
        let events = self.history();
        let skip = events.len().saturating_sub(count);
        events.iter().skip(skip).cloned().collect()
    }

    pub fn count_events(&self, event_type: PlayerEventType) -> usize {
        self.history().iter().filter(|e| e.event_type == event_type).count()
    }

    pub fn get_event_statistics(&self) -> EventStatistics {
        let events = self.history();
        let mut stats = EventStatistics::default();

        for event in events.iter() {
            match event.event_type {
                PlayerEventType::ChannelError => stats.channel_errors += 1,
                PlayerEventType::StreamResolutionError => stats.resolution_errors += 1,
                PlayerEventType::RetryScheduled => stats.retries += 1,
                PlayerEventType::TrackSkipped => stats.skips += 1,
                PlayerEventType::TrackChanged => stats.track_changes += 1,
                PlayerEventType::ChannelAllocated => stats.channel_allocations += 1,
                _ => {}
            }
        }

        stats.total_events = events.len();
        stats
    }
}

/// Statistics about logged events
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventStatistics {
    pub total_events: usize,
    pub channel_errors: usize,
    pub resolution_errors: usize,
    pub retries: usize,
    pub skips: usize,
    pub track_changes: usize,
    pub channel_allocations: usize,
}

/// Times one operation and reports it to the event history when it runs
/// over a threshold
pub struct OperationTimer {
    start_time: Instant,
    operation_name: String,
    logger: PlayerLogger,
}

impl OperationTimer {
    pub fn new(operation_name: String, logger: &PlayerLogger) -> Self {
        trace!("Starting operation: {}", operation_name);
        Self {
            start_time: Instant::now(),
            operation_name,
            logger: logger.clone(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn finish_with_threshold(self, threshold: Duration) -> Duration {
        let duration = self.elapsed();
        if duration > threshold {
            self.logger
                .log_performance_warning(&self.operation_name, duration, threshold);
        } else {
            debug!("Completed operation '{}' in {}ms", self.operation_name, duration.as_millis());
        }
        duration
    }
}
