pub mod throttle;


use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{sleep_until, Instant};

use crate::channel::{Channel, ChannelEvent, ChannelFactory};
use crate::config::PlayerConfig;
use crate::error::{ChannelError, PlayerError, PreconditionViolation, PreloadError};
use crate::error_recovery::ErrorRecovery;
use crate::logging::PlayerLogger;
use crate::models::{ErrorStatus, PlaybackStatus, PlayerSnapshot, PlayerSong, SongKey};
use crate::pool::{LoadFuture, LoadedChannel, ResourcePool};
use crate::queue::SongQueue;
use crate::resolver::StreamResolver;

use throttle::{LeadingThrottle, TrailingThrottle};

/// Settle time between a natural end and the next transition
const END_SETTLE: Duration = Duration::from_millis(10);
const NOTIFICATION_CAPACITY: usize = 64;

/// What the orchestrator tells the outside world
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerNotification {
    StatusChanged(PlaybackStatus),
    IndexChanged(Option<usize>),
    /// Ask the song list to scroll to this index
    Locate(Option<usize>),
    /// The resolver returned fresher metadata for a playlist entry
    SongInfo { index: usize, song: PlayerSong },
    ErrorStatus(ErrorStatus),
}

type Reply<T> = oneshot::Sender<T>;

/// Requests accepted by the orchestrator's mailbox
#[derive(Debug)]
pub enum PlayerCommand {
    PlayAt { index: usize, reply: Reply<Result<(), PreconditionViolation>> },
    PlaySong { key: SongKey, reply: Reply<Result<(), PreconditionViolation>> },
    Next { reply: Reply<Result<(), PreconditionViolation>> },
    Previous { reply: Reply<Result<(), PreconditionViolation>> },
    Pause,
    Resume,
    Toggle,
    Seek { position: Duration, reply: Reply<Result<(), ChannelError>> },
    LoadPlaylist {
        songs: Vec<PlayerSong>,
        start_index: Option<usize>,
        autoplay: bool,
        reply: Reply<Result<(), PreconditionViolation>>,
    },
    Remove { key: SongKey, reply: Reply<Result<usize, PreconditionViolation>> },
    Move { from: usize, to: usize, reply: Reply<Result<(), PreconditionViolation>> },
    Locate,
    UpdateConfig(PlayerConfig),
    Snapshot(Reply<PlayerSnapshot>),
    Shutdown(Reply<()>),
}

/// Cloneable front end of a running orchestrator
#[derive(Clone)]
pub struct PlayerHandle {
    commands: mpsc::UnboundedSender<PlayerCommand>,
    notifications: broadcast::Sender<PlayerNotification>,
}

impl PlayerHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerNotification> {
        self.notifications.subscribe()
    }

    fn send(&self, command: PlayerCommand) -> Result<(), PlayerError> {
        self.commands.send(command).map_err(|_| PlayerError::Disconnected)
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> PlayerCommand) -> Result<T, PlayerError> {
        let (reply, response) = oneshot::channel();
        self.send(build(reply))?;
        response.await.map_err(|_| PlayerError::Disconnected)
    }

    /// Play the song at `index`. Rapid calls collapse into the last one.
    pub async fn play_at(&self, index: usize) -> Result<(), PlayerError> {
        Ok(self.request(|reply| PlayerCommand::PlayAt { index, reply }).await??)
    }

    pub async fn play_song(&self, key: SongKey) -> Result<(), PlayerError> {
        Ok(self.request(|reply| PlayerCommand::PlaySong { key, reply }).await??)
    }

    pub async fn next(&self) -> Result<(), PlayerError> {
        Ok(self.request(|reply| PlayerCommand::Next { reply }).await??)
    }

    pub async fn previous(&self) -> Result<(), PlayerError> {
        Ok(self.request(|reply| PlayerCommand::Previous { reply }).await??)
    }

    pub fn pause(&self) -> Result<(), PlayerError> {
        self.send(PlayerCommand::Pause)
    }

    pub fn resume(&self) -> Result<(), PlayerError> {
        self.send(PlayerCommand::Resume)
    }

    pub fn toggle(&self) -> Result<(), PlayerError> {
        self.send(PlayerCommand::Toggle)
    }

    pub async fn seek(&self, position: Duration) -> Result<(), PlayerError> {
        Ok(self.request(|reply| PlayerCommand::Seek { position, reply }).await??)
    }

    pub async fn load_playlist(
        &self,
        songs: Vec<PlayerSong>,
        start_index: Option<usize>,
        autoplay: bool,
    ) -> Result<(), PlayerError> {
        Ok(self
            .request(|reply| PlayerCommand::LoadPlaylist {
                songs,
                start_index,
                autoplay,
                reply,
            })
            .await??)
    }

    /// Remove the first entry for `key`, returning the index it had
    pub async fn remove(&self, key: SongKey) -> Result<usize, PlayerError> {
        Ok(self.request(|reply| PlayerCommand::Remove { key, reply }).await??)
    }

    pub async fn move_song(&self, from: usize, to: usize) -> Result<(), PlayerError> {
        Ok(self.request(|reply| PlayerCommand::Move { from, to, reply }).await??)
    }

    pub fn locate(&self) -> Result<(), PlayerError> {
        self.send(PlayerCommand::Locate)
    }

    pub fn update_config(&self, config: PlayerConfig) -> Result<(), PlayerError> {
        self.send(PlayerCommand::UpdateConfig(config))
    }

    pub async fn snapshot(&self) -> Result<PlayerSnapshot, PlayerError> {
        self.request(PlayerCommand::Snapshot).await
    }

    /// Stop the orchestrator and release every channel
    pub async fn shutdown(&self) -> Result<(), PlayerError> {
        self.request(PlayerCommand::Shutdown).await
    }
}

/// The channel whose events the orchestrator currently listens to
struct ActiveChannel {
    key: SongKey,
    channel: Arc<dyn Channel>,
    /// Where the first lay-in starts; `None` once audible playback began
    start_offset: Option<Duration>,
}

struct PendingLoad {
    key: SongKey,
    future: LoadFuture,
}

/// Playback state machine.
///
/// Runs as a single task: commands, channel events, throttle deadlines and
/// the pending load are all handled from one `select!`, so transitions never
/// interleave.
pub struct Orchestrator {
    config: PlayerConfig,
    queue: SongQueue,
    status: PlaybackStatus,
    recovery: ErrorRecovery,
    pool: ResourcePool,
    active: Option<ActiveChannel>,
    /// Event subscription of the current epoch
    events: Option<broadcast::Receiver<ChannelEvent>>,
    click: TrailingThrottle<usize>,
    /// Whether the pending click starts playback; a pause keeps the click
    /// but makes it prepare the song silently
    click_plays: bool,
    end_throttle: LeadingThrottle,
    pending_transition: Option<Instant>,
    pending_load: Option<PendingLoad>,
    notifications: broadcast::Sender<PlayerNotification>,
    logger: PlayerLogger,
}

impl Orchestrator {
    pub fn new(
        config: PlayerConfig,
        factory: Arc<dyn ChannelFactory>,
        resolver: Arc<dyn StreamResolver>,
        logger: PlayerLogger,
    ) -> Self {
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        let pool = ResourcePool::new(
            factory,
            resolver,
            config.quality,
            config.free_channel_capacity,
            logger.clone(),
        );

        Self {
            queue: SongQueue::new(),
            status: PlaybackStatus::Paused,
            recovery: ErrorRecovery::new(config.error_retry.clone(), logger.clone()),
            pool,
            active: None,
            events: None,
            click: TrailingThrottle::new(config.throttle_window()),
            click_plays: false,
            end_throttle: LeadingThrottle::new(config.throttle_window()),
            pending_transition: None,
            pending_load: None,
            notifications,
            logger,
            config,
        }
    }

    /// Start the actor on the current tokio runtime
    pub fn spawn(self) -> PlayerHandle {
        let (commands, mailbox) = mpsc::unbounded_channel();
        let handle = PlayerHandle {
            commands,
            notifications: self.notifications.clone(),
        };
        tokio::spawn(self.run(mailbox));
        handle
    }

    async fn run(mut self, mut mailbox: mpsc::UnboundedReceiver<PlayerCommand>) {
        info!("Playback orchestrator started");

        loop {
            tokio::select! {
                command = mailbox.recv() => match command {
                    Some(PlayerCommand::Shutdown(reply)) => {
                        self.shutdown();
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command),
                    None => {
                        self.shutdown();
                        break;
                    }
                },
                event = next_event(&mut self.events) => match event {
                    Ok(event) => self.on_channel_event(event),
                    Err(RecvError::Lagged(skipped)) => warn!("Missed {} channel events", skipped),
                    Err(RecvError::Closed) => self.events = None,
                },
                _ = wait_for(self.click.deadline()) => self.fire_click(),
                _ = wait_for(self.pending_transition) => self.transition(),
                result = next_load(&self.pending_load) => self.on_load(result),
            }
        }

        info!("Playback orchestrator stopped");
    }

    fn handle_command(&mut self, command: PlayerCommand) {
        match command {
            PlayerCommand::PlayAt { index, reply } => {
                let _ = reply.send(self.play_at(index));
            }
            PlayerCommand::PlaySong { key, reply } => {
                let result = match self.queue.position(&key) {
                    Some(index) => self.play_at(index),
                    None => Err(PreconditionViolation::SongNotInPlaylist { key: key.to_string() }),
                };
                let _ = reply.send(result);
            }
            PlayerCommand::Next { reply } => {
                let _ = reply.send(self.step(1));
            }
            PlayerCommand::Previous { reply } => {
                let _ = reply.send(self.step(-1));
            }
            PlayerCommand::Pause => self.pause(),
            PlayerCommand::Resume => self.resume(),
            PlayerCommand::Toggle => {
                if self.status.is_paused() {
                    self.resume();
                } else {
                    self.pause();
                }
            }
            PlayerCommand::Seek { position, reply } => {
                let result = match &self.active {
                    Some(active) => active.channel.seek(position),
                    None => Err(ChannelError::NoSource),
                };
                let _ = reply.send(result);
            }
            PlayerCommand::LoadPlaylist {
                songs,
                start_index,
                autoplay,
                reply,
            } => {
                let _ = reply.send(self.load_playlist(songs, start_index, autoplay));
            }
            PlayerCommand::Remove { key, reply } => {
                let _ = reply.send(self.remove(&key));
            }
            PlayerCommand::Move { from, to, reply } => {
                let result = self.queue.move_song(from, to);
                if result.is_ok() {
                    self.notify(PlayerNotification::IndexChanged(self.queue.current_index()));
                    self.reconcile_window();
                }
                let _ = reply.send(result);
            }
            PlayerCommand::Locate => {
                self.notify(PlayerNotification::Locate(self.queue.current_index()));
            }
            PlayerCommand::UpdateConfig(config) => self.update_config(config),
            PlayerCommand::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            PlayerCommand::Shutdown(reply) => {
                // Handled by the run loop
                let _ = reply.send(());
            }
        }
    }

    fn play_at(&mut self, index: usize) -> Result<(), PreconditionViolation> {
        self.queue.validate(index)?;
        self.queue_click(index);
        Ok(())
    }

    fn queue_click(&mut self, index: usize) {
        self.click.push(index, Instant::now());
        self.click_plays = true;
        debug!("Play-at {} queued, fires at {:?}", index, self.click.deadline());
    }

    /// Next or previous relative to the song the user is heading to
    fn step(&mut self, step: isize) -> Result<(), PreconditionViolation> {
        let base = self
            .click
            .pending()
            .copied()
            .or(self.queue.current_index())
            .ok_or(PreconditionViolation::EmptyPlaylist)?;
        let target = self
            .queue
            .step_from(base, step, self.config.loop_playlist)
            .unwrap_or(base);
        self.play_at(target)
    }

    fn fire_click(&mut self) {
        let Some(index) = self.click.take_due(Instant::now()) else {
            return;
        };
        let Some(index) = self.queue.normalize(index, self.config.loop_playlist) else {
            warn!("Nothing to play: playlist is empty");
            self.set_status(PlaybackStatus::Paused);
            return;
        };

        self.select_index(index);
        if std::mem::take(&mut self.click_plays) {
            self.set_status(PlaybackStatus::Loading);
        }
        self.schedule_transition(Duration::ZERO);
    }

    fn pause(&mut self) {
        self.click_plays = false;
        if let Some(active) = &self.active {
            active.channel.pause();
        }
        let name = self.queue.current_song().map(PlayerSong::display_name);
        self.logger.log_playback_paused(name.as_deref());
        self.set_status(PlaybackStatus::Paused);
    }

    fn resume(&mut self) {
        if self.click.pending().is_some() {
            // The queued song plays once the click fires
            if self.status.is_paused() {
                self.click_plays = true;
                self.set_status(PlaybackStatus::Loading);
            }
            return;
        }
        self.ensure_active_binding();

        if self.active.is_some() {
            self.set_status(PlaybackStatus::Playing);
            self.lay_in_active();
        } else if self.pending_load.is_some() || self.pending_transition.is_some() {
            self.set_status(PlaybackStatus::Loading);
        } else if let Some(index) = self.queue.current_index() {
            self.set_status(PlaybackStatus::Loading);
            self.queue_click(index);
        }
    }

    fn lay_in_active(&mut self) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        let from = active.start_offset.take();
        let key = active.key.clone();

        match active.channel.lay_in(from) {
            Ok(()) => {
                let name = self
                    .queue
                    .current_song()
                    .map(PlayerSong::display_name)
                    .unwrap_or_else(|| key.to_string());
                self.logger.log_playback_started(&name, active.channel.position());
            }
            Err(err) => {
                self.logger.log_channel_error(&key.to_string(), &err.to_string());
                self.on_error(&key);
            }
        }
    }

    fn load_playlist(
        &mut self,
        songs: Vec<PlayerSong>,
        start_index: Option<usize>,
        autoplay: bool,
    ) -> Result<(), PreconditionViolation> {
        if let Some(index) = start_index {
            if songs.is_empty() {
                return Err(PreconditionViolation::EmptyPlaylist);
            }
            if index >= songs.len() {
                return Err(PreconditionViolation::IndexOutOfRange {
                    index,
                    len: songs.len(),
                });
            }
        }

        self.click.clear();
        self.pending_transition = None;
        self.pending_load = None;
        self.detach_active();

        info!("Loading playlist of {} songs", songs.len());
        self.queue.replace(songs, start_index);
        self.recovery.reset();
        self.notify(PlayerNotification::IndexChanged(self.queue.current_index()));
        self.notify(PlayerNotification::ErrorStatus(self.recovery.status()));

        if autoplay && !self.queue.is_empty() {
            self.set_status(PlaybackStatus::Loading);
            self.schedule_transition(Duration::ZERO);
        } else {
            self.set_status(PlaybackStatus::Paused);
            self.reconcile_window();
        }
        Ok(())
    }

    fn remove(&mut self, key: &SongKey) -> Result<usize, PreconditionViolation> {
        let index = self
            .queue
            .position(key)
            .ok_or_else(|| PreconditionViolation::SongNotInPlaylist { key: key.to_string() })?;
        let was_current = self.queue.current_index() == Some(index);

        if was_current {
            self.click.clear();
            self.pending_transition = None;
            self.pending_load = None;
            self.detach_active();
        }
        self.queue.remove(index)?;
        if self.queue.position(key).is_none() {
            self.pool.release(key);
        }
        self.notify(PlayerNotification::IndexChanged(self.queue.current_index()));

        if !was_current {
            if self.status == PlaybackStatus::Playing {
                self.reconcile_window();
            }
            return Ok(index);
        }
        if self.queue.is_empty() {
            self.set_status(PlaybackStatus::Paused);
        } else {
            self.recovery.reset_song();
            if !self.status.is_paused() {
                self.set_status(PlaybackStatus::Loading);
                self.schedule_transition(Duration::ZERO);
            }
        }
        Ok(index)
    }

    fn update_config(&mut self, config: PlayerConfig) {
        debug!("Applying new configuration");
        self.recovery.set_policy(config.error_retry.clone());
        self.click.set_window(config.throttle_window());
        self.end_throttle.set_window(config.throttle_window());
        self.pool.set_free_capacity(config.free_channel_capacity);
        self.pool.set_quality(config.quality);
        self.config = config;

        self.ensure_active_binding();
        if self.status == PlaybackStatus::Playing {
            self.reconcile_window();
        }
    }

    /// The active channel must still be the pool's channel for its song, and
    /// a silent one must match the current fade settings. Otherwise drop it
    /// and prepare the song again.
    fn ensure_active_binding(&mut self) {
        let Some(active) = &self.active else {
            return;
        };
        let key = active.key.clone();
        let bound = self.pool.is_bound(active.channel.id(), &key);
        let drifted = active.channel.is_paused()
            && self
                .pool
                .entry(&key)
                .map(|entry| entry.fade != self.config.fade)
                .unwrap_or(false);

        if bound && !drifted {
            return;
        }

        debug!("Dropping active channel for {} (bound: {}, fade drift: {})", key, bound, drifted);
        self.detach_active();
        if drifted {
            self.pool.release(&key);
        }
        if self.queue.current_song().is_some() {
            self.schedule_transition(Duration::ZERO);
        }
    }

    /// A newer trigger replaces whatever transition was pending
    fn schedule_transition(&mut self, delay: Duration) {
        self.pending_load = None;
        self.pending_transition = Some(Instant::now() + delay);
    }

    /// Drop the current epoch: stop listening and silence the channel
    fn detach_active(&mut self) {
        self.events = None;
        if let Some(active) = self.active.take() {
            active.channel.pause();
        }
    }

    fn transition(&mut self) {
        self.pending_transition = None;
        self.pending_load = None;
        self.detach_active();

        if !self.status.is_paused() {
            self.set_status(PlaybackStatus::Loading);
        }

        let Some(song) = self.queue.current_song().cloned() else {
            warn!("Nothing to play: playlist is empty");
            self.set_status(PlaybackStatus::Paused);
            return;
        };

        debug!("Transition to {} ({})", song.display_name(), song.key());
        let entry = self.pool.acquire(&song, self.config.fade);
        self.pending_load = Some(PendingLoad {
            key: song.key(),
            future: entry.load,
        });
    }

    fn on_load(&mut self, result: Result<LoadedChannel, PreloadError>) {
        let Some(pending) = self.pending_load.take() else {
            return;
        };

        let loaded = match result {
            Ok(loaded) => loaded,
            Err(PreloadError::Cancelled) => {
                // The entry was released under us; start over unless that was deliberate
                if !self.status.is_paused() && self.queue.current_key().as_ref() == Some(&pending.key) {
                    self.schedule_transition(Duration::ZERO);
                }
                return;
            }
            Err(err) => {
                match &err {
                    PreloadError::Resolve(e) => {
                        self.logger.log_stream_resolution_error(&pending.key.to_string(), &e.to_string())
                    }
                    other => self.logger.log_channel_error(&pending.key.to_string(), &other.to_string()),
                }
                if !self.status.is_paused() {
                    self.on_error(&pending.key);
                }
                return;
            }
        };

        if loaded.changed {
            if let Some(index) = self.queue.update_song_info(&pending.key, loaded.song.clone()) {
                self.notify(PlayerNotification::SongInfo {
                    index,
                    song: loaded.song.clone(),
                });
            }
        }

        // Subscribe before lay-in so the played event of this epoch is seen
        self.events = Some(loaded.channel.subscribe());
        self.active = Some(ActiveChannel {
            key: pending.key,
            channel: loaded.channel,
            start_offset: Some(loaded.stream.start_offset),
        });

        if !self.status.is_paused() {
            self.set_status(PlaybackStatus::Playing);
            self.lay_in_active();
        }
    }

    fn on_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Played => {
                self.recovery.record_playback_started();
                self.notify(PlayerNotification::ErrorStatus(self.recovery.status()));
                self.reconcile_window();
            }
            ChannelEvent::Ended | ChannelEvent::FadeComplete => {
                if self.end_throttle.accept(Instant::now()) {
                    self.on_end();
                } else {
                    debug!("Dropping repeated end event");
                }
            }
            ChannelEvent::Error(err) => {
                let Some(key) = self.active.as_ref().map(|active| active.key.clone()) else {
                    return;
                };
                self.logger.log_channel_error(&key.to_string(), &err.to_string());
                if !self.status.is_paused() {
                    self.on_error(&key);
                }
            }
            ChannelEvent::FadeTrigger => {
                if let Some(active) = &self.active {
                    active.channel.lay_out();
                }
            }
            ChannelEvent::Released => {
                self.events = None;
                self.active = None;
                if !self.status.is_paused() && self.queue.current_song().is_some() {
                    self.schedule_transition(Duration::ZERO);
                }
            }
        }
    }

    fn on_end(&mut self) {
        let Some(current) = self.queue.current_index() else {
            return;
        };

        match self.queue.step_from(current, 1, self.config.loop_playlist) {
            Some(next) => {
                self.select_index(next);
                self.schedule_transition(END_SETTLE);
            }
            None => {
                info!("Reached the end of the playlist");
                self.detach_active();
                self.logger.log_playback_paused(None);
                self.set_status(PlaybackStatus::Paused);
            }
        }
    }

    fn on_error(&mut self, key: &SongKey) {
        let decision = self.recovery.record_error(key);
        self.notify(PlayerNotification::ErrorStatus(self.recovery.status()));

        if decision.pause {
            self.set_status(PlaybackStatus::Paused);
        }
        if decision.skip {
            if let Some(next) = self
                .queue
                .current_index()
                .and_then(|current| self.queue.normalize(current + 1, self.config.loop_playlist))
            {
                self.select_index(next);
            }
            self.recovery.reset_song();
            self.notify(PlayerNotification::ErrorStatus(self.recovery.status()));
        }
        self.schedule_transition(decision.delay);
    }

    /// Make `index` current, clearing the song-scoped error count when the
    /// song actually changes
    fn select_index(&mut self, index: usize) {
        let previous = self.queue.current_song().cloned();
        if self.queue.set_current(index).is_err() {
            return;
        }
        let Some(song) = self.queue.current_song().cloned() else {
            return;
        };

        if previous.as_ref().map(PlayerSong::key) != Some(song.key()) {
            self.recovery.reset_song();
        }
        let from = previous.as_ref().map(PlayerSong::display_name);
        self.logger
            .log_track_changed(from.as_deref(), &song.display_name(), index);
        self.notify(PlayerNotification::IndexChanged(Some(index)));
    }

    /// Keep the current song and the next few loaded, release the rest
    fn reconcile_window(&mut self) {
        let window = self
            .queue
            .window(self.config.preload_count, self.config.loop_playlist);
        self.pool.reconcile(&window, self.config.fade);
    }

    fn set_status(&mut self, status: PlaybackStatus) {
        if self.status != status {
            debug!("Status {} -> {}", self.status, status);
            self.status = status;
            self.notify(PlayerNotification::StatusChanged(status));
        }
    }

    fn notify(&self, notification: PlayerNotification) {
        // Nobody listening is fine
        let _ = self.notifications.send(notification);
    }

    fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            status: self.status,
            current_index: self.queue.current_index(),
            current_song: self.queue.current_song().cloned(),
            position_ms: self
                .active
                .as_ref()
                .map(|active| active.channel.position().as_millis() as u64),
            song_count: self.queue.len(),
            error_status: self.recovery.status(),
            bound_channels: self.pool.bound_len(),
            free_channels: self.pool.free_len(),
        }
    }

    fn shutdown(&mut self) {
        self.click.clear();
        self.pending_transition = None;
        self.pending_load = None;
        self.detach_active();
        self.pool.shutdown();
        self.set_status(PlaybackStatus::Paused);
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn next_event(events: &mut Option<broadcast::Receiver<ChannelEvent>>) -> Result<ChannelEvent, RecvError> {
    match events {
        Some(receiver) => receiver.recv().await,
        None => std::future::pending().await,
    }
}

async fn next_load(pending: &Option<PendingLoad>) -> Result<LoadedChannel, PreloadError> {
    match pending {
        Some(pending) => pending.future.clone().await,
        None => std::future::pending().await,
    }
}
