use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use tokio::sync::{broadcast, mpsc};

use poolplay::channel::SimulatedChannelFactory;
use poolplay::cli::{CliApp, Commands, ConfigAction, PlaylistAction, SessionCommand, StatusDisplay};
use poolplay::config::ConfigManager;
use poolplay::error::{ErrorSeverity, PlayerError};
use poolplay::logging::PlayerLogger;
use poolplay::models::{FadeConfig, PlayerSong, SongKey};
use poolplay::player::{Orchestrator, PlayerHandle, PlayerNotification};
use poolplay::queue::playlist::{Playlist, PlaylistStore};
use poolplay::resolver::CatalogResolver;

/// Interactive playback session over one loaded playlist.
///
/// Keeps a mirror of the song list so it can print the list and map song
/// numbers to keys without a round trip to the orchestrator.
struct Session {
    handle: PlayerHandle,
    songs: Vec<PlayerSong>,
    durations: HashMap<SongKey, Duration>,
    logger: PlayerLogger,
}

impl Session {
    fn start(playlist: &Playlist, config_manager: &ConfigManager, logger: PlayerLogger) -> Self {
        let resolver = Arc::new(CatalogResolver::from_playlist(playlist));
        let factory = Arc::new(SimulatedChannelFactory::new());
        let handle = Orchestrator::new(config_manager.get_config().clone(), factory, resolver, logger.clone()).spawn();

        let durations = playlist
            .songs
            .iter()
            .map(|entry| (entry.song().key(), Duration::from_millis(entry.duration_ms)))
            .collect();

        Self {
            handle,
            songs: playlist.player_songs(),
            durations,
            logger,
        }
    }

    fn key_at(&self, index: usize) -> Result<SongKey, PlayerError> {
        self.songs
            .get(index)
            .map(PlayerSong::key)
            .ok_or_else(|| {
                poolplay::PreconditionViolation::IndexOutOfRange {
                    index,
                    len: self.songs.len(),
                }
                .into()
            })
    }

    /// Returns `false` when the session should end
    async fn execute(&mut self, command: SessionCommand) -> Result<bool, PlayerError> {
        match command {
            SessionCommand::Play { index: Some(index) } => self.handle.play_at(index).await?,
            SessionCommand::Play { index: None } | SessionCommand::Resume => self.handle.resume()?,
            SessionCommand::Pause => self.handle.pause()?,
            SessionCommand::Toggle => self.handle.toggle()?,
            SessionCommand::Next => self.handle.next().await?,
            SessionCommand::Prev => self.handle.previous().await?,
            SessionCommand::Seek { position } => {
                self.handle.seek(position).await?;
                println!("Seeked to: {}", CliApp::format_duration(position));
            }
            SessionCommand::Status => {
                let snapshot = self.handle.snapshot().await?;
                let duration = snapshot
                    .current_song
                    .as_ref()
                    .and_then(|song| self.durations.get(&song.key()).copied());
                StatusDisplay::display_full_status(&snapshot, duration);
                println!("{}", StatusDisplay::format_event_statistics(&self.logger.get_event_statistics()));
            }
            SessionCommand::List => {
                let snapshot = self.handle.snapshot().await?;
                StatusDisplay::display_song_list(&self.songs, snapshot.current_index);
            }
            SessionCommand::Remove { index } => {
                let key = self.key_at(index)?;
                // Duplicates resolve to the first entry for the key
                let removed = self.handle.remove(key).await?;
                let removed = self.songs.remove(removed);
                println!("Removed: {}", removed.display_name());
            }
            SessionCommand::Move { from, to } => {
                self.handle.move_song(from, to).await?;
                let song = self.songs.remove(from);
                self.songs.insert(to, song);
                println!("Moved song {} to position {}", from + 1, to + 1);
            }
            SessionCommand::Locate => self.handle.locate()?,
            SessionCommand::Help => CliApp::display_help(),
            SessionCommand::Exit => return Ok(false),
        }
        Ok(true)
    }

    /// Returns `true` if something was printed
    fn on_notification(&mut self, notification: PlayerNotification) -> bool {
        if let PlayerNotification::SongInfo { index, song } = &notification {
            if let Some(slot) = self.songs.get_mut(*index) {
                *slot = song.clone();
            }
        }
        match StatusDisplay::format_notification(&notification, &self.songs) {
            Some(line) => {
                println!("\n{}", line);
                true
            }
            None => false,
        }
    }
}

/// Main application controller that coordinates all components
pub struct AppController {
    config_manager: ConfigManager,
    logger: PlayerLogger,
}

impl AppController {
    /// Create a new application controller
    pub fn new(cli: &CliApp) -> Result<Self, PlayerError> {
        // Initialize logging first (default to 'warn' if unspecified)
        if let Err(e) = PlayerLogger::init("warn") {
            eprintln!("Warning: Failed to initialize logging: {}", e);
        }

        let config_manager = match &cli.config {
            Some(path) => ConfigManager::with_path(CliApp::expand_path(&path.to_string_lossy()))?,
            None => ConfigManager::new()?,
        };

        info!(
            "Application controller initialized with {}",
            config_manager.config_path().display()
        );

        Ok(Self {
            config_manager,
            logger: PlayerLogger::new(),
        })
    }

    fn playlist_store(&self) -> Result<PlaylistStore, PlayerError> {
        let directory = self.config_manager.get_config().playlist_directory.clone();
        let directory = CliApp::expand_path(&directory.to_string_lossy());
        Ok(PlaylistStore::new(directory)?)
    }

    /// Execute a single command
    pub async fn execute_command(&mut self, command: Commands) -> Result<(), PlayerError> {
        match command {
            Commands::Play {
                playlist,
                index,
                paused,
            } => {
                let playlist = self.playlist_store()?.load(&playlist)?;
                let mut session = Session::start(&playlist, &self.config_manager, self.logger.clone());
                session
                    .handle
                    .load_playlist(session.songs.clone(), index.map(|n| n.saturating_sub(1)), !paused)
                    .await?;
                self.run_interactive_mode(&mut session).await?;
            }
            Commands::Playlist { action } => {
                let store = self.playlist_store()?;
                match action {
                    PlaylistAction::List => {
                        let playlists = store.list()?;
                        if playlists.is_empty() {
                            println!("No playlists found in {}", store.directory().display());
                        } else {
                            println!("Available playlists:");
                            for playlist in playlists {
                                println!("  {}", playlist);
                            }
                        }
                    }
                    PlaylistAction::Show { name } => {
                        StatusDisplay::display_playlist(&store.load(&name)?);
                    }
                    PlaylistAction::Delete { name } => {
                        store.delete(&name)?;
                        println!("Playlist deleted: {}", name);
                    }
                }
            }
            Commands::Config { action } => match action {
                ConfigAction::Show => {
                    println!("Config file: {}", self.config_manager.config_path().display());
                    StatusDisplay::display_config(self.config_manager.get_config());
                }
                ConfigAction::Reset => {
                    self.config_manager.reset_to_defaults()?;
                    println!("OK: Configuration reset to defaults");
                }
                ConfigAction::Retries { player, song } => {
                    self.config_manager.set_retries(player, song)?;
                    let retry = &self.config_manager.get_config().error_retry;
                    println!(
                        "OK: Pause after {} failures, skip a song after {}",
                        retry.player_retries, retry.song_retries
                    );
                }
                ConfigAction::Fade {
                    fade_in,
                    offset,
                    fade_out,
                } => {
                    self.config_manager.set_fade(FadeConfig {
                        fade_in_ms: fade_in,
                        fade_out_offset_ms: offset,
                        fade_out_ms: fade_out,
                    })?;
                    println!("OK: Fade updated");
                }
                ConfigAction::Preload { count } => {
                    self.config_manager.set_preload_count(count)?;
                    println!("OK: Preloading {} songs ahead", count);
                }
                ConfigAction::Quality { quality } => {
                    self.config_manager.set_quality(quality)?;
                    println!("OK: Quality {}", quality.as_str());
                }
                ConfigAction::Playlists { directory } => {
                    self.config_manager.set_playlist_directory(CliApp::expand_path(&directory))?;
                    println!("OK: Playlists stored in {}", directory);
                }
            },
        }

        Ok(())
    }

    /// Run the interactive session until exit, EOF or Ctrl-C
    async fn run_interactive_mode(&mut self, session: &mut Session) -> Result<(), PlayerError> {
        println!("poolplay v0.1.0");
        println!("Type 'help' for available commands, 'exit' or 'quit' to quit.");
        println!();

        let (interrupt_tx, mut interrupt_rx) = mpsc::unbounded_channel::<()>();
        if let Err(e) = ctrlc::set_handler(move || {
            let _ = interrupt_tx.send(());
        }) {
            warn!("Could not install Ctrl-C handler: {}", e);
        }

        // Blocking stdin reads live on their own thread
        let (tx, mut lines) = mpsc::unbounded_channel::<String>();
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            let mut line = String::new();
            loop {
                line.clear();
                match stdin.read_line(&mut line) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        if tx.send(line.trim().to_string()).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        let mut notifications = session.handle.subscribe();
        let mut awaiting_input = false;

        loop {
            if !awaiting_input {
                print!("> ");
                let _ = std::io::Write::flush(&mut std::io::stdout());
                awaiting_input = true;
            }

            tokio::select! {
                biased;

                _ = interrupt_rx.recv() => {
                    println!("\nReceived interrupt signal. Shutting down gracefully...");
                    break;
                }

                line = lines.recv() => {
                    awaiting_input = false;
                    let Some(line) = line else {
                        println!();
                        break;
                    };
                    if line.is_empty() {
                        continue;
                    }
                    let outcome = match CliApp::parse_command(&line) {
                        Ok(command) => session.execute(command).await,
                        Err(e) => Err(e.into()),
                    };
                    match outcome {
                        Ok(true) => {}
                        Ok(false) => {
                            println!("Goodbye!");
                            break;
                        }
                        Err(PlayerError::Disconnected) => {
                            StatusDisplay::display_error(&PlayerError::Disconnected);
                            return Err(PlayerError::Disconnected);
                        }
                        Err(e) => self.handle_error(&e),
                    }
                }

                notification = notifications.recv() => match notification {
                    Ok(notification) => {
                        if session.on_notification(notification) {
                            awaiting_input = false;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Missed {} player notifications", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        error!("Player notifications closed");
                        break;
                    }
                }
            }
        }

        self.shutdown(session).await
    }

    /// Stop the orchestrator and release its channels
    async fn shutdown(&mut self, session: &Session) -> Result<(), PlayerError> {
        println!("Shutting down...");

        match session.handle.shutdown().await {
            Ok(()) | Err(PlayerError::Disconnected) => {}
            Err(e) => eprintln!("Warning: Error stopping player: {}", e),
        }

        let stats = self.logger.get_event_statistics();
        info!("Session finished: {:?}", stats);
        println!("Shutdown complete.");
        Ok(())
    }

    fn handle_error(&self, error: &PlayerError) {
        log::log!(error.severity().log_level(), "{}", error);

        if matches!(error.severity(), ErrorSeverity::Info) {
            StatusDisplay::display_simple_error(error);
        } else {
            StatusDisplay::display_error(error);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = CliApp::parse();

    let mut app = match AppController::new(&cli) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Failed to initialize application: {}", e);
            StatusDisplay::display_simple_error(&e);
            std::process::exit(1);
        }
    };

    if let Err(e) = app.execute_command(cli.command).await {
        app.handle_error(&e);
        std::process::exit(1);
    }

    info!("Application shutdown complete");
}
