use thiserror::Error;

/// Main player error type
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("Stream resolution error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Invalid request: {0}")]
    Precondition(#[from] PreconditionViolation),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Playlist error: {0}")]
    Playlist(#[from] PlaylistError),

    #[error("CLI parse error: {0}")]
    Parse(#[from] crate::cli::ParseError),

    #[error("Player is not running")]
    Disconnected,
}

impl PlayerError {
    /// Get user-friendly error message with suggested solutions
    pub fn user_message(&self) -> String {
        match self {
            PlayerError::Resolve(err) => err.user_message(),
            PlayerError::Channel(err) => err.user_message(),
            PlayerError::Precondition(err) => err.user_message(),
            PlayerError::Config(err) => err.user_message(),
            PlayerError::Playlist(err) => err.user_message(),
            PlayerError::Parse(err) => format!("Command error: {}", err),
            PlayerError::Disconnected => "The playback engine has stopped".to_string(),
        }
    }

    /// Get suggested recovery actions for the error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            PlayerError::Resolve(err) => err.recovery_suggestions(),
            PlayerError::Channel(err) => err.recovery_suggestions(),
            PlayerError::Precondition(err) => err.recovery_suggestions(),
            PlayerError::Config(err) => err.recovery_suggestions(),
            PlayerError::Playlist(err) => err.recovery_suggestions(),
            PlayerError::Parse(_) => vec!["Type 'help' to see available commands".to_string()],
            PlayerError::Disconnected => vec!["Restart the application".to_string()],
        }
    }

    /// Check if this error allows for automatic recovery
    pub fn is_recoverable(&self) -> bool {
        match self {
            PlayerError::Resolve(err) => err.is_recoverable(),
            PlayerError::Channel(err) => err.is_recoverable(),
            PlayerError::Precondition(_) => false, // Caller must fix the request
            PlayerError::Config(err) => err.is_recoverable(),
            PlayerError::Playlist(err) => err.is_recoverable(),
            PlayerError::Parse(_) => false, // Parse errors require correct input
            PlayerError::Disconnected => false,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            PlayerError::Resolve(ResolveError::Network(_)) => ErrorSeverity::Warning,
            PlayerError::Resolve(_) => ErrorSeverity::Error,
            PlayerError::Channel(ChannelError::Released) => ErrorSeverity::Info,
            PlayerError::Channel(ChannelError::Seek(_)) => ErrorSeverity::Warning,
            PlayerError::Channel(_) => ErrorSeverity::Error,
            PlayerError::Precondition(PreconditionViolation::EmptyPlaylist) => ErrorSeverity::Info,
            PlayerError::Precondition(_) => ErrorSeverity::Warning,
            PlayerError::Config(_) => ErrorSeverity::Warning,
            PlayerError::Playlist(_) => ErrorSeverity::Warning,
            PlayerError::Parse(_) => ErrorSeverity::Info,
            PlayerError::Disconnected => ErrorSeverity::Critical,
        }
    }
}

/// Error severity levels for logging and user feedback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl ErrorSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorSeverity::Info => "INFO",
            ErrorSeverity::Warning => "WARNING",
            ErrorSeverity::Error => "ERROR",
            ErrorSeverity::Critical => "CRITICAL",
        }
    }

    pub fn log_level(&self) -> log::Level {
        match self {
            ErrorSeverity::Info => log::Level::Info,
            ErrorSeverity::Warning => log::Level::Warn,
            ErrorSeverity::Error => log::Level::Error,
            ErrorSeverity::Critical => log::Level::Error,
        }
    }
}

/// Failures of the metadata service while turning a song into a playable stream.
///
/// Cloned into every subscriber of a shared preload, hence `Clone`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("Song not found: {key}")]
    NotFound { key: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Access denied for {key}")]
    Denied { key: String },
}

impl ResolveError {
    pub fn user_message(&self) -> String {
        match self {
            ResolveError::NotFound { key } => {
                format!("No playable source was found for song {}", key)
            }
            ResolveError::Network(msg) => {
                format!("Could not reach the music service: {}", msg)
            }
            ResolveError::Denied { key } => {
                format!("The provider does not allow streaming song {}", key)
            }
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            ResolveError::NotFound { .. } => vec![
                "The player will skip to the next song after repeated failures".to_string(),
                "Try the same song from another provider".to_string(),
            ],
            ResolveError::Network(_) => vec![
                "Check your network connection".to_string(),
                "Playback is retried automatically with increasing delays".to_string(),
            ],
            ResolveError::Denied { .. } => vec![
                "Log in to the provider or pick another version of the song".to_string(),
            ],
        }
    }

    pub fn is_recoverable(&self) -> bool {
        // All resolution failures go through the retry policy
        true
    }
}

/// Failures reported by a playback channel
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Seek failed: {0}")]
    Seek(String),

    #[error("No source loaded")]
    NoSource,

    #[error("Channel was released")]
    Released,
}

impl ChannelError {
    pub fn user_message(&self) -> String {
        match self {
            ChannelError::Decode(msg) => format!("The audio stream could not be decoded: {}", msg),
            ChannelError::Network(msg) => format!("Audio stream interrupted: {}", msg),
            ChannelError::Seek(msg) => format!("Cannot seek: {}", msg),
            ChannelError::NoSource => "Nothing is loaded on this channel".to_string(),
            ChannelError::Released => "The channel was returned to the pool".to_string(),
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            ChannelError::Decode(_) => vec![
                "Try a lower quality setting".to_string(),
                "The player will skip the song after repeated failures".to_string(),
            ],
            ChannelError::Network(_) => vec![
                "Check your network connection".to_string(),
                "Playback is retried automatically".to_string(),
            ],
            ChannelError::Seek(_) => vec![
                "Use a position within the song's duration".to_string(),
            ],
            ChannelError::NoSource | ChannelError::Released => vec![
                "Start playback again with 'play'".to_string(),
            ],
        }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            ChannelError::Decode(_) => true,
            ChannelError::Network(_) => true,
            ChannelError::Seek(_) => false,
            ChannelError::NoSource => true,
            ChannelError::Released => false, // The channel is gone
        }
    }
}

/// Rejected requests. Returned to the caller, never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionViolation {
    #[error("Playlist is empty")]
    EmptyPlaylist,

    #[error("Index {index} is out of range for playlist of {len} songs")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Song {key} is not in the playlist")]
    SongNotInPlaylist { key: String },
}

impl PreconditionViolation {
    pub fn user_message(&self) -> String {
        match self {
            PreconditionViolation::EmptyPlaylist => {
                "No songs in the playlist - load a playlist first".to_string()
            }
            PreconditionViolation::IndexOutOfRange { index, len } => {
                format!("Song number {} is not valid, the playlist has {} songs", index + 1, len)
            }
            PreconditionViolation::SongNotInPlaylist { key } => {
                format!("Song {} is not part of the current playlist", key)
            }
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            PreconditionViolation::EmptyPlaylist => vec![
                "Use 'playlist list' to see saved playlists".to_string(),
            ],
            PreconditionViolation::IndexOutOfRange { .. } => vec![
                "Use 'list' to see the songs in the playlist".to_string(),
                "Song numbers start from 1".to_string(),
            ],
            PreconditionViolation::SongNotInPlaylist { .. } => vec![
                "Use 'list' to see the songs in the playlist".to_string(),
            ],
        }
    }
}

/// Errors observed while bringing a song's channel up.
///
/// Shared between the pool and the orchestrator, hence `Clone`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreloadError {
    #[error("{0}")]
    Resolve(#[from] ResolveError),

    #[error("{0}")]
    Channel(#[from] ChannelError),

    #[error("Preload cancelled")]
    Cancelled,
}

/// Failures reading or writing `config.toml`
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No home directory to keep settings in")]
    NoHomeDirectory,

    #[error("Config file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not encode settings: {0}")]
    Write(#[from] toml::ser::Error),

    #[error("Could not parse settings: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ConfigError {
    pub fn user_message(&self) -> String {
        match self {
            ConfigError::NoHomeDirectory => "Settings cannot be stored: no home directory".to_string(),
            ConfigError::Io(err) => format!("Settings file could not be read or written ({})", err),
            ConfigError::Write(_) => "Settings could not be written".to_string(),
            ConfigError::Parse(err) => format!("Settings file is not valid TOML: {}", err),
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            ConfigError::NoHomeDirectory => vec![
                "Set HOME, or pass a settings file with --config".to_string(),
            ],
            ConfigError::Io(_) => vec![
                "Make sure ~/.config/poolplay is writable".to_string(),
                "Pass another settings file with --config".to_string(),
            ],
            ConfigError::Write(_) => vec!["Run 'poolplay config reset'".to_string()],
            ConfigError::Parse(_) => vec![
                "Fix the reported line, or run 'poolplay config reset'".to_string(),
            ],
        }
    }

    pub fn is_recoverable(&self) -> bool {
        // The player can always fall back to built-in settings
        true
    }
}

/// Failures of the on-disk playlist store
#[derive(Debug, Error)]
pub enum PlaylistError {
    #[error("No playlist named '{name}'")]
    NotFound { name: String },

    #[error("Bad playlist: {0}")]
    Invalid(String),

    #[error("Could not encode playlist: {0}")]
    Write(#[from] toml::ser::Error),

    #[error("Playlist file I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl PlaylistError {
    pub fn user_message(&self) -> String {
        match self {
            PlaylistError::NotFound { name } => format!("There is no saved playlist called '{}'", name),
            PlaylistError::Invalid(reason) => format!("The playlist cannot be used: {}", reason),
            PlaylistError::Write(_) => "The playlist could not be saved".to_string(),
            PlaylistError::Io(err) => format!("Playlist storage is unavailable ({})", err),
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            PlaylistError::NotFound { .. } => vec![
                "Run 'poolplay playlist list' for the saved names".to_string(),
            ],
            PlaylistError::Invalid(_) => vec![
                "Each song needs id, provider, name, url and duration_ms in a [[songs]] table"
                    .to_string(),
            ],
            PlaylistError::Write(_) => Vec::new(),
            PlaylistError::Io(_) => vec![
                "Check playlist_directory in the settings file".to_string(),
            ],
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self, PlaylistError::Io(_))
    }
}
