use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::models::QualityHint;

pub mod status;
pub use status::StatusDisplay;

/// Pool-backed music streaming player
#[derive(Parser)]
#[command(name = "poolplay")]
#[command(about = "A streaming music player with channel pooling and preloading")]
#[command(version = "0.1.0")]
pub struct CliApp {
    /// Use this configuration file instead of the default one
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Play a saved playlist in an interactive session
    Play {
        /// Playlist name
        playlist: String,
        /// Song number to start from (1-based)
        #[arg(long)]
        index: Option<usize>,
        /// Prepare the first song without starting playback
        #[arg(long)]
        paused: bool,
    },
    /// Playlist management commands
    Playlist {
        #[command(subcommand)]
        action: PlaylistAction,
    },
    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Playlist management subcommands
#[derive(Debug, Subcommand)]
pub enum PlaylistAction {
    /// List available playlists
    List,
    /// Show the songs of a playlist
    Show {
        /// Playlist name
        name: String,
    },
    /// Delete a playlist
    Delete {
        /// Playlist name
        name: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the active configuration
    Show,
    /// Restore the default configuration
    Reset,
    /// Failures tolerated before pausing, and per song before skipping
    Retries { player: u32, song: u32 },
    /// Fade envelope in milliseconds
    Fade {
        #[arg(long = "in")]
        fade_in: u64,
        /// How long before the end the fade-out starts (0 disables it)
        #[arg(long)]
        offset: u64,
        #[arg(long = "out")]
        fade_out: u64,
    },
    /// Number of upcoming songs to preload
    Preload { count: usize },
    /// Stream quality: standard, high or lossless
    Quality { quality: QualityHint },
    /// Directory playlists are stored in
    Playlists { directory: String },
}

/// Commands accepted inside an interactive session. Song numbers are typed
/// 1-based and stored 0-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Play a song, or resume the current one
    Play { index: Option<usize> },
    Pause,
    Resume,
    Toggle,
    Next,
    Prev,
    Seek { position: Duration },
    Status,
    List,
    Remove { index: usize },
    Move { from: usize, to: usize },
    Locate,
    Help,
    Exit,
}

impl CliApp {
    /// Parse command line arguments
    pub fn parse() -> Self {
        <Self as clap::Parser>::parse()
    }

    /// Expand tilde (~) in path to home directory
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            match dirs::home_dir() {
                Some(home_dir) => home_dir.join(rest),
                None => PathBuf::from(path),
            }
        } else if path == "~" {
            dirs::home_dir().unwrap_or_else(|| PathBuf::from(path))
        } else {
            PathBuf::from(path)
        }
    }

    /// Parse a line typed in the interactive session
    pub fn parse_command(input: &str) -> Result<SessionCommand, ParseError> {
        let args: Vec<&str> = input.split_whitespace().collect();
        let Some(command) = args.first() else {
            return Err(ParseError::EmptyCommand);
        };

        match *command {
            "play" | "p" => match args.get(1) {
                Some(value) => Ok(SessionCommand::Play {
                    index: Some(Self::parse_song_number(value)?),
                }),
                None => Ok(SessionCommand::Play { index: None }),
            },
            "pause" => Ok(SessionCommand::Pause),
            "resume" => Ok(SessionCommand::Resume),
            "toggle" | "t" => Ok(SessionCommand::Toggle),
            "next" | "n" => Ok(SessionCommand::Next),
            "prev" | "previous" => Ok(SessionCommand::Prev),
            "seek" => {
                let value = Self::required(&args, 1, "seek", "position")?;
                Ok(SessionCommand::Seek {
                    position: Self::parse_time(value)?,
                })
            }
            "status" | "s" => Ok(SessionCommand::Status),
            "list" | "ls" => Ok(SessionCommand::List),
            "remove" | "rm" => {
                let value = Self::required(&args, 1, "remove", "song number")?;
                Ok(SessionCommand::Remove {
                    index: Self::parse_song_number(value)?,
                })
            }
            "move" | "mv" => {
                let from = Self::required(&args, 1, "move", "from")?;
                let to = Self::required(&args, 2, "move", "to")?;
                Ok(SessionCommand::Move {
                    from: Self::parse_song_number(from)?,
                    to: Self::parse_song_number(to)?,
                })
            }
            "locate" => Ok(SessionCommand::Locate),
            "help" | "h" | "?" => Ok(SessionCommand::Help),
            "exit" | "quit" | "q" => Ok(SessionCommand::Exit),
            other => Err(ParseError::UnknownCommand {
                command: other.to_string(),
            }),
        }
    }

    fn required<'a>(args: &[&'a str], position: usize, command: &str, argument: &str) -> Result<&'a str, ParseError> {
        args.get(position).copied().ok_or_else(|| ParseError::MissingArgument {
            command: command.to_string(),
            argument: argument.to_string(),
        })
    }

    /// Parse a 1-based song number into a 0-based index
    pub fn parse_song_number(value: &str) -> Result<usize, ParseError> {
        match value.parse::<usize>() {
            Ok(number) if number >= 1 => Ok(number - 1),
            _ => Err(ParseError::InvalidArgument {
                argument: "song number".to_string(),
                value: value.to_string(),
                expected: "a number starting from 1".to_string(),
            }),
        }
    }

    /// Display help information
    pub fn display_help() {
        println!("poolplay - Available Commands:");
        println!();
        println!("Playback Control:");
        println!("  play [n]          - Play song n, or resume the current song");
        println!("  pause             - Pause playback");
        println!("  resume            - Resume playback");
        println!("  toggle            - Switch between pause and play");
        println!("  next              - Next song");
        println!("  prev              - Previous song");
        println!("  seek <time>       - Seek to position (e.g., '1:30', '90s')");
        println!();
        println!("Playlist:");
        println!("  list              - List the songs in the playlist");
        println!("  remove <n>        - Remove song n");
        println!("  move <from> <to>  - Move a song to a new position");
        println!("  locate            - Show where the current song is");
        println!();
        println!("General:");
        println!("  status            - Show current player status");
        println!("  help              - Show this help message");
        println!("  exit, quit        - Exit the player");
    }

    /// Parse time string to Duration
    pub fn parse_time(time_str: &str) -> Result<Duration, ParseError> {
        let trimmed = time_str.trim();
        let invalid = || ParseError::InvalidTimeFormat {
            input: time_str.to_string(),
        };

        if trimmed.is_empty() {
            return Err(invalid());
        }

        // "1:30", "1:30.5", "90", "90s"
        if let Some((minutes, seconds)) = trimmed.split_once(':') {
            let minutes: u64 = minutes.parse().map_err(|_| invalid())?;
            let seconds: f64 = seconds.parse().map_err(|_| invalid())?;
            if !(0.0..60.0).contains(&seconds) {
                return Err(invalid());
            }
            Ok(Duration::from_secs_f64(minutes as f64 * 60.0 + seconds))
        } else {
            let seconds: f64 = trimmed.trim_end_matches('s').parse().map_err(|_| invalid())?;
            if !seconds.is_finite() || seconds < 0.0 {
                return Err(invalid());
            }
            Ok(Duration::from_secs_f64(seconds))
        }
    }

    /// Format duration for display
    pub fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
    }
}

/// Command parsing errors
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Empty command")]
    EmptyCommand,

    #[error("Unknown command: {command}")]
    UnknownCommand { command: String },

    #[error("Missing argument for {command}: {argument}")]
    MissingArgument { command: String, argument: String },

    #[error("Invalid argument {argument}: got '{value}', expected {expected}")]
    InvalidArgument {
        argument: String,
        value: String,
        expected: String,
    },

    #[error("Invalid time format: {input}")]
    InvalidTimeFormat { input: String },
}

#[cfg(test)]
mod tests;
