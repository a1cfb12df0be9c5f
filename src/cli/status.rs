use std::time::Duration;

use crate::config::PlayerConfig;
use crate::error::{ErrorSeverity, PlayerError};
use crate::logging::EventStatistics;
use crate::models::{PlaybackStatus, PlayerSnapshot, PlayerSong};
use crate::player::PlayerNotification;
use crate::queue::playlist::Playlist;

/// Status display formatter for the CLI
pub struct StatusDisplay;

impl StatusDisplay {
    /// Display the player snapshot with the current song and pool usage
    pub fn display_full_status(snapshot: &PlayerSnapshot, duration: Option<Duration>) {
        println!("┌─ Player Status ─────────────────────────────────────────┐");

        match &snapshot.current_song {
            Some(song) => {
                let number = snapshot.current_index.map(|i| i + 1).unwrap_or(0);
                println!("│ Song {}/{}: {}", number, snapshot.song_count, Self::truncate(&song.name, 44));
                println!("│ Artist: {}", Self::truncate(&song.artist_names(), 49));
                if let Some(album) = &song.album {
                    println!("│ Album: {}", Self::truncate(&album.name, 50));
                }
                println!("│ Source: {}", song.key());
            }
            None => println!("│ No song selected"),
        }

        println!("│");
        println!("│ Status: {}", Self::format_status(snapshot.status));
        if let Some(position_ms) = snapshot.position_ms {
            let position = Duration::from_millis(position_ms);
            match duration {
                Some(duration) if !duration.is_zero() => {
                    let progress = (position.as_secs_f32() / duration.as_secs_f32()).min(1.0);
                    println!(
                        "│ Position: {} / {}",
                        Self::format_duration(position),
                        Self::format_duration(duration)
                    );
                    println!(
                        "│ Progress: [{}] {:.1}%",
                        Self::create_progress_bar(progress, 40),
                        progress * 100.0
                    );
                }
                _ => println!("│ Position: {}", Self::format_duration(position)),
            }
        }

        println!("│");
        println!(
            "│ Errors: {} on this song, {} in a row",
            snapshot.error_status.total, snapshot.error_status.continuous
        );
        println!(
            "│ Channels: {} bound, {} idle",
            snapshot.bound_channels, snapshot.free_channels
        );
        println!("└─────────────────────────────────────────────────────────┘");
    }

    /// Session counters from the event history
    pub fn format_event_statistics(stats: &EventStatistics) -> String {
        format!(
            "Session: {} track changes, {} retries, {} skips, {} channel errors, {} failed resolutions, {} channels allocated",
            stats.track_changes,
            stats.retries,
            stats.skips,
            stats.channel_errors,
            stats.resolution_errors,
            stats.channel_allocations
        )
    }

    /// One line per song, marking the current one
    pub fn display_song_list<'a>(songs: impl IntoIterator<Item = &'a PlayerSong>, current: Option<usize>) {
        let mut empty = true;
        for (index, song) in songs.into_iter().enumerate() {
            empty = false;
            println!("{}", Self::format_song_line(index, song, current == Some(index)));
        }
        if empty {
            println!("Playlist is empty");
        }
    }

    pub fn format_song_line(index: usize, song: &PlayerSong, current: bool) -> String {
        let marker = if current { "▶" } else { " " };
        format!("{} {:>3}. {}", marker, index + 1, Self::truncate(&song.display_name(), 60))
    }

    /// Display a stored playlist with durations
    pub fn display_playlist(playlist: &Playlist) {
        println!(
            "{} ({} songs, {})",
            playlist.name,
            playlist.songs.len(),
            Self::format_duration(playlist.total_duration())
        );
        for (index, entry) in playlist.songs.iter().enumerate() {
            println!(
                "  {:>3}. {} [{}]",
                index + 1,
                Self::truncate(&entry.song().display_name(), 55),
                Self::format_duration(Duration::from_millis(entry.duration_ms))
            );
        }
    }

    pub fn display_config(config: &PlayerConfig) {
        println!("┌─ Configuration ─────────────────────────────────────────┐");
        println!("│ Quality: {}", config.quality.as_str());
        println!("│ Preload: {} songs ahead", config.preload_count);
        println!("│ Idle channels kept: {}", config.free_channel_capacity);
        println!("│ Click throttle: {}ms", config.throttle_window_ms);
        println!("│ Loop playlist: {}", if config.loop_playlist { "yes" } else { "no" });
        println!(
            "│ Fade: in {}ms, out {}ms, trigger {}ms before end",
            config.fade.fade_in_ms, config.fade.fade_out_ms, config.fade.fade_out_offset_ms
        );
        println!(
            "│ Retries: pause after {}, skip after {}, backoff {}ms",
            config.error_retry.player_retries,
            config.error_retry.song_retries,
            config.error_retry.backoff_base_ms
        );
        println!(
            "│ Playlists: {}",
            Self::truncate(&config.playlist_directory.display().to_string(), 46)
        );
        println!("└─────────────────────────────────────────────────────────┘");
    }

    /// Human readable line for a notification, if it is worth showing
    pub fn format_notification(notification: &PlayerNotification, songs: &[PlayerSong]) -> Option<String> {
        match notification {
            PlayerNotification::StatusChanged(PlaybackStatus::Playing) => None,
            PlayerNotification::StatusChanged(status) => Some(Self::format_status(*status)),
            PlayerNotification::IndexChanged(Some(index)) => songs
                .get(*index)
                .map(|song| format!("♪ Now playing: {}", song.display_name())),
            PlayerNotification::IndexChanged(None) => None,
            PlayerNotification::Locate(Some(index)) => Some(format!("Current song is number {}", index + 1)),
            PlayerNotification::Locate(None) => Some("No current song".to_string()),
            PlayerNotification::SongInfo { index, song } => {
                Some(format!("Updated song {}: {}", index + 1, song.display_name()))
            }
            PlayerNotification::ErrorStatus(status) if status.continuous > 0 => Some(format!(
                "⚠ Playback failed ({} on this song, {} in a row)",
                status.total, status.continuous
            )),
            PlayerNotification::ErrorStatus(_) => None,
        }
    }

    /// Display error message with formatting and recovery suggestions
    pub fn display_error(error: &PlayerError) {
        let severity = error.severity();
        let severity_icon = match severity {
            ErrorSeverity::Info => "ℹ",
            ErrorSeverity::Warning => "⚠",
            ErrorSeverity::Error => "✗",
            ErrorSeverity::Critical => "🔥",
        };

        eprintln!("┌─ {} {} ─────────────────────────────────────────────────┐",
            severity_icon, severity.as_str());

        for line in Self::wrap_text(&error.user_message(), 55) {
            eprintln!("│ {}", line);
        }

        let suggestions = error.recovery_suggestions();
        if !suggestions.is_empty() {
            eprintln!("│");
            eprintln!("│ Suggestions:");
            for suggestion in suggestions.iter().take(3) {
                for line in Self::wrap_text(&format!("• {}", suggestion), 53) {
                    eprintln!("│   {}", line);
                }
            }
        }

        if error.is_recoverable() {
            eprintln!("│");
            eprintln!("│ The player keeps retrying on its own");
        }
        eprintln!("└─────────────────────────────────────────────────────────┘");
    }

    /// Display a simple error message for non-interactive contexts
    pub fn display_simple_error(error: &PlayerError) {
        eprintln!("[{}] {}", error.severity().as_str(), error.user_message());
        if let Some(suggestion) = error.recovery_suggestions().first() {
            eprintln!("Suggestion: {}", suggestion);
        }
    }

    /// Wrap text to fit within specified width
    fn wrap_text(text: &str, width: usize) -> Vec<String> {
        let mut lines = Vec::new();
        let mut current_line = String::new();

        for word in text.split_whitespace() {
            if current_line.is_empty() {
                current_line = word.to_string();
            } else if current_line.len() + word.len() < width {
                current_line.push(' ');
                current_line.push_str(word);
            } else {
                lines.push(std::mem::take(&mut current_line));
                current_line = word.to_string();
            }
        }

        if !current_line.is_empty() {
            lines.push(current_line);
        }
        lines
    }

    /// Format duration as MM:SS or HH:MM:SS for longer ones
    pub fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
        } else {
            format!("{:02}:{:02}", minutes, seconds)
        }
    }

    /// Truncate string to fit display width, on a character boundary
    pub fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len || max_len <= 3 {
            return s.to_string();
        }
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }

    pub fn create_progress_bar(progress: f32, width: usize) -> String {
        let filled = ((progress.clamp(0.0, 1.0)) * width as f32) as usize;
        format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
    }

    pub fn format_status(status: PlaybackStatus) -> String {
        match status {
            PlaybackStatus::Playing => "▶ Playing".to_string(),
            PlaybackStatus::Paused => "⏸ Paused".to_string(),
            PlaybackStatus::Loading => "… Loading".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PreconditionViolation;
    use crate::models::{ErrorStatus, Provider};

    fn song(id: &str, name: &str) -> PlayerSong {
        PlayerSong::new(id, Provider::Netease, name).with_artist("Artist")
    }

    fn snapshot() -> PlayerSnapshot {
        PlayerSnapshot {
            status: PlaybackStatus::Playing,
            current_index: Some(0),
            current_song: Some(song("1", "First")),
            position_ms: Some(42_000),
            song_count: 2,
            error_status: ErrorStatus::default(),
            bound_channels: 2,
            free_channels: 1,
        }
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(StatusDisplay::format_duration(Duration::from_secs(0)), "00:00");
        assert_eq!(StatusDisplay::format_duration(Duration::from_secs(125)), "02:05");
        assert_eq!(StatusDisplay::format_duration(Duration::from_secs(3725)), "01:02:05");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(StatusDisplay::truncate("short", 10), "short");
        assert_eq!(StatusDisplay::truncate("a longer title", 8), "a lon...");
        assert_eq!(StatusDisplay::truncate("abcdef", 3), "abcdef");
        // Multi-byte names must not split a character
        assert_eq!(StatusDisplay::truncate("夜に駆けるよ", 5), "夜に...");
    }

    #[test]
    fn test_create_progress_bar() {
        assert_eq!(StatusDisplay::create_progress_bar(0.5, 4), "██░░");
        assert_eq!(StatusDisplay::create_progress_bar(1.5, 2), "██");
        assert_eq!(StatusDisplay::create_progress_bar(0.0, 3), "░░░");
    }

    #[test]
    fn test_wrap_text() {
        let lines = StatusDisplay::wrap_text("one two three four", 9);
        assert_eq!(lines, vec!["one two", "three", "four"]);
    }

    #[test]
    fn test_format_song_line_marks_current() {
        let line = StatusDisplay::format_song_line(0, &song("1", "First"), true);
        assert_eq!(line, "▶   1. First - Artist");

        let line = StatusDisplay::format_song_line(11, &song("2", "Second"), false);
        assert_eq!(line, "   12. Second - Artist");
    }

    #[test]
    fn test_format_event_statistics() {
        let stats = EventStatistics {
            total_events: 12,
            channel_errors: 2,
            resolution_errors: 1,
            retries: 3,
            skips: 1,
            track_changes: 4,
            channel_allocations: 5,
        };

        assert_eq!(
            StatusDisplay::format_event_statistics(&stats),
            "Session: 4 track changes, 3 retries, 1 skips, 2 channel errors, 1 failed resolutions, 5 channels allocated"
        );
    }

    #[test]
    fn test_format_notification() {
        let songs = vec![song("1", "First"), song("2", "Second")];

        assert_eq!(
            StatusDisplay::format_notification(&PlayerNotification::IndexChanged(Some(1)), &songs),
            Some("♪ Now playing: Second - Artist".to_string())
        );
        assert_eq!(
            StatusDisplay::format_notification(&PlayerNotification::Locate(Some(0)), &songs),
            Some("Current song is number 1".to_string())
        );
        assert_eq!(
            StatusDisplay::format_notification(
                &PlayerNotification::ErrorStatus(ErrorStatus::default()),
                &songs
            ),
            None
        );
        assert!(StatusDisplay::format_notification(
            &PlayerNotification::ErrorStatus(ErrorStatus { total: 2, continuous: 1 }),
            &songs
        )
        .is_some());
        assert_eq!(
            StatusDisplay::format_notification(
                &PlayerNotification::StatusChanged(PlaybackStatus::Paused),
                &songs
            ),
            Some("⏸ Paused".to_string())
        );
    }

    #[test]
    fn test_display_functions_dont_panic() {
        StatusDisplay::display_full_status(&snapshot(), Some(Duration::from_secs(180)));
        StatusDisplay::display_full_status(&snapshot(), None);

        let empty = PlayerSnapshot {
            current_song: None,
            current_index: None,
            position_ms: None,
            ..snapshot()
        };
        StatusDisplay::display_full_status(&empty, None);
        StatusDisplay::display_song_list(&[song("1", "First")], Some(0));
        StatusDisplay::display_song_list(&Vec::<PlayerSong>::new(), None);
        StatusDisplay::display_config(&PlayerConfig::default());

        let error = PlayerError::Precondition(PreconditionViolation::EmptyPlaylist);
        StatusDisplay::display_error(&error);
        StatusDisplay::display_simple_error(&error);
    }
}
