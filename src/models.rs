use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Music providers a song can be streamed from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Netease,
    Qq,
    Xiami,
    Kugou,
    Kuwo,
    Migu,
    Local,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Netease => "netease",
            Provider::Qq => "qq",
            Provider::Xiami => "xiami",
            Provider::Kugou => "kugou",
            Provider::Kuwo => "kuwo",
            Provider::Migu => "migu",
            Provider::Local => "local",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "netease" => Ok(Provider::Netease),
            "qq" => Ok(Provider::Qq),
            "xiami" => Ok(Provider::Xiami),
            "kugou" => Ok(Provider::Kugou),
            "kuwo" => Ok(Provider::Kuwo),
            "migu" => Ok(Provider::Migu),
            "local" => Ok(Provider::Local),
            other => Err(format!("unknown provider '{}'", other)),
        }
    }
}

/// Composite identity of a song. Two songs are the same resource iff both
/// fields match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SongKey {
    pub id: String,
    pub provider: Provider,
}

impl SongKey {
    pub fn new(id: impl Into<String>, provider: Provider) -> Self {
        Self {
            id: id.into(),
            provider,
        }
    }
}

impl fmt::Display for SongKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.id, self.provider)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img: Option<String>,
}

/// Whether the provider lets us stream the song at all
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privilege {
    #[default]
    Allow,
    Deny,
}

/// A song as it appears in the playlist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSong {
    pub id: String,
    pub provider: Provider,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<Artist>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<Album>,
    #[serde(default)]
    pub privilege: Privilege,
}

impl PlayerSong {
    pub fn new(id: impl Into<String>, provider: Provider, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            provider,
            name: name.into(),
            artists: Vec::new(),
            album: None,
            privilege: Privilege::Allow,
        }
    }

    pub fn with_artist(mut self, name: impl Into<String>) -> Self {
        self.artists.push(Artist { name: name.into() });
        self
    }

    pub fn key(&self) -> SongKey {
        SongKey::new(self.id.clone(), self.provider)
    }

    pub fn matches(&self, key: &SongKey) -> bool {
        self.id == key.id && self.provider == key.provider
    }

    /// Artist names joined for display, or "Unknown Artist"
    pub fn artist_names(&self) -> String {
        if self.artists.is_empty() {
            return "Unknown Artist".to_string();
        }
        self.artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(" / ")
    }

    pub fn display_name(&self) -> String {
        format!("{} - {}", self.name, self.artist_names())
    }
}

/// Playable stream data for a song, produced by the stream resolver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    pub playable_url: String,
    pub duration: Duration,
    /// Position audible playback starts from on lay-in
    pub start_offset: Duration,
}

impl StreamInfo {
    pub fn new(playable_url: impl Into<String>, duration: Duration) -> Self {
        Self {
            playable_url: playable_url.into(),
            duration,
            start_offset: Duration::ZERO,
        }
    }

    pub fn with_start_offset(mut self, start_offset: Duration) -> Self {
        self.start_offset = start_offset;
        self
    }
}

/// Resolver output: possibly refreshed song metadata plus its stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSong {
    pub song: PlayerSong,
    pub stream: StreamInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityHint {
    Standard,
    #[default]
    High,
    Lossless,
}

impl QualityHint {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityHint::Standard => "standard",
            QualityHint::High => "high",
            QualityHint::Lossless => "lossless",
        }
    }
}

impl FromStr for QualityHint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "standard" => Ok(QualityHint::Standard),
            "high" => Ok(QualityHint::High),
            "lossless" => Ok(QualityHint::Lossless),
            other => Err(format!("unknown quality '{}' (standard, high, lossless)", other)),
        }
    }
}

/// Volume envelope applied by a channel. A channel keeps the snapshot it was
/// created with; a different config means the channel must be rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FadeConfig {
    pub fade_in_ms: u64,
    /// How long before the end of the stream the fade-out is triggered.
    /// Zero disables the trigger and the stream simply ends.
    pub fade_out_offset_ms: u64,
    pub fade_out_ms: u64,
}

impl Default for FadeConfig {
    fn default() -> Self {
        Self {
            fade_in_ms: 800,
            fade_out_offset_ms: 0,
            fade_out_ms: 1500,
        }
    }
}

impl FadeConfig {
    pub fn fade_in(&self) -> Duration {
        Duration::from_millis(self.fade_in_ms)
    }

    pub fn fade_out_offset(&self) -> Duration {
        Duration::from_millis(self.fade_out_offset_ms)
    }

    pub fn fade_out(&self) -> Duration {
        Duration::from_millis(self.fade_out_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    Paused,
    Loading,
    Playing,
}

impl PlaybackStatus {
    pub fn is_paused(&self) -> bool {
        matches!(self, PlaybackStatus::Paused)
    }
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PlaybackStatus::Paused => "Paused",
            PlaybackStatus::Loading => "Loading",
            PlaybackStatus::Playing => "Playing",
        };
        f.write_str(s)
    }
}

/// Error counters driving the retry policy.
///
/// `total` is scoped to the current song, `continuous` to the current run of
/// failed starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ErrorStatus {
    pub total: u32,
    pub continuous: u32,
}

/// Point-in-time view of the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub status: PlaybackStatus,
    pub current_index: Option<usize>,
    pub current_song: Option<PlayerSong>,
    /// Position of the active channel, if one is bound
    pub position_ms: Option<u64>,
    pub song_count: usize,
    pub error_status: ErrorStatus,
    pub bound_channels: usize,
    pub free_channels: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_song_key_display() {
        let key = SongKey::new("1234", Provider::Netease);
        assert_eq!(key.to_string(), "1234|netease");
    }

    #[test]
    fn test_song_key_identity() {
        let a = SongKey::new("1", Provider::Qq);
        let b = SongKey::new("1", Provider::Netease);
        let c = SongKey::new("1", Provider::Qq);

        assert_ne!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn test_player_song_key_and_matches() {
        let song = PlayerSong::new("42", Provider::Kugou, "Song");
        let key = song.key();

        assert_eq!(key, SongKey::new("42", Provider::Kugou));
        assert!(song.matches(&key));
        assert!(!song.matches(&SongKey::new("42", Provider::Kuwo)));
    }

    #[test]
    fn test_artist_names() {
        let song = PlayerSong::new("1", Provider::Local, "Track");
        assert_eq!(song.artist_names(), "Unknown Artist");

        let song = song.with_artist("A").with_artist("B");
        assert_eq!(song.artist_names(), "A / B");
        assert_eq!(song.display_name(), "Track - A / B");
    }

    #[test]
    fn test_provider_from_str() {
        assert_eq!("QQ".parse::<Provider>().unwrap(), Provider::Qq);
        assert_eq!("migu".parse::<Provider>().unwrap(), Provider::Migu);
        assert!("spotify".parse::<Provider>().is_err());
    }

    #[test]
    fn test_quality_from_str() {
        assert_eq!("Lossless".parse::<QualityHint>().unwrap(), QualityHint::Lossless);
        assert!("ultra".parse::<QualityHint>().is_err());
    }

    #[test]
    fn test_fade_config_durations() {
        let fade = FadeConfig {
            fade_in_ms: 100,
            fade_out_offset_ms: 2000,
            fade_out_ms: 300,
        };

        assert_eq!(fade.fade_in(), Duration::from_millis(100));
        assert_eq!(fade.fade_out_offset(), Duration::from_secs(2));
        assert_eq!(fade.fade_out(), Duration::from_millis(300));
        assert_ne!(fade, FadeConfig::default());
    }

    #[test]
    fn test_song_deserialize_defaults() {
        let song: PlayerSong = toml::from_str(
            r#"
            id = "7"
            provider = "xiami"
            name = "Untitled"
            "#,
        )
        .unwrap();

        assert!(song.artists.is_empty());
        assert_eq!(song.album, None);
        assert_eq!(song.privilege, Privilege::Allow);
    }

    #[test]
    fn test_snapshot_serializes_status_lowercase() {
        let snapshot = PlayerSnapshot {
            status: PlaybackStatus::Loading,
            current_index: Some(1),
            current_song: None,
            position_ms: Some(1500),
            song_count: 3,
            error_status: ErrorStatus::default(),
            bound_channels: 2,
            free_channels: 0,
        };

        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"status\":\"loading\""));
        assert!(json.contains("\"current_index\":1"));
        assert!(json.contains("\"position_ms\":1500"));
    }
}
