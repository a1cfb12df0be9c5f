use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PlaylistError;
use crate::models::{Album, Artist, PlayerSong, Privilege, Provider, StreamInfo};

const PLAYLIST_EXTENSION: &str = "toml";

/// One song of a stored playlist, with the stream the bundled catalog serves
/// for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    pub id: String,
    pub provider: Provider,
    pub name: String,
    pub url: String,
    pub duration_ms: u64,
    #[serde(default)]
    pub start_offset_ms: u64,
    #[serde(default)]
    pub privilege: Privilege,
    #[serde(default)]
    pub artists: Vec<Artist>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<Album>,
}

impl PlaylistEntry {
    pub fn song(&self) -> PlayerSong {
        PlayerSong {
            id: self.id.clone(),
            provider: self.provider,
            name: self.name.clone(),
            artists: self.artists.clone(),
            album: self.album.clone(),
            privilege: self.privilege,
        }
    }

    pub fn stream(&self) -> StreamInfo {
        StreamInfo::new(self.url.clone(), Duration::from_millis(self.duration_ms))
            .with_start_offset(Duration::from_millis(self.start_offset_ms))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub name: String,
    #[serde(default)]
    pub songs: Vec<PlaylistEntry>,
}

impl Playlist {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            songs: Vec::new(),
        }
    }

    pub fn player_songs(&self) -> Vec<PlayerSong> {
        self.songs.iter().map(PlaylistEntry::song).collect()
    }

    pub fn total_duration(&self) -> Duration {
        self.songs.iter().map(|entry| Duration::from_millis(entry.duration_ms)).sum()
    }
}

/// Named playlists kept as TOML files in one directory
pub struct PlaylistStore {
    directory: PathBuf,
}

impl PlaylistStore {
    /// Open the store, creating its directory if needed
    pub fn new(directory: PathBuf) -> Result<Self, PlaylistError> {
        if !directory.exists() {
            fs::create_dir_all(&directory)?;
        }
        Ok(Self { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn path_for(&self, name: &str) -> Result<PathBuf, PlaylistError> {
        validate_name(name)?;
        Ok(self.directory.join(format!("{}.{}", name, PLAYLIST_EXTENSION)))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path_for(name).map(|path| path.is_file()).unwrap_or(false)
    }

    pub fn save(&self, name: &str, playlist: &Playlist) -> Result<(), PlaylistError> {
        if playlist.songs.is_empty() {
            return Err(PlaylistError::Invalid("Cannot save empty playlist".to_string()));
        }
        let path = self.path_for(name)?;
        let content = toml::to_string_pretty(playlist)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn load(&self, name: &str) -> Result<Playlist, PlaylistError> {
        let path = self.path_for(name)?;
        if !path.is_file() {
            return Err(PlaylistError::NotFound {
                name: name.to_string(),
            });
        }

        let content = fs::read_to_string(&path)?;
        toml::from_str(&content).map_err(|e| PlaylistError::Invalid(e.to_string()))
    }

    /// Names of every stored playlist, sorted
    pub fn list(&self) -> Result<Vec<String>, PlaylistError> {
        let mut names = Vec::new();
        if !self.directory.exists() {
            return Ok(names);
        }

        for entry in fs::read_dir(&self.directory)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|ext| ext.to_str()) != Some(PLAYLIST_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }

        names.sort();
        Ok(names)
    }

    pub fn delete(&self, name: &str) -> Result<(), PlaylistError> {
        let path = self.path_for(name)?;
        if !path.is_file() {
            return Err(PlaylistError::NotFound {
                name: name.to_string(),
            });
        }
        fs::remove_file(path)?;
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<(), PlaylistError> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed != name {
        return Err(PlaylistError::Invalid(format!("invalid playlist name '{}'", name)));
    }
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(PlaylistError::Invalid(format!(
            "playlist name '{}' must not contain path separators",
            name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(id: &str, name: &str, duration_ms: u64) -> PlaylistEntry {
        PlaylistEntry {
            id: id.to_string(),
            provider: Provider::Netease,
            name: name.to_string(),
            url: format!("https://music.example/{}", id),
            duration_ms,
            start_offset_ms: 0,
            privilege: Privilege::Allow,
            artists: vec![Artist {
                name: "Artist A".to_string(),
            }],
            album: None,
        }
    }

    fn sample() -> Playlist {
        let mut playlist = Playlist::new("evening");
        playlist.songs.push(entry("1", "Song One", 180_000));
        playlist.songs.push(entry("2", "Song Two", 240_000));
        playlist
    }

    fn store() -> (TempDir, PlaylistStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = PlaylistStore::new(temp_dir.path().join("playlists")).unwrap();
        (temp_dir, store)
    }

    #[test]
    fn test_store_creates_directory() {
        let (temp_dir, store) = store();
        assert!(temp_dir.path().join("playlists").is_dir());
        assert_eq!(store.directory(), temp_dir.path().join("playlists"));
    }

    #[test]
    fn test_save_and_load() {
        let (_temp_dir, store) = store();
        let playlist = sample();

        store.save("evening", &playlist).unwrap();

        assert!(store.exists("evening"));
        assert_eq!(store.load("evening").unwrap(), playlist);
    }

    #[test]
    fn test_save_empty_playlist() {
        let (_temp_dir, store) = store();

        match store.save("empty", &Playlist::new("empty")) {
            Err(PlaylistError::Invalid(msg)) => assert!(msg.contains("empty playlist")),
            other => panic!("Expected Invalid error, got {:?}", other),
        }
    }

    #[test]
    fn test_load_handwritten_file() {
        let (_temp_dir, store) = store();
        let content = r#"
name = "mix"

[[songs]]
id = "77"
provider = "qq"
name = "Intro"
url = "https://cdn.example/77.mp3"
duration_ms = 90000
start_offset_ms = 1500

[[songs.artists]]
name = "Band"

[songs.album]
name = "Live"
"#;
        fs::write(store.path_for("mix").unwrap(), content).unwrap();

        let playlist = store.load("mix").unwrap();
        let song = playlist.songs[0].song();
        let stream = playlist.songs[0].stream();

        assert_eq!(song.key().to_string(), "77|qq");
        assert_eq!(song.artist_names(), "Band");
        assert_eq!(song.album.unwrap().name, "Live");
        assert_eq!(stream.duration, Duration::from_secs(90));
        assert_eq!(stream.start_offset, Duration::from_millis(1500));
    }

    #[test]
    fn test_load_invalid_file() {
        let (_temp_dir, store) = store();
        fs::write(store.path_for("broken").unwrap(), "songs = 3").unwrap();

        assert!(matches!(store.load("broken"), Err(PlaylistError::Invalid(_))));
    }

    #[test]
    fn test_load_missing_playlist() {
        let (_temp_dir, store) = store();

        match store.load("nonexistent") {
            Err(PlaylistError::NotFound { name }) => assert_eq!(name, "nonexistent"),
            other => panic!("Expected NotFound error, got {:?}", other),
        }
    }

    #[test]
    fn test_list_ignores_other_files() {
        let (_temp_dir, store) = store();
        store.save("b-side", &sample()).unwrap();
        store.save("a-side", &sample()).unwrap();
        fs::write(store.directory().join("notes.txt"), "not a playlist").unwrap();

        assert_eq!(store.list().unwrap(), vec!["a-side", "b-side"]);
    }

    #[test]
    fn test_delete() {
        let (_temp_dir, store) = store();
        store.save("gone", &sample()).unwrap();

        store.delete("gone").unwrap();

        assert!(!store.exists("gone"));
        assert!(matches!(store.delete("gone"), Err(PlaylistError::NotFound { .. })));
    }

    #[test]
    fn test_rejects_path_like_names() {
        let (_temp_dir, store) = store();

        assert!(store.path_for("../escape").is_err());
        assert!(store.path_for("").is_err());
        assert!(store.path_for(" padded").is_err());
        assert!(!store.exists(".."));
    }

    #[test]
    fn test_player_songs_and_duration() {
        let playlist = sample();

        let songs = playlist.player_songs();

        assert_eq!(songs.len(), 2);
        assert_eq!(songs[1].name, "Song Two");
        assert_eq!(playlist.total_duration(), Duration::from_secs(420));
    }
}
