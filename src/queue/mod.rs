use std::collections::VecDeque;
use crate::error::PreconditionViolation;
use crate::models::{PlayerSong, SongKey};

pub mod playlist;

/// Ordered playlist plus the position of the current song
#[derive(Debug, Clone, Default)]
pub struct SongQueue {
    songs: VecDeque<PlayerSong>,
    current_index: Option<usize>,
}

impl SongQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_songs(songs: Vec<PlayerSong>) -> Self {
        let mut queue = Self::new();
        queue.replace(songs, None);
        queue
    }

    /// Replace the whole list. The current index becomes `start`, or the
    /// first song when not given.
    pub fn replace(&mut self, songs: Vec<PlayerSong>, start: Option<usize>) {
        self.songs = songs.into();
        self.current_index = if self.songs.is_empty() {
            None
        } else {
            Some(start.unwrap_or(0).min(self.songs.len() - 1))
        };
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    pub fn songs(&self) -> impl Iterator<Item = &PlayerSong> {
        self.songs.iter()
    }

    pub fn get(&self, index: usize) -> Option<&PlayerSong> {
        self.songs.get(index)
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn current_song(&self) -> Option<&PlayerSong> {
        self.current_index.and_then(|index| self.songs.get(index))
    }

    pub fn current_key(&self) -> Option<SongKey> {
        self.current_song().map(PlayerSong::key)
    }

    /// Check that `index` names a song
    pub fn validate(&self, index: usize) -> Result<(), PreconditionViolation> {
        if self.songs.is_empty() {
            return Err(PreconditionViolation::EmptyPlaylist);
        }
        if index >= self.songs.len() {
            return Err(PreconditionViolation::IndexOutOfRange {
                index,
                len: self.songs.len(),
            });
        }
        Ok(())
    }

    pub fn set_current(&mut self, index: usize) -> Result<(), PreconditionViolation> {
        self.validate(index)?;
        self.current_index = Some(index);
        Ok(())
    }

    /// Bring any index into the valid range: wrap when looping, clamp otherwise
    pub fn normalize(&self, index: usize, wrap: bool) -> Option<usize> {
        let len = self.songs.len();
        if len == 0 {
            return None;
        }
        Some(if wrap { index % len } else { index.min(len - 1) })
    }

    /// Index `step` songs away from `from`. Without wrapping, stepping past
    /// either end yields `None`.
    pub fn step_from(&self, from: usize, step: isize, wrap: bool) -> Option<usize> {
        let len = self.songs.len() as isize;
        if len == 0 {
            return None;
        }
        let target = from as isize + step;
        if wrap {
            Some(target.rem_euclid(len) as usize)
        } else if (0..len).contains(&target) {
            Some(target as usize)
        } else {
            None
        }
    }

    pub fn position(&self, key: &SongKey) -> Option<usize> {
        self.songs.iter().position(|song| song.matches(key))
    }

    /// Remove the song at `index`, keeping the current song current when it
    /// survives. Removing the current song leaves the index on its successor
    /// (or the new last song).
    pub fn remove(&mut self, index: usize) -> Result<PlayerSong, PreconditionViolation> {
        self.validate(index)?;
        let removed = self
            .songs
            .remove(index)
            .ok_or(PreconditionViolation::IndexOutOfRange { index, len: self.songs.len() })?;

        self.current_index = match self.current_index {
            _ if self.songs.is_empty() => None,
            Some(current) if index < current => Some(current - 1),
            Some(current) => Some(current.min(self.songs.len() - 1)),
            None => None,
        };
        Ok(removed)
    }

    /// Move a song to a new position; the current song stays current
    pub fn move_song(&mut self, from: usize, to: usize) -> Result<(), PreconditionViolation> {
        self.validate(from)?;
        self.validate(to)?;
        if from == to {
            return Ok(());
        }

        let current_key = self.current_key();
        if let Some(song) = self.songs.remove(from) {
            self.songs.insert(to, song);
        }
        if let Some(key) = current_key {
            self.current_index = self.position(&key);
        }
        Ok(())
    }

    /// Replace the stored metadata for `key`. Returns the index that changed.
    pub fn update_song_info(&mut self, key: &SongKey, song: PlayerSong) -> Option<usize> {
        let index = self.position(key)?;
        self.songs[index] = song;
        Some(index)
    }

    /// The current song followed by up to `ahead` upcoming songs, each at
    /// most once
    pub fn window(&self, ahead: usize, wrap: bool) -> Vec<PlayerSong> {
        let Some(start) = self.current_index else {
            return Vec::new();
        };

        let mut window: Vec<PlayerSong> = Vec::with_capacity(ahead + 1);
        let mut index = start;
        for _ in 0..=ahead.min(self.songs.len().saturating_sub(1)) {
            let song = &self.songs[index];
            if !window.iter().any(|s| s.matches(&song.key())) {
                window.push(song.clone());
            }
            match self.step_from(index, 1, wrap) {
                Some(next) if next != start => index = next,
                _ => break,
            }
        }
        window
    }
}
