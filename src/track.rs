//! Track values.
//!
//! A `Track` is an immutable description of something playable. Its identity
//! is its `url`: two tracks with the same url are the same track, whatever
//! their display metadata says.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Stable identifier attached to a track by whoever built it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TrackId {
    Number(i64),
    Text(String),
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<TrackId>,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artwork: Option<String>,
    /// Favorite marker and the like; 0 when unrated.
    #[serde(default)]
    pub rating: u8,
}

impl Track {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            id: None,
            url: url.into(),
            title: None,
            artist: None,
            album: None,
            artwork: None,
            rating: 0,
        }
    }

    pub fn with_id(mut self, id: TrackId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    /// The explicit id, or the url when none was given.
    pub fn id(&self) -> TrackId {
        self.id
            .clone()
            .unwrap_or_else(|| TrackId::Text(self.url.clone()))
    }

    /// A track is playable only if it points somewhere.
    pub fn is_valid(&self) -> bool {
        !self.url.trim().is_empty()
    }

    /// "Artist - Title", falling back to whatever is known.
    pub fn display(&self) -> String {
        let title = self
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(&self.url);
        match self.artist.as_deref().map(str::trim) {
            Some(a) if !a.is_empty() => format!("{a} - {title}"),
            _ => title.to_string(),
        }
    }

    /// Apply a metadata patch. The url is never touched.
    pub fn merged(&self, patch: &TrackMetadata) -> Self {
        let mut next = self.clone();
        if let Some(title) = &patch.title {
            next.title = Some(title.clone());
        }
        if let Some(artist) = &patch.artist {
            next.artist = Some(artist.clone());
        }
        if let Some(album) = &patch.album {
            next.album = Some(album.clone());
        }
        if let Some(artwork) = &patch.artwork {
            next.artwork = Some(artwork.clone());
        }
        if let Some(rating) = patch.rating {
            next.rating = rating;
        }
        next
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
    }
}

impl Eq for Track {}

impl Hash for Track {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.url.hash(state);
    }
}

/// Partial display metadata for `update_metadata_for_track`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub artwork: Option<String>,
    pub rating: Option<u8>,
}
