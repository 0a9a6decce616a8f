use std::path::Path;

use lofty::prelude::{Accessor, TaggedFileExt};
use tracing::debug;
use walkdir::WalkDir;

use crate::config::LibrarySettings;
use crate::track::Track;

fn is_audio_file(path: &Path, settings: &LibrarySettings) -> bool {
    let exts: Vec<String> = settings
        .extensions
        .iter()
        .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect();

    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            exts.iter().any(|e| e == &ext)
        })
        .unwrap_or(false)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn non_empty(value: Option<impl AsRef<str>>) -> Option<String> {
    value
        .map(|v| v.as_ref().trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Build a track for `path`, taking title/artist/album from its tags when
/// they can be read and the file stem otherwise. The url is the path itself.
fn track_from_file(path: &Path) -> Track {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("UNKNOWN")
        .to_string();
    let mut track = Track::new(path.to_string_lossy()).with_title(stem);

    match lofty::read_from_path(path) {
        Ok(tagged) => {
            if let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) {
                if let Some(title) = non_empty(tag.title()) {
                    track.title = Some(title);
                }
                track.artist = non_empty(tag.artist());
                track.album = non_empty(tag.album());
            }
        }
        Err(e) => debug!(path = %path.display(), "no readable tags: {e}"),
    }
    track
}

/// Walk `dir` and return every audio file in it, ordered by display name.
pub fn scan(dir: &Path, settings: &LibrarySettings) -> Vec<Track> {
    let mut walker = WalkDir::new(dir).follow_links(settings.follow_links);

    // Non-recursive = only the root directory.
    let depth_cap = if settings.recursive {
        settings.max_depth
    } else {
        Some(1)
    };
    if let Some(d) = depth_cap {
        walker = walker.max_depth(d);
    }

    let mut tracks: Vec<Track> = walker
        .into_iter()
        .filter_entry(|e| settings.include_hidden || e.depth() == 0 || !is_hidden(e.path()))
        .filter_map(Result::ok)
        .filter(|e| e.path().is_file())
        .filter(|e| is_audio_file(e.path(), settings))
        .map(|e| track_from_file(e.path()))
        .collect();

    tracks.sort_by_cached_key(|t| t.display().to_lowercase());
    debug!(dir = %dir.display(), found = tracks.len(), "library scan finished");
    tracks
}
