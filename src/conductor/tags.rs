//! Audio-tag reading, wrapping `lofty`'s dynamically-shaped tag access
//! behind the small fixed-field interface §9's design note calls for
//! ("avoid exposing the underlying tag library's dynamic shape").

use lofty::file::TaggedFileExt;
use lofty::prelude::{Accessor, ItemKey};
use std::path::Path;

/// The fixed set of fields the Conductor needs from a track, already
/// flattened out of lofty's per-format tag representation.
#[derive(Debug, Clone, Default)]
pub struct TrackTags {
    pub title: Option<String>,
    pub album: Option<String>,
    pub year: Option<String>,
    pub artists: Vec<String>,
    pub album_artists: Vec<String>,
    pub genres: Vec<String>,
}

/// Reads tags from `path`. Returns `None` on any read/parse failure or if
/// the file carries no recognisable tag — the Conductor skips such files
/// silently (§4.3 step 2).
pub fn read_tags(path: &Path) -> Option<TrackTags> {
    let tagged_file = lofty::read_from_path(path).ok()?;
    let tag = tagged_file.primary_tag().or_else(|| tagged_file.first_tag())?;

    let year = tag
        .year()
        .map(|y| y.to_string())
        .or_else(|| tag.get_string(&ItemKey::RecordingDate).map(|d| d.to_string()));

    Some(TrackTags {
        title: tag.title().map(|s| s.to_string()),
        album: tag.album().map(|s| s.to_string()),
        year,
        artists: strings(tag, &ItemKey::TrackArtist),
        album_artists: strings(tag, &ItemKey::AlbumArtist),
        genres: strings(tag, &ItemKey::Genre),
    })
}

fn strings(tag: &lofty::tag::Tag, key: &ItemKey) -> Vec<String> {
    tag.get_strings(key).map(str::to_string).collect()
}
