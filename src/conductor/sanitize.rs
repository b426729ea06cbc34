//! Filesystem-safe name sanitisation and multi-artist tag splitting,
//! grounded on `sanitize_name` / the artist-splitting block in
//! `scripts/janitor/music.py`.

/// Sanitises a raw tag value for use as a path component: replaces path
/// separators with `-`, strips non-printables, trims whitespace, and maps
/// `.`, `..`, and the empty string to `"Unknown"`. Otherwise preserves
/// Unicode, spaces, and punctuation — deliberately permissive.
pub fn sanitize_name(name: &str) -> String {
    if name.is_empty() {
        return "Unknown".to_string();
    }

    let replaced: String = name
        .replace(['/', '\\'], "-")
        .chars()
        .filter(|c| !c.is_control())
        .collect();
    let trimmed = replaced.trim();

    match trimmed {
        "" | "." | ".." => "Unknown".to_string(),
        other => other.to_string(),
    }
}

/// Splits a single raw artist-tag value on any of `split_symbols`, trims
/// whitespace, and drops empties. Does not deduplicate — callers combine
/// this across multiple source tags into a set.
pub fn split_artist(raw: &str, split_symbols: &[String]) -> Vec<String> {
    if split_symbols.is_empty() {
        let trimmed = raw.trim();
        return if trimmed.is_empty() { Vec::new() } else { vec![trimmed.to_string()] };
    }

    raw.split(|c: char| split_symbols.iter().any(|s| s.as_str() == c.to_string()))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Resolves the final, deduplicated artist set for a track per §4.3's
/// fallback order: `artist` tag, then `albumartist`, then `"Unknown Artist"`.
pub fn resolve_artists(artists: &[String], album_artists: &[String], split_symbols: &[String]) -> Vec<String> {
    let source: &[String] = if !artists.is_empty() {
        artists
    } else if !album_artists.is_empty() {
        album_artists
    } else {
        return vec!["Unknown Artist".to_string()];
    };

    let mut seen = std::collections::BTreeSet::new();
    for entry in source {
        for part in split_artist(entry, split_symbols) {
            seen.insert(part);
        }
    }
    if seen.is_empty() {
        vec!["Unknown Artist".to_string()]
    } else {
        seen.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_preserves_permissive_characters() {
        assert_eq!(sanitize_name("bbno$"), "bbno$");
        assert_eq!(sanitize_name("AC/DC"), "AC-DC");
        assert_eq!(sanitize_name("."), "Unknown");
        assert_eq!(sanitize_name(".."), "Unknown");
        assert_eq!(sanitize_name(""), "Unknown");
        assert_eq!(sanitize_name("  padded  "), "padded");
    }

    #[test]
    fn splits_multi_artist_string() {
        let symbols = vec![";".to_string()];
        assert_eq!(
            split_artist("bbno$; Yung Gravy", &symbols),
            vec!["bbno$".to_string(), "Yung Gravy".to_string()]
        );
    }

    #[test]
    fn resolve_artists_falls_back_through_tags() {
        let symbols = vec![";".to_string()];
        assert_eq!(
            resolve_artists(&[], &[], &symbols),
            vec!["Unknown Artist".to_string()]
        );
        assert_eq!(
            resolve_artists(&[], &["Band A".to_string()], &symbols),
            vec!["Band A".to_string()]
        );
        assert_eq!(
            resolve_artists(&["bbno$; Yung Gravy".to_string()], &[], &symbols),
            vec!["Yung Gravy".to_string(), "bbno$".to_string()]
        );
    }
}
