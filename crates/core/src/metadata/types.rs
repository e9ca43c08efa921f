//! Metadata types.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Descriptive tags for one media file.
///
/// Every field is optional. `None` and the literal `"Unknown"` both mean
/// "not known".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub year: Option<String>,
    pub genre: Option<String>,
    pub track: Option<String>,
    pub show: Option<String>,
    pub season: Option<String>,
    pub episode: Option<String>,
}

fn known(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != "Unknown")
}

impl Metadata {
    /// Guesses metadata from a file name.
    ///
    /// Recognises `Show.Name.S01E02`, `Movie Title (1999)` and
    /// `Artist - Title`. Any other name yields empty metadata, so the file
    /// keeps its place in the input layout.
    pub fn from_filename(path: &Path) -> Self {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let spaced = |s: &str| s.replace(['.', '_'], " ").trim().to_string();

        if let Some((show, season, episode)) = parse_episode(&stem) {
            let show = spaced(show);
            return Self {
                title: Some(show.clone()),
                show: Some(show),
                season: Some(season.to_string()),
                episode: Some(episode.to_string()),
                ..Self::default()
            };
        }

        if let Some((title, year)) = parse_movie_year(&stem) {
            return Self {
                title: Some(spaced(title)),
                year: Some(year.to_string()),
                ..Self::default()
            };
        }

        if let Some((artist, title)) = stem.split_once(" - ") {
            return Self {
                artist: Some(artist.trim().to_string()),
                title: Some(title.trim().to_string()),
                ..Self::default()
            };
        }

        Self::default()
    }

    /// Whether the title is present and not a placeholder.
    pub fn has_meaningful_title(&self) -> bool {
        known(&self.title).is_some()
    }

    /// Whether this looks like an episode of a series.
    pub fn is_episode(&self) -> bool {
        known(&self.show).is_some()
            || known(&self.season).is_some()
            || known(&self.episode).is_some()
    }

    /// Overwrites fields with the known values from `other`.
    pub fn merge(&mut self, other: &Metadata) {
        let fields = [
            (&mut self.title, &other.title),
            (&mut self.artist, &other.artist),
            (&mut self.album, &other.album),
            (&mut self.album_artist, &other.album_artist),
            (&mut self.year, &other.year),
            (&mut self.genre, &other.genre),
            (&mut self.track, &other.track),
            (&mut self.show, &other.show),
            (&mut self.season, &other.season),
            (&mut self.episode, &other.episode),
        ];
        for (mine, theirs) in fields {
            if let Some(value) = known(theirs) {
                *mine = Some(value.to_string());
            }
        }
    }

    /// Returns the value for a template placeholder name.
    pub fn field(&self, name: &str) -> Option<&str> {
        let value = match name {
            "title" => &self.title,
            "artist" => &self.artist,
            "album" => &self.album,
            "album_artist" => &self.album_artist,
            "year" => &self.year,
            "genre" => &self.genre,
            "track" => &self.track,
            "show" => &self.show,
            "season" => &self.season,
            "episode" => &self.episode,
            _ => return None,
        };
        known(value)
    }

    /// Builds ffmpeg `-metadata` arguments for the known tags.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        let tags = [
            ("title", &self.title),
            ("artist", &self.artist),
            ("album", &self.album),
            ("album_artist", &self.album_artist),
            ("date", &self.year),
            ("genre", &self.genre),
            ("track", &self.track),
            ("show", &self.show),
            ("season_number", &self.season),
            ("episode_id", &self.episode),
        ];

        let mut args = Vec::new();
        for (key, value) in tags {
            if let Some(value) = known(value) {
                args.extend(["-metadata".to_string(), format!("{}={}", key, value)]);
            }
        }
        args
    }
}

/// Finds an `SxxEyy` marker and splits the stem around it.
fn parse_episode(stem: &str) -> Option<(&str, &str, &str)> {
    let bytes = stem.as_bytes();
    if bytes.len() < 6 {
        return None;
    }
    for i in 0..=bytes.len() - 6 {
        let window = &bytes[i..i + 6];
        if window[0].eq_ignore_ascii_case(&b'S')
            && window[3].eq_ignore_ascii_case(&b'E')
            && window[1..3].iter().all(u8::is_ascii_digit)
            && window[4..6].iter().all(u8::is_ascii_digit)
        {
            return Some((&stem[..i], &stem[i + 1..i + 3], &stem[i + 4..i + 6]));
        }
    }
    None
}

/// Splits `Title (1999)` into title and year.
fn parse_movie_year(stem: &str) -> Option<(&str, &str)> {
    let open = stem.rfind('(')?;
    let close = stem.rfind(')')?;
    if close != open + 5 {
        return None;
    }
    let year = &stem[open + 1..close];
    year.bytes()
        .all(|b| b.is_ascii_digit())
        .then_some((&stem[..open], year))
}
