//! Output path resolution.

use std::path::{Path, PathBuf};

use super::config::PipelineConfig;
use crate::metadata::{format_path, Metadata};
use crate::validator::{FileDescriptor, MediaKind};

/// Decides where the output for `file` goes.
///
/// With a meaningful title, the path comes from the configured pattern for
/// the file's kind. Otherwise the input's position below the input root is
/// mirrored under `music/` or `movies/`. Either way the extension is the
/// processor's output extension.
pub fn resolve_output_path(
    config: &PipelineConfig,
    file: &FileDescriptor,
    meta: &Metadata,
    output_extension: &str,
) -> PathBuf {
    let extension = output_extension.trim_start_matches('.');

    let relative = match pattern_for(config, file.kind, meta) {
        Some(pattern) if meta.has_meaningful_title() => {
            let folder = match file.kind {
                MediaKind::Video if meta.is_episode() => "series",
                kind => kind.output_folder().unwrap_or_default(),
            };
            // Rendered names may contain dots, so the extension is appended.
            let mut path = Path::new(folder).join(format_path(meta, &pattern));
            if !extension.is_empty() {
                let mut name = path.file_name().unwrap_or_default().to_os_string();
                name.push(".");
                name.push(extension);
                path.set_file_name(name);
            }
            path
        }
        _ if extension.is_empty() => mirrored(config, file),
        _ => mirrored(config, file).with_extension(extension),
    };

    config.output_dir.join(relative)
}

fn pattern_for(config: &PipelineConfig, kind: MediaKind, meta: &Metadata) -> Option<String> {
    match kind {
        MediaKind::Audio => Some(config.music_pattern.clone()),
        MediaKind::Video if meta.is_episode() => Some(config.video_pattern.clone()),
        MediaKind::Video if meta.field("year").is_some() => {
            Some("{title} ({year})/{title}".to_string())
        }
        MediaKind::Video => Some("{title}/{title}".to_string()),
        MediaKind::Unknown => None,
    }
}

fn mirrored(config: &PipelineConfig, file: &FileDescriptor) -> PathBuf {
    let relative = match file.path.strip_prefix(&config.input_dir) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => file.path.file_name().map(PathBuf::from).unwrap_or_default(),
    };

    match file.kind.output_folder() {
        Some(folder) => Path::new(folder).join(relative),
        None => relative,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PipelineConfig {
        PipelineConfig::new("/in", "/out")
    }

    fn descriptor(path: &str, kind: MediaKind) -> FileDescriptor {
        FileDescriptor {
            path: PathBuf::from(path),
            size: 1,
            kind,
            format: "mp3".to_string(),
        }
    }

    #[test]
    fn test_mirrors_without_title() {
        let file = descriptor("/in/rock/a.mp3", MediaKind::Audio);
        let path = resolve_output_path(&config(), &file, &Metadata::default(), "flac");
        assert_eq!(path, PathBuf::from("/out/music/rock/a.flac"));
    }

    #[test]
    fn test_unknown_title_mirrors() {
        let file = descriptor("/in/film.avi", MediaKind::Video);
        let meta = Metadata {
            title: Some("Unknown".to_string()),
            ..Metadata::default()
        };
        let path = resolve_output_path(&config(), &file, &meta, "mkv");
        assert_eq!(path, PathBuf::from("/out/movies/film.mkv"));
    }

    #[test]
    fn test_music_pattern() {
        let file = descriptor("/in/x.mp3", MediaKind::Audio);
        let meta = Metadata {
            artist: Some("Artist".to_string()),
            album: Some("Album".to_string()),
            track: Some("03".to_string()),
            title: Some("Song".to_string()),
            ..Metadata::default()
        };
        let path = resolve_output_path(&config(), &file, &meta, "flac");
        assert_eq!(path, PathBuf::from("/out/music/Artist/Album/03 - Song.flac"));
    }

    #[test]
    fn test_movie_with_year() {
        let file = descriptor("/in/x.avi", MediaKind::Video);
        let meta = Metadata {
            title: Some("Alien".to_string()),
            year: Some("1979".to_string()),
            ..Metadata::default()
        };
        let path = resolve_output_path(&config(), &file, &meta, "mkv");
        assert_eq!(path, PathBuf::from("/out/movies/Alien (1979)/Alien.mkv"));
    }

    #[test]
    fn test_episode_pattern() {
        let file = descriptor("/in/x.avi", MediaKind::Video);
        let meta = Metadata::from_filename(Path::new("The.Wire.S01E02.avi"));
        let path = resolve_output_path(&config(), &file, &meta, "mkv");
        assert_eq!(
            path,
            PathBuf::from("/out/series/The Wire/Season 01/The Wire - S01E02.mkv")
        );
    }

    #[test]
    fn test_title_with_dots_keeps_extension_override() {
        let file = descriptor("/in/x.mp3", MediaKind::Audio);
        let meta = Metadata {
            title: Some("Vol. 2".to_string()),
            ..Metadata::default()
        };
        let config = config().with_patterns("{title}", "{title}");
        let path = resolve_output_path(&config, &file, &meta, "flac");
        assert_eq!(path, PathBuf::from("/out/music/Vol. 2.flac"));
    }
}
