//! Magic-number format detection.

use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

const HEADER_LEN: usize = 12;

/// Identifies a container from its leading bytes.
///
/// Returns `None` for unreadable files and unrecognised headers.
pub async fn detect_format(path: &Path) -> Option<&'static str> {
    let mut file = File::open(path).await.ok()?;
    let mut header = [0u8; HEADER_LEN];
    let mut filled = 0;
    while filled < HEADER_LEN {
        let n = file.read(&mut header[filled..]).await.ok()?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    format_from_header(&header[..filled])
}

fn format_from_header(header: &[u8]) -> Option<&'static str> {
    if header.starts_with(b"fLaC") {
        return Some("flac");
    }
    if header.len() >= 12 && &header[0..4] == b"RIFF" && &header[8..12] == b"WAVE" {
        return Some("wav");
    }
    if header.starts_with(b"OggS") {
        return Some("ogg");
    }
    if header.starts_with(b"ID3") {
        return Some("mp3");
    }
    if header.len() >= 2 && header[0] == 0xFF && matches!(header[1], 0xFB | 0xF3 | 0xF2) {
        return Some("mp3");
    }
    if header.len() >= 8 && &header[4..8] == b"ftyp" {
        return Some("mp4");
    }
    if header.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
        return Some("mkv");
    }
    None
}
