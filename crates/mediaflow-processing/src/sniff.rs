//! Content type detection from magic numbers
//!
//! The staged file name carries a random key and the source extension, which
//! uploaders control, so the mime type is derived from the leading bytes only.

use std::path::Path;
use tokio::io::AsyncReadExt;

/// Bytes inspected at the start of a file
const SNIFF_LEN: usize = 4100;

/// Detect the mime type of the file at `path`, `None` when no signature matches.
pub async fn detect_mime_type(path: &Path) -> std::io::Result<Option<&'static str>> {
    let file = tokio::fs::File::open(path).await?;
    let mut header = Vec::with_capacity(SNIFF_LEN);
    file.take(SNIFF_LEN as u64)
        .read_to_end(&mut header)
        .await?;

    let mime_type = sniff(&header);
    tracing::debug!(
        path = %path.display(),
        mime_type = ?mime_type,
        "Sniffed content type"
    );
    Ok(mime_type)
}

/// Match a file header against the known signatures.
pub fn sniff(header: &[u8]) -> Option<&'static str> {
    let at = |offset: usize, signature: &[u8]| {
        header
            .get(offset..offset + signature.len())
            .is_some_and(|bytes| bytes == signature)
    };

    // Images
    if at(0, &[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }
    if at(0, &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some("image/png");
    }
    if at(0, b"GIF87a") || at(0, b"GIF89a") {
        return Some("image/gif");
    }
    if at(0, b"II*\0") || at(0, b"MM\0*") {
        return Some("image/tiff");
    }
    if at(0, b"8BPS") {
        return Some("image/vnd.adobe.photoshop");
    }
    if at(0, &[0x00, 0x00, 0x01, 0x00]) {
        return Some("image/x-icon");
    }

    // RIFF containers
    if at(0, b"RIFF") {
        if at(8, b"WEBP") {
            return Some("image/webp");
        }
        if at(8, b"WAVE") {
            return Some("audio/wav");
        }
        if at(8, b"AVI ") {
            return Some("video/x-msvideo");
        }
    }
    if at(0, b"FORM") && (at(8, b"AIFF") || at(8, b"AIFC")) {
        return Some("audio/aiff");
    }

    // ISO base media (ftyp box)
    if at(4, b"ftyp") {
        return header.get(8..12).map(iso_brand_mime);
    }

    // Matroska / WebM (EBML header; doctype within the first bytes)
    if at(0, &[0x1A, 0x45, 0xDF, 0xA3]) {
        let window = &header[..header.len().min(64)];
        if window.windows(4).any(|w| w == b"webm") {
            return Some("video/webm");
        }
        return Some("video/x-matroska");
    }

    if at(0, b"OggS") {
        return Some(if header.windows(6).any(|w| w == b"theora") {
            "video/ogg"
        } else {
            "audio/ogg"
        });
    }
    if at(0, b"fLaC") {
        return Some("audio/x-flac");
    }
    if at(0, b"ID3") {
        return Some("audio/mpeg");
    }
    if at(0, b"FLV\x01") {
        return Some("video/x-flv");
    }
    if at(0, &[0x30, 0x26, 0xB2, 0x75, 0x8E, 0x66, 0xCF, 0x11]) {
        return Some("video/x-ms-asf");
    }
    if at(0, &[0x00, 0x00, 0x01, 0xBA]) || at(0, &[0x00, 0x00, 0x01, 0xB3]) {
        return Some("video/mpeg");
    }
    if at(0, b"BM") && header.len() >= 26 {
        return Some("image/bmp");
    }

    // Raw MPEG audio frames
    if header.len() >= 2 && header[0] == 0xFF {
        if header[1] & 0xF6 == 0xF0 {
            return Some("audio/aac");
        }
        // frame sync with a non-reserved layer
        if header[1] & 0xE0 == 0xE0 && header[1] & 0x06 != 0 {
            return Some("audio/mpeg");
        }
    }

    None
}

fn iso_brand_mime(brand: &[u8]) -> &'static str {
    match brand {
        b"avif" | b"avis" => "image/avif",
        b"heic" | b"heix" | b"mif1" | b"msf1" => "image/heic",
        b"M4A " | b"M4B " => "audio/x-m4a",
        b"M4V " | b"M4VH" | b"M4VP" => "video/x-m4v",
        b"qt  " => "video/quicktime",
        b"3gp4" | b"3gp5" | b"3gp6" | b"3ge6" | b"3gs7" => "video/3gpp",
        b"3g2a" | b"3g2b" | b"3g2c" => "video/3gpp2",
        _ => "video/mp4",
    }
}
