//! Audio tag reading
//!
//! Identifies the container from its leading bytes and reads the embedded
//! tags:
//! - FLAC: Vorbis comment metadata block
//! - Ogg (Vorbis or Opus): comment header packet
//! - MP3: ID3v2 at the start, or ID3v1 in the last 128 bytes
//! - MP4: recognised only, tag atoms are not read
//!
//! Input is untrusted. Every length is bounds-checked and malformed data is
//! reported as [`TagError`], never a panic.

mod flac;
mod id3;
mod ogg;
mod vorbis;

use thiserror::Error;

/// Container types the reader recognises
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Flac,
    Ogg,
    Mp3,
    Mp4,
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FileType::Flac => "FLAC",
            FileType::Ogg => "Ogg",
            FileType::Mp3 => "MP3",
            FileType::Mp4 => "MP4",
        };
        f.write_str(name)
    }
}

/// Tag values read from a file. Missing values are empty or zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags {
    pub title: String,
    pub album: String,
    pub artist: String,
    pub album_artist: String,
    pub composer: String,
    pub genre: String,
    pub year: i32,
    pub track: u32,
    pub track_total: u32,
    pub disc: u32,
    pub disc_total: u32,
    pub lyrics: String,
    pub comment: String,
}

#[derive(Error, Debug)]
pub enum TagError {
    #[error("data too short to contain a tag header")]
    TooShort,

    #[error("no recognised audio container or tag")]
    Unrecognized,

    #[error("malformed {format} data: {reason}")]
    Malformed {
        format: &'static str,
        reason: String,
    },
}

impl TagError {
    pub(crate) fn malformed(format: &'static str, reason: impl Into<String>) -> Self {
        TagError::Malformed {
            format,
            reason: reason.into(),
        }
    }
}

/// Smallest input that can hold any of the recognised headers
const MIN_LEN: usize = 11;

/// Identify the container and read its tags
pub fn read_from(data: &[u8]) -> Result<(FileType, Tags), TagError> {
    if data.len() < MIN_LEN {
        return Err(TagError::TooShort);
    }

    if data.starts_with(b"fLaC") {
        return flac::read(data).map(|tags| (FileType::Flac, tags));
    }
    if data.starts_with(b"OggS") {
        return ogg::read(data).map(|tags| (FileType::Ogg, tags));
    }
    if data.starts_with(b"ID3") {
        return id3::read_v2(data).map(|tags| (FileType::Mp3, tags));
    }
    if &data[4..8] == b"ftyp" {
        return Ok((FileType::Mp4, Tags::default()));
    }
    if let Some(tags) = id3::read_v1(data) {
        return Ok((FileType::Mp3, tags));
    }

    Err(TagError::Unrecognized)
}

/// Parse "4", "4/6" or " 4 / 6 " into (number, total)
pub(crate) fn parse_number_pair(value: &str) -> (u32, u32) {
    let mut parts = value.splitn(2, '/');
    let number = parts.next().and_then(|n| n.trim().parse().ok()).unwrap_or(0);
    let total = parts.next().and_then(|n| n.trim().parse().ok()).unwrap_or(0);
    (number, total)
}

/// Leading four-digit year of "2005", "2005-03-01", ...
pub(crate) fn parse_year(value: &str) -> i32 {
    let digits: String = value.trim().chars().take_while(|c| c.is_ascii_digit()).take(4).collect();
    digits.parse().unwrap_or(0)
}

#[cfg(test)]
pub(crate) mod testdata {
    //! Builders for minimal but valid audio files

    fn vorbis_comment(fields: &[(&str, &str)]) -> Vec<u8> {
        let vendor = b"zipserver tests";
        let mut out = Vec::new();
        out.extend_from_slice(&(vendor.len() as u32).to_le_bytes());
        out.extend_from_slice(vendor);
        out.extend_from_slice(&(fields.len() as u32).to_le_bytes());
        for (key, value) in fields {
            let field = format!("{}={}", key, value);
            out.extend_from_slice(&(field.len() as u32).to_le_bytes());
            out.extend_from_slice(field.as_bytes());
        }
        out
    }

    /// `fLaC` + STREAMINFO + VORBIS_COMMENT (last)
    pub fn flac(fields: &[(&str, &str)]) -> Vec<u8> {
        let mut out = b"fLaC".to_vec();
        // STREAMINFO, 34 bytes
        out.push(0x00);
        out.extend_from_slice(&[0, 0, 34]);
        out.extend_from_slice(&[0u8; 34]);
        let comment = vorbis_comment(fields);
        out.push(0x80 | 4);
        let len = comment.len() as u32;
        out.extend_from_slice(&len.to_be_bytes()[1..]);
        out.extend_from_slice(&comment);
        out
    }

    fn ogg_page(sequence: u32, header_type: u8, packet: &[u8]) -> Vec<u8> {
        let mut lacing = vec![255u8; packet.len() / 255];
        lacing.push((packet.len() % 255) as u8);

        let mut out = b"OggS".to_vec();
        out.push(0);
        out.push(header_type);
        out.extend_from_slice(&0u64.to_le_bytes());
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&sequence.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.push(lacing.len() as u8);
        out.extend_from_slice(&lacing);
        out.extend_from_slice(packet);
        out
    }

    /// Two-page Opus stream: OpusHead, then OpusTags
    pub fn opus(fields: &[(&str, &str)]) -> Vec<u8> {
        let mut head = b"OpusHead".to_vec();
        head.extend_from_slice(&[1, 2, 0x38, 0x01, 0x80, 0xBB, 0, 0, 0, 0, 0]);
        let mut tags = b"OpusTags".to_vec();
        tags.extend_from_slice(&vorbis_comment(fields));

        let mut out = ogg_page(0, 0x02, &head);
        out.extend_from_slice(&ogg_page(1, 0x00, &tags));
        out
    }

    fn id3_text_frame(id: &str, text: &str) -> Vec<u8> {
        let mut body = vec![3u8];
        body.extend_from_slice(text.as_bytes());
        let mut out = id.as_bytes().to_vec();
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        out.extend_from_slice(&[0, 0]);
        out.extend_from_slice(&body);
        out
    }

    /// ID3v2.3 tag with UTF-8 text frames, followed by a fake MPEG frame
    pub fn mp3(frames: &[(&str, &str)]) -> Vec<u8> {
        let mut body = Vec::new();
        for (id, text) in frames {
            body.extend_from_slice(&id3_text_frame(id, text));
        }
        let size = body.len() as u32;
        let syncsafe = [
            ((size >> 21) & 0x7F) as u8,
            ((size >> 14) & 0x7F) as u8,
            ((size >> 7) & 0x7F) as u8,
            (size & 0x7F) as u8,
        ];

        let mut out = b"ID3".to_vec();
        out.extend_from_slice(&[3, 0, 0]);
        out.extend_from_slice(&syncsafe);
        out.extend_from_slice(&body);
        out.extend_from_slice(&[0xFF, 0xFB, 0x90, 0x64, 0, 0, 0, 0]);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_too_short() {
        assert!(matches!(read_from(b"fLaC"), Err(TagError::TooShort)));
    }

    #[test]
    fn test_garbage_unrecognized() {
        let garbage = [7u8, 13, 99, 1, 0, 42].repeat(40);
        assert!(matches!(read_from(&garbage), Err(TagError::Unrecognized)));
    }

    #[test]
    fn test_detects_containers() {
        let (ft, _) = read_from(&testdata::flac(&[("TITLE", "x")])).unwrap();
        assert_eq!(ft, FileType::Flac);
        let (ft, _) = read_from(&testdata::opus(&[("TITLE", "x")])).unwrap();
        assert_eq!(ft, FileType::Ogg);
        let (ft, _) = read_from(&testdata::mp3(&[("TIT2", "x")])).unwrap();
        assert_eq!(ft, FileType::Mp3);

        let mut mp4 = vec![0, 0, 0, 0x14];
        mp4.extend_from_slice(b"ftypM4A \x00\x00\x00\x00M4A ");
        let (ft, _) = read_from(&mp4).unwrap();
        assert_eq!(ft, FileType::Mp4);
    }

    #[test]
    fn test_parse_helpers() {
        assert_eq!(parse_number_pair("4/6"), (4, 6));
        assert_eq!(parse_number_pair(" 12 "), (12, 0));
        assert_eq!(parse_number_pair("x/3"), (0, 3));
        assert_eq!(parse_year("2005-03-01"), 2005);
        assert_eq!(parse_year("unknown"), 0);
    }
}
