//! ID3v2 (2.2, 2.3, 2.4) and ID3v1 tags

use binrw::prelude::*;
use std::io::Cursor;

use super::{parse_number_pair, parse_year, TagError, Tags};

const FORMAT: &str = "ID3v2";

/// ID3v1 genre list, indexed by the genre byte
const ID3V1_GENRES: &[&str] = &[
    "Blues", "Classic Rock", "Country", "Dance", "Disco", "Funk", "Grunge", "Hip-Hop", "Jazz",
    "Metal", "New Age", "Oldies", "Other", "Pop", "R&B", "Rap", "Reggae", "Rock", "Techno",
    "Industrial", "Alternative", "Ska", "Death Metal", "Pranks", "Soundtrack", "Euro-Techno",
    "Ambient", "Trip-Hop", "Vocal", "Jazz+Funk", "Fusion", "Trance", "Classical", "Instrumental",
    "Acid", "House", "Game", "Sound Clip", "Gospel", "Noise", "AlternRock", "Bass", "Soul",
    "Punk", "Space", "Meditative", "Instrumental Pop", "Instrumental Rock", "Ethnic", "Gothic",
    "Darkwave", "Techno-Industrial", "Electronic", "Pop-Folk", "Eurodance", "Dream",
    "Southern Rock", "Comedy", "Cult", "Gangsta", "Top 40", "Christian Rap", "Pop/Funk", "Jungle",
    "Native American", "Cabaret", "New Wave", "Psychedelic", "Rave", "Showtunes", "Trailer",
    "Lo-Fi", "Tribal", "Acid Punk", "Acid Jazz", "Polka", "Retro", "Musical", "Rock & Roll",
    "Hard Rock",
];

#[derive(Debug, BinRead)]
#[br(big, magic = b"ID3")]
struct Header {
    major: u8,
    _revision: u8,
    flags: u8,

    #[br(map = |b: [u8; 4]| syncsafe(b))]
    size: u32,
}

fn syncsafe(b: [u8; 4]) -> u32 {
    (u32::from(b[0] & 0x7F) << 21)
        | (u32::from(b[1] & 0x7F) << 14)
        | (u32::from(b[2] & 0x7F) << 7)
        | u32::from(b[3] & 0x7F)
}

/// Undo unsynchronisation: `FF 00` -> `FF`
fn remove_unsync(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut prev = 0u8;
    for &b in data {
        if !(prev == 0xFF && b == 0x00) {
            out.push(b);
        }
        prev = b;
    }
    out
}

/// Decode an ID3 text payload with its leading encoding byte
fn decode_text(encoding: u8, data: &[u8]) -> String {
    let text = match encoding {
        0 => data.iter().map(|&b| b as char).collect(),
        1 | 2 => {
            let (big_endian, body) = match data {
                [0xFE, 0xFF, rest @ ..] => (true, rest),
                [0xFF, 0xFE, rest @ ..] => (false, rest),
                _ => (encoding == 2, data),
            };
            let units: Vec<u16> = body
                .chunks_exact(2)
                .map(|c| {
                    if big_endian {
                        u16::from_be_bytes([c[0], c[1]])
                    } else {
                        u16::from_le_bytes([c[0], c[1]])
                    }
                })
                .collect();
            String::from_utf16_lossy(&units)
        }
        _ => String::from_utf8_lossy(data).into_owned(),
    };

    // v2.4 separates multiple values with NUL; keep the first
    text.split('\0').next().unwrap_or_default().to_string()
}

/// Length of a NUL terminator-delimited string in the given encoding
fn terminated_len(encoding: u8, data: &[u8]) -> usize {
    if encoding == 1 || encoding == 2 {
        data.chunks_exact(2)
            .position(|c| c == [0, 0])
            .map(|i| i * 2 + 2)
            .unwrap_or(data.len())
    } else {
        data.iter().position(|&b| b == 0).map(|i| i + 1).unwrap_or(data.len())
    }
}

/// COMM / USLT: encoding, 3-byte language, description, text
fn decode_language_text(body: &[u8]) -> String {
    if body.len() < 4 {
        return String::new();
    }
    let encoding = body[0];
    let rest = &body[4..];
    let description_len = terminated_len(encoding, rest);
    decode_text(encoding, &rest[description_len..])
}

/// Resolve "(17)", "17" or "(17)Rock" references into genre names
fn resolve_genre(value: &str) -> String {
    let trimmed = value.trim();
    let index = trimmed
        .strip_prefix('(')
        .and_then(|rest| rest.split_once(')'))
        .map(|(n, _)| n)
        .unwrap_or(trimmed);

    match index.parse::<usize>() {
        Ok(i) => ID3V1_GENRES.get(i).map(|g| g.to_string()).unwrap_or_default(),
        Err(_) => trimmed.to_string(),
    }
}

fn apply_frame(tags: &mut Tags, id: &str, body: &[u8]) {
    let text = || match body.split_first() {
        Some((encoding, rest)) => decode_text(*encoding, rest),
        None => String::new(),
    };

    match id {
        "TIT2" | "TT2" => tags.title = text(),
        "TALB" | "TAL" => tags.album = text(),
        "TPE1" | "TP1" => tags.artist = text(),
        "TPE2" | "TP2" => tags.album_artist = text(),
        "TCOM" | "TCM" => tags.composer = text(),
        "TCON" | "TCO" => tags.genre = resolve_genre(&text()),
        "TYER" | "TYE" | "TDRC" => tags.year = parse_year(&text()),
        "TRCK" | "TRK" => (tags.track, tags.track_total) = parse_number_pair(&text()),
        "TPOS" | "TPA" => (tags.disc, tags.disc_total) = parse_number_pair(&text()),
        "USLT" | "ULT" => tags.lyrics = decode_language_text(body),
        "COMM" | "COM" => {
            if tags.comment.is_empty() {
                tags.comment = decode_language_text(body);
            }
        }
        _ => {}
    }
}

/// Read an ID3v2 tag at the start of the data
pub fn read_v2(data: &[u8]) -> Result<Tags, TagError> {
    let header = Header::read(&mut Cursor::new(data))
        .map_err(|e| TagError::malformed(FORMAT, e.to_string()))?;

    if !(2..=4).contains(&header.major) {
        return Err(TagError::malformed(FORMAT, format!("unsupported version 2.{}", header.major)));
    }

    let end = 10 + header.size as usize;
    if end > data.len() {
        return Err(TagError::malformed(FORMAT, "tag size runs past end of file"));
    }

    let mut body = if header.flags & 0x80 != 0 && header.major < 4 {
        remove_unsync(&data[10..end])
    } else {
        data[10..end].to_vec()
    };

    // extended header
    if header.flags & 0x40 != 0 && header.major >= 3 {
        if body.len() < 4 {
            return Err(TagError::malformed(FORMAT, "truncated extended header"));
        }
        let size = if header.major == 4 {
            syncsafe([body[0], body[1], body[2], body[3]]) as usize
        } else {
            u32::from_be_bytes([body[0], body[1], body[2], body[3]]) as usize + 4
        };
        if size > body.len() {
            return Err(TagError::malformed(FORMAT, "extended header runs past tag"));
        }
        body.drain(..size);
    }

    let (id_len, header_len) = if header.major == 2 { (3, 6) } else { (4, 10) };
    let mut tags = Tags::default();
    let mut pos = 0usize;

    while pos + header_len <= body.len() {
        let frame = &body[pos..pos + header_len];
        if frame[0] == 0 {
            // padding
            break;
        }

        let id = String::from_utf8_lossy(&frame[..id_len]).into_owned();
        let size = match header.major {
            2 => u32::from_be_bytes([0, frame[3], frame[4], frame[5]]),
            3 => u32::from_be_bytes([frame[4], frame[5], frame[6], frame[7]]),
            _ => syncsafe([frame[4], frame[5], frame[6], frame[7]]),
        } as usize;
        let format_flags = if header.major == 2 { 0 } else { frame[9] };

        let start = pos + header_len;
        let end = start
            .checked_add(size)
            .filter(|end| *end <= body.len())
            .ok_or_else(|| TagError::malformed(FORMAT, format!("frame {} runs past tag", id)))?;
        pos = end;

        let mut frame_body = &body[start..end];

        let (compressed, encrypted, unsync, length_indicator) = match header.major {
            3 => (format_flags & 0x80 != 0, format_flags & 0x40 != 0, false, false),
            4 => (
                format_flags & 0x08 != 0,
                format_flags & 0x04 != 0,
                format_flags & 0x02 != 0,
                format_flags & 0x01 != 0,
            ),
            _ => (false, false, false, false),
        };
        if compressed || encrypted {
            continue;
        }
        if length_indicator {
            if frame_body.len() < 4 {
                continue;
            }
            frame_body = &frame_body[4..];
        }

        if unsync {
            apply_frame(&mut tags, &id, &remove_unsync(frame_body));
        } else {
            apply_frame(&mut tags, &id, frame_body);
        }
    }

    Ok(tags)
}

fn v1_field(data: &[u8]) -> String {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    let text: String = data[..end].iter().map(|&b| b as char).collect();
    text.trim_end().to_string()
}

/// Read an ID3v1 tag from the last 128 bytes, if present
pub fn read_v1(data: &[u8]) -> Option<Tags> {
    if data.len() < 128 {
        return None;
    }
    let tag = &data[data.len() - 128..];
    if !tag.starts_with(b"TAG") {
        return None;
    }

    let comment = &tag[97..127];
    let (comment_text, track) = if comment[28] == 0 && comment[29] != 0 {
        (v1_field(&comment[..28]), u32::from(comment[29]))
    } else {
        (v1_field(comment), 0)
    };

    Some(Tags {
        title: v1_field(&tag[3..33]),
        artist: v1_field(&tag[33..63]),
        album: v1_field(&tag[63..93]),
        year: parse_year(&v1_field(&tag[93..97])),
        comment: comment_text,
        track,
        genre: ID3V1_GENRES
            .get(tag[127] as usize)
            .map(|g| g.to_string())
            .unwrap_or_default(),
        ..Tags::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::testdata;

    #[test]
    fn test_read_v23_text_frames() {
        let data = testdata::mp3(&[
            ("TIT2", "Boring"),
            ("TALB", "Wat?"),
            ("TPE1", "Small Dude"),
            ("TCON", "(13)"),
            ("TYER", "1994"),
            ("TRCK", "2/10"),
        ]);
        let tags = read_v2(&data).unwrap();
        assert_eq!(tags.title, "Boring");
        assert_eq!(tags.album, "Wat?");
        assert_eq!(tags.artist, "Small Dude");
        assert_eq!(tags.genre, "Pop");
        assert_eq!(tags.year, 1994);
        assert_eq!((tags.track, tags.track_total), (2, 10));
    }

    #[test]
    fn test_comment_frame() {
        let mut body = vec![0u8];
        body.extend_from_slice(b"eng");
        body.extend_from_slice(b"\0wrote this when I was bored");
        let mut tags = Tags::default();
        apply_frame(&mut tags, "COMM", &body);
        assert_eq!(tags.comment, "wrote this when I was bored");
    }

    #[test]
    fn test_utf16_text() {
        let mut body = vec![1u8, 0xFF, 0xFE];
        for unit in "Acoustic".encode_utf16() {
            body.extend_from_slice(&unit.to_le_bytes());
        }
        let mut tags = Tags::default();
        apply_frame(&mut tags, "TCON", &body);
        assert_eq!(tags.genre, "Acoustic");
    }

    #[test]
    fn test_truncated_tag() {
        let data = testdata::mp3(&[("TIT2", "Boring")]);
        assert!(read_v2(&data[..12]).is_err());
    }

    #[test]
    fn test_read_v1() {
        let mut data = vec![0u8; 300];
        let mut tag = vec![0u8; 128];
        tag[..3].copy_from_slice(b"TAG");
        tag[3..9].copy_from_slice(b"Boring");
        tag[93..97].copy_from_slice(b"1994");
        tag[126] = 2;
        tag[127] = 17;
        data.extend_from_slice(&tag);

        let tags = read_v1(&data).unwrap();
        assert_eq!(tags.title, "Boring");
        assert_eq!(tags.year, 1994);
        assert_eq!(tags.track, 2);
        assert_eq!(tags.genre, "Rock");
    }
}
