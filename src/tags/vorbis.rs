//! Vorbis comment block (shared by FLAC and Ogg)

use super::{parse_number_pair, parse_year, TagError, Tags};

const FORMAT: &str = "vorbis comment";

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn u32_le(&mut self) -> Result<u32, TagError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], TagError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| TagError::malformed(FORMAT, "length runs past end of block"))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }
}

/// Parse a comment block: vendor string, then `KEY=value` fields
pub fn parse(block: &[u8]) -> Result<Tags, TagError> {
    let mut cursor = Cursor { data: block, pos: 0 };

    let vendor_len = cursor.u32_le()? as usize;
    cursor.take(vendor_len)?;

    let count = cursor.u32_le()?;
    let mut tags = Tags::default();

    for _ in 0..count {
        let len = cursor.u32_le()? as usize;
        let field = String::from_utf8_lossy(cursor.take(len)?);
        if let Some((key, value)) = field.split_once('=') {
            apply_field(&mut tags, &key.to_uppercase(), value);
        }
    }

    Ok(tags)
}

fn apply_field(tags: &mut Tags, key: &str, value: &str) {
    match key {
        "TITLE" => tags.title = value.to_string(),
        "ALBUM" => tags.album = value.to_string(),
        "ARTIST" => tags.artist = value.to_string(),
        "ALBUMARTIST" | "ALBUM ARTIST" => tags.album_artist = value.to_string(),
        "COMPOSER" => tags.composer = value.to_string(),
        "GENRE" => tags.genre = value.to_string(),
        "DATE" | "YEAR" => tags.year = parse_year(value),
        "TRACKNUMBER" => {
            let (track, total) = parse_number_pair(value);
            tags.track = track;
            if total != 0 {
                tags.track_total = total;
            }
        }
        "TRACKTOTAL" | "TOTALTRACKS" => tags.track_total = parse_number_pair(value).0,
        "DISCNUMBER" => {
            let (disc, total) = parse_number_pair(value);
            tags.disc = disc;
            if total != 0 {
                tags.disc_total = total;
            }
        }
        "DISCTOTAL" | "TOTALDISCS" => tags.disc_total = parse_number_pair(value).0,
        "LYRICS" | "UNSYNCEDLYRICS" => tags.lyrics = value.to_string(),
        "COMMENT" | "DESCRIPTION" => tags.comment = value.to_string(),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(fields: &[&str]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&3u32.to_le_bytes());
        out.extend_from_slice(b"ven");
        out.extend_from_slice(&(fields.len() as u32).to_le_bytes());
        for field in fields {
            out.extend_from_slice(&(field.len() as u32).to_le_bytes());
            out.extend_from_slice(field.as_bytes());
        }
        out
    }

    #[test]
    fn test_fields() {
        let tags = parse(&block(&[
            "title=Long drone",
            "ALBUM=Fall asleep",
            "TRACKNUMBER=4",
            "TRACKTOTAL=6",
            "DISCNUMBER=2/2",
            "DATE=2005-01-01",
            "NOEQUALS",
        ]))
        .unwrap();

        assert_eq!(tags.title, "Long drone");
        assert_eq!(tags.album, "Fall asleep");
        assert_eq!((tags.track, tags.track_total), (4, 6));
        assert_eq!((tags.disc, tags.disc_total), (2, 2));
        assert_eq!(tags.year, 2005);
    }

    #[test]
    fn test_truncated_block() {
        let mut data = block(&["TITLE=abc"]);
        data.truncate(data.len() - 2);
        assert!(matches!(parse(&data), Err(TagError::Malformed { .. })));
    }

    #[test]
    fn test_huge_length_does_not_panic() {
        let mut data = Vec::new();
        data.extend_from_slice(&u32::MAX.to_le_bytes());
        assert!(parse(&data).is_err());
    }
}
