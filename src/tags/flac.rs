//! FLAC metadata blocks

use binrw::prelude::*;
use std::io::Cursor;

use super::{vorbis, TagError, Tags};

const FORMAT: &str = "FLAC";

/// Block type of the Vorbis comment block
const VORBIS_COMMENT: u8 = 4;

/// Metadata block header: last-block flag + 7-bit type, 24-bit length
#[derive(Debug, BinRead)]
#[br(big)]
struct BlockHeader {
    flags: u8,

    #[br(map = |b: [u8; 3]| u32::from_be_bytes([0, b[0], b[1], b[2]]))]
    length: u32,
}

impl BlockHeader {
    fn is_last(&self) -> bool {
        self.flags & 0x80 != 0
    }

    fn block_type(&self) -> u8 {
        self.flags & 0x7F
    }
}

/// Read tags from a `fLaC` stream. A stream without a comment block has
/// empty tags.
pub fn read(data: &[u8]) -> Result<Tags, TagError> {
    let mut pos = 4usize;

    loop {
        let header_end = pos + 4;
        if header_end > data.len() {
            return Err(TagError::malformed(FORMAT, "metadata ends inside a block header"));
        }

        let header = BlockHeader::read(&mut Cursor::new(&data[pos..header_end]))
            .map_err(|e| TagError::malformed(FORMAT, e.to_string()))?;

        let body_end = header_end + header.length as usize;
        if body_end > data.len() {
            return Err(TagError::malformed(FORMAT, "block length runs past end of file"));
        }

        if header.block_type() == VORBIS_COMMENT {
            return vorbis::parse(&data[header_end..body_end]);
        }
        if header.block_type() == 127 {
            return Err(TagError::malformed(FORMAT, "invalid block type 127"));
        }
        if header.is_last() {
            return Ok(Tags::default());
        }

        pos = body_end;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::testdata;

    #[test]
    fn test_read_comment_block() {
        let data = testdata::flac(&[
            ("TITLE", "Long drone"),
            ("ARTIST", "Smith"),
            ("ALBUMARTIST", "Smith"),
            ("COMPOSER", "Smith"),
        ]);
        let tags = read(&data).unwrap();
        assert_eq!(tags.title, "Long drone");
        assert_eq!(tags.album_artist, "Smith");
        assert_eq!(tags.composer, "Smith");
    }

    #[test]
    fn test_truncated_stream() {
        let data = testdata::flac(&[("TITLE", "Long drone")]);
        assert!(read(&data[..20]).is_err());
        assert!(read(&data[..data.len() - 1]).is_err());
    }

    #[test]
    fn test_no_comment_block() {
        let mut data = b"fLaC".to_vec();
        data.push(0x80);
        data.extend_from_slice(&[0, 0, 34]);
        data.extend_from_slice(&[0u8; 34]);
        assert_eq!(read(&data).unwrap(), Tags::default());
    }
}
