//! Ogg pages and Vorbis/Opus comment packets

use binrw::prelude::*;
use std::io::Cursor;

use super::{vorbis, TagError, Tags};

const FORMAT: &str = "Ogg";

/// Fixed 27-byte page header plus its lacing table
#[derive(Debug, BinRead)]
#[br(little, magic = b"OggS")]
struct PageHeader {
    version: u8,
    _header_type: u8,
    _granule_position: u64,
    serial: u32,
    _sequence: u32,
    _checksum: u32,
    _segment_count: u8,

    #[br(count = _segment_count)]
    lacing: Vec<u8>,
}

impl PageHeader {
    fn len(&self) -> usize {
        27 + self.lacing.len()
    }
}

/// Reassemble the first `wanted` packets of the first logical stream
fn first_packets(data: &[u8], wanted: usize) -> Result<Vec<Vec<u8>>, TagError> {
    let mut packets = Vec::new();
    let mut current = Vec::new();
    let mut pos = 0usize;
    let mut stream_serial = None;

    while packets.len() < wanted {
        if pos >= data.len() {
            return Err(TagError::malformed(FORMAT, "stream ended before header packets"));
        }

        let header = PageHeader::read(&mut Cursor::new(&data[pos..]))
            .map_err(|e| TagError::malformed(FORMAT, e.to_string()))?;
        if header.version != 0 {
            return Err(TagError::malformed(FORMAT, format!("unknown page version {}", header.version)));
        }

        let mut body = pos + header.len();
        pos = body + header.lacing.iter().map(|l| *l as usize).sum::<usize>();
        if pos > data.len() {
            return Err(TagError::malformed(FORMAT, "page body runs past end of file"));
        }

        let serial = *stream_serial.get_or_insert(header.serial);
        if header.serial != serial {
            continue;
        }

        for lace in &header.lacing {
            let len = *lace as usize;
            current.extend_from_slice(&data[body..body + len]);
            body += len;
            if len < 255 {
                packets.push(std::mem::take(&mut current));
                if packets.len() == wanted {
                    break;
                }
            }
        }
    }

    Ok(packets)
}

/// Read tags from an Ogg Vorbis or Ogg Opus stream
pub fn read(data: &[u8]) -> Result<Tags, TagError> {
    let packets = first_packets(data, 2)?;
    let (ident, comment) = (&packets[0], &packets[1]);

    if ident.starts_with(b"\x01vorbis") {
        let body = comment
            .strip_prefix(b"\x03vorbis")
            .ok_or_else(|| TagError::malformed(FORMAT, "second Vorbis packet is not a comment header"))?;
        return vorbis::parse(body);
    }

    if ident.starts_with(b"OpusHead") {
        let body = comment
            .strip_prefix(b"OpusTags")
            .ok_or_else(|| TagError::malformed(FORMAT, "second Opus packet is not OpusTags"))?;
        return vorbis::parse(body);
    }

    Err(TagError::malformed(FORMAT, "unsupported codec in first packet"))
}
