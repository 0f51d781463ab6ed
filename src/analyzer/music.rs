//! Rules for music albums

use serde::Serialize;
use std::io::Read;
use tracing::debug;

use super::{AnalyzeError, AnalyzeResult, Analyzer, Metadata};
use crate::tags::{self, FileType};

fn is_zero(n: &u32) -> bool {
    *n == 0
}

fn is_zero_year(n: &i32) -> bool {
    *n == 0
}

/// Song metadata collected from audio tags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrackInfo {
    pub file_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub album: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub artist: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub album_artist: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub composer: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub genre: String,
    #[serde(skip_serializing_if = "is_zero_year")]
    pub year: i32,
    #[serde(skip_serializing_if = "is_zero")]
    pub track: u32,
    #[serde(skip_serializing_if = "is_zero")]
    pub track_total: u32,
    #[serde(skip_serializing_if = "is_zero")]
    pub disc: u32,
    #[serde(skip_serializing_if = "is_zero")]
    pub disc_total: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub lyrics: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub comment: String,
}

impl TrackInfo {
    fn new(file_type: FileType, tags: tags::Tags) -> Self {
        Self {
            file_type: file_type.to_string(),
            title: tags.title,
            album: tags.album,
            artist: tags.artist,
            album_artist: tags.album_artist,
            composer: tags.composer,
            genre: tags.genre,
            year: tags.year,
            track: tags.track,
            track_total: tags.track_total,
            disc: tags.disc,
            disc_total: tags.disc_total,
            lyrics: tags.lyrics,
            comment: tags.comment,
        }
    }
}

/// Accepts FLAC, Ogg and MP3 files and collects their tags. Everything else
/// is skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct MusicAnalyzer;

impl Analyzer for MusicAnalyzer {
    fn analyze(&self, reader: &mut dyn Read, key: &str) -> Result<AnalyzeResult, AnalyzeError> {
        // Tag formats need random access, so buffer the whole entry
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;

        let (file_type, tags) = tags::read_from(&data).map_err(|e| {
            debug!("No usable tags in {}: {}", key, e);
            AnalyzeError::Skipped(e.to_string())
        })?;

        let content_type = match file_type {
            FileType::Flac => "audio/flac",
            FileType::Ogg => "audio/ogg",
            FileType::Mp3 => "audio/mpeg",
            FileType::Mp4 => {
                return Err(AnalyzeError::Skipped(format!(
                    "unsupported music file format {:?}",
                    file_type.to_string()
                )))
            }
        };

        let mut res = AnalyzeResult::new(key, content_type);
        res.metadata = Some(Metadata::Track(TrackInfo::new(file_type, tags)));
        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::testdata;

    fn analyze(data: &[u8]) -> Result<AnalyzeResult, AnalyzeError> {
        MusicAnalyzer.analyze(&mut &data[..], "key")
    }

    fn track(res: &AnalyzeResult) -> &TrackInfo {
        match &res.metadata {
            Some(Metadata::Track(info)) => info,
            None => panic!("no metadata"),
        }
    }

    #[test]
    fn test_flac() {
        let data = testdata::flac(&[
            ("TITLE", "Long drone"),
            ("ALBUM", "Fall asleep"),
            ("ARTIST", "Smith"),
            ("ALBUMARTIST", "Smith"),
            ("COMPOSER", "Smith"),
            ("DATE", "2005"),
            ("TRACKNUMBER", "4"),
            ("TRACKTOTAL", "6"),
            ("DISCNUMBER", "2"),
            ("DISCTOTAL", "2"),
        ]);
        let res = analyze(&data).unwrap();
        assert_eq!(res.key, "key");
        assert_eq!(res.content_type, "audio/flac");
        assert_eq!(res.content_encoding, None);
        assert_eq!(
            track(&res),
            &TrackInfo {
                file_type: "FLAC".into(),
                title: "Long drone".into(),
                album: "Fall asleep".into(),
                artist: "Smith".into(),
                album_artist: "Smith".into(),
                composer: "Smith".into(),
                year: 2005,
                track: 4,
                track_total: 6,
                disc: 2,
                disc_total: 2,
                ..TrackInfo::default()
            }
        );
    }

    #[test]
    fn test_opus() {
        let data = testdata::opus(&[
            ("TITLE", "Halloween song 2"),
            ("ALBUM", "Don't listen to any of these songs"),
            ("ARTIST", "Creepy Weirdo"),
            ("GENRE", "horror"),
            ("DATE", "2022"),
            ("TRACKNUMBER", "12"),
            ("TRACKTOTAL", "666"),
            ("LYRICS", "pumpkins yeah\\ndecorate your house"),
            ("COMMENT", "spooky tune"),
        ]);
        let res = analyze(&data).unwrap();
        assert_eq!(res.content_type, "audio/ogg");
        let info = track(&res);
        assert_eq!(info.file_type, "Ogg");
        assert_eq!(info.album, "Don't listen to any of these songs");
        assert_eq!(info.lyrics, "pumpkins yeah\\ndecorate your house");
        assert_eq!((info.track, info.track_total), (12, 666));
    }

    #[test]
    fn test_mp3() {
        let data = testdata::mp3(&[
            ("TIT2", "Boring"),
            ("TALB", "Wat?"),
            ("TPE1", "Small Dude"),
            ("TCON", "Acoustic"),
            ("TYER", "1994"),
            ("TRCK", "2/10"),
        ]);
        let res = analyze(&data).unwrap();
        assert_eq!(res.content_type, "audio/mpeg");
        let info = track(&res);
        assert_eq!(info.file_type, "MP3");
        assert_eq!(info.title, "Boring");
        assert_eq!(info.genre, "Acoustic");
        assert_eq!(info.year, 1994);
        assert_eq!((info.track, info.track_total), (2, 10));
    }

    #[test]
    fn test_garbage_is_skipped() {
        let garbage = [3u8, 1, 5, 3, 2, 6, 1, 2, 5, 3, 4, 6, 2].repeat(20);
        assert!(analyze(&garbage).unwrap_err().is_skipped());
        assert!(analyze(b"tiny").unwrap_err().is_skipped());
    }

    #[test]
    fn test_mp4_is_skipped() {
        let mut mp4 = vec![0, 0, 0, 0x14];
        mp4.extend_from_slice(b"ftypM4A \x00\x00\x00\x00M4A ");
        let err = analyze(&mp4).unwrap_err();
        assert!(err.is_skipped());
        assert!(err.to_string().contains("MP4"));
    }

    #[test]
    fn test_metadata_serialization_omits_empty() {
        let res = analyze(&testdata::flac(&[("TITLE", "Long drone")])).unwrap();
        let json = serde_json::to_value(res.metadata.unwrap()).unwrap();
        assert_eq!(json["file_type"], "FLAC");
        assert_eq!(json["title"], "Long drone");
        assert!(json.get("album").is_none());
        assert!(json.get("year").is_none());
    }
}
