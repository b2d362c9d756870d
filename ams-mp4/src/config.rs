use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Codec family of an indexed track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackType {
    Audio,
    Video,
}

impl std::fmt::Display for TrackType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackType::Audio => write!(f, "audio"),
            TrackType::Video => write!(f, "video"),
        }
    }
}

/// Audio codec parameters lifted from the `mp4a` sample entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DashAudioEntry {
    pub number_of_channels: u16,
    pub sample_size: u16,
    pub compression_id: u16,
    /// 16.16 fixed point, as stored in the sample entry.
    pub sample_rate: u32,
}

/// Video codec parameters lifted from the `avc1` and `avcC` boxes, plus the
/// source-file locations of the sync-sample and composition-offset tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DashVideoEntry {
    pub width: u16,
    pub height: u16,
    pub horizontal_resolution: u32,
    pub vertical_resolution: u32,
    pub entry_data_size: u32,
    pub frames_per_sample: u16,
    pub bit_depth: u16,
    pub color_table_index: i16,
    /// AVC profile, profile-compatibility and level, in that order.
    pub codec_info: [u8; 3],
    /// NAL unit length minus one, reserved bits stripped.
    pub nal_unit_size: u8,
    #[serde(rename = "SPSEntryCount")]
    pub sps_entry_count: u8,
    #[serde(rename = "SPSSize")]
    pub sps_size: u16,
    #[serde(rename = "SPSData")]
    pub sps_data: Vec<u8>,
    #[serde(rename = "PPSEntryCount")]
    pub pps_entry_count: u8,
    #[serde(rename = "PPSSize")]
    pub pps_size: u16,
    #[serde(rename = "PPSData")]
    pub pps_data: Vec<u8>,
    pub stss_box_offset: u64,
    pub stss_box_size: u32,
    pub ctts_box_offset: u64,
    pub ctts_box_size: u32,
}

/// Everything segment generation needs to know about one source track.
///
/// Produced once by the offline indexer and persisted as JSON; read-only
/// afterwards, so concurrent request handlers share it freely. The byte
/// offsets stay valid only as long as the source file is untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DashConfig {
    pub stsz_box_offset: u64,
    pub stsz_box_size: u32,
    pub mdat_box_offset: u64,
    pub mdat_box_size: u32,
    #[serde(rename = "Type")]
    pub track_type: TrackType,
    /// 16.16 fixed point, typically 1.0.
    pub rate: i32,
    /// 8.8 fixed point, typically full volume.
    pub volume: i16,
    /// Track duration in `timescale` units.
    pub duration: u64,
    pub timescale: u32,
    /// ISO-639-2/T letters.
    pub language: [u8; 3],
    /// Handler FourCC from `hdlr`.
    pub handler_type: u32,
    /// Uniform sample duration from the first `stts` run.
    pub sample_delta: u32,
    /// First edit's media time from `elst`; subtracted from composition
    /// offsets.
    pub media_time: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<DashAudioEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<DashVideoEntry>,
}

impl DashConfig {
    /// Advertised bandwidth in bits per second.
    pub fn bandwidth(&self) -> u64 {
        if self.duration == 0 {
            return 0;
        }
        (self.mdat_box_size as f64 / (self.duration as f64 / self.timescale as f64) * 8.0) as u64
    }

    pub fn language_str(&self) -> String {
        String::from_utf8_lossy(&self.language).into_owned()
    }
}

/// One logical track of a package: a name like `video_eng`, the source file
/// it reads from, and the indexed configuration (absent for subtitles).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TrackEntry {
    pub name: String,
    pub bandwidth: u64,
    /// Source path, relative to the directory of the index file.
    pub file: String,
    pub lang: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<DashConfig>,
}

/// The persisted package index: every track of every kind, plus the segment
/// duration the whole presentation is cut to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JsonConfig {
    pub segment_duration: u32,
    /// Keyed by `"video"`, `"audio"` or `"subtitle"`; order within a kind is
    /// the packaging order.
    pub tracks: BTreeMap<String, Vec<TrackEntry>>,
}

impl JsonConfig {
    pub fn video_tracks(&self) -> &[TrackEntry] {
        self.tracks.get("video").map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn audio_tracks(&self) -> &[TrackEntry] {
        self.tracks.get("audio").map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn subtitle_tracks(&self) -> &[TrackEntry] {
        self.tracks.get("subtitle").map(Vec::as_slice).unwrap_or(&[])
    }

    /// Finds the entry matching a `(kind, name, bandwidth)` triple from a
    /// segment URL.
    pub fn find_track(&self, kind: &str, name: &str, bandwidth: u64) -> Option<&TrackEntry> {
        self.tracks
            .get(kind)?
            .iter()
            .find(|t| t.name == name && t.bandwidth == bandwidth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio_config() -> DashConfig {
        DashConfig {
            stsz_box_offset: 2000,
            stsz_box_size: 52,
            mdat_box_offset: 4000,
            mdat_box_size: 1_000_000,
            track_type: TrackType::Audio,
            rate: 0x00010000,
            volume: 0x0100,
            duration: 480_000,
            timescale: 48_000,
            language: *b"eng",
            handler_type: u32::from_be_bytes(*b"soun"),
            sample_delta: 1024,
            media_time: 0,
            audio: Some(DashAudioEntry {
                number_of_channels: 2,
                sample_size: 16,
                compression_id: 0,
                sample_rate: 48_000 << 16,
            }),
            video: None,
        }
    }

    #[test]
    fn bandwidth_formula() {
        // 1 MB over 10 seconds of media.
        assert_eq!(audio_config().bandwidth(), 800_000);
    }

    #[test]
    fn json_omits_absent_codec_entry() {
        let json = serde_json::to_string(&audio_config()).unwrap();
        assert!(json.contains("\"Audio\""));
        assert!(!json.contains("\"Video\""));
        assert!(json.contains("\"Type\":\"audio\""));

        let back: DashConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, audio_config());
    }

    #[test]
    fn find_track_matches_exact_triple() {
        let mut config = JsonConfig {
            segment_duration: 10,
            tracks: BTreeMap::new(),
        };
        config.tracks.insert(
            "audio".into(),
            vec![TrackEntry {
                name: "audio_eng".into(),
                bandwidth: 128_000,
                file: "audio.mp4".into(),
                lang: "eng".into(),
                config: Some(audio_config()),
            }],
        );

        assert!(config.find_track("audio", "audio_eng", 128_000).is_some());
        assert!(config.find_track("audio", "audio_eng", 128_001).is_none());
        assert!(config.find_track("video", "audio_eng", 128_000).is_none());
    }
}
