use crate::{
    boxes::Mp4Box,
    config::{DashAudioEntry, DashConfig, DashVideoEntry, JsonConfig, TrackEntry, TrackType},
    tree::BoxTree,
    Error, Result,
};
use log::info;
use std::{collections::BTreeMap, path::Path};

const AVC1_PATH: &str = "moov.trak.mdia.minf.stbl.stsd.avc1";
const MP4A_PATH: &str = "moov.trak.mdia.minf.stbl.stsd.mp4a";

/// One indexed source file: its track kind plus the entry to be merged into
/// a package.
#[derive(Debug, Clone)]
pub struct Mp4Index {
    pub kind: TrackType,
    pub entry: TrackEntry,
}

/// Walks a source MP4 and distills the per-track configuration that segment
/// generation needs: codec parameters, timing, and the source-file locations
/// of `mdat`, `stsz`, `stss` and `ctts`.
///
/// Only single-track progressive files with one `avc1` or `mp4a` sample
/// entry are supported.
pub fn index_mp4(path: &Path, language: &str) -> Result<Mp4Index> {
    let tree = BoxTree::parse_file(path)?;

    let trak_count = tree.get_all("moov.trak").len();
    if trak_count > 1 {
        return Err(Error::UnsupportedInput(format!(
            "{} declares {trak_count} tracks, expected exactly one",
            path.display()
        )));
    }

    let kind = if tree.contains(AVC1_PATH) {
        TrackType::Video
    } else if tree.contains(MP4A_PATH) {
        TrackType::Audio
    } else {
        return Err(Error::UnsupportedInput(format!(
            "{} holds neither an avc1 nor an mp4a sample entry",
            path.display()
        )));
    };

    let config = build_config(&tree, kind, path)?;
    let bandwidth = config.bandwidth();

    let entry = TrackEntry {
        name: format!("{kind}_{language}"),
        bandwidth,
        file: path.to_string_lossy().into_owned(),
        lang: language.to_string(),
        config: Some(config),
    };

    info!(
        "indexed {} as {} ({} b/s)",
        path.display(),
        entry.name,
        bandwidth
    );

    Ok(Mp4Index { kind, entry })
}

fn build_config(tree: &BoxTree, kind: TrackType, path: &Path) -> Result<DashConfig> {
    let missing =
        |what: &str| Error::UnsupportedInput(format!("{} has no {what} box", path.display()));

    let Some(Mp4Box::Mdat(mdat)) = tree.get("mdat") else {
        return Err(missing("mdat"));
    };
    let Some(Mp4Box::Mdhd(mdhd)) = tree.get("moov.trak.mdia.mdhd") else {
        return Err(missing("mdhd"));
    };
    let Some(Mp4Box::Hdlr(hdlr)) = tree.get("moov.trak.mdia.hdlr") else {
        return Err(missing("hdlr"));
    };
    let Some(Mp4Box::Stts(stts)) = tree.get("moov.trak.mdia.minf.stbl.stts") else {
        return Err(missing("stts"));
    };
    let Some(Mp4Box::Stsz(stsz)) = tree.get("moov.trak.mdia.minf.stbl.stsz") else {
        return Err(missing("stsz"));
    };
    let sample_delta = stts
        .entries
        .first()
        .ok_or_else(|| missing("stts entry"))?
        .sample_delta;

    // A missing edit list means no composition shift.
    let media_time = match tree.get("moov.trak.edts.elst") {
        Some(Mp4Box::Elst(elst)) => elst.media_time(),
        _ => 0,
    };

    let mut config = DashConfig {
        stsz_box_offset: stsz.offset,
        stsz_box_size: stsz.payload_size(),
        mdat_box_offset: mdat.offset,
        mdat_box_size: mdat.size,
        track_type: kind,
        rate: 0x00010000,
        volume: 0x0100,
        duration: mdhd.duration,
        timescale: mdhd.timescale,
        language: mdhd.language_code(),
        handler_type: hdlr.handler_type,
        sample_delta,
        media_time,
        audio: None,
        video: None,
    };

    match kind {
        TrackType::Audio => {
            let Some(Mp4Box::Mp4a(mp4a)) = tree.get(MP4A_PATH) else {
                return Err(missing("mp4a"));
            };
            config.audio = Some(DashAudioEntry {
                number_of_channels: mp4a.number_of_channels,
                sample_size: mp4a.sample_size,
                compression_id: mp4a.compression_id,
                sample_rate: mp4a.sample_rate,
            });
        }
        TrackType::Video => {
            let Some(Mp4Box::Avc1(avc1)) = tree.get(AVC1_PATH) else {
                return Err(missing("avc1"));
            };
            let Some(Mp4Box::AvcC(avcc)) = tree.get("moov.trak.mdia.minf.stbl.stsd.avc1.avcC")
            else {
                return Err(missing("avcC"));
            };

            let (stss_box_offset, stss_box_size) =
                match tree.get("moov.trak.mdia.minf.stbl.stss") {
                    Some(Mp4Box::Stss(stss)) => (stss.offset, stss.payload_size()),
                    _ => (0, 0),
                };
            let (ctts_box_offset, ctts_box_size) =
                match tree.get("moov.trak.mdia.minf.stbl.ctts") {
                    Some(Mp4Box::Ctts(ctts)) => (ctts.offset, ctts.payload_size()),
                    _ => (0, 0),
                };

            config.video = Some(DashVideoEntry {
                width: avc1.width,
                height: avc1.height,
                horizontal_resolution: avc1.horizontal_resolution,
                vertical_resolution: avc1.vertical_resolution,
                entry_data_size: avc1.entry_data_size,
                frames_per_sample: avc1.frames_per_sample,
                bit_depth: avc1.bit_depth,
                color_table_index: avc1.color_table_index,
                codec_info: [
                    avcc.avc_profile_indication,
                    avcc.profile_compatibility,
                    avcc.avc_level_indication,
                ],
                nal_unit_size: avcc.nal_unit_size & 0x03,
                sps_entry_count: avcc.sps_entry_count,
                sps_size: avcc.sps_size,
                sps_data: avcc.sps_data.clone(),
                pps_entry_count: avcc.pps_entry_count,
                pps_size: avcc.pps_size,
                pps_data: avcc.pps_data.clone(),
                stss_box_offset,
                stss_box_size,
                ctts_box_offset,
                ctts_box_size,
            });
        }
    }

    Ok(config)
}

/// Builds the subtitle entry for a sidecar VTT file. Subtitles bypass
/// indexing entirely; the manifest points straight at the file.
pub fn subtitle_entry(path: &Path, language: &str) -> TrackEntry {
    TrackEntry {
        name: format!("caption_{language}"),
        bandwidth: 256,
        file: path.to_string_lossy().into_owned(),
        lang: language.to_string(),
        config: None,
    }
}

/// Groups indexed tracks and subtitle entries into one package index.
pub fn assemble(
    segment_duration: u32,
    indexed: Vec<Mp4Index>,
    subtitles: Vec<TrackEntry>,
) -> JsonConfig {
    let mut tracks: BTreeMap<String, Vec<TrackEntry>> = BTreeMap::new();

    for item in indexed {
        let key = match item.kind {
            TrackType::Video => "video",
            TrackType::Audio => "audio",
        };
        tracks.entry(key.to_string()).or_default().push(item.entry);
    }
    if !subtitles.is_empty() {
        tracks.insert("subtitle".to_string(), subtitles);
    }

    JsonConfig {
        segment_duration,
        tracks,
    }
}
