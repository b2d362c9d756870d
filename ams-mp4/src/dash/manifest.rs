use crate::{
    config::{JsonConfig, TrackEntry},
    Error, Result,
};
use std::fmt::Write;

/// Composes the static-profile, live-template MPD for one asset.
///
/// One Period with up to three AdaptationSets: audio (group 1), video
/// (group 2) and one set per subtitle track. Representation ids are
/// `{name}={bandwidth}`, which the segment URL routes parse back into an
/// index lookup.
pub fn build_mpd(config: &JsonConfig, asset_id: &str) -> Result<String> {
    let video_tracks = config.video_tracks();
    let audio_tracks = config.audio_tracks();

    let reference = video_tracks
        .iter()
        .chain(audio_tracks.iter())
        .find_map(|t| t.config.as_ref())
        .ok_or(Error::NoTracks)?;

    let duration_ms =
        reference.duration * 1000 / u64::from(reference.timescale.max(1));

    let mut mpd = String::new();
    mpd.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    mpd.push_str("<!-- Created with AMS media origin -->\n");
    mpd.push_str("<MPD\n");
    mpd.push_str("xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\"\n");
    mpd.push_str("xmlns=\"urn:mpeg:dash:schema:mpd:2011\"\n");
    mpd.push_str("xsi:schemaLocation=\"urn:mpeg:dash:schema:mpd:2011 http://standards.iso.org/ittf/PubliclyAvailableStandards/MPEG-DASH_schema_files/DASH-MPD.xsd\"\n");
    mpd.push_str("type=\"static\"\n");
    writeln!(
        mpd,
        "mediaPresentationDuration=\"PT{}H{}M{}.{}S\"",
        duration_ms / 3_600_000,
        (duration_ms / 60_000) % 60,
        (duration_ms / 1000) % 60,
        duration_ms % 1000
    )
    .ok();
    writeln!(mpd, "maxSegmentDuration=\"PT{}S\"", config.segment_duration).ok();
    writeln!(mpd, "minBufferTime=\"PT{}S\"", config.segment_duration + 1).ok();
    mpd.push_str("profiles=\"urn:mpeg:dash:profile:isoff-live:2011\">\n");
    mpd.push_str("  <Period>\n");
    mpd.push_str("    <BaseURL>dash/</BaseURL>\n");

    if !audio_tracks.is_empty() {
        mpd.push_str(&audio_adaptation_set(
            audio_tracks,
            asset_id,
            config.segment_duration,
        )?);
    }
    if !video_tracks.is_empty() {
        mpd.push_str(&video_adaptation_set(
            video_tracks,
            asset_id,
            config.segment_duration,
        )?);
    }
    mpd.push_str(&subtitle_adaptation_sets(config.subtitle_tracks()));

    mpd.push_str("  </Period>\n");
    mpd.push_str("</MPD>\n");

    Ok(mpd)
}

fn bandwidth_range(tracks: &[TrackEntry]) -> (u64, u64) {
    let mut min = 0;
    let mut max = 0;
    for t in tracks {
        if min == 0 || t.bandwidth < min {
            min = t.bandwidth;
        }
        if max == 0 || t.bandwidth > max {
            max = t.bandwidth;
        }
    }
    (min, max)
}

fn audio_adaptation_set(
    tracks: &[TrackEntry],
    asset_id: &str,
    segment_duration: u32,
) -> Result<String> {
    let (min_bandwidth, max_bandwidth) = bandwidth_range(tracks);
    let reference = tracks[0].config.as_ref().ok_or(Error::NoTracks)?;
    let audio = reference.audio.as_ref().ok_or(Error::NoTracks)?;

    let mut s = String::new();
    s.push_str("    <AdaptationSet\n");
    s.push_str("      group=\"1\"\n");
    s.push_str("      contentType=\"audio\"\n");
    writeln!(s, "      lang=\"{}\"", tracks[0].lang).ok();
    writeln!(s, "      minBandwidth=\"{min_bandwidth}\"").ok();
    writeln!(s, "      maxBandwidth=\"{max_bandwidth}\"").ok();
    s.push_str("      segmentAlignment=\"true\"\n");
    writeln!(s, "      audioSamplingRate=\"{}\"", reference.timescale).ok();
    s.push_str("      mimeType=\"audio/mp4\"\n");
    s.push_str("      codecs=\"mp4a.40.2\">\n");
    s.push_str("      <AudioChannelConfiguration\n");
    s.push_str("        schemeIdUri=\"urn:mpeg:dash:23003:3:audio_channel_configuration:2011\"\n");
    writeln!(s, "        value=\"{}\">", audio.number_of_channels).ok();
    s.push_str("      </AudioChannelConfiguration>\n");
    s.push_str(&segment_template(asset_id, reference.timescale, segment_duration));
    for t in tracks {
        s.push_str("      <Representation\n");
        writeln!(s, "        id=\"{}={}\"", t.name, t.bandwidth).ok();
        writeln!(s, "        bandwidth=\"{}\">", t.bandwidth).ok();
        s.push_str("      </Representation>\n");
    }
    s.push_str("    </AdaptationSet>\n");

    Ok(s)
}

fn video_adaptation_set(
    tracks: &[TrackEntry],
    asset_id: &str,
    segment_duration: u32,
) -> Result<String> {
    let (min_bandwidth, max_bandwidth) = bandwidth_range(tracks);
    let reference = tracks[0].config.as_ref().ok_or(Error::NoTracks)?;

    let mut min_width = 0u16;
    let mut max_width = 0u16;
    let mut min_height = 0u16;
    let mut max_height = 0u16;
    for t in tracks {
        let Some(video) = t.config.as_ref().and_then(|c| c.video.as_ref()) else {
            continue;
        };
        if min_width == 0 || video.width < min_width {
            min_width = video.width;
        }
        if max_width == 0 || video.width > max_width {
            max_width = video.width;
        }
        if min_height == 0 || video.height < min_height {
            min_height = video.height;
        }
        if max_height == 0 || video.height > max_height {
            max_height = video.height;
        }
    }

    let mut s = String::new();
    s.push_str("    <AdaptationSet\n");
    s.push_str("      group=\"2\"\n");
    s.push_str("      contentType=\"video\"\n");
    writeln!(s, "      lang=\"{}\"", tracks[0].lang).ok();
    writeln!(s, "      minBandwidth=\"{min_bandwidth}\"").ok();
    writeln!(s, "      maxBandwidth=\"{max_bandwidth}\"").ok();
    writeln!(s, "      minWidth=\"{min_width}\"").ok();
    writeln!(s, "      maxWidth=\"{max_width}\"").ok();
    writeln!(s, "      minHeight=\"{min_height}\"").ok();
    writeln!(s, "      maxHeight=\"{max_height}\"").ok();
    s.push_str("      segmentAlignment=\"true\"\n");
    s.push_str("      mimeType=\"video/mp4\"\n");
    s.push_str("      startWithSAP=\"1\">\n");
    s.push_str(&segment_template(asset_id, reference.timescale, segment_duration));
    for t in tracks {
        let Some(video) = t.config.as_ref().and_then(|c| c.video.as_ref()) else {
            continue;
        };
        s.push_str("      <Representation\n");
        writeln!(s, "        id=\"{}={}\"", t.name, t.bandwidth).ok();
        writeln!(s, "        bandwidth=\"{}\"", t.bandwidth).ok();
        writeln!(s, "        width=\"{}\"", video.width).ok();
        writeln!(s, "        height=\"{}\"", video.height).ok();
        writeln!(
            s,
            "        codecs=\"avc1.{:02X}{:02X}{:02X}\"",
            video.codec_info[0], video.codec_info[1], video.codec_info[2]
        )
        .ok();
        s.push_str("        scanType=\"progressive\">\n");
        s.push_str("      </Representation>\n");
    }
    s.push_str("    </AdaptationSet>\n");

    Ok(s)
}

fn segment_template(asset_id: &str, timescale: u32, segment_duration: u32) -> String {
    let mut s = String::new();
    s.push_str("      <SegmentTemplate\n");
    writeln!(s, "        timescale=\"{timescale}\"").ok();
    writeln!(
        s,
        "        initialization=\"{asset_id}-$RepresentationID$.dash\""
    )
    .ok();
    writeln!(
        s,
        "        media=\"{asset_id}-$RepresentationID$-$Number$.m4s\""
    )
    .ok();
    s.push_str("        startNumber=\"1\"\n");
    writeln!(
        s,
        "        duration=\"{}\">",
        u64::from(segment_duration) * u64::from(timescale)
    )
    .ok();
    s.push_str("      </SegmentTemplate>\n");
    s
}

fn subtitle_adaptation_sets(tracks: &[TrackEntry]) -> String {
    let mut s = String::new();
    for t in tracks {
        writeln!(
            s,
            "    <AdaptationSet mimeType=\"text/vtt\" lang=\"{}\">",
            t.lang
        )
        .ok();
        writeln!(
            s,
            "      <Representation id=\"{}\" bandwidth=\"{}\">",
            t.name, t.bandwidth
        )
        .ok();
        writeln!(s, "        <BaseURL>../../{}</BaseURL>", t.file).ok();
        s.push_str("      </Representation>\n");
        s.push_str("    </AdaptationSet>\n");
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DashConfig, DashVideoEntry, TrackType};
    use std::collections::BTreeMap;

    fn video_track(bandwidth: u64, width: u16, height: u16) -> TrackEntry {
        TrackEntry {
            name: "video_eng".into(),
            bandwidth,
            file: "video.mp4".into(),
            lang: "eng".into(),
            config: Some(DashConfig {
                stsz_box_offset: 0,
                stsz_box_size: 0,
                mdat_box_offset: 0,
                mdat_box_size: 0,
                track_type: TrackType::Video,
                rate: 0x00010000,
                volume: 0x0100,
                duration: 5_400_000,
                timescale: 90_000,
                language: *b"eng",
                handler_type: u32::from_be_bytes(*b"vide"),
                sample_delta: 1024,
                media_time: 0,
                audio: None,
                video: Some(DashVideoEntry {
                    width,
                    height,
                    horizontal_resolution: 0x00480000,
                    vertical_resolution: 0x00480000,
                    entry_data_size: 0,
                    frames_per_sample: 1,
                    bit_depth: 24,
                    color_table_index: -1,
                    codec_info: [0x4D, 0x40, 0x1E],
                    nal_unit_size: 3,
                    sps_entry_count: 1,
                    sps_size: 4,
                    sps_data: vec![0x67, 0x4d, 0x40, 0x1e],
                    pps_entry_count: 1,
                    pps_size: 2,
                    pps_data: vec![0x68, 0xca],
                    stss_box_offset: 0,
                    stss_box_size: 0,
                    ctts_box_offset: 0,
                    ctts_box_size: 0,
                }),
            }),
        }
    }

    fn config_with_video() -> JsonConfig {
        let mut tracks = BTreeMap::new();
        tracks.insert("video".to_string(), vec![video_track(1_500_000, 1280, 720)]);
        JsonConfig {
            segment_duration: 10,
            tracks,
        }
    }

    #[test]
    fn codecs_and_dimensions() {
        let mpd = build_mpd(&config_with_video(), "bbb").unwrap();
        assert!(mpd.contains("codecs=\"avc1.4D401E\""));
        assert!(mpd.contains("width=\"1280\""));
        assert!(mpd.contains("height=\"720\""));
        assert!(mpd.contains("id=\"video_eng=1500000\""));
        assert!(mpd.contains("initialization=\"bbb-$RepresentationID$.dash\""));
        assert!(mpd.contains("duration=\"900000\""));
    }

    #[test]
    fn presentation_duration_format() {
        // 5_400_000 / 90_000 = 60 seconds.
        let mpd = build_mpd(&config_with_video(), "bbb").unwrap();
        assert!(mpd.contains("mediaPresentationDuration=\"PT0H1M0.0S\""));
        assert!(mpd.contains("minBufferTime=\"PT11S\""));
    }

    #[test]
    fn height_bounds_use_heights() {
        let mut config = config_with_video();
        config.tracks.get_mut("video").unwrap().push({
            let mut t = video_track(800_000, 640, 360);
            t.name = "video_fra".into();
            t
        });

        let mpd = build_mpd(&config, "bbb").unwrap();
        assert!(mpd.contains("minHeight=\"360\""));
        assert!(mpd.contains("maxHeight=\"720\""));
        assert!(mpd.contains("minBandwidth=\"800000\""));
        assert!(mpd.contains("maxBandwidth=\"1500000\""));
    }

    #[test]
    fn empty_package_is_rejected() {
        let config = JsonConfig {
            segment_duration: 10,
            tracks: BTreeMap::new(),
        };
        assert!(matches!(build_mpd(&config, "bbb"), Err(Error::NoTracks)));
    }
}
