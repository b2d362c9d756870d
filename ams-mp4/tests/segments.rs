use ams_mp4::{
    boxes::{
        AvcCBox, Avc1Box, CttsBox, CttsEntry, DrefBox, ElstBox, ElstEntry, EsdsBox, FtypBox,
        HdlrBox, MdhdBox, Mp4Box, Mp4aBox, MvhdBox, SmhdBox, StcoBox, StscBox, StscEntry, StsdBox,
        StssBox, SttsBox, SttsEntry, StszBox, TkhdBox, VmhdBox,
    },
    build_init, build_mpd, build_segment, index_mp4, BoxTree, Error, TrackType,
};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::LazyLock,
};

static OUTPUT_DIR: LazyLock<PathBuf> = LazyLock::new(|| {
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../target/ams-mp4-tests");
    fs::create_dir_all(&dir).ok();
    dir
});

// ==========================================
// Fixture synthesis
// ==========================================

const AUDIO_SAMPLES: u32 = 100;
const AUDIO_SAMPLE_SIZE: u32 = 200;
const AUDIO_DELTA: u32 = 1024;
const AUDIO_TIMESCALE: u32 = 48_000;

const VIDEO_SAMPLES: u32 = 300;
const VIDEO_DELTA: u32 = 3000;
const VIDEO_TIMESCALE: u32 = 90_000;
const VIDEO_SYNC: [u32; 4] = [1, 77, 153, 229];
const VIDEO_MEDIA_TIME: i64 = 3000;

fn video_sample_size(i: u32) -> u32 {
    50 + (i % 7)
}

fn container(name: &[u8; 4], children: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + children.len());
    out.extend_from_slice(&(8 + children.len() as u32).to_be_bytes());
    out.extend_from_slice(name);
    out.extend_from_slice(children);
    out
}

/// Grows a serialized leaf into a container by appending children and
/// patching the declared size, the way `stsd`/`mp4a`/`avc1` nest on the
/// wire.
fn with_children(mut leaf: Vec<u8>, children: &[u8]) -> Vec<u8> {
    let total = (leaf.len() + children.len()) as u32;
    leaf[..4].copy_from_slice(&total.to_be_bytes());
    leaf.extend_from_slice(children);
    leaf
}

fn raw_box(name: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    container(name, payload)
}

fn movie_header(movie_timescale: u32, movie_duration: u64) -> Vec<u8> {
    Mp4Box::Mvhd(MvhdBox {
        version: 0,
        flags: [0; 3],
        creation_time: 0,
        modification_time: 0,
        timescale: movie_timescale,
        duration: movie_duration,
        rate: 0x00010000,
        volume: 0x0100,
        reserved: 0,
        reserved2: 0,
        matrix: [0x00010000, 0, 0, 0, 0x00010000, 0, 0, 0, 0x40000000],
        pre_defined: [0; 6],
        next_track_id: 2,
    })
    .to_bytes()
    .unwrap()
}

fn track_header(duration: u64, width: u16, height: u16) -> Vec<u8> {
    Mp4Box::Tkhd(TkhdBox {
        version: 0,
        flags: [0, 0, 7],
        creation_time: 0,
        modification_time: 0,
        track_id: 1,
        reserved: 0,
        duration,
        reserved2: 0,
        layer: 0,
        alternate_group: 0,
        volume: if width == 0 { 0x0100 } else { 0 },
        reserved3: 0,
        matrix: [0x00010000, 0, 0, 0, 0x00010000, 0, 0, 0, 0x40000000],
        width: u32::from(width) << 16,
        height: u32::from(height) << 16,
    })
    .to_bytes()
    .unwrap()
}

fn edit_list(media_time: i64) -> Vec<u8> {
    let elst = Mp4Box::Elst(ElstBox {
        version: 0,
        flags: [0; 3],
        entries: vec![ElstEntry {
            segment_duration: 0,
            media_time,
            media_rate_integer: 1,
            media_rate_fraction: 0,
        }],
    })
    .to_bytes()
    .unwrap();
    container(b"edts", &elst)
}

fn media_header(timescale: u32, duration: u64) -> Vec<u8> {
    Mp4Box::Mdhd(MdhdBox {
        version: 0,
        flags: [0; 3],
        creation_time: 0,
        modification_time: 0,
        timescale,
        duration,
        language: MdhdBox::pack_language(*b"eng"),
        pre_defined: 0,
    })
    .to_bytes()
    .unwrap()
}

fn handler(kind: &[u8; 4], name: &[u8]) -> Vec<u8> {
    Mp4Box::Hdlr(HdlrBox {
        version: 0,
        flags: [0; 3],
        pre_defined: 0,
        handler_type: u32::from_be_bytes(*kind),
        reserved: [0; 3],
        name: name.to_vec(),
    })
    .to_bytes()
    .unwrap()
}

fn data_information() -> Vec<u8> {
    let dref = Mp4Box::Dref(DrefBox::self_reference()).to_bytes().unwrap();
    container(b"dinf", &dref)
}

fn time_to_sample(count: u32, delta: u32) -> Vec<u8> {
    Mp4Box::Stts(SttsBox {
        version: 0,
        flags: [0; 3],
        entries: vec![SttsEntry {
            sample_count: count,
            sample_delta: delta,
        }],
    })
    .to_bytes()
    .unwrap()
}

fn sample_to_chunk() -> Vec<u8> {
    Mp4Box::Stsc(StscBox {
        version: 0,
        flags: [0; 3],
        entries: vec![StscEntry {
            first_chunk: 1,
            samples_per_chunk: 1,
            sample_description_index: 1,
        }],
    })
    .to_bytes()
    .unwrap()
}

fn chunk_offsets() -> Vec<u8> {
    Mp4Box::Stco(StcoBox {
        version: 0,
        flags: [0; 3],
        chunk_offsets: vec![0],
    })
    .to_bytes()
    .unwrap()
}

fn write_audio_fixture(path: &Path) {
    let ftyp = Mp4Box::Ftyp(FtypBox {
        major_brand: *b"isom",
        minor_version: 512,
        compatible_brands: vec![*b"isom", *b"mp41"],
    })
    .to_bytes()
    .unwrap();

    let mp4a = Mp4Box::Mp4a(Mp4aBox {
        reserved: [0; 6],
        data_reference_index: 1,
        version: 0,
        revision_level: 0,
        vendor: 0,
        number_of_channels: 2,
        sample_size: 16,
        compression_id: 0,
        reserved2: 0,
        sample_rate: AUDIO_TIMESCALE << 16,
    })
    .to_bytes()
    .unwrap();
    let esds = Mp4Box::Esds(EsdsBox::aac()).to_bytes().unwrap();
    let mp4a = with_children(mp4a, &esds);

    let stsd = Mp4Box::Stsd(StsdBox {
        version: 0,
        flags: [0; 3],
        entry_count: 1,
    })
    .to_bytes()
    .unwrap();
    let stsd = with_children(stsd, &mp4a);

    let stsz = Mp4Box::Stsz(StszBox {
        offset: 0,
        version: 0,
        flags: [0; 3],
        sample_size: AUDIO_SAMPLE_SIZE,
        sample_count: AUDIO_SAMPLES,
        entry_sizes: Vec::new(),
    })
    .to_bytes()
    .unwrap();

    let smhd = Mp4Box::Smhd(SmhdBox {
        version: 0,
        flags: [0; 3],
        balance: 0,
        reserved: 0,
    })
    .to_bytes()
    .unwrap();

    let duration = u64::from(AUDIO_SAMPLES) * u64::from(AUDIO_DELTA);
    let stbl = container(
        b"stbl",
        &[
            stsd,
            time_to_sample(AUDIO_SAMPLES, AUDIO_DELTA),
            sample_to_chunk(),
            stsz,
            chunk_offsets(),
        ]
        .concat(),
    );
    let minf = container(b"minf", &[smhd, data_information(), stbl].concat());
    let mdia = container(
        b"mdia",
        &[
            media_header(AUDIO_TIMESCALE, duration),
            handler(b"soun", b"SoundHandler\0"),
            minf,
        ]
        .concat(),
    );
    let trak = container(
        b"trak",
        &[track_header(duration, 0, 0), edit_list(0), mdia].concat(),
    );
    let moov = container(b"moov", &[movie_header(1000, 2134), trak].concat());

    let mut mdat_payload = Vec::new();
    for i in 0..AUDIO_SAMPLES {
        mdat_payload.extend(std::iter::repeat((i % 256) as u8).take(AUDIO_SAMPLE_SIZE as usize));
    }
    let mdat = raw_box(b"mdat", &mdat_payload);

    fs::write(path, [ftyp, moov, mdat].concat()).unwrap();
}

fn write_video_fixture(path: &Path, with_unknown_box: bool) {
    let ftyp = Mp4Box::Ftyp(FtypBox {
        major_brand: *b"isom",
        minor_version: 512,
        compatible_brands: vec![*b"isom", *b"avc1"],
    })
    .to_bytes()
    .unwrap();

    let avc1 = Mp4Box::Avc1(Avc1Box {
        reserved: [0; 6],
        data_reference_index: 1,
        version: 0,
        revision_level: 0,
        vendor: 0,
        temporal_quality: 0,
        spatial_quality: 0,
        width: 1280,
        height: 720,
        horizontal_resolution: 0x00480000,
        vertical_resolution: 0x00480000,
        entry_data_size: 0,
        frames_per_sample: 1,
        compressor_name: Avc1Box::compressor("AVC Coding"),
        bit_depth: 24,
        color_table_index: -1,
    })
    .to_bytes()
    .unwrap();
    let avcc = Mp4Box::AvcC(AvcCBox {
        configuration_version: 1,
        avc_profile_indication: 0x4D,
        profile_compatibility: 0x40,
        avc_level_indication: 0x1E,
        nal_unit_size: 0xFF,
        sps_entry_count: 1,
        sps_size: 5,
        sps_data: vec![0x67, 0x4d, 0x40, 0x1e, 0xda],
        pps_entry_count: 1,
        pps_size: 3,
        pps_data: vec![0x68, 0xca, 0x8c],
    })
    .to_bytes()
    .unwrap();
    let avc1 = with_children(avc1, &avcc);

    let stsd = Mp4Box::Stsd(StsdBox {
        version: 0,
        flags: [0; 3],
        entry_count: 1,
    })
    .to_bytes()
    .unwrap();
    let stsd = with_children(stsd, &avc1);

    let stss = Mp4Box::Stss(StssBox {
        offset: 0,
        version: 0,
        flags: [0; 3],
        sample_numbers: VIDEO_SYNC.to_vec(),
    })
    .to_bytes()
    .unwrap();

    let mut ctts_entries = vec![CttsEntry {
        sample_count: 1,
        sample_offset: 6000,
    }];
    ctts_entries.push(CttsEntry {
        sample_count: VIDEO_SAMPLES - 1,
        sample_offset: 3000,
    });
    let ctts = Mp4Box::Ctts(CttsBox {
        offset: 0,
        version: 0,
        flags: [0; 3],
        entries: ctts_entries,
    })
    .to_bytes()
    .unwrap();

    let stsz = Mp4Box::Stsz(StszBox {
        offset: 0,
        version: 0,
        flags: [0; 3],
        sample_size: 0,
        sample_count: VIDEO_SAMPLES,
        entry_sizes: (0..VIDEO_SAMPLES).map(video_sample_size).collect(),
    })
    .to_bytes()
    .unwrap();

    let vmhd = Mp4Box::Vmhd(VmhdBox {
        version: 0,
        flags: [0, 0, 1],
        graphics_mode: 0,
        op_color: [0; 3],
    })
    .to_bytes()
    .unwrap();

    let duration = u64::from(VIDEO_SAMPLES) * u64::from(VIDEO_DELTA);
    let stbl = container(
        b"stbl",
        &[
            stsd,
            time_to_sample(VIDEO_SAMPLES, VIDEO_DELTA),
            ctts,
            stss,
            sample_to_chunk(),
            stsz,
            chunk_offsets(),
        ]
        .concat(),
    );
    let minf = container(b"minf", &[vmhd, data_information(), stbl].concat());
    let mdia = container(
        b"mdia",
        &[
            media_header(VIDEO_TIMESCALE, duration),
            handler(b"vide", b"VideoHandler\0"),
            minf,
        ]
        .concat(),
    );
    let trak = container(
        b"trak",
        &[
            track_header(duration, 1280, 720),
            edit_list(VIDEO_MEDIA_TIME),
            mdia,
        ]
        .concat(),
    );

    let mut moov_children = vec![movie_header(1000, 10_000)];
    if with_unknown_box {
        moov_children.push(raw_box(b"wxyz", &[0xde, 0xad, 0xbe, 0xef]));
    }
    moov_children.push(trak);
    let moov = container(b"moov", &moov_children.concat());

    let mut mdat_payload = Vec::new();
    for i in 0..VIDEO_SAMPLES {
        mdat_payload.extend(std::iter::repeat((i % 251) as u8).take(video_sample_size(i) as usize));
    }
    let mdat = raw_box(b"mdat", &mdat_payload);

    fs::write(path, [ftyp, moov, mdat].concat()).unwrap();
}

fn audio_fixture(name: &str) -> PathBuf {
    let path = OUTPUT_DIR.join(name);
    write_audio_fixture(&path);
    path
}

fn video_fixture(name: &str) -> PathBuf {
    let path = OUTPUT_DIR.join(name);
    write_video_fixture(&path, false);
    path
}

// ==========================================
// Parsed-segment helpers
// ==========================================

fn parse_bytes(bytes: &[u8]) -> BoxTree {
    let mut cursor = std::io::Cursor::new(bytes.to_vec());
    BoxTree::parse(&mut cursor, bytes.len() as u64, Path::new("generated.m4s")).unwrap()
}

fn find_box(bytes: &[u8], name: &[u8; 4]) -> usize {
    let mut offset = 0;
    while offset + 8 <= bytes.len() {
        let size = u32::from_be_bytes(bytes[offset..offset + 4].try_into().unwrap()) as usize;
        if &bytes[offset + 4..offset + 8] == name {
            return offset;
        }
        offset += size;
    }
    panic!("no {} box in buffer", String::from_utf8_lossy(name));
}

fn trun_of(tree: &BoxTree) -> &ams_mp4::boxes::TrunBox {
    match tree.get("moof.traf.trun") {
        Some(Mp4Box::Trun(trun)) => trun,
        other => panic!("missing trun: {other:?}"),
    }
}

fn tfdt_of(tree: &BoxTree) -> &ams_mp4::boxes::TfdtBox {
    match tree.get("moof.traf.tfdt") {
        Some(Mp4Box::Tfdt(tfdt)) => tfdt,
        other => panic!("missing tfdt: {other:?}"),
    }
}

// ==========================================
// Indexing
// ==========================================

#[test]
fn indexing_is_deterministic() {
    let path = audio_fixture("determinism.mp4");
    let first = index_mp4(&path, "eng").unwrap();
    let second = index_mp4(&path, "eng").unwrap();

    assert_eq!(
        serde_json::to_string(&first.entry).unwrap(),
        serde_json::to_string(&second.entry).unwrap()
    );
}

#[test]
fn audio_index_fields() {
    let path = audio_fixture("audio-index.mp4");
    let index = index_mp4(&path, "eng").unwrap();

    assert_eq!(index.kind, TrackType::Audio);
    assert_eq!(index.entry.name, "audio_eng");
    // 20 kB of media over 100 * 1024 / 48000 seconds.
    assert_eq!(index.entry.bandwidth, 75_000);

    let config = index.entry.config.as_ref().unwrap();
    assert_eq!(config.timescale, AUDIO_TIMESCALE);
    assert_eq!(config.sample_delta, AUDIO_DELTA);
    assert_eq!(config.language, *b"eng");
    assert_eq!(config.mdat_box_size, AUDIO_SAMPLES * AUDIO_SAMPLE_SIZE);
    let audio = config.audio.as_ref().unwrap();
    assert_eq!(audio.number_of_channels, 2);
    assert_eq!(audio.sample_rate, AUDIO_TIMESCALE << 16);
    assert!(config.video.is_none());
}

#[test]
fn video_index_records_table_locations() {
    let path = video_fixture("video-index.mp4");
    let index = index_mp4(&path, "eng").unwrap();

    assert_eq!(index.kind, TrackType::Video);
    let config = index.entry.config.as_ref().unwrap();
    assert_eq!(config.media_time, VIDEO_MEDIA_TIME);
    let video = config.video.as_ref().unwrap();
    assert_eq!((video.width, video.height), (1280, 720));
    assert_eq!(video.codec_info, [0x4D, 0x40, 0x1E]);
    assert_eq!(video.nal_unit_size, 0x03);
    assert!(video.stss_box_size > 0);
    assert!(video.ctts_box_offset > 0);

    // The recorded locations must point at the live tables: decode them
    // straight out of the file.
    let file = fs::read(&path).unwrap();
    let stss_at = video.stss_box_offset as usize;
    let declared =
        u32::from_be_bytes(file[stss_at + 4..stss_at + 8].try_into().unwrap());
    assert_eq!(declared, VIDEO_SYNC.len() as u32);
}

#[test]
fn unknown_box_is_skipped() {
    let path = OUTPUT_DIR.join("unknown-box.mp4");
    write_video_fixture(&path, true);
    let index = index_mp4(&path, "eng").unwrap();
    assert_eq!(index.kind, TrackType::Video);
}

#[test]
fn non_media_input_is_rejected() {
    let path = OUTPUT_DIR.join("no-media.mp4");
    let moov = container(b"moov", &movie_header(1000, 0));
    fs::write(&path, moov).unwrap();

    assert!(matches!(
        index_mp4(&path, "eng"),
        Err(Error::UnsupportedInput(_))
    ));
}

// ==========================================
// Init segments
// ==========================================

#[test]
fn audio_init_segment() {
    let path = audio_fixture("audio-init.mp4");
    let config = index_mp4(&path, "eng").unwrap().entry.config.unwrap();
    let bytes = build_init(&config).unwrap();

    let tree = parse_bytes(&bytes);
    match tree.get("ftyp") {
        Some(Mp4Box::Ftyp(ftyp)) => {
            assert_eq!(ftyp.major_brand, *b"iso6");
            assert_eq!(ftyp.compatible_brands, vec![*b"iso6", *b"dash"]);
        }
        other => panic!("missing ftyp: {other:?}"),
    }
    match tree.get("moov.mvhd") {
        Some(Mp4Box::Mvhd(mvhd)) => {
            assert_eq!(mvhd.timescale, 1);
            assert_eq!(mvhd.duration, 0);
        }
        other => panic!("missing mvhd: {other:?}"),
    }
    match tree.get("moov.mvex.trex") {
        Some(Mp4Box::Trex(trex)) => {
            assert_eq!(trex.default_sample_duration, AUDIO_DELTA);
            assert_eq!(trex.track_id, 1);
        }
        other => panic!("missing trex: {other:?}"),
    }
    match tree.get("moov.trak.mdia.minf.stbl.stsd.mp4a") {
        Some(Mp4Box::Mp4a(mp4a)) => {
            assert_eq!(mp4a.sample_rate, 0x2EE0_0000);
            assert_eq!(mp4a.number_of_channels, 2);
        }
        other => panic!("missing mp4a: {other:?}"),
    }
    match tree.get("moov.trak.mdia.minf.stbl.stsd.mp4a.esds") {
        Some(Mp4Box::Esds(esds)) => assert_eq!(esds.data.len(), 27),
        other => panic!("missing esds: {other:?}"),
    }
    // Empty sample tables.
    match tree.get("moov.trak.mdia.minf.stbl.stsz") {
        Some(Mp4Box::Stsz(stsz)) => assert_eq!(stsz.sample_count, 0),
        other => panic!("missing stsz: {other:?}"),
    }
    assert!(tree.contains("moov.trak.mdia.minf.smhd"));
    assert!(!tree.contains("moov.trak.mdia.minf.vmhd"));
}

#[test]
fn video_init_segment() {
    let path = video_fixture("video-init.mp4");
    let config = index_mp4(&path, "eng").unwrap().entry.config.unwrap();
    let bytes = build_init(&config).unwrap();

    // Indexing keeps only the low 2 bits of the NAL length field; the
    // emitted avcC must restore the reserved upper 6 bits.
    assert_eq!(config.video.as_ref().unwrap().nal_unit_size, 0x03);
    let avcc_at = bytes.windows(4).position(|w| w == b"avcC").unwrap();
    assert_eq!(bytes[avcc_at + 8], 0xFF);

    let tree = parse_bytes(&bytes);
    match tree.get("moov.trak.tkhd") {
        Some(Mp4Box::Tkhd(tkhd)) => {
            assert_eq!(tkhd.width, 1280 << 16);
            assert_eq!(tkhd.height, 720 << 16);
            assert_eq!(tkhd.flags, [0, 0, 7]);
        }
        other => panic!("missing tkhd: {other:?}"),
    }
    match tree.get("moov.trak.mdia.hdlr") {
        Some(Mp4Box::Hdlr(hdlr)) => {
            assert_eq!(hdlr.name, b"AMS Video Handler\0".to_vec());
        }
        other => panic!("missing hdlr: {other:?}"),
    }
    match tree.get("moov.trak.mdia.minf.stbl.stsd.avc1.avcC") {
        Some(Mp4Box::AvcC(avcc)) => {
            assert_eq!(avcc.avc_profile_indication, 0x4D);
            assert_eq!(avcc.sps_data, vec![0x67, 0x4d, 0x40, 0x1e, 0xda]);
        }
        other => panic!("missing avcC: {other:?}"),
    }
    assert!(tree.contains("moov.trak.mdia.minf.stbl.stsd.avc1.btrt"));
    assert!(tree.contains("moov.trak.mdia.minf.vmhd"));
}

// ==========================================
// Media segments: audio
// ==========================================

#[test]
fn audio_windows_are_gapless() {
    let path = audio_fixture("audio-windows.mp4");
    let config = index_mp4(&path, "eng").unwrap().entry.config.unwrap();

    // D=1s, 48000/1024 = 46.875 samples per segment.
    let expectations = [(1u32, 0u64, 46u32), (2, 46, 47), (3, 93, 7)];
    for (number, start, count) in expectations {
        let bytes = build_segment(&config, &path, number, 1).unwrap();
        let tree = parse_bytes(&bytes);

        let trun = trun_of(&tree);
        assert_eq!(trun.samples.len() as u32, count, "segment {number}");
        assert_eq!(
            tfdt_of(&tree).base_media_decode_time,
            start * u64::from(AUDIO_DELTA),
            "segment {number}"
        );
        for sample in &trun.samples {
            assert_eq!(sample.size, AUDIO_SAMPLE_SIZE);
        }
    }

    // Past the end of the track.
    assert!(matches!(
        build_segment(&config, &path, 4, 1),
        Err(Error::SampleStartOutOfRange { .. })
    ));
}

#[test]
fn audio_segment_layout() {
    let path = audio_fixture("audio-layout.mp4");
    let config = index_mp4(&path, "eng").unwrap().entry.config.unwrap();
    let bytes = build_segment(&config, &path, 2, 1).unwrap();

    let tree = parse_bytes(&bytes);
    match tree.get("styp") {
        Some(Mp4Box::Styp(styp)) => {
            assert_eq!(styp.compatible_brands, vec![*b"iso6", *b"msdh"]);
        }
        other => panic!("missing styp: {other:?}"),
    }
    match tree.get("moof.mfhd") {
        Some(Mp4Box::Mfhd(mfhd)) => assert_eq!(mfhd.sequence_number, 2),
        other => panic!("missing mfhd: {other:?}"),
    }
    match tree.get("moof.traf.tfhd") {
        Some(Mp4Box::Tfhd(tfhd)) => {
            assert_eq!(tfhd.flags, [0x02, 0x00, 0x28]);
            assert_eq!(tfhd.default_sample_duration, AUDIO_DELTA);
            assert_eq!(tfhd.default_sample_flags, 0x02800040);
        }
        other => panic!("missing tfhd: {other:?}"),
    }

    // The data offset points at the first byte after the mdat header.
    let moof_at = find_box(&bytes, b"moof");
    let mdat_at = find_box(&bytes, b"mdat");
    assert_eq!(
        trun_of(&tree).data_offset as usize,
        mdat_at + 8 - moof_at
    );

    // The mdat payload is the exact byte range of samples 46..=92 from the
    // source file.
    let source = fs::read(&path).unwrap();
    let source_mdat = find_box(&source, b"mdat") + 8;
    let window_start = source_mdat + 46 * AUDIO_SAMPLE_SIZE as usize;
    let window_len = 47 * AUDIO_SAMPLE_SIZE as usize;
    assert_eq!(
        &bytes[mdat_at + 8..],
        &source[window_start..window_start + window_len]
    );
}

// ==========================================
// Media segments: video
// ==========================================

#[test]
fn video_segment_snaps_to_key_frames() {
    let path = video_fixture("video-snap.mp4");
    let config = index_mp4(&path, "eng").unwrap().entry.config.unwrap();

    // D=2s: 60 samples per unsnapped window, sync samples at 0/76/152/228.
    // Segment 4's window has no sync sample beyond it, so its end stays at
    // the unsnapped boundary and the segment is marked final.
    let expectations = [
        // (number, snapped start, snapped inclusive end)
        (1u32, 0u64, 75u64),
        (2, 76, 151),
        (3, 152, 227),
        (4, 228, 239),
    ];
    for (number, start, end) in expectations {
        let bytes = build_segment(&config, &path, number, 2).unwrap();
        let tree = parse_bytes(&bytes);

        let trun = trun_of(&tree);
        assert_eq!(trun.samples.len() as u64, end - start + 1, "segment {number}");
        assert_eq!(
            tfdt_of(&tree).base_media_decode_time,
            start * u64::from(VIDEO_DELTA),
            "segment {number}"
        );
        // Every segment starts on a source sync sample.
        assert!(
            VIDEO_SYNC.contains(&(start as u32 + 1)),
            "segment {number} starts at non-sync sample {start}"
        );
        assert_eq!(trun.samples[0].flags, 0x02400040, "segment {number}");

        // Sizes come straight from the source table.
        for (i, sample) in trun.samples.iter().enumerate() {
            assert_eq!(sample.size, video_sample_size(start as u32 + i as u32));
        }
    }
}

#[test]
fn video_composition_offsets_subtract_media_time() {
    let path = video_fixture("video-ctts.mp4");
    let config = index_mp4(&path, "eng").unwrap().entry.config.unwrap();
    let bytes = build_segment(&config, &path, 1, 2).unwrap();
    let tree = parse_bytes(&bytes);

    let trun = trun_of(&tree);
    assert_eq!(trun.version, 1);
    assert_eq!(trun.flags, [0x00, 0x0e, 0x01]);

    // Sample 0 carries +6000 from the table minus media time 3000; the rest
    // sit exactly on their decode time.
    assert_eq!(trun.samples[0].composition_time_offset, 3000);
    for sample in &trun.samples[1..] {
        assert_eq!(sample.composition_time_offset, 0);
    }

    // After the first positive shift, non-sync samples switch flag variants.
    assert_eq!(trun.samples[0].flags, 0x02400040);
    for sample in &trun.samples[1..] {
        assert_eq!(sample.flags, 0x018100C0);
    }
}

#[test]
fn video_segment_without_shift_uses_default_flags() {
    let path = video_fixture("video-flags.mp4");
    let config = index_mp4(&path, "eng").unwrap().entry.config.unwrap();
    let bytes = build_segment(&config, &path, 2, 2).unwrap();
    let tree = parse_bytes(&bytes);

    let trun = trun_of(&tree);
    assert_eq!(trun.samples[0].flags, 0x02400040);
    for sample in &trun.samples[1..] {
        assert_eq!(sample.flags, 0x014100C0);
    }
}

#[test]
fn last_video_segment_carries_lmsg() {
    let path = video_fixture("video-last.mp4");
    let config = index_mp4(&path, "eng").unwrap().entry.config.unwrap();

    let bytes = build_segment(&config, &path, 4, 2).unwrap();
    match parse_bytes(&bytes).get("styp") {
        Some(Mp4Box::Styp(styp)) => {
            assert_eq!(styp.compatible_brands, vec![*b"iso6", *b"msdh", *b"lmsg"]);
        }
        other => panic!("missing styp: {other:?}"),
    }

    // Non-final segments do not.
    let bytes = build_segment(&config, &path, 1, 2).unwrap();
    match parse_bytes(&bytes).get("styp") {
        Some(Mp4Box::Styp(styp)) => {
            assert_eq!(styp.compatible_brands, vec![*b"iso6", *b"msdh"]);
        }
        other => panic!("missing styp: {other:?}"),
    }
}

#[test]
fn video_mdat_matches_declared_sizes() {
    let path = video_fixture("video-mdat.mp4");
    let config = index_mp4(&path, "eng").unwrap().entry.config.unwrap();
    let bytes = build_segment(&config, &path, 2, 2).unwrap();

    let mdat_at = find_box(&bytes, b"mdat");
    let declared: u32 = (76..=151).map(video_sample_size).sum();
    assert_eq!(bytes.len() - mdat_at - 8, declared as usize);

    // Byte-exact against the source: samples 0..76 are skipped, then the
    // window follows contiguously.
    let source = fs::read(&path).unwrap();
    let source_mdat = find_box(&source, b"mdat") + 8;
    let skipped: u32 = (0..76).map(video_sample_size).sum();
    let window_start = source_mdat + skipped as usize;
    assert_eq!(
        &bytes[mdat_at + 8..],
        &source[window_start..window_start + declared as usize]
    );
}

#[test]
fn missing_sync_table_is_an_error() {
    let path = video_fixture("video-no-stss.mp4");
    let mut config = index_mp4(&path, "eng").unwrap().entry.config.unwrap();
    if let Some(video) = config.video.as_mut() {
        video.stss_box_size = 0;
    }
    assert!(matches!(
        build_segment(&config, &path, 1, 2),
        Err(Error::MissingSyncTable)
    ));
}

// ==========================================
// Full round trips
// ==========================================

#[test]
fn reserialized_source_survives_reparse() {
    let path = video_fixture("video-reserialize.mp4");
    let tree = BoxTree::parse_file(&path).unwrap();
    let bytes = tree.serialize().unwrap();

    let reparsed = parse_bytes(&bytes);
    match (
        tree.get("moov.trak.mdia.mdhd"),
        reparsed.get("moov.trak.mdia.mdhd"),
    ) {
        (Some(Mp4Box::Mdhd(a)), Some(Mp4Box::Mdhd(b))) => {
            assert_eq!(a.timescale, b.timescale);
            assert_eq!(a.duration, b.duration);
        }
        other => panic!("missing mdhd: {other:?}"),
    }
    match reparsed.get("moov.trak.mdia.minf.stbl.stsz") {
        Some(Mp4Box::Stsz(stsz)) => assert_eq!(stsz.sample_count, VIDEO_SAMPLES),
        other => panic!("missing stsz: {other:?}"),
    }
}

#[test]
fn manifest_from_indexed_package() {
    let audio = audio_fixture("mpd-audio.mp4");
    let video = video_fixture("mpd-video.mp4");

    let indexed = vec![
        index_mp4(&audio, "eng").unwrap(),
        index_mp4(&video, "eng").unwrap(),
    ];
    let config = ams_mp4::assemble(10, indexed, vec![]);

    let json = serde_json::to_string(&config).unwrap();
    let reloaded: ams_mp4::JsonConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(reloaded, config);

    let mpd = build_mpd(&reloaded, "fixture").unwrap();
    assert!(mpd.contains("codecs=\"avc1.4D401E\""));
    assert!(mpd.contains("codecs=\"mp4a.40.2\""));
    assert!(mpd.contains("audioSamplingRate=\"48000\""));
    // 300 * 3000 / 90000 = 10 seconds of video.
    assert!(mpd.contains("mediaPresentationDuration=\"PT0H0M10.0S\""));
}
