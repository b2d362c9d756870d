use crate::{
    boxes::{
        Avc1Box, AvcCBox, BtrtBox, DrefBox, EsdsBox, FreeBox, FtypBox, HdlrBox, MdhdBox, Mp4Box,
        Mp4aBox, MvhdBox, ParentBox, SmhdBox, StcoBox, StscBox, StsdBox, StszBox, SttsBox,
        TkhdBox, TrexBox, VmhdBox, UNITY_MATRIX,
    },
    config::{DashConfig, TrackType},
    tree::BoxTree,
    Error, Result,
};

/// Builds the initialization segment (`ftyp` + `moov`) for one track.
///
/// The movie header is normalized: timescale 1, duration 0, a single track
/// with id 1, and a `trex` carrying the source's uniform sample delta as the
/// default sample duration. Sample tables are emitted empty; all media
/// timing lives in the fragments.
pub fn build_init(config: &DashConfig) -> Result<Vec<u8>> {
    let mut tree = BoxTree::new();

    tree.replace(
        "ftyp",
        Mp4Box::Ftyp(FtypBox {
            major_brand: *b"iso6",
            minor_version: 0,
            compatible_brands: vec![*b"iso6", *b"dash"],
        }),
    );
    tree.replace(
        "free",
        Mp4Box::Free(FreeBox {
            data: super::FREE_TAG.to_vec(),
        }),
    );

    tree.replace("moov", Mp4Box::Parent(ParentBox::new(*b"moov")));
    tree.replace(
        "moov.mvhd",
        Mp4Box::Mvhd(MvhdBox {
            version: 0,
            flags: [0; 3],
            creation_time: 0,
            modification_time: 0,
            timescale: 1,
            duration: 0,
            rate: config.rate,
            volume: config.volume,
            reserved: 0,
            reserved2: 0,
            matrix: UNITY_MATRIX,
            pre_defined: [0; 6],
            next_track_id: 2,
        }),
    );

    tree.replace("moov.trak", Mp4Box::Parent(ParentBox::new(*b"trak")));
    let (width, height) = match (&config.track_type, &config.video) {
        (TrackType::Video, Some(v)) => (
            u32::from(v.width) * UNITY_MATRIX[0] as u32,
            u32::from(v.height) * UNITY_MATRIX[4] as u32,
        ),
        _ => (0, 0),
    };
    tree.replace(
        "moov.trak.tkhd",
        Mp4Box::Tkhd(TkhdBox {
            version: 0,
            flags: [0x00, 0x00, 0x07],
            creation_time: 0,
            modification_time: 0,
            track_id: 1,
            reserved: 0,
            duration: 0,
            reserved2: 0,
            layer: 0,
            alternate_group: 0,
            volume: match config.track_type {
                TrackType::Video => 0,
                TrackType::Audio => 0x0100,
            },
            reserved3: 0,
            matrix: UNITY_MATRIX,
            width,
            height,
        }),
    );

    tree.replace("moov.trak.mdia", Mp4Box::Parent(ParentBox::new(*b"mdia")));
    tree.replace(
        "moov.trak.mdia.mdhd",
        Mp4Box::Mdhd(MdhdBox {
            version: 0,
            flags: [0; 3],
            creation_time: 0,
            modification_time: 0,
            timescale: config.timescale,
            duration: 0,
            language: MdhdBox::pack_language(config.language),
            pre_defined: 0,
        }),
    );
    tree.replace(
        "moov.trak.mdia.hdlr",
        Mp4Box::Hdlr(HdlrBox {
            version: 0,
            flags: [0; 3],
            pre_defined: 0,
            handler_type: config.handler_type,
            reserved: [0; 3],
            name: match config.track_type {
                TrackType::Video => b"AMS Video Handler\0".to_vec(),
                TrackType::Audio => b"AMS Audio Handler\0".to_vec(),
            },
        }),
    );

    tree.replace(
        "moov.trak.mdia.minf",
        Mp4Box::Parent(ParentBox::new(*b"minf")),
    );
    tree.replace(
        "moov.trak.mdia.minf.dinf",
        Mp4Box::Parent(ParentBox::new(*b"dinf")),
    );
    tree.replace(
        "moov.trak.mdia.minf.dinf.dref",
        Mp4Box::Dref(DrefBox::self_reference()),
    );
    tree.replace(
        "moov.trak.mdia.minf.stbl",
        Mp4Box::Parent(ParentBox::new(*b"stbl")),
    );
    tree.replace(
        "moov.trak.mdia.minf.stbl.stsd",
        Mp4Box::Stsd(StsdBox {
            version: 0,
            flags: [0; 3],
            entry_count: 1,
        }),
    );
    tree.replace(
        "moov.trak.mdia.minf.stbl.stts",
        Mp4Box::Stts(SttsBox::empty()),
    );
    tree.replace(
        "moov.trak.mdia.minf.stbl.stsc",
        Mp4Box::Stsc(StscBox::empty()),
    );
    tree.replace(
        "moov.trak.mdia.minf.stbl.stsz",
        Mp4Box::Stsz(StszBox::empty()),
    );
    tree.replace(
        "moov.trak.mdia.minf.stbl.stco",
        Mp4Box::Stco(StcoBox::empty()),
    );

    match config.track_type {
        TrackType::Audio => {
            let audio = config
                .audio
                .as_ref()
                .ok_or_else(|| Error::TypeMismatch("audio track without audio entry".into()))?;

            tree.replace(
                "moov.trak.mdia.minf.smhd",
                Mp4Box::Smhd(SmhdBox {
                    version: 0,
                    flags: [0; 3],
                    balance: 0,
                    reserved: 0,
                }),
            );
            tree.replace(
                "moov.trak.mdia.minf.stbl.stsd.mp4a",
                Mp4Box::Mp4a(Mp4aBox {
                    reserved: [0; 6],
                    data_reference_index: 1,
                    version: 0,
                    revision_level: 0,
                    vendor: 0,
                    number_of_channels: audio.number_of_channels,
                    sample_size: audio.sample_size,
                    compression_id: audio.compression_id,
                    reserved2: 0,
                    sample_rate: audio.sample_rate,
                }),
            );
            tree.replace(
                "moov.trak.mdia.minf.stbl.stsd.mp4a.esds",
                Mp4Box::Esds(EsdsBox::aac()),
            );
        }
        TrackType::Video => {
            let video = config
                .video
                .as_ref()
                .ok_or_else(|| Error::TypeMismatch("video track without video entry".into()))?;

            tree.replace(
                "moov.trak.mdia.minf.vmhd",
                Mp4Box::Vmhd(VmhdBox {
                    version: 0,
                    flags: [0x00, 0x00, 0x01],
                    graphics_mode: 0,
                    op_color: [0; 3],
                }),
            );
            tree.replace(
                "moov.trak.mdia.minf.stbl.stsd.avc1",
                Mp4Box::Avc1(Avc1Box {
                    reserved: [0; 6],
                    data_reference_index: 1,
                    version: 0,
                    revision_level: 0,
                    vendor: 0,
                    temporal_quality: 0,
                    spatial_quality: 0,
                    width: video.width,
                    height: video.height,
                    horizontal_resolution: video.horizontal_resolution,
                    vertical_resolution: video.vertical_resolution,
                    entry_data_size: 0,
                    frames_per_sample: 1,
                    compressor_name: Avc1Box::compressor("AVC Coding"),
                    bit_depth: video.bit_depth,
                    color_table_index: video.color_table_index,
                }),
            );
            tree.replace(
                "moov.trak.mdia.minf.stbl.stsd.avc1.avcC",
                Mp4Box::AvcC(AvcCBox {
                    configuration_version: 1,
                    avc_profile_indication: video.codec_info[0],
                    profile_compatibility: video.codec_info[1],
                    avc_level_indication: video.codec_info[2],
                    nal_unit_size: video.nal_unit_size,
                    sps_entry_count: video.sps_entry_count,
                    sps_size: video.sps_size,
                    sps_data: video.sps_data.clone(),
                    pps_entry_count: video.pps_entry_count,
                    pps_size: video.pps_size,
                    pps_data: video.pps_data.clone(),
                }),
            );
            tree.replace(
                "moov.trak.mdia.minf.stbl.stsd.avc1.btrt",
                Mp4Box::Btrt(BtrtBox {
                    decoding_buffer_size: 0,
                    max_bitrate: 0,
                    avg_bitrate: (config.mdat_box_size as f64
                        / (config.duration as f64 / config.timescale as f64)
                        * 8.0) as u32,
                }),
            );
        }
    }

    tree.replace("moov.mvex", Mp4Box::Parent(ParentBox::new(*b"mvex")));
    tree.replace(
        "moov.mvex.trex",
        Mp4Box::Trex(TrexBox {
            version: 0,
            flags: [0; 3],
            track_id: 1,
            default_sample_description_index: 1,
            default_sample_duration: config.sample_delta,
            default_sample_size: 0,
            default_sample_flags: 0,
        }),
    );

    tree.serialize()
}
