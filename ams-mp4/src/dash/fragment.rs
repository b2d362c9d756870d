use crate::{
    boxes::{
        CttsBox, CttsEntry, FreeBox, MdatBox, MfhdBox, Mp4Box, ParentBox, StssBox, StszBox,
        StypBox, TfdtBox, TfhdBox, TrunBox, TrunSample,
    },
    config::{DashConfig, TrackType},
    tree::BoxTree,
    Error, Result,
};
use std::{
    fs::File,
    io::{Read, Seek, SeekFrom},
    path::Path,
};

/// Default flags for a non-sync video sample (depends on others, leading
/// unknown).
const SAMPLE_FLAGS_NON_SYNC: u32 = 0x014100C0;
/// Flags for a sync sample (independent, does not depend).
const SAMPLE_FLAGS_SYNC: u32 = 0x02400040;
/// Flags for a non-sync sample following a positive composition shift.
const SAMPLE_FLAGS_AFTER_SHIFT: u32 = 0x018100C0;

/// Default sample flags advertised in the `tfhd` of audio fragments.
const AUDIO_DEFAULT_SAMPLE_FLAGS: u32 = 0x02800040;

/// Run-length cursor over `ctts` entries, advanced once per sample.
struct CttsCursor {
    entries: Vec<CttsEntry>,
    index: usize,
    remaining: u32,
}

impl CttsCursor {
    fn new(entries: Vec<CttsEntry>) -> Self {
        let remaining = entries.first().map(|e| e.sample_count).unwrap_or(0);
        Self {
            entries,
            index: 0,
            remaining,
        }
    }

    fn current_offset(&self) -> i64 {
        self.entries
            .get(self.index)
            .map(|e| i64::from(e.sample_offset))
            .unwrap_or(0)
    }

    fn advance(&mut self) {
        if self.remaining > 0 {
            self.remaining -= 1;
        }
        if self.remaining == 0 && self.index < self.entries.len() {
            self.index += 1;
            self.remaining = self
                .entries
                .get(self.index)
                .map(|e| e.sample_count)
                .unwrap_or(0);
        }
    }
}

/// Builds media segment `number` (1-based) of `duration` seconds for one
/// track, referring back to the source file for sample sizes, sync samples,
/// composition offsets and the `mdat` payload.
///
/// The sample window is `[(N-1)·D·timescale/delta, N·D·timescale/delta)`;
/// for video the start snaps back onto a sync sample and the end extends to
/// just before the next one, so every segment begins with a key frame.
pub fn build_segment(
    config: &DashConfig,
    src: &Path,
    number: u32,
    duration: u32,
) -> Result<Vec<u8>> {
    if number == 0 {
        return Err(Error::SegmentPastEnd { segment: 0 });
    }

    let video = match config.track_type {
        TrackType::Video => Some(
            config
                .video
                .as_ref()
                .ok_or_else(|| Error::TypeMismatch("video track without video entry".into()))?,
        ),
        TrackType::Audio => {
            if config.audio.is_none() {
                return Err(Error::TypeMismatch("audio track without audio entry".into()));
            }
            None
        }
    };

    let mut f = File::open(src)?;

    let delta = u64::from(config.sample_delta);
    let mut sample_start =
        u64::from(number - 1) * u64::from(duration) * u64::from(config.timescale) / delta;
    // Exclusive for now; decremented to inclusive after the sync snap.
    let mut sample_end =
        u64::from(number) * u64::from(duration) * u64::from(config.timescale) / delta;

    let mut last_segment = false;
    let mut sync_samples: Vec<u64> = Vec::new();

    if let Some(video) = video {
        if video.stss_box_size == 0 {
            return Err(Error::MissingSyncTable);
        }
        let stss = read_table(&mut f, video.stss_box_offset, video.stss_box_size, |data| {
            StssBox::decode(data)
        })?;
        if stss.sample_numbers.is_empty() {
            return Err(Error::MissingSyncTable);
        }

        // Snap the start to the first sync sample inside the window and
        // collect the window-relative indices of every sync sample; they get
        // distinct per-sample flags.
        // Sample numbers are 1-based on the wire.
        let mut i = 0;
        let mut start_snapped = false;
        while i < stss.sample_numbers.len()
            && u64::from(stss.sample_numbers[i]).saturating_sub(1) < sample_end
        {
            let sync = u64::from(stss.sample_numbers[i]).saturating_sub(1);
            if sync >= sample_start {
                if !start_snapped {
                    sample_start = sync;
                    start_snapped = true;
                }
                sync_samples.push(sync - sample_start);
            }
            i += 1;
        }
        if i < stss.sample_numbers.len() {
            sample_end = u64::from(stss.sample_numbers[i]).saturating_sub(1);
        } else {
            last_segment = true;
        }
    }

    if sample_end == 0 {
        return Err(Error::SegmentPastEnd { segment: number });
    }
    sample_end -= 1;

    // Composition offsets are only carried when the source has a ctts table.
    let mut ctts_cursor = match video {
        Some(video) if video.ctts_box_offset != 0 => Some(CttsCursor::new(
            read_table(&mut f, video.ctts_box_offset, video.ctts_box_size, |data| {
                CttsBox::decode(data)
            })?
            .entries,
        )),
        _ => None,
    };
    let has_composition = ctts_cursor.is_some();

    // Read just enough of the size table to cover the window.
    let stsz_read = (12 + (sample_end as u32 + 1) * 4).min(config.stsz_box_size);
    let stsz = read_table(&mut f, config.stsz_box_offset, stsz_read, |data| {
        StszBox::decode(data)
    })?;

    if stsz.sample_count == 0 || sample_start > u64::from(stsz.sample_count) - 1 {
        return Err(Error::SampleStartOutOfRange {
            segment: number,
            sample_start,
            sample_count: stsz.sample_count,
        });
    }
    if sample_end > u64::from(stsz.sample_count) - 1 {
        sample_end = u64::from(stsz.sample_count) - 1;
    }
    // A table that declares more samples than it holds entries for must not
    // push the window past the decoded prefix.
    if stsz.sample_size == 0 {
        let available = stsz.entry_sizes.len() as u64;
        if sample_start >= available {
            return Err(Error::SampleStartOutOfRange {
                segment: number,
                sample_start,
                sample_count: available as u32,
            });
        }
        if sample_end >= available {
            sample_end = available - 1;
        }
    }

    let mut tree = BoxTree::new();

    tree.replace(
        "styp",
        Mp4Box::Styp(StypBox {
            major_brand: *b"iso6",
            minor_version: 0,
            compatible_brands: if last_segment {
                vec![*b"iso6", *b"msdh", *b"lmsg"]
            } else {
                vec![*b"iso6", *b"msdh"]
            },
        }),
    );
    tree.replace(
        "free",
        Mp4Box::Free(FreeBox {
            data: super::FREE_TAG.to_vec(),
        }),
    );

    tree.replace("moof", Mp4Box::Parent(ParentBox::new(*b"moof")));
    let mfhd = MfhdBox {
        version: 0,
        flags: [0; 3],
        sequence_number: number,
    };

    let tfhd = match config.track_type {
        TrackType::Audio => TfhdBox {
            version: 0,
            // default-base-is-moof | default-sample-duration-present |
            // default-sample-flags-present
            flags: [0x02, 0x00, 0x28],
            track_id: 1,
            base_data_offset: 0,
            sample_description_index: 0,
            default_sample_duration: config.sample_delta,
            default_sample_size: 0,
            default_sample_flags: AUDIO_DEFAULT_SAMPLE_FLAGS,
        },
        TrackType::Video => TfhdBox {
            version: 0,
            // default-base-is-moof | default-sample-duration-present
            flags: [0x02, 0x00, 0x08],
            track_id: 1,
            base_data_offset: 0,
            sample_description_index: 0,
            default_sample_duration: config.sample_delta,
            default_sample_size: 0,
            default_sample_flags: 0,
        },
    };

    let mut trun = TrunBox {
        version: 0,
        flags: [0x00, 0x02, 0x01],
        data_offset: 0,
        first_sample_flags: 0,
        samples: Vec::with_capacity((sample_end - sample_start + 1) as usize),
    };
    if video.is_some() {
        if has_composition {
            // sample-composition-time-offsets | sample-flags | sample-size
            trun.flags[1] = 0x0e;
            trun.version = 1;
        } else {
            trun.flags[1] = 0x06;
        }
    }

    // Walk samples 0..sample_start to locate the window's byte offset in the
    // source mdat and to bring the ctts cursor up to the window.
    let mut mdat = MdatBox {
        src: src.to_path_buf(),
        offset: config.mdat_box_offset,
        size: 0,
    };
    for i in 0..sample_start {
        mdat.offset += u64::from(stsz.size_of(i as usize));
        if let Some(cursor) = ctts_cursor.as_mut() {
            cursor.advance();
        }
    }

    let mut last_composition_offset: i64 = 0;
    for i in sample_start..=sample_end {
        let size = stsz.size_of(i as usize);
        let mut sample = TrunSample {
            duration: 0,
            size,
            flags: 0,
            composition_time_offset: 0,
        };
        if video.is_some() {
            sample.flags = SAMPLE_FLAGS_NON_SYNC;
            if let Some(cursor) = ctts_cursor.as_mut() {
                if last_composition_offset != 0 {
                    sample.flags = SAMPLE_FLAGS_AFTER_SHIFT;
                }
                sample.composition_time_offset = cursor.current_offset() - config.media_time;
                if sample.composition_time_offset > 0 {
                    last_composition_offset = sample.composition_time_offset;
                } else {
                    last_composition_offset += sample.composition_time_offset;
                }
                cursor.advance();
            }
        }
        mdat.size += size;
        trun.samples.push(sample);
    }
    for sync in &sync_samples {
        if let Some(sample) = trun.samples.get_mut(*sync as usize) {
            sample.flags = SAMPLE_FLAGS_SYNC;
        }
    }

    let tfdt = TfdtBox {
        version: 1,
        flags: [0; 3],
        base_media_decode_time: sample_start * u64::from(tfhd.default_sample_duration),
    };

    // The data offset points at the first mdat payload byte: the whole moof,
    // plus the mdat header.
    let traf_size = 8 + (8 + tfhd.payload_size()) + (8 + tfdt.payload_size())
        + (8 + trun.payload_size());
    let moof_size = 8 + (8 + mfhd.payload_size()) + traf_size;
    trun.data_offset = (moof_size + 8) as i32;

    tree.replace("moof.mfhd", Mp4Box::Mfhd(mfhd));
    tree.replace("moof.traf", Mp4Box::Parent(ParentBox::new(*b"traf")));
    tree.replace("moof.traf.tfhd", Mp4Box::Tfhd(tfhd));
    tree.replace("moof.traf.tfdt", Mp4Box::Tfdt(tfdt));
    tree.replace("moof.traf.trun", Mp4Box::Trun(trun));
    tree.replace("mdat", Mp4Box::Mdat(mdat));

    tree.serialize()
}

/// Seeks to a recorded table offset and decodes `size` payload bytes.
fn read_table<T>(
    f: &mut File,
    offset: u64,
    size: u32,
    decode: impl FnOnce(&[u8]) -> Result<T>,
) -> Result<T> {
    f.seek(SeekFrom::Start(offset))?;
    let mut data = vec![0u8; size as usize];
    f.read_exact(&mut data)?;
    decode(&data)
}
