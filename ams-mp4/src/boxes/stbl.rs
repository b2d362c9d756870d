use crate::{Reader, Result, Writer};

/// Sample description box. Holds only the entry count; the sample entries
/// (`avc1`, `mp4a`, ...) live at child paths in the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct StsdBox {
    pub version: u8,
    pub flags: [u8; 3],
    pub entry_count: u32,
}

impl StsdBox {
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data.to_vec());
        let version = r.read_u8()?;
        let mut flags = [0u8; 3];
        flags.copy_from_slice(&r.read_bytes(3)?);
        Ok(Self {
            version,
            flags,
            entry_count: r.read_u32()?,
        })
    }

    pub fn payload_size(&self) -> u32 {
        8
    }

    pub fn encode_payload(&self, w: &mut Writer) -> Result<()> {
        w.put_u8(self.version);
        w.put_bytes(&self.flags);
        w.put_u32(self.entry_count);
        Ok(())
    }
}

/// One decoding-time run.
#[derive(Debug, Clone, PartialEq)]
pub struct SttsEntry {
    pub sample_count: u32,
    pub sample_delta: u32,
}

/// Decoding time-to-sample box. The first entry's delta becomes the default
/// sample duration of generated fragments.
#[derive(Debug, Clone, PartialEq)]
pub struct SttsBox {
    pub version: u8,
    pub flags: [u8; 3],
    pub entries: Vec<SttsEntry>,
}

impl SttsBox {
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data.to_vec());
        let version = r.read_u8()?;
        let mut flags = [0u8; 3];
        flags.copy_from_slice(&r.read_bytes(3)?);
        let entry_count = r.read_u32()?;
        let mut entries = Vec::with_capacity(entry_count as usize);
        for _ in 0..entry_count {
            entries.push(SttsEntry {
                sample_count: r.read_u32()?,
                sample_delta: r.read_u32()?,
            });
        }
        Ok(Self {
            version,
            flags,
            entries,
        })
    }

    pub fn payload_size(&self) -> u32 {
        8 + 8 * self.entries.len() as u32
    }

    pub fn encode_payload(&self, w: &mut Writer) -> Result<()> {
        w.put_u8(self.version);
        w.put_bytes(&self.flags);
        w.put_u32(self.entries.len() as u32);
        for e in &self.entries {
            w.put_u32(e.sample_count);
            w.put_u32(e.sample_delta);
        }
        Ok(())
    }

    /// An empty table, as emitted in init segments.
    pub fn empty() -> Self {
        Self {
            version: 0,
            flags: [0; 3],
            entries: Vec::new(),
        }
    }
}

/// One composition-offset run.
#[derive(Debug, Clone, PartialEq)]
pub struct CttsEntry {
    pub sample_count: u32,
    pub sample_offset: u32,
}

/// Composition time-to-sample box.
///
/// `offset` records the payload position in the source file so the segment
/// builder can re-read the table lazily without holding it in the index.
#[derive(Debug, Clone, PartialEq)]
pub struct CttsBox {
    pub offset: u64,
    pub version: u8,
    pub flags: [u8; 3],
    pub entries: Vec<CttsEntry>,
}

impl CttsBox {
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data.to_vec());
        let version = r.read_u8()?;
        let mut flags = [0u8; 3];
        flags.copy_from_slice(&r.read_bytes(3)?);
        let entry_count = r.read_u32()?;
        let mut entries = Vec::with_capacity(entry_count as usize);
        for _ in 0..entry_count {
            entries.push(CttsEntry {
                sample_count: r.read_u32()?,
                sample_offset: r.read_u32()?,
            });
        }
        Ok(Self {
            offset: 0,
            version,
            flags,
            entries,
        })
    }

    pub fn payload_size(&self) -> u32 {
        8 + 8 * self.entries.len() as u32
    }

    pub fn encode_payload(&self, w: &mut Writer) -> Result<()> {
        w.put_u8(self.version);
        w.put_bytes(&self.flags);
        w.put_u32(self.entries.len() as u32);
        for e in &self.entries {
            w.put_u32(e.sample_count);
            w.put_u32(e.sample_offset);
        }
        Ok(())
    }
}

/// Sync (key-frame) sample box. Sample numbers are 1-based.
///
/// `offset` records the payload position in the source file for lazy
/// re-reads during segment generation.
#[derive(Debug, Clone, PartialEq)]
pub struct StssBox {
    pub offset: u64,
    pub version: u8,
    pub flags: [u8; 3],
    pub sample_numbers: Vec<u32>,
}

impl StssBox {
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data.to_vec());
        let version = r.read_u8()?;
        let mut flags = [0u8; 3];
        flags.copy_from_slice(&r.read_bytes(3)?);
        let declared = r.read_u32()?;
        // Trust the payload over the declared count when they disagree.
        let entry_count = declared.min((data.len() as u32).saturating_sub(8) / 4);
        let mut sample_numbers = Vec::with_capacity(entry_count as usize);
        for _ in 0..entry_count {
            sample_numbers.push(r.read_u32()?);
        }
        Ok(Self {
            offset: 0,
            version,
            flags,
            sample_numbers,
        })
    }

    pub fn payload_size(&self) -> u32 {
        8 + 4 * self.sample_numbers.len() as u32
    }

    pub fn encode_payload(&self, w: &mut Writer) -> Result<()> {
        w.put_u8(self.version);
        w.put_bytes(&self.flags);
        w.put_u32(self.sample_numbers.len() as u32);
        for n in &self.sample_numbers {
            w.put_u32(*n);
        }
        Ok(())
    }
}

/// One sample-to-chunk run.
#[derive(Debug, Clone, PartialEq)]
pub struct StscEntry {
    pub first_chunk: u32,
    pub samples_per_chunk: u32,
    pub sample_description_index: u32,
}

/// Sample-to-chunk box.
#[derive(Debug, Clone, PartialEq)]
pub struct StscBox {
    pub version: u8,
    pub flags: [u8; 3],
    pub entries: Vec<StscEntry>,
}

impl StscBox {
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data.to_vec());
        let version = r.read_u8()?;
        let mut flags = [0u8; 3];
        flags.copy_from_slice(&r.read_bytes(3)?);
        let entry_count = r.read_u32()?;
        let mut entries = Vec::with_capacity(entry_count as usize);
        for _ in 0..entry_count {
            entries.push(StscEntry {
                first_chunk: r.read_u32()?,
                samples_per_chunk: r.read_u32()?,
                sample_description_index: r.read_u32()?,
            });
        }
        Ok(Self {
            version,
            flags,
            entries,
        })
    }

    pub fn payload_size(&self) -> u32 {
        8 + 12 * self.entries.len() as u32
    }

    pub fn encode_payload(&self, w: &mut Writer) -> Result<()> {
        w.put_u8(self.version);
        w.put_bytes(&self.flags);
        w.put_u32(self.entries.len() as u32);
        for e in &self.entries {
            w.put_u32(e.first_chunk);
            w.put_u32(e.samples_per_chunk);
            w.put_u32(e.sample_description_index);
        }
        Ok(())
    }

    pub fn empty() -> Self {
        Self {
            version: 0,
            flags: [0; 3],
            entries: Vec::new(),
        }
    }
}

/// Sample size box.
///
/// `sample_count` keeps the count declared in the file even when only a
/// prefix of the entry table was handed to the decoder; the segment builder
/// reads exactly the prefix covering its window. `offset` records the
/// payload position in the source file.
#[derive(Debug, Clone, PartialEq)]
pub struct StszBox {
    pub offset: u64,
    pub version: u8,
    pub flags: [u8; 3],
    /// Constant size for every sample, or zero when `entry_sizes` applies.
    pub sample_size: u32,
    pub sample_count: u32,
    pub entry_sizes: Vec<u32>,
}

impl StszBox {
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data.to_vec());
        let version = r.read_u8()?;
        let mut flags = [0u8; 3];
        flags.copy_from_slice(&r.read_bytes(3)?);
        let sample_size = r.read_u32()?;
        let sample_count = r.read_u32()?;

        let mut entry_sizes = Vec::new();
        if sample_size == 0 {
            let available = (data.len() as u32).saturating_sub(12) / 4;
            let take = sample_count.min(available);
            entry_sizes.reserve(take as usize);
            for _ in 0..take {
                entry_sizes.push(r.read_u32()?);
            }
        }

        Ok(Self {
            offset: 0,
            version,
            flags,
            sample_size,
            sample_count,
            entry_sizes,
        })
    }

    pub fn payload_size(&self) -> u32 {
        if self.sample_size == 0 {
            12 + 4 * self.entry_sizes.len() as u32
        } else {
            12
        }
    }

    pub fn encode_payload(&self, w: &mut Writer) -> Result<()> {
        w.put_u8(self.version);
        w.put_bytes(&self.flags);
        w.put_u32(self.sample_size);
        w.put_u32(self.sample_count);
        if self.sample_size == 0 {
            for size in &self.entry_sizes {
                w.put_u32(*size);
            }
        }
        Ok(())
    }

    /// Size of sample `index`, honoring the constant-size form.
    pub fn size_of(&self, index: usize) -> u32 {
        if self.sample_size != 0 {
            self.sample_size
        } else {
            self.entry_sizes[index]
        }
    }

    pub fn empty() -> Self {
        Self {
            offset: 0,
            version: 0,
            flags: [0; 3],
            sample_size: 0,
            sample_count: 0,
            entry_sizes: Vec::new(),
        }
    }
}

/// Independent-and-disposable-samples box. Parsed for tolerance; the entry
/// bytes are kept opaque.
#[derive(Debug, Clone, PartialEq)]
pub struct SdtpBox {
    pub version: u8,
    pub entries: Vec<u8>,
}

impl SdtpBox {
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data.to_vec());
        let version = r.read_u8()?;
        Ok(Self {
            version,
            entries: r.read_to_end()?,
        })
    }

    pub fn payload_size(&self) -> u32 {
        1 + self.entries.len() as u32
    }

    pub fn encode_payload(&self, w: &mut Writer) -> Result<()> {
        w.put_u8(self.version);
        w.put_bytes(&self.entries);
        Ok(())
    }
}

/// Chunk offset box.
#[derive(Debug, Clone, PartialEq)]
pub struct StcoBox {
    pub version: u8,
    pub flags: [u8; 3],
    pub chunk_offsets: Vec<u32>,
}

impl StcoBox {
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data.to_vec());
        let version = r.read_u8()?;
        let mut flags = [0u8; 3];
        flags.copy_from_slice(&r.read_bytes(3)?);
        let entry_count = r.read_u32()?;
        let mut chunk_offsets = Vec::with_capacity(entry_count as usize);
        for _ in 0..entry_count {
            chunk_offsets.push(r.read_u32()?);
        }
        Ok(Self {
            version,
            flags,
            chunk_offsets,
        })
    }

    pub fn payload_size(&self) -> u32 {
        8 + 4 * self.chunk_offsets.len() as u32
    }

    pub fn encode_payload(&self, w: &mut Writer) -> Result<()> {
        w.put_u8(self.version);
        w.put_bytes(&self.flags);
        w.put_u32(self.chunk_offsets.len() as u32);
        for v in &self.chunk_offsets {
            w.put_u32(*v);
        }
        Ok(())
    }

    pub fn empty() -> Self {
        Self {
            version: 0,
            flags: [0; 3],
            chunk_offsets: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stss_round_trip_is_byte_exact() {
        let stss = StssBox {
            offset: 0,
            version: 0,
            flags: [0; 3],
            sample_numbers: vec![1, 77, 153, 229],
        };
        let mut w = Writer::new();
        stss.encode_payload(&mut w).unwrap();
        let bytes = w.into_inner();
        assert_eq!(bytes.len() as u32, stss.payload_size());
        assert_eq!(&bytes[4..8], &4u32.to_be_bytes());
        assert_eq!(&bytes[8..12], &1u32.to_be_bytes());

        let parsed = StssBox::decode(&bytes).unwrap();
        assert_eq!(parsed, stss);

        let mut w = Writer::new();
        parsed.encode_payload(&mut w).unwrap();
        assert_eq!(w.into_inner(), bytes);
    }

    #[test]
    fn stsz_bounded_prefix_decode() {
        // A table of 10 samples handed to the decoder clipped at 4 entries.
        let mut w = Writer::new();
        StszBox {
            offset: 0,
            version: 0,
            flags: [0; 3],
            sample_size: 0,
            sample_count: 10,
            entry_sizes: (1..=10).collect(),
        }
        .encode_payload(&mut w)
        .unwrap();
        let full = w.into_inner();

        let prefix = StszBox::decode(&full[..12 + 4 * 4]).unwrap();
        assert_eq!(prefix.sample_count, 10);
        assert_eq!(prefix.entry_sizes, vec![1, 2, 3, 4]);
    }

    #[test]
    fn stsz_fixed_size() {
        let stsz = StszBox {
            offset: 0,
            version: 0,
            flags: [0; 3],
            sample_size: 512,
            sample_count: 1000,
            entry_sizes: Vec::new(),
        };
        let mut w = Writer::new();
        stsz.encode_payload(&mut w).unwrap();
        let bytes = w.into_inner();
        assert_eq!(bytes.len(), 12);
        let parsed = StszBox::decode(&bytes).unwrap();
        assert_eq!(parsed.size_of(0), 512);
        assert_eq!(parsed.size_of(999), 512);
    }

    #[test]
    fn ctts_round_trip() {
        let ctts = CttsBox {
            offset: 0,
            version: 0,
            flags: [0; 3],
            entries: vec![
                CttsEntry {
                    sample_count: 1,
                    sample_offset: 2048,
                },
                CttsEntry {
                    sample_count: 3,
                    sample_offset: 0,
                },
            ],
        };
        let mut w = Writer::new();
        ctts.encode_payload(&mut w).unwrap();
        assert_eq!(CttsBox::decode(&w.into_inner()).unwrap(), ctts);
    }
}
