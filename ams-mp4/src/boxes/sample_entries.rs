use crate::{Error, Reader, Result, Writer};

/// The opaque elementary-stream descriptor payload emitted into every
/// generated audio init segment. Existing clients depend on this exact
/// bitstream.
pub const AAC_ESDS_PAYLOAD: [u8; 27] = [
    0x03, 0x19, 0x00, 0x01, 0x00, 0x04, 0x11, 0x40, 0x15, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x01, 0xF3, 0xC2, 0x05, 0x02, 0x11, 0x90, 0x06, 0x01, 0x02,
];

/// AAC audio sample entry. The first 28 payload bytes are fixed fields; the
/// `esds` child is parsed at its own tree path.
#[derive(Debug, Clone, PartialEq)]
pub struct Mp4aBox {
    pub reserved: [u8; 6],
    pub data_reference_index: u16,
    pub version: u16,
    pub revision_level: u16,
    pub vendor: u32,
    pub number_of_channels: u16,
    pub sample_size: u16,
    pub compression_id: u16,
    pub reserved2: u16,
    /// Sample rate, 16.16 fixed point (48 kHz is 48000 << 16).
    pub sample_rate: u32,
}

/// Number of fixed payload bytes before the child boxes start.
pub(crate) const MP4A_PREFIX: u32 = 28;

impl Mp4aBox {
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data.to_vec());
        let mut reserved = [0u8; 6];
        reserved.copy_from_slice(&r.read_bytes(6)?);
        Ok(Self {
            reserved,
            data_reference_index: r.read_u16()?,
            version: r.read_u16()?,
            revision_level: r.read_u16()?,
            vendor: r.read_u32()?,
            number_of_channels: r.read_u16()?,
            sample_size: r.read_u16()?,
            compression_id: r.read_u16()?,
            reserved2: r.read_u16()?,
            sample_rate: r.read_u32()?,
        })
    }

    pub fn payload_size(&self) -> u32 {
        MP4A_PREFIX
    }

    pub fn encode_payload(&self, w: &mut Writer) -> Result<()> {
        w.put_bytes(&self.reserved);
        w.put_u16(self.data_reference_index);
        w.put_u16(self.version);
        w.put_u16(self.revision_level);
        w.put_u32(self.vendor);
        w.put_u16(self.number_of_channels);
        w.put_u16(self.sample_size);
        w.put_u16(self.compression_id);
        w.put_u16(self.reserved2);
        w.put_u32(self.sample_rate);
        Ok(())
    }
}

/// Elementary stream descriptor box. The descriptor itself is carried as an
/// opaque blob.
#[derive(Debug, Clone, PartialEq)]
pub struct EsdsBox {
    /// Version and flags, as one word.
    pub version: u32,
    pub data: Vec<u8>,
}

impl EsdsBox {
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data.to_vec());
        Ok(Self {
            version: r.read_u32()?,
            data: r.read_to_end()?,
        })
    }

    pub fn payload_size(&self) -> u32 {
        4 + self.data.len() as u32
    }

    pub fn encode_payload(&self, w: &mut Writer) -> Result<()> {
        w.put_u32(self.version);
        w.put_bytes(&self.data);
        Ok(())
    }

    /// The canonical AAC-LC descriptor.
    pub fn aac() -> Self {
        Self {
            version: 0,
            data: AAC_ESDS_PAYLOAD.to_vec(),
        }
    }
}

/// AVC visual sample entry. The first 78 payload bytes are fixed fields; the
/// `avcC` and `btrt` children are parsed at their own tree paths.
#[derive(Debug, Clone, PartialEq)]
pub struct Avc1Box {
    pub reserved: [u8; 6],
    pub data_reference_index: u16,
    pub version: u16,
    pub revision_level: u16,
    pub vendor: u32,
    pub temporal_quality: u32,
    pub spatial_quality: u32,
    pub width: u16,
    pub height: u16,
    /// Pixels per inch, 16.16 fixed point.
    pub horizontal_resolution: u32,
    pub vertical_resolution: u32,
    pub entry_data_size: u32,
    pub frames_per_sample: u16,
    /// Pascal string padded to 32 bytes.
    pub compressor_name: [u8; 32],
    pub bit_depth: u16,
    pub color_table_index: i16,
}

/// Number of fixed payload bytes before the child boxes start.
pub(crate) const AVC1_PREFIX: u32 = 78;

impl Avc1Box {
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data.to_vec());
        let mut reserved = [0u8; 6];
        reserved.copy_from_slice(&r.read_bytes(6)?);
        let data_reference_index = r.read_u16()?;
        let version = r.read_u16()?;
        let revision_level = r.read_u16()?;
        let vendor = r.read_u32()?;
        let temporal_quality = r.read_u32()?;
        let spatial_quality = r.read_u32()?;
        let width = r.read_u16()?;
        let height = r.read_u16()?;
        let horizontal_resolution = r.read_u32()?;
        let vertical_resolution = r.read_u32()?;
        let entry_data_size = r.read_u32()?;
        let frames_per_sample = r.read_u16()?;
        let mut compressor_name = [0u8; 32];
        compressor_name.copy_from_slice(&r.read_bytes(32)?);
        let bit_depth = r.read_u16()?;
        let color_table_index = r.read_i16()?;

        Ok(Self {
            reserved,
            data_reference_index,
            version,
            revision_level,
            vendor,
            temporal_quality,
            spatial_quality,
            width,
            height,
            horizontal_resolution,
            vertical_resolution,
            entry_data_size,
            frames_per_sample,
            compressor_name,
            bit_depth,
            color_table_index,
        })
    }

    pub fn payload_size(&self) -> u32 {
        AVC1_PREFIX
    }

    pub fn encode_payload(&self, w: &mut Writer) -> Result<()> {
        w.put_bytes(&self.reserved);
        w.put_u16(self.data_reference_index);
        w.put_u16(self.version);
        w.put_u16(self.revision_level);
        w.put_u32(self.vendor);
        w.put_u32(self.temporal_quality);
        w.put_u32(self.spatial_quality);
        w.put_u16(self.width);
        w.put_u16(self.height);
        w.put_u32(self.horizontal_resolution);
        w.put_u32(self.vertical_resolution);
        w.put_u32(self.entry_data_size);
        w.put_u16(self.frames_per_sample);
        w.put_bytes(&self.compressor_name);
        w.put_u16(self.bit_depth);
        w.put_i16(self.color_table_index);
        Ok(())
    }

    /// The compressor name written into generated entries.
    pub fn compressor(name: &str) -> [u8; 32] {
        let mut out = [0u8; 32];
        let bytes = name.as_bytes();
        out[0] = bytes.len() as u8;
        out[1..1 + bytes.len()].copy_from_slice(bytes);
        out
    }
}

/// AVC decoder configuration record.
#[derive(Debug, Clone, PartialEq)]
pub struct AvcCBox {
    pub configuration_version: u8,
    pub avc_profile_indication: u8,
    pub profile_compatibility: u8,
    pub avc_level_indication: u8,
    /// NAL unit length minus one; the upper 6 bits are reserved as 111111b.
    pub nal_unit_size: u8,
    /// The count lives in the low 5 bits on the wire; the high 3 bits are
    /// reserved and written back as 111b.
    pub sps_entry_count: u8,
    pub sps_size: u16,
    pub sps_data: Vec<u8>,
    pub pps_entry_count: u8,
    pub pps_size: u16,
    pub pps_data: Vec<u8>,
}

impl AvcCBox {
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < 8 {
            return Err(Error::MalformedBox {
                name: "avcC".into(),
                reason: "payload shorter than 8 bytes".into(),
            });
        }
        let mut r = Reader::new(data.to_vec());
        let configuration_version = r.read_u8()?;
        let avc_profile_indication = r.read_u8()?;
        let profile_compatibility = r.read_u8()?;
        let avc_level_indication = r.read_u8()?;
        let nal_unit_size = r.read_u8()?;
        let sps_entry_count = r.read_u8()? & 0x1f;
        let sps_size = r.read_u16()?;
        let sps_data = r.read_bytes(sps_size as usize * sps_entry_count as usize)?;
        let pps_entry_count = r.read_u8()?;
        let pps_size = r.read_u16()?;
        let pps_data = r.read_bytes(pps_size as usize * pps_entry_count as usize)?;

        Ok(Self {
            configuration_version,
            avc_profile_indication,
            profile_compatibility,
            avc_level_indication,
            nal_unit_size,
            sps_entry_count,
            sps_size,
            sps_data,
            pps_entry_count,
            pps_size,
            pps_data,
        })
    }

    pub fn payload_size(&self) -> u32 {
        8 + self.sps_data.len() as u32 + 3 + self.pps_data.len() as u32
    }

    pub fn encode_payload(&self, w: &mut Writer) -> Result<()> {
        w.put_u8(self.configuration_version);
        w.put_u8(self.avc_profile_indication);
        w.put_u8(self.profile_compatibility);
        w.put_u8(self.avc_level_indication);
        w.put_u8(self.nal_unit_size | 0xfc);
        w.put_u8(self.sps_entry_count | 0xe0);
        w.put_u16(self.sps_size);
        w.put_bytes(&self.sps_data);
        w.put_u8(self.pps_entry_count);
        w.put_u16(self.pps_size);
        w.put_bytes(&self.pps_data);
        Ok(())
    }
}

/// Bit rate box.
#[derive(Debug, Clone, PartialEq)]
pub struct BtrtBox {
    pub decoding_buffer_size: u32,
    pub max_bitrate: u32,
    pub avg_bitrate: u32,
}

impl BtrtBox {
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data.to_vec());
        Ok(Self {
            decoding_buffer_size: r.read_u32()?,
            max_bitrate: r.read_u32()?,
            avg_bitrate: r.read_u32()?,
        })
    }

    pub fn payload_size(&self) -> u32 {
        12
    }

    pub fn encode_payload(&self, w: &mut Writer) -> Result<()> {
        w.put_u32(self.decoding_buffer_size);
        w.put_u32(self.max_bitrate);
        w.put_u32(self.avg_bitrate);
        Ok(())
    }
}
