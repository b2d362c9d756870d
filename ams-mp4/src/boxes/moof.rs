use crate::{Error, Reader, Result, Writer};

/// Movie fragment header box.
#[derive(Debug, Clone, PartialEq)]
pub struct MfhdBox {
    pub version: u8,
    pub flags: [u8; 3],
    /// 1-based segment number of this fragment.
    pub sequence_number: u32,
}

impl MfhdBox {
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data.to_vec());
        let version = r.read_u8()?;
        let mut flags = [0u8; 3];
        flags.copy_from_slice(&r.read_bytes(3)?);
        Ok(Self {
            version,
            flags,
            sequence_number: r.read_u32()?,
        })
    }

    pub fn payload_size(&self) -> u32 {
        8
    }

    pub fn encode_payload(&self, w: &mut Writer) -> Result<()> {
        w.put_u8(self.version);
        w.put_bytes(&self.flags);
        w.put_u32(self.sequence_number);
        Ok(())
    }
}

/// Track fragment header box. Optional fields are present on the wire iff
/// the matching flag bit is set; absent fields hold zero here.
#[derive(Debug, Clone, PartialEq)]
pub struct TfhdBox {
    pub version: u8,
    /// flags[0] 0x02 is default-base-is-moof; flags[2] gates the optional
    /// fields below: 0x01 base-data-offset, 0x02 sample-description-index,
    /// 0x08 default-sample-duration, 0x10 default-sample-size,
    /// 0x20 default-sample-flags.
    pub flags: [u8; 3],
    pub track_id: u32,
    pub base_data_offset: u64,
    pub sample_description_index: u32,
    pub default_sample_duration: u32,
    pub default_sample_size: u32,
    pub default_sample_flags: u32,
}

impl TfhdBox {
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data.to_vec());
        let version = r.read_u8()?;
        let mut flags = [0u8; 3];
        flags.copy_from_slice(&r.read_bytes(3)?);

        let track_id = r.read_u32()?;
        let mut tfhd = Self {
            version,
            flags,
            track_id,
            base_data_offset: 0,
            sample_description_index: 0,
            default_sample_duration: 0,
            default_sample_size: 0,
            default_sample_flags: 0,
        };

        if flags[2] & 0x01 != 0 {
            tfhd.base_data_offset = r.read_u64()?;
        }
        if flags[2] & 0x02 != 0 {
            tfhd.sample_description_index = r.read_u32()?;
        }
        if flags[2] & 0x08 != 0 {
            tfhd.default_sample_duration = r.read_u32()?;
        }
        if flags[2] & 0x10 != 0 {
            tfhd.default_sample_size = r.read_u32()?;
        }
        if flags[2] & 0x20 != 0 {
            tfhd.default_sample_flags = r.read_u32()?;
        }

        Ok(tfhd)
    }

    pub fn payload_size(&self) -> u32 {
        let mut size = 8;
        if self.flags[2] & 0x01 != 0 {
            size += 8;
        }
        if self.flags[2] & 0x02 != 0 {
            size += 4;
        }
        if self.flags[2] & 0x08 != 0 {
            size += 4;
        }
        if self.flags[2] & 0x10 != 0 {
            size += 4;
        }
        if self.flags[2] & 0x20 != 0 {
            size += 4;
        }
        size
    }

    pub fn encode_payload(&self, w: &mut Writer) -> Result<()> {
        w.put_u8(self.version);
        w.put_bytes(&self.flags);
        w.put_u32(self.track_id);
        if self.flags[2] & 0x01 != 0 {
            w.put_u64(self.base_data_offset);
        }
        if self.flags[2] & 0x02 != 0 {
            w.put_u32(self.sample_description_index);
        }
        if self.flags[2] & 0x08 != 0 {
            w.put_u32(self.default_sample_duration);
        }
        if self.flags[2] & 0x10 != 0 {
            w.put_u32(self.default_sample_size);
        }
        if self.flags[2] & 0x20 != 0 {
            w.put_u32(self.default_sample_flags);
        }
        Ok(())
    }
}

/// Track fragment decode time box. Generated segments always use version 1
/// (64-bit decode time).
#[derive(Debug, Clone, PartialEq)]
pub struct TfdtBox {
    pub version: u8,
    pub flags: [u8; 3],
    /// Absolute decode time of the fragment's first sample, in media
    /// timescale units.
    pub base_media_decode_time: u64,
}

impl TfdtBox {
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data.to_vec());
        let version = r.read_u8()?;
        if version > 1 {
            return Err(Error::UnsupportedVersion {
                name: "tfdt".into(),
                version,
            });
        }
        let mut flags = [0u8; 3];
        flags.copy_from_slice(&r.read_bytes(3)?);
        let base_media_decode_time = if version == 0 {
            r.read_u32()? as u64
        } else {
            r.read_u64()?
        };
        Ok(Self {
            version,
            flags,
            base_media_decode_time,
        })
    }

    pub fn payload_size(&self) -> u32 {
        if self.version == 0 {
            8
        } else {
            12
        }
    }

    pub fn encode_payload(&self, w: &mut Writer) -> Result<()> {
        w.put_u8(self.version);
        w.put_bytes(&self.flags);
        if self.version == 0 {
            w.put_u32(self.base_media_decode_time as u32);
        } else {
            w.put_u64(self.base_media_decode_time);
        }
        Ok(())
    }
}

/// One sample row of a `trun`. Fields are meaningful only when the owning
/// box's flags carry them on the wire.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrunSample {
    pub duration: u32,
    pub size: u32,
    pub flags: u32,
    /// Signed when `trun` version is 1.
    pub composition_time_offset: i64,
}

/// Track fragment run box.
#[derive(Debug, Clone, PartialEq)]
pub struct TrunBox {
    pub version: u8,
    /// flags[2]: 0x01 data-offset-present, 0x04 first-sample-flags-present.
    /// flags[1]: 0x01 sample-duration, 0x02 sample-size, 0x04 sample-flags,
    /// 0x08 sample-composition-time-offsets.
    pub flags: [u8; 3],
    pub data_offset: i32,
    pub first_sample_flags: u32,
    pub samples: Vec<TrunSample>,
}

impl TrunBox {
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data.to_vec());
        let version = r.read_u8()?;
        let mut flags = [0u8; 3];
        flags.copy_from_slice(&r.read_bytes(3)?);
        let sample_count = r.read_u32()?;

        let mut trun = Self {
            version,
            flags,
            data_offset: 0,
            first_sample_flags: 0,
            samples: Vec::new(),
        };

        if flags[2] & 0x01 != 0 {
            trun.data_offset = r.read_i32()?;
        }
        if flags[2] & 0x04 != 0 {
            trun.first_sample_flags = r.read_u32()?;
        }
        if flags[1] != 0 {
            trun.samples.reserve(sample_count as usize);
            for _ in 0..sample_count {
                let mut sample = TrunSample::default();
                if flags[1] & 0x01 != 0 {
                    sample.duration = r.read_u32()?;
                }
                if flags[1] & 0x02 != 0 {
                    sample.size = r.read_u32()?;
                }
                if flags[1] & 0x04 != 0 {
                    sample.flags = r.read_u32()?;
                }
                if flags[1] & 0x08 != 0 {
                    sample.composition_time_offset = if version == 0 {
                        r.read_u32()? as i64
                    } else {
                        r.read_i32()? as i64
                    };
                }
                trun.samples.push(sample);
            }
        }

        Ok(trun)
    }

    pub fn payload_size(&self) -> u32 {
        let mut size = 8;
        if self.flags[2] & 0x01 != 0 {
            size += 4;
        }
        if self.flags[2] & 0x04 != 0 {
            size += 4;
        }
        let mut per_sample = 0;
        for bit in [0x01, 0x02, 0x04, 0x08] {
            if self.flags[1] & bit != 0 {
                per_sample += 4;
            }
        }
        size + per_sample * self.samples.len() as u32
    }

    pub fn encode_payload(&self, w: &mut Writer) -> Result<()> {
        w.put_u8(self.version);
        w.put_bytes(&self.flags);
        w.put_u32(self.samples.len() as u32);
        if self.flags[2] & 0x01 != 0 {
            w.put_i32(self.data_offset);
        }
        if self.flags[2] & 0x04 != 0 {
            w.put_u32(self.first_sample_flags);
        }
        if self.flags[1] != 0 {
            for sample in &self.samples {
                if self.flags[1] & 0x01 != 0 {
                    w.put_u32(sample.duration);
                }
                if self.flags[1] & 0x02 != 0 {
                    w.put_u32(sample.size);
                }
                if self.flags[1] & 0x04 != 0 {
                    w.put_u32(sample.flags);
                }
                if self.flags[1] & 0x08 != 0 {
                    w.put_i32(sample.composition_time_offset as i32);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tfhd_flag_gated_fields() {
        let tfhd = TfhdBox {
            version: 0,
            flags: [0x02, 0x00, 0x28],
            track_id: 1,
            base_data_offset: 0,
            sample_description_index: 0,
            default_sample_duration: 1024,
            default_sample_size: 0,
            default_sample_flags: 0x02800040,
        };
        assert_eq!(tfhd.payload_size(), 16);

        let mut w = Writer::new();
        tfhd.encode_payload(&mut w).unwrap();
        let bytes = w.into_inner();
        assert_eq!(bytes.len(), 16);
        assert_eq!(TfhdBox::decode(&bytes).unwrap(), tfhd);
    }

    #[test]
    fn trun_signed_composition_offsets() {
        let trun = TrunBox {
            version: 1,
            flags: [0x00, 0x0e, 0x01],
            data_offset: 196,
            first_sample_flags: 0,
            samples: vec![
                TrunSample {
                    duration: 0,
                    size: 4096,
                    flags: 0x02400040,
                    composition_time_offset: -1024,
                },
                TrunSample {
                    duration: 0,
                    size: 512,
                    flags: 0x014100C0,
                    composition_time_offset: 2048,
                },
            ],
        };
        let mut w = Writer::new();
        trun.encode_payload(&mut w).unwrap();
        let bytes = w.into_inner();
        assert_eq!(bytes.len() as u32, trun.payload_size());
        assert_eq!(TrunBox::decode(&bytes).unwrap(), trun);
    }

    #[test]
    fn tfdt_64_bit_decode_time() {
        let tfdt = TfdtBox {
            version: 1,
            flags: [0; 3],
            base_media_decode_time: 77 * 1024,
        };
        let mut w = Writer::new();
        tfdt.encode_payload(&mut w).unwrap();
        let bytes = w.into_inner();
        assert_eq!(bytes.len(), 12);
        assert_eq!(TfdtBox::decode(&bytes).unwrap(), tfdt);
    }
}
