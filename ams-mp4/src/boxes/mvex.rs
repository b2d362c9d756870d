use crate::{Error, Reader, Result, Writer};

/// Movie extends header box.
#[derive(Debug, Clone, PartialEq)]
pub struct MehdBox {
    pub version: u8,
    pub flags: [u8; 3],
    pub fragment_duration: u64,
}

impl MehdBox {
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data.to_vec());
        let version = r.read_u8()?;
        if version > 1 {
            return Err(Error::UnsupportedVersion {
                name: "mehd".into(),
                version,
            });
        }
        let mut flags = [0u8; 3];
        flags.copy_from_slice(&r.read_bytes(3)?);
        let fragment_duration = if version == 0 {
            r.read_u32()? as u64
        } else {
            r.read_u64()?
        };
        Ok(Self {
            version,
            flags,
            fragment_duration,
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
            w.put_u32(self.fragment_duration as u32);
        } else {
            w.put_u64(self.fragment_duration);
        }
        Ok(())
    }
}

/// Track extends box. `default_sample_duration` carries the source track's
/// uniform sample delta into the fragmented world.
#[derive(Debug, Clone, PartialEq)]
pub struct TrexBox {
    pub version: u8,
    pub flags: [u8; 3],
    pub track_id: u32,
    pub default_sample_description_index: u32,
    pub default_sample_duration: u32,
    pub default_sample_size: u32,
    pub default_sample_flags: u32,
}

impl TrexBox {
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data.to_vec());
        let version = r.read_u8()?;
        let mut flags = [0u8; 3];
        flags.copy_from_slice(&r.read_bytes(3)?);
        Ok(Self {
            version,
            flags,
            track_id: r.read_u32()?,
            default_sample_description_index: r.read_u32()?,
            default_sample_duration: r.read_u32()?,
            default_sample_size: r.read_u32()?,
            default_sample_flags: r.read_u32()?,
        })
    }

    pub fn payload_size(&self) -> u32 {
        24
    }

    pub fn encode_payload(&self, w: &mut Writer) -> Result<()> {
        w.put_u8(self.version);
        w.put_bytes(&self.flags);
        w.put_u32(self.track_id);
        w.put_u32(self.default_sample_description_index);
        w.put_u32(self.default_sample_duration);
        w.put_u32(self.default_sample_size);
        w.put_u32(self.default_sample_flags);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trex_round_trip() {
        let trex = TrexBox {
            version: 0,
            flags: [0; 3],
            track_id: 1,
            default_sample_description_index: 1,
            default_sample_duration: 1024,
            default_sample_size: 0,
            default_sample_flags: 0,
        };
        let mut w = Writer::new();
        trex.encode_payload(&mut w).unwrap();
        let bytes = w.into_inner();
        assert_eq!(bytes.len(), 24);
        assert_eq!(TrexBox::decode(&bytes).unwrap(), trex);
    }
}
