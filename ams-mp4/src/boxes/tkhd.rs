use crate::{Error, Reader, Result, Writer};

/// Track header box.
#[derive(Debug, Clone, PartialEq)]
pub struct TkhdBox {
    pub version: u8,
    /// 0x000001 Track_enabled | 0x000002 Track_in_movie | 0x000004 Track_in_preview
    pub flags: [u8; 3],
    pub creation_time: u64,
    pub modification_time: u64,
    pub track_id: u32,
    pub reserved: u32,
    pub duration: u64,
    pub reserved2: u64,
    pub layer: i16,
    pub alternate_group: i16,
    pub volume: i16,
    pub reserved3: u16,
    pub matrix: [i32; 9],
    /// Visual presentation width, 16.16 fixed point.
    pub width: u32,
    /// Visual presentation height, 16.16 fixed point.
    pub height: u32,
}

impl TkhdBox {
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data.to_vec());
        let version = r.read_u8()?;
        if version > 1 {
            return Err(Error::UnsupportedVersion {
                name: "tkhd".into(),
                version,
            });
        }
        let mut flags = [0u8; 3];
        flags.copy_from_slice(&r.read_bytes(3)?);

        let (creation_time, modification_time);
        if version == 0 {
            creation_time = r.read_u32()? as u64;
            modification_time = r.read_u32()? as u64;
        } else {
            creation_time = r.read_u64()?;
            modification_time = r.read_u64()?;
        }
        let track_id = r.read_u32()?;
        let reserved = r.read_u32()?;
        let duration = if version == 0 {
            r.read_u32()? as u64
        } else {
            r.read_u64()?
        };
        let reserved2 = r.read_u64()?;
        let layer = r.read_i16()?;
        let alternate_group = r.read_i16()?;
        let volume = r.read_i16()?;
        let reserved3 = r.read_u16()?;
        let mut matrix = [0i32; 9];
        for v in &mut matrix {
            *v = r.read_i32()?;
        }
        let width = r.read_u32()?;
        let height = r.read_u32()?;

        Ok(Self {
            version,
            flags,
            creation_time,
            modification_time,
            track_id,
            reserved,
            duration,
            reserved2,
            layer,
            alternate_group,
            volume,
            reserved3,
            matrix,
            width,
            height,
        })
    }

    pub fn payload_size(&self) -> u32 {
        if self.version == 0 {
            84
        } else {
            96
        }
    }

    pub fn encode_payload(&self, w: &mut Writer) -> Result<()> {
        w.put_u8(self.version);
        w.put_bytes(&self.flags);
        if self.version == 0 {
            w.put_u32(self.creation_time as u32);
            w.put_u32(self.modification_time as u32);
        } else {
            w.put_u64(self.creation_time);
            w.put_u64(self.modification_time);
        }
        w.put_u32(self.track_id);
        w.put_u32(self.reserved);
        if self.version == 0 {
            w.put_u32(self.duration as u32);
        } else {
            w.put_u64(self.duration);
        }
        w.put_u64(self.reserved2);
        w.put_i16(self.layer);
        w.put_i16(self.alternate_group);
        w.put_i16(self.volume);
        w.put_u16(self.reserved3);
        for v in &self.matrix {
            w.put_i32(*v);
        }
        w.put_u32(self.width);
        w.put_u32(self.height);
        Ok(())
    }
}

/// One edit-list entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ElstEntry {
    pub segment_duration: u64,
    /// Starting composition time of this edit within the media. The segment
    /// builder subtracts it from every composition offset.
    pub media_time: i64,
    pub media_rate_integer: i16,
    pub media_rate_fraction: i16,
}

/// Edit list box. Parsed for its first entry's `media_time`; never emitted
/// into generated segments.
#[derive(Debug, Clone, PartialEq)]
pub struct ElstBox {
    pub version: u8,
    pub flags: [u8; 3],
    pub entries: Vec<ElstEntry>,
}

impl ElstBox {
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data.to_vec());
        let version = r.read_u8()?;
        if version > 1 {
            return Err(Error::UnsupportedVersion {
                name: "elst".into(),
                version,
            });
        }
        let mut flags = [0u8; 3];
        flags.copy_from_slice(&r.read_bytes(3)?);

        let entry_count = r.read_u32()?;
        let mut entries = Vec::with_capacity(entry_count as usize);
        for _ in 0..entry_count {
            let (segment_duration, media_time);
            if version == 0 {
                segment_duration = r.read_u32()? as u64;
                media_time = r.read_i32()? as i64;
            } else {
                segment_duration = r.read_u64()?;
                media_time = r.read_u64()? as i64;
            }
            entries.push(ElstEntry {
                segment_duration,
                media_time,
                media_rate_integer: r.read_i16()?,
                media_rate_fraction: r.read_i16()?,
            });
        }

        Ok(Self {
            version,
            flags,
            entries,
        })
    }

    pub fn payload_size(&self) -> u32 {
        let entry = if self.version == 0 { 12 } else { 20 };
        8 + entry * self.entries.len() as u32
    }

    pub fn encode_payload(&self, w: &mut Writer) -> Result<()> {
        w.put_u8(self.version);
        w.put_bytes(&self.flags);
        w.put_u32(self.entries.len() as u32);
        for e in &self.entries {
            if self.version == 0 {
                w.put_u32(e.segment_duration as u32);
                w.put_i32(e.media_time as i32);
            } else {
                w.put_u64(e.segment_duration);
                w.put_u64(e.media_time as u64);
            }
            w.put_i16(e.media_rate_integer);
            w.put_i16(e.media_rate_fraction);
        }
        Ok(())
    }

    /// `media_time` of the first edit, or zero when the list is empty.
    pub fn media_time(&self) -> i64 {
        self.entries.first().map(|e| e.media_time).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tkhd_round_trip() {
        let tkhd = TkhdBox {
            version: 0,
            flags: [0, 0, 7],
            creation_time: 0,
            modification_time: 0,
            track_id: 1,
            reserved: 0,
            duration: 0,
            reserved2: 0,
            layer: 0,
            alternate_group: 0,
            volume: 0,
            reserved3: 0,
            matrix: crate::boxes::mvhd::UNITY_MATRIX,
            width: 1280 << 16,
            height: 720 << 16,
        };
        let mut w = Writer::new();
        tkhd.encode_payload(&mut w).unwrap();
        let bytes = w.into_inner();
        assert_eq!(bytes.len(), 84);
        assert_eq!(TkhdBox::decode(&bytes).unwrap(), tkhd);
    }

    #[test]
    fn elst_media_time() {
        let elst = ElstBox {
            version: 0,
            flags: [0; 3],
            entries: vec![ElstEntry {
                segment_duration: 5_400_000,
                media_time: 2048,
                media_rate_integer: 1,
                media_rate_fraction: 0,
            }],
        };
        let mut w = Writer::new();
        elst.encode_payload(&mut w).unwrap();
        let bytes = w.into_inner();
        let parsed = ElstBox::decode(&bytes).unwrap();
        assert_eq!(parsed.media_time(), 2048);
        assert_eq!(parsed, elst);
    }
}
