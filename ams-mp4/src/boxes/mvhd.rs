use crate::{Error, Reader, Result, Writer};

/// Movie header box. Versions 0 and 1 switch the time and duration fields
/// between 32 and 64 bits.
#[derive(Debug, Clone, PartialEq)]
pub struct MvhdBox {
    pub version: u8,
    pub flags: [u8; 3],
    pub creation_time: u64,
    pub modification_time: u64,
    /// Number of time units that pass in one second.
    pub timescale: u32,
    pub duration: u64,
    /// Playback rate, 16.16 fixed point. Typically 0x00010000 (1.0).
    pub rate: i32,
    /// Playback volume, 8.8 fixed point. Typically 0x0100 (full volume).
    pub volume: i16,
    pub reserved: u16,
    pub reserved2: u64,
    pub matrix: [i32; 9],
    pub pre_defined: [u32; 6],
    pub next_track_id: u32,
}

impl MvhdBox {
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data.to_vec());
        let version = r.read_u8()?;
        if version > 1 {
            return Err(Error::UnsupportedVersion {
                name: "mvhd".into(),
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
        let timescale = r.read_u32()?;
        let duration = if version == 0 {
            r.read_u32()? as u64
        } else {
            r.read_u64()?
        };
        let rate = r.read_i32()?;
        let volume = r.read_i16()?;
        let reserved = r.read_u16()?;
        let reserved2 = r.read_u64()?;
        let mut matrix = [0i32; 9];
        for v in &mut matrix {
            *v = r.read_i32()?;
        }
        let mut pre_defined = [0u32; 6];
        for v in &mut pre_defined {
            *v = r.read_u32()?;
        }
        let next_track_id = r.read_u32()?;

        Ok(Self {
            version,
            flags,
            creation_time,
            modification_time,
            timescale,
            duration,
            rate,
            volume,
            reserved,
            reserved2,
            matrix,
            pre_defined,
            next_track_id,
        })
    }

    pub fn payload_size(&self) -> u32 {
        if self.version == 0 {
            100
        } else {
            112
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
        w.put_u32(self.timescale);
        if self.version == 0 {
            w.put_u32(self.duration as u32);
        } else {
            w.put_u64(self.duration);
        }
        w.put_i32(self.rate);
        w.put_i16(self.volume);
        w.put_u16(self.reserved);
        w.put_u64(self.reserved2);
        for v in &self.matrix {
            w.put_i32(*v);
        }
        for v in &self.pre_defined {
            w.put_u32(*v);
        }
        w.put_u32(self.next_track_id);
        Ok(())
    }
}

/// The identity transform used when synthesizing headers.
pub(crate) const UNITY_MATRIX: [i32; 9] = [0x00010000, 0, 0, 0, 0x00010000, 0, 0, 0, 0x40000000];

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MvhdBox {
        MvhdBox {
            version: 0,
            flags: [0; 3],
            creation_time: 3_531_120_000,
            modification_time: 3_531_120_000,
            timescale: 90000,
            duration: 5_400_000,
            rate: 0x00010000,
            volume: 0x0100,
            reserved: 0,
            reserved2: 0,
            matrix: UNITY_MATRIX,
            pre_defined: [0; 6],
            next_track_id: 2,
        }
    }

    #[test]
    fn round_trip_version_0() {
        let mvhd = sample();
        let mut w = Writer::new();
        mvhd.encode_payload(&mut w).unwrap();
        let bytes = w.into_inner();
        assert_eq!(bytes.len() as u32, mvhd.payload_size());
        assert_eq!(MvhdBox::decode(&bytes).unwrap(), mvhd);
    }

    #[test]
    fn round_trip_version_1() {
        let mut mvhd = sample();
        mvhd.version = 1;
        mvhd.duration = u64::from(u32::MAX) + 17;
        let mut w = Writer::new();
        mvhd.encode_payload(&mut w).unwrap();
        let bytes = w.into_inner();
        assert_eq!(bytes.len(), 112);
        assert_eq!(MvhdBox::decode(&bytes).unwrap(), mvhd);
    }

    #[test]
    fn rejects_unknown_version() {
        let mut data = vec![0u8; 100];
        data[0] = 2;
        assert!(matches!(
            MvhdBox::decode(&data),
            Err(Error::UnsupportedVersion { version: 2, .. })
        ));
    }
}
