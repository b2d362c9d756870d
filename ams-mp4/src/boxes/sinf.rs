use crate::{Reader, Result, Writer};

/// Original format box, found inside `sinf` of encrypted sample entries.
/// Parsed but never emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct FrmaBox {
    pub data_format: [u8; 4],
}

impl FrmaBox {
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data.to_vec());
        Ok(Self {
            data_format: r.read_fourcc()?,
        })
    }

    pub fn payload_size(&self) -> u32 {
        4
    }

    pub fn encode_payload(&self, w: &mut Writer) -> Result<()> {
        w.put_bytes(&self.data_format);
        Ok(())
    }
}

/// Scheme type box. Parsed but never emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct SchmBox {
    pub version: u8,
    pub flags: [u8; 3],
    pub scheme_type: [u8; 4],
    pub scheme_version: u32,
    /// Present on the wire iff flag bit 0x000001 is set.
    pub scheme_uri: String,
}

impl SchmBox {
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data.to_vec());
        let version = r.read_u8()?;
        let mut flags = [0u8; 3];
        flags.copy_from_slice(&r.read_bytes(3)?);
        let scheme_type = r.read_fourcc()?;
        let scheme_version = r.read_u32()?;
        let scheme_uri = if flags == [0, 0, 1] {
            String::from_utf8_lossy(&r.read_to_end()?).into_owned()
        } else {
            String::new()
        };
        Ok(Self {
            version,
            flags,
            scheme_type,
            scheme_version,
            scheme_uri,
        })
    }

    pub fn payload_size(&self) -> u32 {
        let uri = if self.flags == [0, 0, 1] {
            self.scheme_uri.len() as u32
        } else {
            0
        };
        12 + uri
    }

    pub fn encode_payload(&self, w: &mut Writer) -> Result<()> {
        w.put_u8(self.version);
        w.put_bytes(&self.flags);
        w.put_bytes(&self.scheme_type);
        w.put_u32(self.scheme_version);
        if self.flags == [0, 0, 1] {
            w.put_bytes(self.scheme_uri.as_bytes());
        }
        Ok(())
    }
}
