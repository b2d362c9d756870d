use crate::{boxes::FourCc, Reader, Result, Writer};

/// File type box. After the fixed 8-byte prefix the payload holds a run of
/// 4-byte brand codes; the count is derived from the payload size.
#[derive(Debug, Clone, PartialEq)]
pub struct FtypBox {
    pub major_brand: FourCc,
    pub minor_version: u32,
    pub compatible_brands: Vec<FourCc>,
}

impl FtypBox {
    pub fn decode(data: &[u8]) -> Result<Self> {
        let (major_brand, minor_version, compatible_brands) = decode_brands(data)?;
        Ok(Self {
            major_brand,
            minor_version,
            compatible_brands,
        })
    }

    pub fn payload_size(&self) -> u32 {
        8 + 4 * self.compatible_brands.len() as u32
    }

    pub fn encode_payload(&self, w: &mut Writer) -> Result<()> {
        encode_brands(w, self.major_brand, self.minor_version, &self.compatible_brands)
    }
}

/// Segment type box. Same wire layout as `ftyp`; carried at the head of a
/// media segment. The final segment of a representation carries the `lmsg`
/// compatible brand.
#[derive(Debug, Clone, PartialEq)]
pub struct StypBox {
    pub major_brand: FourCc,
    pub minor_version: u32,
    pub compatible_brands: Vec<FourCc>,
}

impl StypBox {
    pub fn decode(data: &[u8]) -> Result<Self> {
        let (major_brand, minor_version, compatible_brands) = decode_brands(data)?;
        Ok(Self {
            major_brand,
            minor_version,
            compatible_brands,
        })
    }

    pub fn payload_size(&self) -> u32 {
        8 + 4 * self.compatible_brands.len() as u32
    }

    pub fn encode_payload(&self, w: &mut Writer) -> Result<()> {
        encode_brands(w, self.major_brand, self.minor_version, &self.compatible_brands)
    }
}

fn decode_brands(data: &[u8]) -> Result<(FourCc, u32, Vec<FourCc>)> {
    let mut reader = Reader::new(data.to_vec());
    let major_brand = reader.read_fourcc()?;
    let minor_version = reader.read_u32()?;

    let entry_count = (data.len() as u32).saturating_sub(8) / 4;
    let mut compatible_brands = Vec::with_capacity(entry_count as usize);
    for _ in 0..entry_count {
        compatible_brands.push(reader.read_fourcc()?);
    }

    Ok((major_brand, minor_version, compatible_brands))
}

fn encode_brands(
    w: &mut Writer,
    major_brand: FourCc,
    minor_version: u32,
    compatible_brands: &[FourCc],
) -> Result<()> {
    w.put_bytes(&major_brand);
    w.put_u32(minor_version);
    for brand in compatible_brands {
        w.put_bytes(brand);
    }
    Ok(())
}

/// Free space box, kept verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct FreeBox {
    pub data: Vec<u8>,
}

impl FreeBox {
    pub fn decode(data: &[u8]) -> Result<Self> {
        Ok(Self {
            data: data.to_vec(),
        })
    }

    pub fn payload_size(&self) -> u32 {
        self.data.len() as u32
    }

    pub fn encode_payload(&self, w: &mut Writer) -> Result<()> {
        w.put_bytes(&self.data);
        Ok(())
    }
}
