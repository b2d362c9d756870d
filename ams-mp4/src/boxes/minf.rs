use crate::{Reader, Result, Writer};

/// Video media header box.
#[derive(Debug, Clone, PartialEq)]
pub struct VmhdBox {
    pub version: u8,
    pub flags: [u8; 3],
    pub graphics_mode: u16,
    pub op_color: [u16; 3],
}

impl VmhdBox {
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data.to_vec());
        let version = r.read_u8()?;
        let mut flags = [0u8; 3];
        flags.copy_from_slice(&r.read_bytes(3)?);
        let graphics_mode = r.read_u16()?;
        let mut op_color = [0u16; 3];
        for v in &mut op_color {
            *v = r.read_u16()?;
        }
        Ok(Self {
            version,
            flags,
            graphics_mode,
            op_color,
        })
    }

    pub fn payload_size(&self) -> u32 {
        12
    }

    pub fn encode_payload(&self, w: &mut Writer) -> Result<()> {
        w.put_u8(self.version);
        w.put_bytes(&self.flags);
        w.put_u16(self.graphics_mode);
        for v in &self.op_color {
            w.put_u16(*v);
        }
        Ok(())
    }
}

/// Sound media header box.
#[derive(Debug, Clone, PartialEq)]
pub struct SmhdBox {
    pub version: u8,
    pub flags: [u8; 3],
    pub balance: i16,
    pub reserved: u16,
}

impl SmhdBox {
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data.to_vec());
        let version = r.read_u8()?;
        let mut flags = [0u8; 3];
        flags.copy_from_slice(&r.read_bytes(3)?);
        Ok(Self {
            version,
            flags,
            balance: r.read_i16()?,
            reserved: r.read_u16()?,
        })
    }

    pub fn payload_size(&self) -> u32 {
        8
    }

    pub fn encode_payload(&self, w: &mut Writer) -> Result<()> {
        w.put_u8(self.version);
        w.put_bytes(&self.flags);
        w.put_i16(self.balance);
        w.put_u16(self.reserved);
        Ok(())
    }
}

/// Hint media header box. Parsed for tolerance; never emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct HmhdBox {
    pub version: u8,
    pub flags: [u8; 3],
    pub max_pdu_size: u16,
    pub avg_pdu_size: u16,
    pub max_bitrate: u32,
    pub avg_bitrate: u32,
    pub reserved: u32,
}

impl HmhdBox {
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data.to_vec());
        let version = r.read_u8()?;
        let mut flags = [0u8; 3];
        flags.copy_from_slice(&r.read_bytes(3)?);
        Ok(Self {
            version,
            flags,
            max_pdu_size: r.read_u16()?,
            avg_pdu_size: r.read_u16()?,
            max_bitrate: r.read_u32()?,
            avg_bitrate: r.read_u32()?,
            reserved: r.read_u32()?,
        })
    }

    pub fn payload_size(&self) -> u32 {
        20
    }

    pub fn encode_payload(&self, w: &mut Writer) -> Result<()> {
        w.put_u8(self.version);
        w.put_bytes(&self.flags);
        w.put_u16(self.max_pdu_size);
        w.put_u16(self.avg_pdu_size);
        w.put_u32(self.max_bitrate);
        w.put_u32(self.avg_bitrate);
        w.put_u32(self.reserved);
        Ok(())
    }
}

/// A `url ` entry inside `dref`. The self-reference entry has an empty
/// location and flag bit 0x000001 set.
#[derive(Debug, Clone, PartialEq)]
pub struct DrefUrlBox {
    pub location: String,
    pub version: u8,
    pub flags: [u8; 3],
}

impl DrefUrlBox {
    fn entry_size(&self) -> u32 {
        8 + self.location.len() as u32 + 4
    }
}

/// A `urn ` entry inside `dref`.
#[derive(Debug, Clone, PartialEq)]
pub struct DrefUrnBox {
    pub name: String,
    pub location: String,
    pub version: u8,
    pub flags: [u8; 3],
}

impl DrefUrnBox {
    fn entry_size(&self) -> u32 {
        8 + self.name.len() as u32 + self.location.len() as u32 + 4
    }
}

/// Data reference box. Entries are held inline rather than at child paths:
/// their wire layout is positional within the `dref` payload.
#[derive(Debug, Clone, PartialEq)]
pub struct DrefBox {
    pub version: u8,
    pub flags: [u8; 3],
    pub url_entries: Vec<DrefUrlBox>,
    pub urn_entries: Vec<DrefUrnBox>,
}

impl DrefBox {
    /// The single self-reference entry carried by every generated init
    /// segment.
    pub fn self_reference() -> Self {
        Self {
            version: 0,
            flags: [0; 3],
            url_entries: vec![DrefUrlBox {
                location: String::new(),
                version: 0,
                flags: [0, 0, 1],
            }],
            urn_entries: Vec::new(),
        }
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let malformed = |reason: &str| crate::Error::MalformedBox {
            name: "dref".into(),
            reason: reason.into(),
        };

        if data.len() < 8 {
            return Err(malformed("payload shorter than 8 bytes"));
        }
        let version = data[0];
        let flags = [data[1], data[2], data[3]];
        let entry_count = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);

        let mut url_entries = Vec::new();
        let mut urn_entries = Vec::new();
        let mut offset = 8usize;
        for _ in 0..entry_count {
            if offset + 8 > data.len() {
                return Err(malformed("entry header past payload end"));
            }
            let kind = &data[offset + 4..offset + 8];
            offset += 8;
            match kind {
                b"url " => {
                    let location = scan_string(data, &mut offset, &malformed)?;
                    if offset + 4 > data.len() {
                        return Err(malformed("url entry truncated"));
                    }
                    url_entries.push(DrefUrlBox {
                        location,
                        version: data[offset],
                        flags: [data[offset + 1], data[offset + 2], data[offset + 3]],
                    });
                    offset += 4;
                }
                b"urn " => {
                    let name = scan_string(data, &mut offset, &malformed)?;
                    let location = scan_string(data, &mut offset, &malformed)?;
                    if offset + 4 > data.len() {
                        return Err(malformed("urn entry truncated"));
                    }
                    urn_entries.push(DrefUrnBox {
                        name,
                        location,
                        version: data[offset],
                        flags: [data[offset + 1], data[offset + 2], data[offset + 3]],
                    });
                    offset += 4;
                }
                _ => break,
            }
        }

        Ok(Self {
            version,
            flags,
            url_entries,
            urn_entries,
        })
    }

    pub fn payload_size(&self) -> u32 {
        let urls: u32 = self.url_entries.iter().map(DrefUrlBox::entry_size).sum();
        let urns: u32 = self.urn_entries.iter().map(DrefUrnBox::entry_size).sum();
        8 + urls + urns
    }

    pub fn encode_payload(&self, w: &mut Writer) -> Result<()> {
        w.put_u8(self.version);
        w.put_bytes(&self.flags);
        w.put_u32((self.url_entries.len() + self.urn_entries.len()) as u32);
        for e in &self.url_entries {
            w.put_u32(e.entry_size());
            w.put_bytes(b"url ");
            w.put_bytes(e.location.as_bytes());
            w.put_u8(e.version);
            w.put_bytes(&e.flags);
        }
        for e in &self.urn_entries {
            w.put_u32(e.entry_size());
            w.put_bytes(b"urn ");
            w.put_bytes(e.name.as_bytes());
            w.put_bytes(e.location.as_bytes());
            w.put_u8(e.version);
            w.put_bytes(&e.flags);
        }
        Ok(())
    }
}

/// Scans a string up to (but not consuming) the next zero byte. Entry
/// strings carry no terminator of their own; the zero that ends the scan is
/// the version byte of the entry.
fn scan_string(
    data: &[u8],
    offset: &mut usize,
    malformed: &impl Fn(&str) -> crate::Error,
) -> Result<String> {
    let start = *offset;
    let mut end = start;
    loop {
        if end >= data.len() {
            return Err(malformed("unterminated string"));
        }
        if data[end] == 0 {
            break;
        }
        end += 1;
    }
    *offset = end;
    Ok(String::from_utf8_lossy(&data[start..end]).into_owned())
}
