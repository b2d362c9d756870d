use crate::{
    boxes::{
        Avc1Box, AvcCBox, BtrtBox, CttsBox, DrefBox, ElstBox, FreeBox, FrmaBox, FtypBox, HdlrBox,
        HmhdBox, MdatBox, MdhdBox, MehdBox, MfhdBox, Mp4Box, Mp4aBox, MvhdBox, ParentBox, SchmBox,
        SdtpBox, SmhdBox, StcoBox, StscBox, StsdBox, StssBox, StszBox, SttsBox, StypBox, TfdtBox,
        TfhdBox, TkhdBox, TrexBox, TrunBox, VmhdBox, EsdsBox,
    },
    Error, Result, Writer,
};
use log::debug;
use std::{
    collections::HashMap,
    io::{Read, Seek, SeekFrom},
    path::Path,
};

/// The fixed order in which recognized box paths are emitted. Children
/// follow their parents immediately; parent sizes are re-derived from this
/// table at serialization time.
const BOX_PATH_ORDER: &[&str] = &[
    "ftyp",
    "styp",
    "free",
    "moof",
    "moof.mfhd",
    "moof.traf",
    "moof.traf.tfhd",
    "moof.traf.tfdt",
    "moof.traf.trun",
    "moov",
    "moov.mvhd",
    "moov.trak",
    "moov.trak.tkhd",
    "moov.trak.mdia",
    "moov.trak.mdia.mdhd",
    "moov.trak.mdia.hdlr",
    "moov.trak.mdia.minf",
    "moov.trak.mdia.minf.smhd",
    "moov.trak.mdia.minf.vmhd",
    "moov.trak.mdia.minf.dinf",
    "moov.trak.mdia.minf.dinf.dref",
    "moov.trak.mdia.minf.stbl",
    "moov.trak.mdia.minf.stbl.stsd",
    "moov.trak.mdia.minf.stbl.stsd.mp4a",
    "moov.trak.mdia.minf.stbl.stsd.mp4a.esds",
    "moov.trak.mdia.minf.stbl.stsd.avc1",
    "moov.trak.mdia.minf.stbl.stsd.avc1.avcC",
    "moov.trak.mdia.minf.stbl.stsd.avc1.btrt",
    "moov.trak.mdia.minf.stbl.stts",
    "moov.trak.mdia.minf.stbl.ctts",
    "moov.trak.mdia.minf.stbl.stsc",
    "moov.trak.mdia.minf.stbl.stsz",
    "moov.trak.mdia.minf.stbl.sdtp",
    "moov.trak.mdia.minf.stbl.stco",
    "moov.mvex",
    "moov.mvex.mehd",
    "moov.mvex.trex",
    "mdat",
];

/// What the parser does with a dotted path. Mirrors the dispatch table of
/// the reader: the same four-character code decodes differently (or not at
/// all) depending on its parent chain.
enum PathKind {
    /// Recurse over the payload as a run of child boxes.
    Container,
    /// Decode the whole payload with the box's own decoder.
    Leaf(LeafKind),
    /// A fixed payload prefix, then child boxes.
    SampleEntry(SampleEntryKind),
    /// Record (path, offset, size) and seek past.
    Mdat,
    /// Not in the dispatch table.
    Unknown,
}

#[derive(Clone, Copy)]
enum LeafKind {
    Ftyp,
    Styp,
    Free,
    Mvhd,
    Tkhd,
    Elst,
    Mdhd,
    Hdlr,
    Vmhd,
    Smhd,
    Hmhd,
    Dref,
    Esds,
    AvcC,
    Btrt,
    Stts,
    Ctts,
    Stss,
    Stsc,
    Stsz,
    Sdtp,
    Stco,
    Mehd,
    Trex,
    Mfhd,
    Tfhd,
    Trun,
    Tfdt,
    Frma,
    Schm,
}

#[derive(Clone, Copy)]
enum SampleEntryKind {
    Stsd,
    Mp4a,
    Avc1,
}

fn kind_for(path: &str) -> PathKind {
    use LeafKind::*;
    use PathKind::*;

    match path {
        "ftyp" => Leaf(Ftyp),
        "styp" => Leaf(Styp),
        "free" => Leaf(Free),
        "moov" | "moov.trak" | "moov.trak.edts" | "moov.trak.mdia" | "moov.trak.mdia.minf"
        | "moov.trak.mdia.minf.dinf" | "moov.trak.mdia.minf.stbl" | "moov.mvex" | "moov.udta"
        | "moof" | "moof.traf" | "mfra" | "skip" | "skip.udta" | "skip.udta.cprt" | "meta"
        | "meta.dinf" | "meta.ipro" | "meta.ipro.sinf" | "meta.flin" | "meta.flin.paen"
        | "meco" | "moov.trak.mdia.minf.stbl.stsd.encv.sinf"
        | "moov.trak.mdia.minf.stbl.stsd.encv.sinf.schi" => Container,
        "moov.mvhd" => Leaf(Mvhd),
        "moov.trak.tkhd" => Leaf(Tkhd),
        "moov.trak.edts.elst" => Leaf(Elst),
        "moov.trak.mdia.mdhd" => Leaf(Mdhd),
        "moov.trak.mdia.hdlr" => Leaf(Hdlr),
        "moov.trak.mdia.minf.vmhd" => Leaf(Vmhd),
        "moov.trak.mdia.minf.smhd" => Leaf(Smhd),
        "moov.trak.mdia.minf.hmhd" => Leaf(Hmhd),
        "moov.trak.mdia.minf.dinf.dref" => Leaf(Dref),
        "moov.trak.mdia.minf.stbl.stsd" => SampleEntry(SampleEntryKind::Stsd),
        "moov.trak.mdia.minf.stbl.stsd.mp4a" => SampleEntry(SampleEntryKind::Mp4a),
        "moov.trak.mdia.minf.stbl.stsd.mp4a.esds" => Leaf(Esds),
        "moov.trak.mdia.minf.stbl.stsd.avc1"
        | "moov.trak.mdia.minf.stbl.stsd.encv" => SampleEntry(SampleEntryKind::Avc1),
        "moov.trak.mdia.minf.stbl.stsd.avc1.avcC"
        | "moov.trak.mdia.minf.stbl.stsd.encv.avcC" => Leaf(AvcC),
        "moov.trak.mdia.minf.stbl.stsd.avc1.btrt"
        | "moov.trak.mdia.minf.stbl.stsd.encv.btrt" => Leaf(Btrt),
        "moov.trak.mdia.minf.stbl.stsd.encv.sinf.frma" | "meta.ipro.sinf.frma" => Leaf(Frma),
        "moov.trak.mdia.minf.stbl.stsd.encv.sinf.schm" => Leaf(Schm),
        "moov.trak.mdia.minf.stbl.stts" => Leaf(Stts),
        "moov.trak.mdia.minf.stbl.ctts" => Leaf(Ctts),
        "moov.trak.mdia.minf.stbl.stss" => Leaf(Stss),
        "moov.trak.mdia.minf.stbl.stsc" => Leaf(Stsc),
        "moov.trak.mdia.minf.stbl.stsz" => Leaf(Stsz),
        "moov.trak.mdia.minf.stbl.sdtp" => Leaf(Sdtp),
        "moov.trak.mdia.minf.stbl.stco" => Leaf(Stco),
        "moov.mvex.mehd" => Leaf(Mehd),
        "moov.mvex.trex" => Leaf(Trex),
        "moof.mfhd" => Leaf(Mfhd),
        "moof.traf.tfhd" => Leaf(Tfhd),
        "moof.traf.tfdt" => Leaf(Tfdt),
        "moof.traf.trun" => Leaf(Trun),
        "mdat" => PathKind::Mdat,
        _ => Unknown,
    }
}

/// Random-access index over the boxes of one parse or one assembly, keyed by
/// dotted path (`moov.trak.mdia.minf.stbl.stsd.avc1.avcC`). Order within a
/// path is the order of appearance in the source.
///
/// A tree lives only for the duration of a parse or a segment assembly; it
/// is never retained between requests.
#[derive(Default)]
pub struct BoxTree {
    boxes: HashMap<String, Vec<Mp4Box>>,
}

impl BoxTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// First box at `path`, if any.
    pub fn get(&self, path: &str) -> Option<&Mp4Box> {
        self.boxes.get(path).and_then(|v| v.first())
    }

    /// All boxes at `path`, in order of appearance.
    pub fn get_all(&self, path: &str) -> &[Mp4Box] {
        self.boxes.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, path: &str) -> bool {
        self.boxes.contains_key(path)
    }

    /// Appends a box at `path`.
    pub fn add(&mut self, path: &str, value: Mp4Box) {
        self.boxes.entry(path.to_string()).or_default().push(value);
    }

    /// Replaces whatever is at `path` with a single box.
    pub fn replace(&mut self, path: &str, value: Mp4Box) {
        self.boxes.insert(path.to_string(), vec![value]);
    }

    /// Parses `length` bytes of box structure from a seekable source.
    ///
    /// Unknown box types are skipped; `mdat` payloads are never read, only
    /// located. `src` names the file the reader is positioned in, so that
    /// located `mdat` ranges can be streamed back out at serialization time.
    pub fn parse<R: Read + Seek>(r: &mut R, length: u64, src: &Path) -> Result<Self> {
        let mut tree = Self::new();
        read_boxes(r, length, "", &mut tree, src)?;
        Ok(tree)
    }

    /// Parses a whole MP4 file.
    pub fn parse_file(path: &Path) -> Result<Self> {
        let mut f = std::fs::File::open(path)?;
        let length = f.metadata()?.len();
        Self::parse(&mut f, length, path)
    }

    /// Emits every recognized path present in the tree, in canonical order,
    /// with parent sizes derived bottom-up.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut w = Writer::new();
        for path in BOX_PATH_ORDER {
            if let Some(b) = self.get(path) {
                let total = self.total_size(path);
                b.encode(&mut w, total)?;
            }
        }
        Ok(w.into_inner())
    }

    /// Total serialized size of the box at `path`: header, own payload, and
    /// every canonical-order descendant present in the tree.
    fn total_size(&self, path: &str) -> u32 {
        let own = match self.get(path) {
            Some(b) => 8 + b.payload_size(),
            None => return 0,
        };
        let children: u32 = BOX_PATH_ORDER
            .iter()
            .filter(|p| is_direct_child(path, p))
            .map(|p| self.total_size(p))
            .sum();
        own + children
    }
}

fn is_direct_child(parent: &str, candidate: &str) -> bool {
    candidate
        .strip_prefix(parent)
        .and_then(|rest| rest.strip_prefix('.'))
        .is_some_and(|rest| !rest.contains('.'))
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

struct BoxHeader {
    name: [u8; 4],
    /// Total size including the header itself.
    total_size: u64,
    header_len: u64,
}

fn read_header<R: Read>(r: &mut R) -> Result<BoxHeader> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    let mut total_size = u64::from(u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]));
    let name = [buf[4], buf[5], buf[6], buf[7]];
    let mut header_len = 8;

    // A declared size of 1 switches to the 64-bit largesize form.
    if total_size == 1 {
        let mut large = [0u8; 8];
        r.read_exact(&mut large)?;
        total_size = u64::from_be_bytes(large);
        header_len = 16;
    }

    if total_size < header_len {
        return Err(Error::MalformedBox {
            name: String::from_utf8_lossy(&name).into_owned(),
            reason: format!("declared size {total_size} is smaller than its header"),
        });
    }

    Ok(BoxHeader {
        name,
        total_size,
        header_len,
    })
}

fn read_boxes<R: Read + Seek>(
    r: &mut R,
    length: u64,
    prefix: &str,
    tree: &mut BoxTree,
    src: &Path,
) -> Result<()> {
    let mut offset = 0u64;

    while offset < length {
        let header = read_header(r)?;
        let name = String::from_utf8_lossy(&header.name).into_owned();
        let path = join_path(prefix, &name);
        let payload_size = header.total_size - header.header_len;
        debug!("( off {:8} ) [{}]", header.total_size, path);

        match kind_for(&path) {
            PathKind::Container => {
                tree.add(&path, Mp4Box::Parent(ParentBox::new(header.name)));
                read_boxes(r, payload_size, &path, tree, src)?;
            }
            PathKind::SampleEntry(kind) => {
                read_sample_entry(r, kind, &path, payload_size, tree, src)?;
            }
            PathKind::Mdat => {
                let data_offset = r.stream_position()?;
                tree.add(
                    &path,
                    Mp4Box::Mdat(MdatBox {
                        src: src.to_path_buf(),
                        offset: data_offset,
                        size: payload_size as u32,
                    }),
                );
                r.seek(SeekFrom::Current(payload_size as i64))?;
            }
            PathKind::Leaf(kind) => {
                let data_offset = r.stream_position()?;
                let mut data = vec![0u8; payload_size as usize];
                r.read_exact(&mut data).map_err(|_| Error::MalformedBox {
                    name: name.clone(),
                    reason: "payload truncated".into(),
                })?;
                match decode_leaf(kind, &data, data_offset) {
                    Ok(decoded) => tree.add(&path, decoded),
                    // An unknown version is fatal for this box only.
                    Err(Error::UnsupportedVersion { name, version }) => {
                        debug!("skipping '{name}' box with unsupported version {version}");
                    }
                    Err(e) => return Err(e),
                }
            }
            PathKind::Unknown => {
                debug!("skipping unknown '{path}' box");
                r.seek(SeekFrom::Current(payload_size as i64))?;
            }
        }

        offset += header.total_size;
    }

    Ok(())
}

/// `stsd` carries an 8-byte payload prefix before its children; `mp4a` and
/// `avc1` carry fixed codec fields before theirs.
fn read_sample_entry<R: Read + Seek>(
    r: &mut R,
    kind: SampleEntryKind,
    path: &str,
    payload_size: u64,
    tree: &mut BoxTree,
    src: &Path,
) -> Result<()> {
    let prefix_len = match kind {
        SampleEntryKind::Stsd => 8,
        SampleEntryKind::Mp4a => u64::from(crate::boxes::MP4A_PREFIX),
        SampleEntryKind::Avc1 => u64::from(crate::boxes::AVC1_PREFIX),
    };

    if payload_size < prefix_len {
        return Err(Error::MalformedBox {
            name: path.rsplit('.').next().unwrap_or(path).to_string(),
            reason: "payload shorter than its fixed fields".into(),
        });
    }

    let mut data = vec![0u8; prefix_len as usize];
    r.read_exact(&mut data)?;

    let decoded = match kind {
        SampleEntryKind::Stsd => Mp4Box::Stsd(StsdBox::decode(&data)?),
        SampleEntryKind::Mp4a => Mp4Box::Mp4a(Mp4aBox::decode(&data)?),
        SampleEntryKind::Avc1 => Mp4Box::Avc1(Avc1Box::decode(&data)?),
    };
    tree.add(path, decoded);

    read_boxes(r, payload_size - prefix_len, path, tree, src)
}

fn decode_leaf(kind: LeafKind, data: &[u8], data_offset: u64) -> Result<Mp4Box> {
    Ok(match kind {
        LeafKind::Ftyp => Mp4Box::Ftyp(FtypBox::decode(data)?),
        LeafKind::Styp => Mp4Box::Styp(StypBox::decode(data)?),
        LeafKind::Free => Mp4Box::Free(FreeBox::decode(data)?),
        LeafKind::Mvhd => Mp4Box::Mvhd(MvhdBox::decode(data)?),
        LeafKind::Tkhd => Mp4Box::Tkhd(TkhdBox::decode(data)?),
        LeafKind::Elst => Mp4Box::Elst(ElstBox::decode(data)?),
        LeafKind::Mdhd => Mp4Box::Mdhd(MdhdBox::decode(data)?),
        LeafKind::Hdlr => Mp4Box::Hdlr(HdlrBox::decode(data)?),
        LeafKind::Vmhd => Mp4Box::Vmhd(VmhdBox::decode(data)?),
        LeafKind::Smhd => Mp4Box::Smhd(SmhdBox::decode(data)?),
        LeafKind::Hmhd => Mp4Box::Hmhd(HmhdBox::decode(data)?),
        LeafKind::Dref => Mp4Box::Dref(DrefBox::decode(data)?),
        LeafKind::Esds => Mp4Box::Esds(EsdsBox::decode(data)?),
        LeafKind::AvcC => Mp4Box::AvcC(AvcCBox::decode(data)?),
        LeafKind::Btrt => Mp4Box::Btrt(BtrtBox::decode(data)?),
        LeafKind::Stts => Mp4Box::Stts(SttsBox::decode(data)?),
        LeafKind::Ctts => {
            let mut b = CttsBox::decode(data)?;
            b.offset = data_offset;
            Mp4Box::Ctts(b)
        }
        LeafKind::Stss => {
            let mut b = StssBox::decode(data)?;
            b.offset = data_offset;
            Mp4Box::Stss(b)
        }
        LeafKind::Stsc => Mp4Box::Stsc(StscBox::decode(data)?),
        LeafKind::Stsz => {
            let mut b = StszBox::decode(data)?;
            b.offset = data_offset;
            Mp4Box::Stsz(b)
        }
        LeafKind::Sdtp => Mp4Box::Sdtp(SdtpBox::decode(data)?),
        LeafKind::Stco => Mp4Box::Stco(StcoBox::decode(data)?),
        LeafKind::Mehd => Mp4Box::Mehd(MehdBox::decode(data)?),
        LeafKind::Trex => Mp4Box::Trex(TrexBox::decode(data)?),
        LeafKind::Mfhd => Mp4Box::Mfhd(MfhdBox::decode(data)?),
        LeafKind::Tfhd => Mp4Box::Tfhd(TfhdBox::decode(data)?),
        LeafKind::Trun => Mp4Box::Trun(TrunBox::decode(data)?),
        LeafKind::Tfdt => Mp4Box::Tfdt(TfdtBox::decode(data)?),
        LeafKind::Frma => Mp4Box::Frma(FrmaBox::decode(data)?),
        LeafKind::Schm => Mp4Box::Schm(SchmBox::decode(data)?),
    })
}
