mod ftyp;
mod mdat;
mod mdhd;
mod minf;
mod moof;
mod mvex;
mod mvhd;
mod sample_entries;
mod sinf;
mod stbl;
mod tkhd;

pub use ftyp::{FreeBox, FtypBox, StypBox};
pub use mdat::MdatBox;
pub use mdhd::{HdlrBox, MdhdBox};
pub use minf::{DrefBox, DrefUrlBox, DrefUrnBox, HmhdBox, SmhdBox, VmhdBox};
pub use moof::{MfhdBox, TfdtBox, TfhdBox, TrunBox, TrunSample};
pub use mvex::{MehdBox, TrexBox};
pub use mvhd::MvhdBox;
pub(crate) use mvhd::UNITY_MATRIX;
pub use sample_entries::{Avc1Box, AvcCBox, BtrtBox, EsdsBox, Mp4aBox};
pub(crate) use sample_entries::{AVC1_PREFIX, MP4A_PREFIX};
pub use sinf::{FrmaBox, SchmBox};
pub use stbl::{
    CttsBox, CttsEntry, SdtpBox, StcoBox, StscBox, StscEntry, StsdBox, StssBox, SttsBox, SttsEntry,
    StszBox,
};
pub use tkhd::{ElstBox, ElstEntry, TkhdBox};

use crate::{Result, Writer};

/// Four-character box type code.
pub type FourCc = [u8; 4];

/// A pure container box: an 8-byte header whose payload is a run of child
/// boxes. The children live at their own dotted paths in the tree; the
/// serializer re-derives the declared size from them.
#[derive(Debug, Clone, PartialEq)]
pub struct ParentBox {
    pub name: FourCc,
}

impl ParentBox {
    pub fn new(name: FourCc) -> Self {
        Self { name }
    }
}

/// Every box type this crate decodes, plus [`ParentBox`] for containers.
///
/// Unknown four-character codes are never materialized: the parser skips
/// them, so a tree only ever holds variants listed here.
#[derive(Debug, Clone, PartialEq)]
pub enum Mp4Box {
    Parent(ParentBox),
    Ftyp(FtypBox),
    Styp(StypBox),
    Free(FreeBox),
    Mvhd(MvhdBox),
    Tkhd(TkhdBox),
    Elst(ElstBox),
    Mdhd(MdhdBox),
    Hdlr(HdlrBox),
    Vmhd(VmhdBox),
    Smhd(SmhdBox),
    Hmhd(HmhdBox),
    Dref(DrefBox),
    Stsd(StsdBox),
    Mp4a(Mp4aBox),
    Esds(EsdsBox),
    Avc1(Avc1Box),
    AvcC(AvcCBox),
    Btrt(BtrtBox),
    Stts(SttsBox),
    Ctts(CttsBox),
    Stss(StssBox),
    Stsc(StscBox),
    Stsz(StszBox),
    Sdtp(SdtpBox),
    Stco(StcoBox),
    Mehd(MehdBox),
    Trex(TrexBox),
    Mfhd(MfhdBox),
    Tfhd(TfhdBox),
    Tfdt(TfdtBox),
    Trun(TrunBox),
    Frma(FrmaBox),
    Schm(SchmBox),
    Mdat(MdatBox),
}

impl Mp4Box {
    /// The four-character code this box serializes under.
    pub fn fourcc(&self) -> FourCc {
        match self {
            Mp4Box::Parent(b) => b.name,
            Mp4Box::Ftyp(_) => *b"ftyp",
            Mp4Box::Styp(_) => *b"styp",
            Mp4Box::Free(_) => *b"free",
            Mp4Box::Mvhd(_) => *b"mvhd",
            Mp4Box::Tkhd(_) => *b"tkhd",
            Mp4Box::Elst(_) => *b"elst",
            Mp4Box::Mdhd(_) => *b"mdhd",
            Mp4Box::Hdlr(_) => *b"hdlr",
            Mp4Box::Vmhd(_) => *b"vmhd",
            Mp4Box::Smhd(_) => *b"smhd",
            Mp4Box::Hmhd(_) => *b"hmhd",
            Mp4Box::Dref(_) => *b"dref",
            Mp4Box::Stsd(_) => *b"stsd",
            Mp4Box::Mp4a(_) => *b"mp4a",
            Mp4Box::Esds(_) => *b"esds",
            Mp4Box::Avc1(_) => *b"avc1",
            Mp4Box::AvcC(_) => *b"avcC",
            Mp4Box::Btrt(_) => *b"btrt",
            Mp4Box::Stts(_) => *b"stts",
            Mp4Box::Ctts(_) => *b"ctts",
            Mp4Box::Stss(_) => *b"stss",
            Mp4Box::Stsc(_) => *b"stsc",
            Mp4Box::Stsz(_) => *b"stsz",
            Mp4Box::Sdtp(_) => *b"sdtp",
            Mp4Box::Stco(_) => *b"stco",
            Mp4Box::Mehd(_) => *b"mehd",
            Mp4Box::Trex(_) => *b"trex",
            Mp4Box::Mfhd(_) => *b"mfhd",
            Mp4Box::Tfhd(_) => *b"tfhd",
            Mp4Box::Tfdt(_) => *b"tfdt",
            Mp4Box::Trun(_) => *b"trun",
            Mp4Box::Frma(_) => *b"frma",
            Mp4Box::Schm(_) => *b"schm",
            Mp4Box::Mdat(_) => *b"mdat",
        }
    }

    /// Size in bytes of this box's own payload, excluding the 8-byte header
    /// and excluding any children held at deeper tree paths.
    pub fn payload_size(&self) -> u32 {
        match self {
            Mp4Box::Parent(_) => 0,
            Mp4Box::Ftyp(b) => b.payload_size(),
            Mp4Box::Styp(b) => b.payload_size(),
            Mp4Box::Free(b) => b.payload_size(),
            Mp4Box::Mvhd(b) => b.payload_size(),
            Mp4Box::Tkhd(b) => b.payload_size(),
            Mp4Box::Elst(b) => b.payload_size(),
            Mp4Box::Mdhd(b) => b.payload_size(),
            Mp4Box::Hdlr(b) => b.payload_size(),
            Mp4Box::Vmhd(b) => b.payload_size(),
            Mp4Box::Smhd(b) => b.payload_size(),
            Mp4Box::Hmhd(b) => b.payload_size(),
            Mp4Box::Dref(b) => b.payload_size(),
            Mp4Box::Stsd(b) => b.payload_size(),
            Mp4Box::Mp4a(b) => b.payload_size(),
            Mp4Box::Esds(b) => b.payload_size(),
            Mp4Box::Avc1(b) => b.payload_size(),
            Mp4Box::AvcC(b) => b.payload_size(),
            Mp4Box::Btrt(b) => b.payload_size(),
            Mp4Box::Stts(b) => b.payload_size(),
            Mp4Box::Ctts(b) => b.payload_size(),
            Mp4Box::Stss(b) => b.payload_size(),
            Mp4Box::Stsc(b) => b.payload_size(),
            Mp4Box::Stsz(b) => b.payload_size(),
            Mp4Box::Sdtp(b) => b.payload_size(),
            Mp4Box::Stco(b) => b.payload_size(),
            Mp4Box::Mehd(b) => b.payload_size(),
            Mp4Box::Trex(b) => b.payload_size(),
            Mp4Box::Mfhd(b) => b.payload_size(),
            Mp4Box::Tfhd(b) => b.payload_size(),
            Mp4Box::Tfdt(b) => b.payload_size(),
            Mp4Box::Trun(b) => b.payload_size(),
            Mp4Box::Frma(b) => b.payload_size(),
            Mp4Box::Schm(b) => b.payload_size(),
            Mp4Box::Mdat(b) => b.payload_size(),
        }
    }

    /// Serializes this box alone: header plus own payload. Containers come
    /// out empty; assembling a full tree is the serializer's job.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut w = Writer::new();
        self.encode(&mut w, 8 + self.payload_size())?;
        Ok(w.into_inner())
    }

    /// Writes the box header with the given total size, followed by the own
    /// payload. `total_size` includes the header and any children; the tree
    /// serializer computes it bottom-up before emission.
    pub fn encode(&self, w: &mut Writer, total_size: u32) -> Result<()> {
        w.put_box_header(self.fourcc(), total_size);

        match self {
            Mp4Box::Parent(_) => Ok(()),
            Mp4Box::Ftyp(b) => b.encode_payload(w),
            Mp4Box::Styp(b) => b.encode_payload(w),
            Mp4Box::Free(b) => b.encode_payload(w),
            Mp4Box::Mvhd(b) => b.encode_payload(w),
            Mp4Box::Tkhd(b) => b.encode_payload(w),
            Mp4Box::Elst(b) => b.encode_payload(w),
            Mp4Box::Mdhd(b) => b.encode_payload(w),
            Mp4Box::Hdlr(b) => b.encode_payload(w),
            Mp4Box::Vmhd(b) => b.encode_payload(w),
            Mp4Box::Smhd(b) => b.encode_payload(w),
            Mp4Box::Hmhd(b) => b.encode_payload(w),
            Mp4Box::Dref(b) => b.encode_payload(w),
            Mp4Box::Stsd(b) => b.encode_payload(w),
            Mp4Box::Mp4a(b) => b.encode_payload(w),
            Mp4Box::Esds(b) => b.encode_payload(w),
            Mp4Box::Avc1(b) => b.encode_payload(w),
            Mp4Box::AvcC(b) => b.encode_payload(w),
            Mp4Box::Btrt(b) => b.encode_payload(w),
            Mp4Box::Stts(b) => b.encode_payload(w),
            Mp4Box::Ctts(b) => b.encode_payload(w),
            Mp4Box::Stss(b) => b.encode_payload(w),
            Mp4Box::Stsc(b) => b.encode_payload(w),
            Mp4Box::Stsz(b) => b.encode_payload(w),
            Mp4Box::Sdtp(b) => b.encode_payload(w),
            Mp4Box::Stco(b) => b.encode_payload(w),
            Mp4Box::Mehd(b) => b.encode_payload(w),
            Mp4Box::Trex(b) => b.encode_payload(w),
            Mp4Box::Mfhd(b) => b.encode_payload(w),
            Mp4Box::Tfhd(b) => b.encode_payload(w),
            Mp4Box::Tfdt(b) => b.encode_payload(w),
            Mp4Box::Trun(b) => b.encode_payload(w),
            Mp4Box::Frma(b) => b.encode_payload(w),
            Mp4Box::Schm(b) => b.encode_payload(w),
            Mp4Box::Mdat(b) => b.encode_payload(w),
        }
    }
}
