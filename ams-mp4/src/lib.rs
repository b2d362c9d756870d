//! ISO BMFF box codec and MPEG-DASH re-fragmentation engine.
//!
//! The offline half parses a progressive MP4, distills a per-track
//! [`DashConfig`] and persists it inside a [`JsonConfig`] package index.
//! The online half answers segment requests from that index alone: init
//! segments are synthesized from the config, media segments re-read only
//! the sample-table prefixes and the `mdat` byte range they need from the
//! untouched source file.

mod error;
mod reader;
mod writer;

pub mod boxes;
pub mod config;
pub mod dash;
pub mod index;
pub mod tree;

use reader::Reader;
use writer::Writer;

pub use config::{DashAudioEntry, DashConfig, DashVideoEntry, JsonConfig, TrackEntry, TrackType};
pub use dash::{build_init, build_mpd, build_segment};
pub use error::{Error, Result};
pub use index::{assemble, index_mp4, subtitle_entry, Mp4Index};
pub use tree::BoxTree;
