mod fragment;
mod init;
mod manifest;

pub use fragment::build_segment;
pub use init::build_init;
pub use manifest::build_mpd;

/// Signature written into the `free` box of every generated segment.
pub(crate) const FREE_TAG: &[u8] = b"AMS media origin";
