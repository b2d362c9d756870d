use anyhow::{Context, Result};
use clap::Args;
use log::info;
use std::path::PathBuf;

/// Serve packaged assets as an MPEG-DASH origin over HTTP.
#[derive(Args, Clone, Debug)]
pub struct Serve {
    /// Document root to confine the server to. Requires root: the process
    /// chroots here before binding.
    #[arg(short = 'd', long)]
    pub document_root: PathBuf,

    /// Port to listen on.
    #[arg(short, long, default_value_t = 80)]
    pub port: u16,
}

impl Serve {
    pub async fn execute(&self) -> Result<()> {
        confine(&self.document_root)?;

        info!(
            "[*] Running DASH origin on port {}, serving {} (press CTRL+C to exit)",
            self.port,
            self.document_root.display()
        );

        crate::server::run(self.port).await
    }
}

#[cfg(unix)]
fn confine(document_root: &std::path::Path) -> Result<()> {
    std::os::unix::fs::chroot(document_root).with_context(|| {
        format!(
            "cannot chroot to '{}'; the server must run as root so the \
            document root can be confined",
            document_root.display()
        )
    })?;
    std::env::set_current_dir("/").context("cannot enter the confined root")?;
    Ok(())
}

#[cfg(not(unix))]
fn confine(_document_root: &std::path::Path) -> Result<()> {
    anyhow::bail!("serving requires a unix host: the document root is confined with chroot")
}
