use ams_mp4::{assemble, index_mp4, subtitle_entry, Mp4Index, TrackEntry};
use anyhow::{bail, Result};
use clap::Args;
use log::{info, warn};
use std::{fs, path::PathBuf};

/// Index MP4 and VTT sources into a DASH package description.
#[derive(Args, Clone, Debug)]
pub struct Pack {
    /// JSON package index to write.
    #[arg(short, long, default_value = "video.json")]
    pub output: PathBuf,

    /// Duration of each segment in seconds.
    #[arg(short = 'd', long, default_value_t = 10)]
    pub segment_duration: u32,

    /// Audio or video .mp4 (one stream per file) or .vtt subtitle input.
    /// This option can be used multiple times.
    #[arg(short, long, required = true)]
    pub input: Vec<PathBuf>,

    /// ISO-639-2 language code for the matching --input, in order.
    /// Inputs without a code default to `eng`.
    #[arg(short, long)]
    pub lang: Vec<String>,
}

impl Pack {
    pub fn execute(&self) -> Result<()> {
        for lang in &self.lang {
            if lang.len() != 3 {
                bail!("ISO-639-2 language codes are 3 characters (eg: eng), got '{lang}'");
            }
        }

        let mut indexed: Vec<Mp4Index> = Vec::new();
        let mut subtitles: Vec<TrackEntry> = Vec::new();

        for (i, input) in self.input.iter().enumerate() {
            let language = self
                .lang
                .get(i)
                .map(String::as_str)
                .unwrap_or("eng");

            match input.extension().and_then(|x| x.to_str()) {
                Some("mp4") => {
                    info!("-- Parsing file='{}' language='{language}'", input.display());
                    indexed.push(index_mp4(input, language)?);
                }
                Some("vtt") => {
                    subtitles.push(subtitle_entry(input, language));
                }
                _ => {
                    warn!(
                        "{} has an unknown extension and can't be packaged, \
                        use .mp4 or .vtt inputs",
                        input.display()
                    );
                }
            }
        }

        let config = assemble(self.segment_duration, indexed, subtitles);
        let json = serde_json::to_string(&config)?;

        info!("-- Creating package file '{}'", self.output.display());
        fs::write(&self.output, json)?;
        info!("All files have been packaged successfully");

        Ok(())
    }
}
