use clap::Parser;
use std::path::PathBuf;

use crate::domain::{EventvConfig, EventvError, SourceConfig};
use crate::events::DEFAULT_FEED_URL;

#[derive(Debug, Parser)]
#[command(version, about = "Browse natural events in the terminal.")]
pub struct Cli {
    /// Event feed to fetch on startup
    #[arg(long, default_value = DEFAULT_FEED_URL)]
    pub url: String,

    /// Read the events from a local json file instead of fetching them
    #[arg(short, long, conflicts_with = "url")]
    pub file: Option<String>,

    /// Match filters case sensitive
    #[arg(long)]
    pub case_sensitive: bool,

    #[arg(long, default_value_t = 40)]
    pub max_column_width: usize,

    /// Lines shown for an expanded row
    #[arg(long, default_value_t = 24)]
    pub max_detail_lines: usize,

    /// Milliseconds to wait for terminal events per frame
    #[arg(long, default_value_t = 100)]
    pub event_poll_time: u64,

    #[arg(long, default_value = "~/.eventv.log")]
    pub log_file: String,
}

pub fn expand_path(path: &str) -> Result<PathBuf, EventvError> {
    shellexpand::full(path)
        .map(|p| PathBuf::from(p.as_ref()))
        .map_err(|e| EventvError::InvalidArgument(format!("{path}: {e}")))
}

impl Cli {
    pub fn log_path(&self) -> Result<PathBuf, EventvError> {
        expand_path(&self.log_file)
    }

    pub fn to_config(&self) -> Result<EventvConfig, EventvError> {
        let source = match &self.file {
            Some(file) => SourceConfig::File(expand_path(file)?),
            None => SourceConfig::Url(self.url.clone()),
        };
        if self.max_column_width < 3 {
            return Err(EventvError::InvalidArgument(
                "--max-column-width must be at least 3".into(),
            ));
        }
        Ok(EventvConfig {
            source,
            case_sensitive: self.case_sensitive,
            max_column_width: self.max_column_width,
            max_detail_lines: self.max_detail_lines,
            event_poll_time: self.event_poll_time,
        })
    }
}
