use ratatui::crossterm::event::KeyEvent;

use crate::events::Event;

pub const HELP_TEXT: &str = "\
 eventv - natural event viewer

 Navigation
   j / Down      next row
   k / Up        previous row
   h / Left      previous column
   l / Right     next column
   PgUp / PgDn   page up / down
   g / G         first / last row

 Table
   s             cycle sort of the selected column (asc, desc, off)
   Enter / Space expand or collapse the selected row
   / or f        filter the selected column
   r             reload events
   y             copy cell
   Y             copy row as json

 General
   ?             show this help
   Esc           close popup
   q             quit
";

#[derive(Debug, thiserror::Error)]
pub enum EventvError {
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("server answered with status {0}")]
    StatusError(u16),
    #[error("malformed event feed: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("clipboard unavailable: {0}")]
    ClipboardError(#[from] arboard::Error),
    #[error("loading failed: {0}")]
    LoadingFailed(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("logging setup failed: {0}")]
    LoggingFailed(String),
    #[error("file not found")]
    FileNotFound,
    #[error("permission denied")]
    PermissionDenied,
}

#[derive(Debug, Clone)]
pub struct EventvConfig {
    pub source: SourceConfig,
    pub case_sensitive: bool,
    pub max_column_width: usize,
    pub max_detail_lines: usize,
    pub event_poll_time: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceConfig {
    Url(String),
    File(std::path::PathBuf),
}

impl Default for EventvConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::Url(crate::events::DEFAULT_FEED_URL.to_string()),
            case_sensitive: false,
            max_column_width: 40,
            max_detail_lines: 24,
            event_poll_time: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CMDMode {
    Filter,
}

#[derive(Debug)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    CycleSort,
    ToggleExpand,
    Filter,
    Reload,
    CopyCell,
    CopyRow,
    Help,
    Exit,
    Click(u16, u16),
    Resize(usize, usize),
    RawKey(KeyEvent),
    Loaded(Result<Vec<Event>, EventvError>),
}
