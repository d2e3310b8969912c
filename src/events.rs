use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::domain::{EventvError, SourceConfig};

pub const DEFAULT_FEED_URL: &str = "https://eonet.gsfc.nasa.gov/api/v3/events?limit=50&days=365";

/// One natural event as delivered by the feed.
///
/// The typed fields feed the table. `raw` keeps the record exactly as it was
/// received for the detail view and for copying.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub link: String,
    #[serde(default)]
    pub closed: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub categories: Vec<Category>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sources: Vec<Source>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub geometry: Vec<Geometry>,
    #[serde(skip)]
    pub raw: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Category {
    // Older feed versions use numeric ids
    #[serde(default)]
    pub id: Value,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Source {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Geometry {
    #[serde(default)]
    pub magnitude_value: Option<f64>,
    #[serde(default)]
    pub magnitude_unit: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub coordinates: Value,
}

/// An explicit `null` gets the same default as an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Deserialize)]
struct EventFeed {
    events: Vec<Value>,
}

/// Parses an `{ "events": [...] }` document. Records that cannot be read as an
/// event (no id, wrong types) are skipped with a warning; the rest still load.
pub fn parse_feed(body: &str) -> Result<Vec<Event>, EventvError> {
    let feed: EventFeed = serde_json::from_str(body)?;
    let total = feed.events.len();
    let events: Vec<Event> = feed
        .events
        .into_iter()
        .enumerate()
        .filter_map(|(idx, raw)| match Event::deserialize(&raw) {
            Ok(mut event) => {
                event.raw = raw;
                Some(event)
            }
            Err(e) => {
                warn!("Skipping event #{idx} of the feed: {e}");
                None
            }
        })
        .collect();
    if events.len() < total {
        info!("Parsed {} of {total} events", events.len());
    }
    Ok(events)
}

/// Where the raw rows come from. A source is asked for the complete list every
/// time; there is no incremental fetching.
pub trait DataSource: Send + Sync {
    fn describe(&self) -> String;
    fn fetch(&self) -> Result<Vec<Event>, EventvError>;
}

pub struct HttpSource {
    url: String,
    client: reqwest::blocking::Client,
}

impl HttpSource {
    pub fn new(url: impl Into<String>) -> Result<Self, EventvError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("eventv/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

impl DataSource for HttpSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    fn fetch(&self) -> Result<Vec<Event>, EventvError> {
        debug!("GET {}", self.url);
        let response = self.client.get(&self.url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(EventvError::StatusError(status.as_u16()));
        }
        let body = response.text()?;
        parse_feed(&body)
    }
}

pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl DataSource for FileSource {
    fn describe(&self) -> String {
        self.path.to_string_lossy().to_string()
    }

    fn fetch(&self) -> Result<Vec<Event>, EventvError> {
        let body = fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => EventvError::FileNotFound,
            ErrorKind::PermissionDenied => EventvError::PermissionDenied,
            _ => EventvError::IoError(e),
        })?;
        parse_feed(&body)
    }
}

pub fn source_from_config(config: &SourceConfig) -> Result<Arc<dyn DataSource>, EventvError> {
    Ok(match config {
        SourceConfig::Url(url) => Arc::new(HttpSource::new(url.clone())?),
        SourceConfig::File(path) => Arc::new(FileSource::new(path.clone())),
    })
}

/// Runs a single fetch on a background thread. The receiver yields exactly one
/// result; there is no retry and no cancellation.
pub fn spawn_load(source: Arc<dyn DataSource>) -> Receiver<Result<Vec<Event>, EventvError>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let start_time = Instant::now();
        let result = source.fetch();
        match &result {
            Ok(events) => info!(
                "Loaded {} events from {} in {}ms",
                events.len(),
                source.describe(),
                start_time.elapsed().as_millis()
            ),
            Err(e) => warn!("Loading from {} failed: {e}", source.describe()),
        }
        if tx.send(result).is_err() {
            debug!("Load result dropped, receiver is gone");
        }
    });
    rx
}
