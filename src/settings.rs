use crate::error::ImportError;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;
use uuid::Uuid;

pub const DEFAULT_SERVICE_URL: &str = "http://photosynth.net/photosynthws/PhotosynthService.asmx";
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 8;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImportSource {
    /// A collection id, or a viewer url carrying it as its `cid` parameter.
    Remote(String),
    Archive(PathBuf),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportSettings {
    pub source: ImportSource,
    pub import_point_clouds: bool,
    pub import_camera_parameters: bool,
    /// Coordinate systems to import; `None` imports all of them.
    pub coordinate_systems: Option<BTreeSet<i32>>,
}

impl ImportSettings {
    pub fn new(source: ImportSource, import_point_clouds: bool, import_camera_parameters: bool) -> Self {
        Self {
            source,
            import_point_clouds,
            import_camera_parameters,
            coordinate_systems: None,
        }
    }

    pub fn remote(locator: impl Into<String>) -> Self {
        Self::new(ImportSource::Remote(locator.into()), true, true)
    }

    pub fn with_coordinate_systems(mut self, ids: impl IntoIterator<Item = i32>) -> Self {
        self.coordinate_systems = Some(ids.into_iter().collect());
        self
    }

    pub fn should_import(&self, coordinate_system: i32) -> bool {
        self.coordinate_systems
            .as_ref()
            .map_or(true, |ids| ids.contains(&coordinate_system))
    }

    /// Resolves the source to a hyphenated, lowercase collection id.
    pub fn collection_id(&self) -> Result<String, ImportError> {
        match &self.source {
            ImportSource::Remote(locator) => parse_collection_id(locator),
            ImportSource::Archive(path) => Err(ImportError::UnsupportedSource(path.clone())),
        }
    }
}

pub fn parse_collection_id(locator: &str) -> Result<String, ImportError> {
    let locator = locator.trim();
    let candidate = match Url::parse(locator) {
        Ok(url) => url
            .query_pairs()
            .find(|(key, _)| key.eq_ignore_ascii_case("cid"))
            .map(|(_, value)| value.into_owned())
            .ok_or_else(|| ImportError::WrongUrl(format!("no cid parameter in {locator}")))?,
        Err(_) => locator.to_string(),
    };

    Uuid::parse_str(&candidate)
        .map(|id| id.hyphenated().to_string())
        .map_err(|_| ImportError::WrongUrl(format!("{candidate} is not a collection id")))
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct ImporterConfig {
    pub service_url: String,
    pub request_timeout_secs: Option<u64>,
    pub max_concurrent_requests: usize,
}

impl ImporterConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn concurrency(&self) -> usize {
        self.max_concurrent_requests.max(1)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Default for ImporterConfig {
    fn default() -> Self {
        Self {
            service_url: DEFAULT_SERVICE_URL.to_string(),
            request_timeout_secs: None,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
        }
    }
}
