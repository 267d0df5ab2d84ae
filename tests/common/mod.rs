// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use serde_json::{Map, Value, json};
use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use supermarket_mirror::repository::endpoints;
use supermarket_mirror::{
    CallbackReporter, Catalog, Credentials, Error, MirrorConfig, MirrorEvent, Result, SiteClient,
    UploadResponse,
};
use tempfile::TempDir;

pub const SOURCE: &str = "https://COMMUNITY";
pub const TARGET: &str = "https://PRIVATE";
pub const USER: &str = "mirror-bot";

/// Scripted answer to a GET
enum Route {
    Json(Value),
    NotFound,
    Failure(String),
}

/// Scripted answer to an upload
enum UploadReply {
    Respond(u16, String),
    Unreachable(String),
}

/// What the fake saw when asked to upload
#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub url: String,
    pub user_id: String,
    pub tarball_existed: bool,
    pub tarball: Vec<u8>,
    pub manifest: String,
}

/// In-memory Supermarket pair
///
/// Unknown URLs answer 404. Uploads without a scripted reply answer 201.
#[derive(Default)]
pub struct FakeSiteClient {
    routes: HashMap<String, Route>,
    artifacts: HashMap<String, Vec<u8>>,
    replies: Mutex<VecDeque<UploadReply>>,
    requests: Mutex<Vec<String>>,
    uploads: Mutex<Vec<RecordedUpload>>,
}

impl FakeSiteClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn json(mut self, url: impl Into<String>, value: Value) -> Self {
        self.routes.insert(url.into(), Route::Json(value));
        self
    }

    pub fn not_found(mut self, url: impl Into<String>) -> Self {
        self.routes.insert(url.into(), Route::NotFound);
        self
    }

    pub fn failing(mut self, url: impl Into<String>, message: &str) -> Self {
        self.routes.insert(url.into(), Route::Failure(message.to_string()));
        self
    }

    pub fn artifact(mut self, url: impl Into<String>, bytes: &[u8]) -> Self {
        self.artifacts.insert(url.into(), bytes.to_vec());
        self
    }

    /// Next upload answers with this status and body
    pub fn upload_reply(self, status: u16, body: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(UploadReply::Respond(status, body.to_string()));
        self
    }

    /// Next upload cannot be delivered
    pub fn upload_unreachable(self, message: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(UploadReply::Unreachable(message.to_string()));
        self
    }

    /// Every GET and download URL, in order
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.lock().unwrap().clone()
    }

    fn record(&self, url: &str) {
        self.requests.lock().unwrap().push(url.to_string());
    }
}

impl SiteClient for FakeSiteClient {
    fn get_json(&self, url: &str) -> Result<Value> {
        self.record(url);
        match self.routes.get(url) {
            Some(Route::Json(value)) => Ok(value.clone()),
            Some(Route::Failure(message)) => Err(Error::TransportError(message.clone())),
            Some(Route::NotFound) | None => Err(Error::NotFoundError(url.to_string())),
        }
    }

    fn download(&self, url: &str, dest: &mut File) -> Result<u64> {
        self.record(url);
        if let Some(bytes) = self.artifacts.get(url) {
            dest.write_all(bytes).unwrap();
            return Ok(bytes.len() as u64);
        }
        match self.routes.get(url) {
            Some(Route::Failure(message)) => Err(Error::TransportError(message.clone())),
            _ => Err(Error::NotFoundError(url.to_string())),
        }
    }

    fn upload(
        &self,
        url: &str,
        credentials: &Credentials,
        tarball: &Path,
        manifest: &str,
    ) -> Result<UploadResponse> {
        self.uploads.lock().unwrap().push(RecordedUpload {
            url: url.to_string(),
            user_id: credentials.user_id.clone(),
            tarball_existed: tarball.is_file(),
            tarball: std::fs::read(tarball).unwrap_or_default(),
            manifest: manifest.to_string(),
        });

        match self.replies.lock().unwrap().pop_front() {
            Some(UploadReply::Respond(status, body)) => Ok(UploadResponse { status, body }),
            Some(UploadReply::Unreachable(message)) => Err(Error::TransportError(message)),
            None => Ok(UploadResponse {
                status: 201,
                body: "ok".to_string(),
            }),
        }
    }
}

/// One version of a cookbook as the universe endpoint lists it
#[derive(Debug, Clone)]
pub struct FakeCookbook {
    pub name: String,
    pub version: String,
    attributes: Map<String, Value>,
}

impl FakeCookbook {
    pub fn new(name: &str, version: &str, dependencies: Value) -> Self {
        let mut attributes = Map::new();
        attributes.insert("dependencies".to_string(), dependencies);
        attributes.insert(
            "download_url".to_string(),
            json!(format!("{}_{}_download", name, version)),
        );
        attributes.insert("location_path".to_string(), json!(format!("{}_path", name)));
        attributes.insert("location_type".to_string(), json!("opscode"));
        Self {
            name: name.to_string(),
            version: version.to_string(),
            attributes,
        }
    }

    pub fn with_attribute(mut self, key: &str, value: Value) -> Self {
        self.attributes.insert(key.to_string(), value);
        self
    }

    pub fn name_and_version(&self) -> String {
        format!("{} {}", self.name, self.version)
    }
}

/// Universe JSON holding the given cookbook versions
pub fn universe(cookbooks: &[&FakeCookbook]) -> Value {
    let mut root = Map::new();
    for cookbook in cookbooks {
        let versions = root
            .entry(cookbook.name.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(versions) = versions {
            versions.insert(
                cookbook.version.clone(),
                Value::Object(cookbook.attributes.clone()),
            );
        }
    }
    Value::Object(root)
}

pub fn catalog(cookbooks: &[&FakeCookbook]) -> Catalog {
    Catalog::from_value(universe(cookbooks)).unwrap()
}

pub fn download_url(site: &str, cookbook: &str, version: &str) -> String {
    format!("{}/api/v1/cookbooks/{}/versions/{}/download", site, cookbook, version)
}

/// Cookbook record listing `versions`, pointing at `latest` when given
pub fn cookbook_record(cookbook: &str, versions: &[&str], latest: Option<&str>) -> Value {
    let counts: Map<String, Value> = versions
        .iter()
        .map(|version| (version.to_string(), json!(1)))
        .collect();
    json!({
        "name": cookbook,
        "latest_version": latest.map(|version| endpoints::version_url(SOURCE, cookbook, version)),
        "deprecated": false,
        "category": "Other",
        "metrics": { "downloads": { "versions": counts } }
    })
}

/// Version record whose artifact lives at [`download_url`] on the source
pub fn version_record(cookbook: &str, version: &str, dependencies: Value) -> Value {
    json!({
        "version": version,
        "file": download_url(SOURCE, cookbook, version),
        "dependencies": dependencies
    })
}

/// Routes for transferring `cookbook` `version` from the source
pub fn with_source_version(
    client: FakeSiteClient,
    cookbook: &str,
    version: &str,
    dependencies: Value,
) -> FakeSiteClient {
    client
        .json(
            endpoints::version_url(SOURCE, cookbook, version),
            version_record(cookbook, version, dependencies),
        )
        .artifact(
            download_url(SOURCE, cookbook, version),
            artifact_bytes(cookbook, version).as_slice(),
        )
}

pub fn artifact_bytes(cookbook: &str, version: &str) -> Vec<u8> {
    format!("tarball of {} {}", cookbook, version).into_bytes()
}

/// Directories a test run writes into; dropped with the test
pub struct Workspace {
    pub work: TempDir,
    pub keep_root: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            work: TempDir::new().unwrap(),
            keep_root: TempDir::new().unwrap(),
        }
    }

    /// Keep directory, not created until something is kept
    pub fn keep_dir(&self) -> PathBuf {
        self.keep_root.path().join("failed")
    }

    pub fn config(&self) -> MirrorConfig {
        let mut config = MirrorConfig::new(
            SOURCE,
            TARGET,
            Credentials::new(USER, "/etc/supermarket-mirror/key.pem"),
        );
        config.work_dir = Some(self.work.path().to_path_buf());
        config.download_dir = self.keep_dir();
        config
    }

    /// Files left in the staging directory
    pub fn staged_files(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.work.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    }
}

/// Reporter that keeps every event
pub fn recording_reporter() -> (
    Arc<Mutex<Vec<MirrorEvent>>>,
    CallbackReporter<impl Fn(&MirrorEvent) + Send + Sync>,
) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let events_clone = events.clone();
    let reporter = CallbackReporter::new(move |event: &MirrorEvent| {
        events_clone.lock().unwrap().push(event.clone());
    });
    (events, reporter)
}
