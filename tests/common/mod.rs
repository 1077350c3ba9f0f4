#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use synth_import::fragment::encode_fragment;
use synth_import::prelude::*;

pub const CID: &str = "8d0a4f7e-3c2b-4b1a-9e6f-0123456789ab";
pub const SERVICE_URL: &str = "http://service/ws";
pub const JSON_URL: &str = "http://x/synth.json";
pub const ROOT: &str = "http://x/root/";

enum Reply {
    Body(Vec<u8>),
    Status(u16),
}

struct Route {
    reply: Reply,
    delay: Duration,
}

/// In-memory transport: canned replies per url, with optional delays to reorder completions.
#[derive(Default)]
pub struct MemoryClient {
    routes: Mutex<HashMap<String, Route>>,
    log: Mutex<Vec<(Method, String)>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, url: &str, body: impl Into<Vec<u8>>) -> &Self {
        self.serve_delayed(url, body, Duration::ZERO)
    }

    pub fn serve_delayed(&self, url: &str, body: impl Into<Vec<u8>>, delay: Duration) -> &Self {
        self.routes.lock().unwrap().insert(
            url.to_string(),
            Route {
                reply: Reply::Body(body.into()),
                delay,
            },
        );
        self
    }

    pub fn fail(&self, url: &str, status: u16) -> &Self {
        self.routes.lock().unwrap().insert(
            url.to_string(),
            Route {
                reply: Reply::Status(status),
                delay: Duration::ZERO,
            },
        );
        self
    }

    pub fn requested(&self) -> Vec<(Method, String)> {
        self.log.lock().unwrap().clone()
    }

    /// Most requests that were being served at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn requested_urls_ending_with(&self, suffix: &str) -> usize {
        self.requested()
            .iter()
            .filter(|(_, url)| url.ends_with(suffix))
            .count()
    }
}

#[async_trait]
impl ResourceClient for MemoryClient {
    async fn request(
        &self,
        url: &str,
        method: Method,
        _body: Option<Vec<u8>>,
        _headers: Option<BTreeMap<String, String>>,
    ) -> Result<Vec<u8>, ResourceError> {
        self.log.lock().unwrap().push((method, url.to_string()));
        let (reply, delay) = {
            let routes = self.routes.lock().unwrap();
            match routes.get(url) {
                Some(Route { reply: Reply::Body(body), delay }) => (Ok(body.clone()), *delay),
                Some(Route { reply: Reply::Status(status), delay }) => {
                    (Err(ResourceError::Status(*status)), *delay)
                }
                None => (Err(ResourceError::Status(404)), Duration::ZERO),
            }
        };
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(in_flight, Ordering::SeqCst);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        reply
    }
}

pub fn service_response(result: &str, collection_type: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>
    <GetCollectionDataResponse xmlns="http://labs.live.com/">
      <GetCollectionDataResult>
        <Result>{result}</Result>
        <CollectionType>{collection_type}</CollectionType>
        <JsonUrl>{JSON_URL}</JsonUrl>
        <CollectionRoot>{ROOT}</CollectionRoot>
      </GetCollectionDataResult>
    </GetCollectionDataResponse>
  </soap:Body>
</soap:Envelope>"#
    )
}

/// Manifest with one coordinate system (id 0) and image 7.
pub fn manifest(bin_file_count: u32, number_of_points: u32) -> Value {
    json!({"l": {CID: {
        "_num_images": 1,
        "_num_coord_systems": 1,
        "image_map": {"7": {"u": "http://x/7.jpg", "d": [4, 3]}},
        "x": {"0": {
            "k": ["points_0", bin_file_count, number_of_points],
            "r": {"0": {"j": [7, 0.5, 1.5, 2.5, 0.0, 0.0, 0.0, 1.33, 0.8], "f": [0.01, 0.02]}}
        }}
    }}})
}

pub fn points(n: usize, seed: u8) -> Vec<Point> {
    (0..n)
        .map(|i| {
            Point::new(
                glam::Vec3::new(i as f32, seed as f32, -(i as f32) * 0.5),
                glam::U8Vec3::new(seed, i as u8, 255 - seed),
            )
        })
        .collect()
}

pub fn fragment(n: usize, seed: u8) -> Vec<u8> {
    encode_fragment(&points(n, seed))
}

pub const IMAGE_BYTES: &[u8] = b"\xff\xd8\xff\xe0 not really a jpeg";

/// A client serving the web service, the manifest and image 7.
pub fn client_for(manifest: &Value) -> MemoryClient {
    let client = MemoryClient::new();
    client
        .serve(SERVICE_URL, service_response("OK", "Synth"))
        .serve(JSON_URL, manifest.to_string())
        .serve("http://x/7.jpg", IMAGE_BYTES);
    client
}

pub fn config() -> ImporterConfig {
    ImporterConfig {
        service_url: SERVICE_URL.to_string(),
        ..Default::default()
    }
}
