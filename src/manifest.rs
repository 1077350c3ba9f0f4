//! Parsing of the json manifest describing a synth collection.
//!
//! The manifest holds a single collection under `l`, keyed by its id:
//!
//! ```json
//! {"l": {"<cid>": {
//!     "_num_images": 1,
//!     "_num_coord_systems": 1,
//!     "image_map": {"7": {"u": "http://x/7.jpg", "d": [1024, 768]}},
//!     "x": {"0": {
//!         "k": ["points_0", 1, 2],
//!         "r": {"0": {"j": [7, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.33, 1.1], "f": [0.0, 0.0]}}
//!     }}
//! }}}
//! ```
//!
//! `k` lists the fragment name prefix, the fragment count and the declared point count.
//! `j` lists the image id followed by the eight camera fields.

use crate::camera::{CameraField, CameraParameters};
use crate::error::ImportError;
use crate::synth::{CoordinateSystem, Image, PointCloud, SynthData};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use url::Url;

#[derive(Deserialize, Debug)]
struct RawCollection {
    #[serde(rename = "_num_images", default)]
    num_images: Option<u32>,
    #[serde(rename = "_num_coord_systems")]
    num_coord_systems: u32,
    #[serde(rename = "image_map", default)]
    image_map: Option<BTreeMap<String, RawImage>>,
    #[serde(rename = "x", default)]
    coordinate_systems: BTreeMap<String, RawCoordinateSystem>,
}

#[derive(Deserialize, Debug)]
struct RawImage {
    #[serde(rename = "u")]
    url: String,
    #[serde(rename = "d", default)]
    dimensions: Option<[u32; 2]>,
}

#[derive(Deserialize, Debug)]
struct RawCoordinateSystem {
    #[serde(rename = "k")]
    points: RawPointsInfo,
    #[serde(rename = "r")]
    cameras: BTreeMap<String, RawCamera>,
}

#[derive(Deserialize, Debug)]
struct RawPointsInfo(#[allow(dead_code)] String, u32, u32);

#[derive(Deserialize, Debug)]
struct RawCamera {
    #[serde(rename = "j")]
    fields: Vec<f64>,
    #[serde(rename = "f", default)]
    distortion: Option<[f64; 2]>,
}

/// Builds the synth skeleton: coordinate systems with their cameras and declared point
/// counts, and the image map. No point data is loaded.
pub fn parse_manifest(
    json: &[u8],
    collection_id: &str,
    collection_root: &str,
) -> Result<SynthData, ImportError> {
    let root: Value = serde_json::from_slice(json)?;

    let collections = root
        .get("l")
        .and_then(Value::as_object)
        .ok_or_else(|| ImportError::WrongCollectionType("manifest has no collection".to_string()))?;
    if collections.len() != 1 {
        return Err(ImportError::WrongCollectionType(format!(
            "expected a single collection, found {}",
            collections.len()
        )));
    }
    let collection = collections
        .values()
        .next()
        .ok_or_else(|| ImportError::WrongCollectionType("manifest has no collection".to_string()))?;
    if !collection.is_object() {
        return Err(ImportError::WrongCollectionType(
            "collection is not an object".to_string(),
        ));
    }

    let raw = RawCollection::deserialize(collection)?;
    if raw.num_coord_systems == 0 {
        return Err(ImportError::Empty);
    }

    let raw_images = raw
        .image_map
        .ok_or_else(|| ImportError::Manifest("missing image_map".to_string()))?;
    let images = parse_image_map(raw_images, collection_root)?;

    if raw.num_coord_systems as usize > raw.coordinate_systems.len() {
        return Err(ImportError::Manifest(format!(
            "{} coordinate systems declared but {} listed",
            raw.num_coord_systems,
            raw.coordinate_systems.len()
        )));
    }

    let mut coordinate_systems = Vec::with_capacity(raw.num_coord_systems as usize);
    for index in 0..raw.num_coord_systems {
        let key = index.to_string();
        let raw_cs = raw.coordinate_systems.get(&key).ok_or_else(|| {
            ImportError::Manifest(format!("missing coordinate system {index}"))
        })?;
        coordinate_systems.push(parse_coordinate_system(index as i32, raw_cs, &images)?);
    }

    let num_images = raw.num_images.unwrap_or(images.len() as u32);

    Ok(SynthData {
        collection_id: collection_id.to_string(),
        collection_root: collection_root.to_string(),
        coordinate_systems,
        images,
        num_images,
    })
}

fn parse_image_map(
    raw_images: BTreeMap<String, RawImage>,
    collection_root: &str,
) -> Result<BTreeMap<i32, Image>, ImportError> {
    let mut images = BTreeMap::new();
    for (key, raw) in raw_images {
        let id = parse_id(&key, "image")?;
        if raw.url.is_empty() {
            return Err(ImportError::Manifest(format!("image {id} has no url")));
        }
        let [width, height] = raw.dimensions.unwrap_or_default();
        images.insert(
            id,
            Image {
                id,
                width,
                height,
                url: resolve_url(collection_root, &raw.url),
                local_path: None,
            },
        );
    }
    Ok(images)
}

fn parse_coordinate_system(
    id: i32,
    raw: &RawCoordinateSystem,
    images: &BTreeMap<i32, Image>,
) -> Result<CoordinateSystem, ImportError> {
    let RawPointsInfo(_, bin_file_count, number_of_points) = &raw.points;
    let mut coordinate_system = CoordinateSystem::new(
        id,
        PointCloud::new(id, *bin_file_count, *number_of_points),
    );

    for (key, raw_camera) in &raw.cameras {
        let camera_id = parse_id(key, "camera")?;
        coordinate_system
            .camera_parameters
            .push(parse_camera(camera_id, id, raw_camera, images)?);
    }

    Ok(coordinate_system)
}

fn parse_camera(
    camera_id: i32,
    coordinate_system: i32,
    raw: &RawCamera,
    images: &BTreeMap<i32, Image>,
) -> Result<CameraParameters, ImportError> {
    if raw.fields.len() != CameraField::COUNT + 1 {
        return Err(ImportError::Manifest(format!(
            "camera {camera_id} of coordinate system {coordinate_system} has {} values, expected {}",
            raw.fields.len(),
            CameraField::COUNT + 1
        )));
    }

    let image_id = raw.fields[0];
    if image_id.fract() != 0.0 || image_id < i32::MIN as f64 || image_id > i32::MAX as f64 {
        return Err(ImportError::Manifest(format!(
            "camera {camera_id} has an invalid image id {image_id}"
        )));
    }
    let image_id = image_id as i32;
    if !images.contains_key(&image_id) {
        return Err(ImportError::Manifest(format!(
            "camera {camera_id} references unknown image {image_id}"
        )));
    }

    let mut camera = CameraParameters::new(camera_id, coordinate_system, image_id);
    for (field, value) in CameraField::ALL.into_iter().zip(&raw.fields[1..]) {
        camera.set(field, *value);
    }
    camera.distortion_radius = raw.distortion.unwrap_or_default();
    Ok(camera)
}

fn parse_id(key: &str, what: &str) -> Result<i32, ImportError> {
    key.parse()
        .map_err(|_| ImportError::Manifest(format!("invalid {what} id {key:?}")))
}

fn resolve_url(collection_root: &str, url: &str) -> String {
    if Url::parse(url).is_ok() {
        return url.to_string();
    }
    Url::parse(collection_root)
        .and_then(|root| root.join(url))
        .map(|resolved| resolved.to_string())
        .unwrap_or_else(|_| url.to_string())
}
