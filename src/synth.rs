use crate::camera::CameraParameters;
use crate::point::Point;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Image {
    pub id: i32,
    pub width: u32,
    pub height: u32,
    pub url: String,
    /// Where the image was written, once saved.
    pub local_path: Option<PathBuf>,
}

impl Image {
    pub fn new(id: i32, url: impl Into<String>) -> Self {
        Self {
            id,
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn file_name(&self) -> String {
        image_file_name(self.id)
    }
}

/// Most points reserved up front for a cloud; larger clouds grow as fragments arrive.
pub const PREALLOCATED_POINTS: usize = 1 << 20;

pub fn image_file_name(id: i32) -> String {
    format!("IMG_{id}.jpg")
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointCloud {
    pub coordinate_system: i32,
    /// Number of `points_m_n.bin` fragments the cloud is split into.
    pub bin_file_count: u32,
    /// Declared total, checked once every fragment is loaded.
    pub number_of_points: u32,
    points: Vec<Point>,
}

impl PointCloud {
    pub fn new(coordinate_system: i32, bin_file_count: u32, number_of_points: u32) -> Self {
        Self {
            coordinate_system,
            bin_file_count,
            number_of_points,
            points: Vec::new(),
        }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.points.len() == self.number_of_points as usize
    }

    /// Room left before the declared point count is reached.
    pub fn remaining(&self) -> usize {
        (self.number_of_points as usize).saturating_sub(self.points.len())
    }

    pub(crate) fn reserve_declared(&mut self) {
        self.points.reserve_exact(self.remaining().min(PREALLOCATED_POINTS));
    }

    pub(crate) fn append(&mut self, points: Vec<Point>) {
        if self.points.capacity() == 0 {
            self.points = points;
        } else {
            self.points.extend(points);
        }
    }
}

/// An independent cluster of the synth sharing one reference frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CoordinateSystem {
    pub id: i32,
    pub should_be_imported: bool,
    pub point_cloud: PointCloud,
    pub camera_parameters: Vec<CameraParameters>,
}

impl CoordinateSystem {
    pub fn new(id: i32, point_cloud: PointCloud) -> Self {
        Self {
            id,
            should_be_imported: true,
            point_cloud,
            camera_parameters: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SynthData {
    pub collection_id: String,
    /// Base url of the `points_m_n.bin` fragments.
    pub collection_root: String,
    pub coordinate_systems: Vec<CoordinateSystem>,
    pub images: BTreeMap<i32, Image>,
    pub num_images: u32,
}

impl SynthData {
    pub fn coordinate_system(&self, id: i32) -> Option<&CoordinateSystem> {
        self.coordinate_systems.iter().find(|cs| cs.id == id)
    }

    pub fn coordinate_system_mut(&mut self, id: i32) -> Option<&mut CoordinateSystem> {
        self.coordinate_systems.iter_mut().find(|cs| cs.id == id)
    }

    pub fn image(&self, id: i32) -> Option<&Image> {
        self.images.get(&id)
    }

    pub fn total_points(&self) -> usize {
        self.coordinate_systems
            .iter()
            .map(|cs| cs.point_cloud.len())
            .sum()
    }

    pub fn cameras(&self) -> impl Iterator<Item = &CameraParameters> {
        self.coordinate_systems
            .iter()
            .flat_map(|cs| cs.camera_parameters.iter())
    }
}
