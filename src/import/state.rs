use crate::error::ImportError;
use crate::fragment::{fragment_requests, is_loadable_layout, FragmentRequest};
use crate::import::images::ImageRequest;
use crate::point::Point;
use crate::settings::ImportSettings;
use crate::status::{ImportState, ImportStatus, Progress};
use crate::synth::SynthData;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn};

/// What a completion did to the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Advance {
    /// Recorded; more completions are outstanding.
    Pending,
    /// The last outstanding completion of the stage was recorded.
    StageComplete,
    /// The completion latched an error; the pipeline is terminated.
    Failed,
    /// Late, unknown or duplicate completion; nothing changed.
    Ignored,
}

impl Advance {
    pub fn ends_stage(&self) -> bool {
        matches!(self, Advance::StageComplete | Advance::Failed)
    }
}

/// The import state machine from the parsed manifest onwards.
///
/// It issues the requests of each fan-out stage and folds their completions back into
/// the synth, in whatever order they arrive. Once terminated, either ready or failed, it
/// ignores every further completion.
#[derive(Debug)]
pub struct ImportPipeline {
    synth: SynthData,
    import_point_clouds: bool,
    import_camera_parameters: bool,
    status: ImportStatus,
    outstanding_fragments: HashSet<(i32, u32)>,
    loading: Vec<i32>,
    outstanding_images: HashSet<i32>,
    failure: Option<ImportError>,
}

impl ImportPipeline {
    pub fn new(mut synth: SynthData, settings: &ImportSettings) -> Self {
        for cs in &mut synth.coordinate_systems {
            cs.should_be_imported = settings.should_import(cs.id);
            if !settings.import_camera_parameters {
                cs.camera_parameters.clear();
            }
        }

        Self {
            synth,
            import_point_clouds: settings.import_point_clouds,
            import_camera_parameters: settings.import_camera_parameters,
            status: ImportStatus {
                progress: Progress::ParseJson,
                ..Default::default()
            },
            outstanding_fragments: HashSet::new(),
            loading: Vec::new(),
            outstanding_images: HashSet::new(),
            failure: None,
        }
    }

    pub fn synth(&self) -> &SynthData {
        &self.synth
    }

    pub fn status(&self) -> ImportStatus {
        self.status
    }

    pub fn is_terminated(&self) -> bool {
        self.status.state.is_terminal()
    }

    /// Completions still expected in the current stage.
    pub fn pending(&self) -> usize {
        self.outstanding_fragments.len() + self.outstanding_images.len()
    }

    /// Starts the fragment stage and returns one request per fragment of every cloud to
    /// import. When nothing is to be loaded the stage completes immediately, and with point
    /// import disabled the stage is skipped.
    pub fn begin_fragments(&mut self) -> Vec<FragmentRequest> {
        if self.is_terminated() || self.pending() > 0 {
            return Vec::new();
        }

        if !self.import_point_clouds {
            debug!("point cloud import disabled");
            return Vec::new();
        }

        let unloadable = self
            .synth
            .coordinate_systems
            .iter()
            .filter(|cs| cs.should_be_imported)
            .map(|cs| &cs.point_cloud)
            .find(|cloud| !is_loadable_layout(cloud.bin_file_count, cloud.number_of_points));
        if let Some(cloud) = unloadable {
            let error = ImportError::UnloadableCloud {
                coordinate_system: cloud.coordinate_system,
                bin_file_count: cloud.bin_file_count,
                number_of_points: cloud.number_of_points,
            };
            self.fail(error);
            return Vec::new();
        }

        let mut requests = Vec::new();
        let root = self.synth.collection_root.as_str();
        for cs in self.synth.coordinate_systems.iter_mut() {
            if !cs.should_be_imported {
                continue;
            }
            cs.point_cloud.reserve_declared();
            requests.extend(fragment_requests(root, cs.id, cs.point_cloud.bin_file_count));
            self.loading.push(cs.id);
        }

        self.outstanding_fragments = requests
            .iter()
            .map(|request| (request.coordinate_system, request.index))
            .collect();
        self.enter(Progress::DownloadBin, requests.len());
        info!(fragments = requests.len(), "downloading point fragments");

        if requests.is_empty() {
            self.complete_fragments();
        }
        requests
    }

    pub fn on_fragment(
        &mut self,
        request: &FragmentRequest,
        result: Result<Vec<Point>, ImportError>,
    ) -> Advance {
        if self.is_terminated() {
            trace!(url = %request.url, "ignoring fragment completion after termination");
            return Advance::Ignored;
        }
        if !self
            .outstanding_fragments
            .remove(&(request.coordinate_system, request.index))
        {
            trace!(url = %request.url, "ignoring unexpected fragment completion");
            return Advance::Ignored;
        }

        let points = match result {
            Ok(points) => points,
            Err(error) => return self.fail(error),
        };

        self.status.progress = Progress::LoadingBin;
        let Some(cs) = self.synth.coordinate_system_mut(request.coordinate_system) else {
            return self.fail(ImportError::Manifest(format!(
                "unknown coordinate system {}",
                request.coordinate_system
            )));
        };

        let cloud = &mut cs.point_cloud;
        if points.len() > cloud.remaining() {
            let error = ImportError::PointCount {
                coordinate_system: cs.id,
                declared: cloud.number_of_points,
                loaded: cloud.len() + points.len(),
            };
            return self.fail(error);
        }

        debug!(
            file = %request.file_name(),
            points = points.len(),
            "loaded fragment"
        );
        cloud.append(points);
        self.status.completed += 1;

        if self.outstanding_fragments.is_empty() {
            self.complete_fragments()
        } else {
            Advance::Pending
        }
    }

    fn complete_fragments(&mut self) -> Advance {
        for id in std::mem::take(&mut self.loading) {
            let Some(cs) = self.synth.coordinate_system(id) else {
                continue;
            };
            if !cs.point_cloud.is_complete() {
                let error = ImportError::PointCount {
                    coordinate_system: id,
                    declared: cs.point_cloud.number_of_points,
                    loaded: cs.point_cloud.len(),
                };
                return self.fail(error);
            }
        }

        info!(points = self.synth.total_points(), "point clouds loaded");
        Advance::StageComplete
    }

    /// Starts the image stage, saving into `save_dir`. The import becomes ready right away
    /// when there is nothing to download.
    pub fn begin_images(&mut self, save_dir: &Path) -> Vec<ImageRequest> {
        if self.is_terminated() || self.pending() > 0 {
            return Vec::new();
        }

        let requests: Vec<ImageRequest> = if self.import_camera_parameters {
            self.synth
                .images
                .values()
                .map(|image| ImageRequest {
                    id: image.id,
                    url: image.url.clone(),
                    path: save_dir.join(image.file_name()),
                })
                .collect()
        } else {
            Vec::new()
        };

        self.outstanding_images = requests.iter().map(|request| request.id).collect();
        self.enter(Progress::DownloadImg, requests.len());
        info!(images = requests.len(), "downloading images");

        if requests.is_empty() {
            self.ready();
        }
        requests
    }

    pub fn on_image(&mut self, id: i32, result: Result<PathBuf, ImportError>) -> Advance {
        if self.is_terminated() {
            trace!(id, "ignoring image completion after termination");
            return Advance::Ignored;
        }
        if !self.outstanding_images.remove(&id) {
            trace!(id, "ignoring unexpected image completion");
            return Advance::Ignored;
        }

        let path = match result {
            Ok(path) => path,
            Err(error) => return self.fail(error),
        };

        debug!(id, path = %path.display(), "saved image");
        if let Some(image) = self.synth.images.get_mut(&id) {
            image.local_path = Some(path);
        }
        self.status.completed += 1;

        if self.outstanding_images.is_empty() {
            self.ready();
            Advance::StageComplete
        } else {
            Advance::Pending
        }
    }

    /// Latches `error` unless the pipeline already terminated.
    pub fn fail(&mut self, error: ImportError) -> Advance {
        if self.is_terminated() {
            return Advance::Ignored;
        }
        warn!(code = ?error.code(), %error, "import failed");
        self.status.state = ImportState::Failed(error.code());
        self.outstanding_fragments.clear();
        self.outstanding_images.clear();
        self.failure = Some(error);
        Advance::Failed
    }

    /// The loaded synth, or the error that terminated the import.
    pub fn finish(self) -> Result<SynthData, ImportError> {
        match (self.status.state, self.failure) {
            (_, Some(error)) => Err(error),
            (ImportState::Ready, None) => Ok(self.synth),
            _ => Err(ImportError::Interrupted),
        }
    }

    fn enter(&mut self, progress: Progress, total: usize) {
        self.status.progress = progress;
        self.status.completed = 0;
        self.status.total = total;
    }

    fn ready(&mut self) {
        info!(
            coordinate_systems = self.synth.coordinate_systems.len(),
            images = self.synth.images.len(),
            "synth ready"
        );
        self.status.state = ImportState::Ready;
    }
}
