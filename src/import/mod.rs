//! Drives an import end to end: web service, manifest, fragment fan-out, image fan-out.
//!
//! Fetches run as independent tasks that report back over a channel; a single loop folds
//! the completions into the [`ImportPipeline`], so the synth has exactly one mutator.

pub mod images;
pub mod state;

pub use images::ImageRequest;
pub use state::{Advance, ImportPipeline};

use crate::error::{ErrorCode, ImportError};
use crate::fragment::{load_fragment, FragmentRequest};
use crate::manifest::parse_manifest;
use crate::point::Point;
use crate::resource::{request_with_timeout, Method, ResourceClient};
use crate::service::resolve_collection;
use crate::settings::{ImportSettings, ImporterConfig};
use crate::status::{ImportState, ImportStatus, Progress};
use crate::synth::SynthData;
use images::{download_image, prepare_save_dir};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{info, info_span, Instrument};

pub struct SynthImporter<C: ResourceClient> {
    client: Arc<C>,
    config: ImporterConfig,
}

impl<C: ResourceClient + 'static> SynthImporter<C> {
    pub fn new(client: C, config: ImporterConfig) -> Self {
        Self::with_shared_client(Arc::new(client), config)
    }

    pub fn with_shared_client(client: Arc<C>, config: ImporterConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &ImporterConfig {
        &self.config
    }

    /// Starts an import in the background. Must be called within a tokio runtime.
    pub fn start(&self, settings: ImportSettings, save_path: impl Into<PathBuf>) -> ImportHandle {
        let (status_tx, status_rx) = watch::channel(ImportStatus::default());
        let run = ImportRun {
            client: Arc::clone(&self.client),
            config: self.config.clone(),
            settings,
            save_path: save_path.into(),
            status: status_tx,
        };

        ImportHandle {
            status: status_rx,
            task: tokio::spawn(run.execute()),
        }
    }

    pub async fn import(
        &self,
        settings: ImportSettings,
        save_path: impl Into<PathBuf>,
    ) -> Result<SynthData, ImportError> {
        self.start(settings, save_path).finish().await
    }
}

/// Observes a running import and collects its outcome.
pub struct ImportHandle {
    status: watch::Receiver<ImportStatus>,
    task: JoinHandle<Result<SynthData, ImportError>>,
}

impl ImportHandle {
    pub fn status(&self) -> ImportStatus {
        *self.status.borrow()
    }

    pub fn progress(&self) -> Progress {
        self.status().progress
    }

    pub fn error(&self) -> ErrorCode {
        self.status().error()
    }

    pub fn is_ready(&self) -> bool {
        self.status().is_ready()
    }

    pub fn subscribe(&self) -> watch::Receiver<ImportStatus> {
        self.status.clone()
    }

    /// Waits for a terminal status without taking the result.
    pub async fn wait(&mut self) -> ImportStatus {
        if let Ok(status) = self.status.wait_for(|status| status.state.is_terminal()).await {
            return *status;
        }
        *self.status.borrow()
    }

    pub async fn finish(self) -> Result<SynthData, ImportError> {
        match self.task.await {
            Ok(result) => result,
            Err(error) if error.is_panic() => std::panic::resume_unwind(error.into_panic()),
            Err(_) => Err(ImportError::Interrupted),
        }
    }
}

struct FragmentCompletion {
    request: FragmentRequest,
    result: Result<Vec<Point>, ImportError>,
}

struct ImageCompletion {
    id: i32,
    result: Result<PathBuf, ImportError>,
}

struct ImportRun<C: ResourceClient> {
    client: Arc<C>,
    config: ImporterConfig,
    settings: ImportSettings,
    save_path: PathBuf,
    status: watch::Sender<ImportStatus>,
}

impl<C: ResourceClient + 'static> ImportRun<C> {
    async fn execute(self) -> Result<SynthData, ImportError> {
        let span = info_span!("synth_import", source = ?self.settings.source);
        let result = self.run().instrument(span).await;

        let mut status = *self.status.borrow();
        status.state = match &result {
            Ok(_) => ImportState::Ready,
            Err(error) => ImportState::Failed(error.code()),
        };
        self.status.send_replace(status);
        result
    }

    async fn run(&self) -> Result<SynthData, ImportError> {
        let timeout = self.config.request_timeout();
        let collection_id = self.settings.collection_id()?;
        prepare_save_dir(&self.save_path).await?;

        self.enter(Progress::WebService);
        info!(%collection_id, service = %self.config.service_url, "resolving collection");
        let collection = resolve_collection(
            self.client.as_ref(),
            &self.config.service_url,
            &collection_id,
            timeout,
        )
        .await?;

        self.enter(Progress::DownloadJson);
        info!(url = %collection.json_url, "downloading manifest");
        let json = request_with_timeout(
            self.client.as_ref(),
            &collection.json_url,
            Method::Get,
            None,
            None,
            timeout,
        )
        .await?;

        self.enter(Progress::ParseJson);
        let synth = parse_manifest(&json, &collection_id, &collection.collection_root)?;
        info!(
            coordinate_systems = synth.coordinate_systems.len(),
            images = synth.images.len(),
            "parsed manifest"
        );

        let mut pipeline = ImportPipeline::new(synth, &self.settings);
        let limit = Arc::new(Semaphore::new(self.config.concurrency()));

        let requests = pipeline.begin_fragments();
        self.status.send_replace(pipeline.status());
        if !requests.is_empty() {
            let mut completions = self.spawn_fragment_loads(requests, &limit, timeout);
            while let Some(FragmentCompletion { request, result }) = completions.recv().await {
                let advance = pipeline.on_fragment(&request, result);
                self.status.send_replace(pipeline.status());
                if advance.ends_stage() {
                    break;
                }
            }
        }
        if settle(&mut pipeline, &limit) {
            return pipeline.finish();
        }

        let requests = pipeline.begin_images(&self.save_path);
        self.status.send_replace(pipeline.status());
        if !requests.is_empty() {
            let mut completions = self.spawn_image_downloads(requests, &limit, timeout);
            while let Some(ImageCompletion { id, result }) = completions.recv().await {
                let advance = pipeline.on_image(id, result);
                self.status.send_replace(pipeline.status());
                if advance.ends_stage() {
                    break;
                }
            }
        }
        settle(&mut pipeline, &limit);
        pipeline.finish()
    }

    fn enter(&self, progress: Progress) {
        self.status.send_modify(|status| {
            status.progress = progress;
            status.completed = 0;
            status.total = 0;
        });
    }

    fn spawn_fragment_loads(
        &self,
        requests: Vec<FragmentRequest>,
        limit: &Arc<Semaphore>,
        timeout: Option<Duration>,
    ) -> mpsc::UnboundedReceiver<FragmentCompletion> {
        let (tx, rx) = mpsc::unbounded_channel();
        for request in requests {
            let client = Arc::clone(&self.client);
            let limit = Arc::clone(limit);
            let tx = tx.clone();
            tokio::spawn(async move {
                let result = match limit.acquire_owned().await {
                    Ok(_permit) => load_fragment(client.as_ref(), &request, timeout).await,
                    Err(_) => Err(ImportError::Interrupted),
                };
                // the receiver is gone once the import terminated
                let _ = tx.send(FragmentCompletion { request, result });
            });
        }
        rx
    }

    fn spawn_image_downloads(
        &self,
        requests: Vec<ImageRequest>,
        limit: &Arc<Semaphore>,
        timeout: Option<Duration>,
    ) -> mpsc::UnboundedReceiver<ImageCompletion> {
        let (tx, rx) = mpsc::unbounded_channel();
        for request in requests {
            let client = Arc::clone(&self.client);
            let limit = Arc::clone(limit);
            let tx = tx.clone();
            tokio::spawn(async move {
                let result = match limit.acquire_owned().await {
                    Ok(_permit) => download_image(client.as_ref(), &request, timeout).await,
                    Err(_) => Err(ImportError::Interrupted),
                };
                let _ = tx.send(ImageCompletion {
                    id: request.id,
                    result,
                });
            });
        }
        rx
    }
}

/// Ends a fan-out stage: a stage whose completions stopped arriving is interrupted, and
/// once the pipeline terminated queued fetches are kept from starting. Returns whether the
/// pipeline terminated.
fn settle(pipeline: &mut ImportPipeline, limit: &Semaphore) -> bool {
    if pipeline.pending() > 0 {
        pipeline.fail(ImportError::Interrupted);
    }
    if pipeline.is_terminated() {
        limit.close();
        true
    } else {
        false
    }
}
