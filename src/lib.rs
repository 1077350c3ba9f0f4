//! Import of photogrammetry synths: point clouds, camera parameters and images published
//! by a remote collection service.
//!
//! ```no_run
//! # async fn run() -> Result<(), synth_import::ImportError> {
//! use synth_import::prelude::*;
//!
//! let importer = SynthImporter::new(ReqwestClient::new(), ImporterConfig::default());
//! let settings = ImportSettings::remote("8d0a4f7e-3c2b-4b1a-9e6f-0123456789ab");
//! let synth = importer.import(settings, "synth_images").await?;
//! println!("{} points", synth.total_points());
//! # Ok(())
//! # }
//! ```

pub mod camera;
pub mod codec;
pub mod error;
pub mod fragment;
pub mod import;
pub mod manifest;
pub mod point;
pub mod prelude;
pub mod resource;
pub mod service;
pub mod settings;
pub mod status;
pub mod synth;

pub use error::{ErrorCode, ImportError};
pub use import::{ImportHandle, SynthImporter};
pub use manifest::parse_manifest;
pub use synth::SynthData;
