pub use crate::import::{ImportHandle, ImportPipeline, SynthImporter};
pub use crate::resource::{Method, ResourceClient, ResourceError};
pub use crate::settings::{ImportSettings, ImportSource, ImporterConfig};
pub use crate::status::{ImportState, ImportStatus, Progress};

#[cfg(feature = "reqwest")]
pub use crate::resource::reqwest::ReqwestClient;

#[cfg(feature = "fs")]
pub use crate::resource::{file::FileClient, hybrid::HybridClient};

// Model
pub use crate::camera::{CameraField, CameraParameters};
pub use crate::point::Point;
pub use crate::synth::{CoordinateSystem, Image, PointCloud, SynthData};

// Error types
pub use crate::error::{ErrorCode, ImportError};
pub use crate::fragment::FragmentError;
pub use crate::codec::CodecError;
