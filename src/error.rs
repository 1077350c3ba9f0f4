use crate::fragment::FragmentError;
use crate::resource::ResourceError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Flat outcome taxonomy of an import. `NoError` and `Pending` are the non-failure values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    WrongUrl,
    WrongPath,
    WebServiceError,
    NegativeResponse,
    UnexpectedResponse,
    WrongCollectionType,
    JsonParsing,
    Empty,
    ReadingBinData,
    BinDataFormat,
    CreateDir,
    SaveImg,
    NoError,
    Pending,
}

impl ErrorCode {
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::WrongUrl => "The provided URL is not a valid synth URL.",
            ErrorCode::WrongPath => "The provided path is not valid.",
            ErrorCode::WebServiceError => "The web service returned an error.",
            ErrorCode::NegativeResponse => "The web service rejected the request.",
            ErrorCode::UnexpectedResponse => "The web service response could not be understood.",
            ErrorCode::WrongCollectionType => "The collection is not a synth.",
            ErrorCode::JsonParsing => "Error parsing the synth json data.",
            ErrorCode::Empty => "The synth is empty.",
            ErrorCode::ReadingBinData => "Error reading binary point data.",
            ErrorCode::BinDataFormat => "Binary point data is not in the expected format.",
            ErrorCode::CreateDir => "Unable to create the image directory.",
            ErrorCode::SaveImg => "Unable to save an image.",
            ErrorCode::NoError => "Import completed.",
            ErrorCode::Pending => "Import in progress.",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Invalid synth locator: {0}")]
    WrongUrl(String),

    #[error("Archive import is not supported: {0}")]
    UnsupportedSource(PathBuf),

    #[error("Invalid save path {path:?}: {reason}")]
    WrongPath { path: PathBuf, reason: &'static str },

    #[error("Unable to create directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Web service error: {0}")]
    WebService(#[from] ResourceError),

    #[error("Web service returned a negative response: {0}")]
    NegativeResponse(String),

    #[error("Unexpected web service response: {0}")]
    UnexpectedResponse(String),

    #[error("Collection is not a synth: {0}")]
    WrongCollectionType(String),

    #[error("Invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed manifest: {0}")]
    Manifest(String),

    #[error("The synth contains no coordinate systems")]
    Empty,

    #[error("Error loading fragment {url}: {source}")]
    Fragment {
        url: String,
        #[source]
        source: FragmentError,
    },

    #[error("Coordinate system {coordinate_system} declares {declared} points but {loaded} were loaded")]
    PointCount {
        coordinate_system: i32,
        declared: u32,
        loaded: usize,
    },

    #[error("Coordinate system {coordinate_system} declares {number_of_points} points in {bin_file_count} fragments")]
    UnloadableCloud {
        coordinate_system: i32,
        bin_file_count: u32,
        number_of_points: u32,
    },

    #[error("Error downloading image {url}: {source}")]
    ImageDownload {
        url: String,
        #[source]
        source: ResourceError,
    },

    #[error("Unable to save image {path:?}: {source}")]
    SaveImage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Import task stopped before completion")]
    Interrupted,
}

impl ImportError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ImportError::WrongUrl(_) | ImportError::UnsupportedSource(_) => ErrorCode::WrongUrl,
            ImportError::WrongPath { .. } => ErrorCode::WrongPath,
            ImportError::CreateDir { .. } => ErrorCode::CreateDir,
            ImportError::WebService(_)
            | ImportError::ImageDownload { .. }
            | ImportError::Interrupted => ErrorCode::WebServiceError,
            ImportError::NegativeResponse(_) => ErrorCode::NegativeResponse,
            ImportError::UnexpectedResponse(_) => ErrorCode::UnexpectedResponse,
            ImportError::WrongCollectionType(_) => ErrorCode::WrongCollectionType,
            ImportError::Json(_) | ImportError::Manifest(_) => ErrorCode::JsonParsing,
            ImportError::Empty => ErrorCode::Empty,
            ImportError::Fragment { source, .. } => source.code(),
            ImportError::PointCount { .. } | ImportError::UnloadableCloud { .. } => {
                ErrorCode::BinDataFormat
            }
            ImportError::SaveImage { .. } => ErrorCode::SaveImg,
        }
    }
}
