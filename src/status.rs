use crate::error::ErrorCode;
use std::fmt;

/// Import stages, in the order the pipeline walks through them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Progress {
    WebService,
    DownloadJson,
    ParseJson,
    DownloadBin,
    LoadingBin,
    DownloadImg,
}

impl Progress {
    pub fn label(&self) -> &'static str {
        match self {
            Progress::WebService => "Contacting web service...",
            Progress::DownloadJson => "Downloading json data...",
            Progress::ParseJson => "Parsing json data...",
            Progress::DownloadBin => "Downloading binary files...",
            Progress::LoadingBin => "Loading binary data...",
            Progress::DownloadImg => "Downloading images...",
        }
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImportState {
    Pending,
    Ready,
    Failed(ErrorCode),
}

impl ImportState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ImportState::Pending)
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            ImportState::Pending => ErrorCode::Pending,
            ImportState::Ready => ErrorCode::NoError,
            ImportState::Failed(code) => *code,
        }
    }
}

/// Snapshot of an import, as published to observers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImportStatus {
    pub progress: Progress,
    pub state: ImportState,
    /// Completed operations of the current fan-out stage.
    pub completed: usize,
    pub total: usize,
}

impl ImportStatus {
    pub fn error(&self) -> ErrorCode {
        self.state.code()
    }

    pub fn is_ready(&self) -> bool {
        self.state == ImportState::Ready
    }
}

impl Default for ImportStatus {
    fn default() -> Self {
        Self {
            progress: Progress::WebService,
            state: ImportState::Pending,
            completed: 0,
            total: 0,
        }
    }
}
