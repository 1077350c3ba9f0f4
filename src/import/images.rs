use crate::error::ImportError;
use crate::resource::{request_with_timeout, Method, ResourceClient};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageRequest {
    pub id: i32,
    pub url: String,
    /// Destination file.
    pub path: PathBuf,
}

/// Downloads one image and writes it to its destination, returning the written path.
pub async fn download_image<C: ResourceClient + ?Sized>(
    client: &C,
    request: &ImageRequest,
    timeout: Option<Duration>,
) -> Result<PathBuf, ImportError> {
    let bytes = request_with_timeout(client, &request.url, Method::Get, None, None, timeout)
        .await
        .map_err(|source| ImportError::ImageDownload {
            url: request.url.clone(),
            source,
        })?;

    tokio::fs::write(&request.path, &bytes)
        .await
        .map_err(|source| ImportError::SaveImage {
            path: request.path.clone(),
            source,
        })?;

    Ok(request.path.clone())
}

/// Checks the save directory, creating it when missing.
pub async fn prepare_save_dir(path: &Path) -> Result<(), ImportError> {
    if path.as_os_str().is_empty() {
        return Err(ImportError::WrongPath {
            path: path.to_path_buf(),
            reason: "empty path",
        });
    }

    match tokio::fs::metadata(path).await {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(ImportError::WrongPath {
            path: path.to_path_buf(),
            reason: "not a directory",
        }),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            tokio::fs::create_dir_all(path)
                .await
                .map_err(|source| ImportError::CreateDir {
                    path: path.to_path_buf(),
                    source,
                })
        }
        Err(_) => Err(ImportError::WrongPath {
            path: path.to_path_buf(),
            reason: "path is not accessible",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[tokio::test]
    async fn creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        prepare_save_dir(&nested).await.unwrap();
        assert!(nested.is_dir());
        prepare_save_dir(&nested).await.unwrap();
    }

    #[tokio::test]
    async fn rejects_files_and_empty_paths() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file");
        std::fs::write(&file, b"x").unwrap();

        let err = prepare_save_dir(&file).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::WrongPath);

        let err = prepare_save_dir(Path::new("")).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::WrongPath);
    }

    #[tokio::test]
    async fn cannot_create_below_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file");
        std::fs::write(&file, b"x").unwrap();

        let err = prepare_save_dir(&file.join("images")).await.unwrap_err();
        assert!(matches!(
            err.code(),
            ErrorCode::CreateDir | ErrorCode::WrongPath
        ));
    }
}
