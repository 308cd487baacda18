use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::BufReader;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use crate::error::{RequestError, ValidationError};
use crate::models::page::PageType;
use crate::models::resource::ResourceType;

/// Uploaded files live under `root/{page_type}/{page-slug}/{filename}`, the
/// database records the part relative to `root`
#[derive(Clone, Debug)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub async fn ensure_root(&self) -> Result<(), std::io::Error> {
        fs::create_dir_all(&self.root).await?;
        info!("storage root ready at {:?}", self.root);
        Ok(())
    }

    pub async fn save(
        &self,
        page_type: PageType,
        page_name: &str,
        filename: &str,
        content: &[u8],
    ) -> Result<String, RequestError> {
        let filename = sanitize_filename(filename)?;
        let relative = format!("{}/{}/{}", page_type, page_slug(page_name), filename);
        let full_path = self.root.join(&relative);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&full_path, content).await?;
        Ok(relative)
    }

    /// Best effort, a missing file is not an error when the row is already
    /// gone
    pub async fn remove(&self, relative: &str) {
        let full_path = self.root.join(relative);
        if let Err(e) = fs::remove_file(&full_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("failed to remove stored file {full_path:?}: {e}");
            }
        }
    }

    pub async fn open_stream(
        &self,
        relative: &str,
    ) -> Result<ReaderStream<BufReader<fs::File>>, RequestError> {
        validate_relative_path(relative)?;
        let full_path = self.root.join(relative);
        let file = fs::File::open(&full_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RequestError::NotFound
            } else {
                RequestError::Io(e)
            }
        })?;
        Ok(ReaderStream::new(BufReader::new(file)))
    }
}

/// Downloads address files by their stored relative path, anything that
/// could escape the storage root is rejected outright
pub fn validate_relative_path(path: &str) -> Result<(), ValidationError> {
    let escapes = path.starts_with('/')
        || path.contains('\\')
        || Path::new(path)
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir));
    if escapes || path.is_empty() {
        return Err(ValidationError::InvalidInput {
            value: path.to_string(),
            reason: "file path must be relative to the storage root".to_string(),
        });
    }
    Ok(())
}

pub fn sanitize_filename(filename: &str) -> Result<String, ValidationError> {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if name.is_empty() || name == "." || name == ".." {
        return Err(ValidationError::InvalidInput {
            value: filename.to_string(),
            reason: "upload needs a usable file name".to_string(),
        });
    }
    Ok(name.to_string())
}

pub fn page_slug(page_name: &str) -> String {
    page_name.to_lowercase().replace(' ', "_")
}

/// Fallback when the upload doesn't name its kind
pub fn infer_resource_type(filename: &str) -> ResourceType {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "mp4" | "avi" | "mov" | "webm" => ResourceType::Video,
        "jpg" | "jpeg" | "png" | "gif" | "webp" => ResourceType::Photo,
        "mp3" | "wav" | "flac" | "m4a" | "ogg" => ResourceType::Audio,
        _ => ResourceType::Document,
    }
}

pub fn guess_content_type(path: &str) -> &'static str {
    let extension = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "avi" => "video/x-msvideo",
        "mov" => "video/quicktime",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "flac" => "audio/flac",
        "m4a" => "audio/mp4",
        "ogg" => "audio/ogg",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_matches_storage_layout() {
        assert_eq!(page_slug("Wonderwall"), "wonderwall");
        assert_eq!(page_slug("Stairway To Heaven"), "stairway_to_heaven");
    }

    #[test]
    fn filenames_lose_directory_parts() {
        assert_eq!(sanitize_filename("solo.mp4").unwrap(), "solo.mp4");
        assert_eq!(sanitize_filename("/tmp/solo.mp4").unwrap(), "solo.mp4");
        assert_eq!(sanitize_filename("..\\evil.exe").unwrap(), "evil.exe");
        assert!(sanitize_filename("").is_err());
        assert!(sanitize_filename("..").is_err());
    }

    #[test]
    fn relative_paths_cannot_escape() {
        assert!(validate_relative_path("song/wonderwall/solo.mp4").is_ok());
        assert!(validate_relative_path("/etc/passwd").is_err());
        assert!(validate_relative_path("song/../../etc/passwd").is_err());
        assert!(validate_relative_path("").is_err());
    }

    #[test]
    fn extension_inference_covers_each_kind() {
        assert_eq!(infer_resource_type("take.mp4"), ResourceType::Video);
        assert_eq!(infer_resource_type("cover.PNG"), ResourceType::Photo);
        assert_eq!(infer_resource_type("tabs.pdf"), ResourceType::Document);
        assert_eq!(infer_resource_type("demo.flac"), ResourceType::Audio);
        assert_eq!(infer_resource_type("notes"), ResourceType::Document);
    }
}
