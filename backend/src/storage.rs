//! The public disk: property images and owner business permits, written
//! under fixed subpaths and served read-only at `/storage`.

use std::io;
use std::path::{Component, Path, PathBuf};

use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::error::AppError;

pub const GALLERY_DIR: &str = "properties/gallery";
pub const PERMIT_DIR: &str = "properties/permits";

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];
const PERMIT_EXTENSIONS: &[&str] = &["pdf", "jpg", "jpeg", "png"];
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    PropertyImage,
    BusinessPermit,
}

impl UploadKind {
    fn dir(self) -> &'static str {
        match self {
            UploadKind::PropertyImage => GALLERY_DIR,
            UploadKind::BusinessPermit => PERMIT_DIR,
        }
    }

    fn extensions(self) -> &'static [&'static str] {
        match self {
            UploadKind::PropertyImage => IMAGE_EXTENSIONS,
            UploadKind::BusinessPermit => PERMIT_EXTENSIONS,
        }
    }

    fn field(self) -> &'static str {
        match self {
            UploadKind::PropertyImage => "image",
            UploadKind::BusinessPermit => "permit",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PublicDisk {
    root: PathBuf,
}

impl PublicDisk {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Validates and writes an upload, returning its disk-relative path.
    pub async fn store(
        &self,
        kind: UploadKind,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<String, AppError> {
        let extension = allowed_extension(kind, file_name)?;
        if bytes.is_empty() {
            return Err(AppError::field(kind.field(), "The uploaded file is empty."));
        }
        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(AppError::field(
                kind.field(),
                "The uploaded file may not be greater than 5 MB.",
            ));
        }

        let name: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        let relative = format!("{}/{}.{}", kind.dir(), name, extension);
        let target = self.root.join(&relative);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;
        log::info!("Stored {} bytes at {}", bytes.len(), relative);
        Ok(relative)
    }

    /// Removes a stored file; a file that is already gone is not an error.
    pub async fn delete(&self, relative: &str) -> Result<(), AppError> {
        let Some(path) = self.resolve(relative) else {
            log::warn!("Refusing to delete path outside the public disk: {}", relative);
            return Ok(());
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                log::info!("Deleted {}", relative);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete_all(&self, relatives: &[String]) -> Result<(), AppError> {
        for relative in relatives {
            self.delete(relative).await?;
        }
        Ok(())
    }

    /// Joins a stored relative path onto the root, rejecting anything that
    /// could escape it.
    fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let path = Path::new(relative);
        let safe = path
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        safe.then(|| self.root.join(path))
    }
}

fn allowed_extension(kind: UploadKind, file_name: &str) -> Result<String, AppError> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if kind.extensions().contains(&extension.as_str()) {
        Ok(extension)
    } else {
        Err(AppError::field(
            kind.field(),
            format!(
                "The {} must be a file of type: {}.",
                kind.field(),
                kind.extensions().join(", ")
            ),
        ))
    }
}
