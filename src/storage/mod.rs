//! Object storage for uploaded images.
//!
//! Files live on local disk under `{root}/{bucket}/{folder}/{name}` and are
//! served publicly at `{base}/storage/v1/object/public/{bucket}/{folder}/{name}`.

use chrono::Utc;
use rand::Rng;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Largest accepted upload, 5 MB.
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
const ALLOWED_TYPES: [(&str, &str); 3] = [("image/jpeg", "jpg"), ("image/png", "png"), ("image/webp", "webp")];
const PUBLIC_PREFIX: &str = "/storage/v1/object/public/";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("File is too large ({0} bytes)")]
    TooLarge(usize),

    #[error("File is empty")]
    Empty,

    #[error("Invalid object path: {0}")]
    InvalidPath(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where an upload goes inside the bucket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Folder {
    ProductImages,
    HeroSlides,
    TeamImages,
    ProfilePictures { user_id: String },
}

impl Folder {
    pub fn path(&self) -> String {
        match self {
            Self::ProductImages => "product_images".into(),
            Self::HeroSlides => "hero_slides".into(),
            Self::TeamImages => "site_images/team".into(),
            Self::ProfilePictures { user_id } => format!("profile_pictures/{user_id}"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ObjectStorage {
    root: PathBuf,
    bucket: String,
    public_base_url: String,
}

impl ObjectStorage {
    pub fn new(root: impl Into<PathBuf>, bucket: impl Into<String>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            bucket: bucket.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Directory holding this bucket's files.
    pub fn bucket_dir(&self) -> PathBuf { self.root.join(&self.bucket) }

    /// Route prefix the bucket is served under.
    pub fn mount_path(&self) -> String { format!("{PUBLIC_PREFIX}{}", self.bucket) }

    pub fn public_url(&self, object_path: &str) -> String {
        format!("{}{}/{}", self.public_base_url, self.mount_path(), object_path)
    }

    /// Store `bytes` under a fresh name in `folder` and return its public URL.
    #[tracing::instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn upload(&self, folder: Folder, file_name: &str, content_type: &str, bytes: &[u8]) -> Result<String, StorageError> {
        let ext = validate_upload(file_name, content_type, bytes.len())?;
        let object_path = format!("{}/{}-{}.{}", folder.path(), random_base36(11), Utc::now().timestamp_millis(), ext);
        let target = self.bucket_dir().join(&object_path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;
        tracing::info!(%object_path, "uploaded object");
        Ok(self.public_url(&object_path))
    }

    /// Remove an object by public URL or bucket-relative path. Missing objects are not an error.
    pub async fn delete(&self, url_or_path: &str) -> Result<(), StorageError> {
        let object_path = self.object_path(url_or_path)?;
        match tokio::fs::remove_file(self.bucket_dir().join(&object_path)).await {
            Ok(()) => {
                tracing::info!(%object_path, "deleted object");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Delete, logging rather than returning failures.
    pub async fn delete_quietly(&self, url_or_path: &str) {
        if let Err(err) = self.delete(url_or_path).await {
            tracing::warn!(url = %url_or_path, error = %err, "failed to delete object");
        }
    }

    /// Whether `url` points into this bucket.
    pub fn is_managed_url(&self, url: &str) -> bool {
        url.starts_with(&format!("{}{}/", self.public_base_url, self.mount_path()))
    }

    /// Whether `url` is a managed object inside `folder`.
    pub fn is_in_folder(&self, url: &str, folder: &Folder) -> bool {
        self.is_managed_url(url)
            && self.object_path(url).is_ok_and(|path| path.starts_with(&format!("{}/", folder.path())))
    }

    /// Bucket-relative path for a public URL or bare path.
    pub fn object_path(&self, url_or_path: &str) -> Result<String, StorageError> {
        let path = match url_or_path.split_once(PUBLIC_PREFIX) {
            Some((_, rest)) => rest.strip_prefix(&format!("{}/", self.bucket)).unwrap_or(rest),
            None => url_or_path,
        };
        let path = path.split(['?', '#']).next().unwrap_or_default().trim_start_matches('/');
        let safe = !path.is_empty() && Path::new(path).components().all(|c| matches!(c, Component::Normal(_)));
        if !safe { return Err(StorageError::InvalidPath(url_or_path.to_string())); }
        Ok(path.to_string())
    }
}

/// Check type and size; returns the extension to store under.
fn validate_upload(file_name: &str, content_type: &str, size: usize) -> Result<&'static str, StorageError> {
    let (_, default_ext) = ALLOWED_TYPES
        .iter()
        .find(|(mime, _)| mime.eq_ignore_ascii_case(content_type))
        .ok_or_else(|| StorageError::UnsupportedType(content_type.to_string()))?;
    if size == 0 { return Err(StorageError::Empty); }
    if size > MAX_UPLOAD_BYTES { return Err(StorageError::TooLarge(size)); }

    let ext = Path::new(file_name).extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
    Ok(match ext.as_deref() {
        Some("jpeg") => "jpeg",
        Some("jpg") => "jpg",
        Some("png") => "png",
        Some("webp") => "webp",
        _ => default_ext,
    })
}

fn random_base36(len: usize) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    (0..len).map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> ObjectStorage {
        let dir = std::env::temp_dir().join(format!("storefront-storage-{}", uuid::Uuid::new_v4()));
        ObjectStorage::new(dir, "images", "http://localhost:8083/")
    }

    #[tokio::test]
    async fn test_upload_then_delete() {
        let storage = storage();
        let url = storage.upload(Folder::HeroSlides, "Banner.PNG", "image/png", b"\x89PNG").await.unwrap();
        assert!(url.starts_with("http://localhost:8083/storage/v1/object/public/images/hero_slides/"));
        assert!(url.ends_with(".png"));
        assert!(storage.is_managed_url(&url));

        let path = storage.object_path(&url).unwrap();
        assert!(storage.bucket_dir().join(&path).exists());
        storage.delete(&url).await.unwrap();
        assert!(!storage.bucket_dir().join(&path).exists());
        // second delete is a no-op
        storage.delete(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_profile_pictures_are_per_user() {
        let storage = storage();
        let url = storage.upload(Folder::ProfilePictures { user_id: "u1".into() }, "me.jpeg", "image/jpeg", b"\xff\xd8").await.unwrap();
        assert!(storage.object_path(&url).unwrap().starts_with("profile_pictures/u1/"));
        assert!(storage.is_in_folder(&url, &Folder::ProfilePictures { user_id: "u1".into() }));
        assert!(!storage.is_in_folder(&url, &Folder::ProfilePictures { user_id: "u".into() }));
        assert!(!storage.is_in_folder(&url, &Folder::ProductImages));
    }

    #[test]
    fn test_rejects_bad_uploads() {
        assert!(matches!(validate_upload("a.gif", "image/gif", 10), Err(StorageError::UnsupportedType(_))));
        assert!(matches!(validate_upload("a.png", "image/png", MAX_UPLOAD_BYTES + 1), Err(StorageError::TooLarge(_))));
        assert!(matches!(validate_upload("a.png", "image/png", 0), Err(StorageError::Empty)));
        assert_eq!(validate_upload("photo", "image/jpeg", 10).unwrap(), "jpg");
    }

    #[test]
    fn test_object_path_rejects_traversal() {
        let storage = storage();
        assert_eq!(storage.object_path("product_images/a.png").unwrap(), "product_images/a.png");
        assert!(storage.object_path("../secrets").is_err());
        assert!(storage.object_path("http://x/storage/v1/object/public/images/../../etc").is_err());
        assert!(!storage.is_managed_url("https://cdn.example.com/a.png"));
    }
}
