//! Attachment object storage
//!
//! Objects live under `<root_dir>/<bucket>/<key>` and are served statically
//! under `<public_prefix>/<bucket>/<key>`.

use async_trait::async_trait;
use axum::body::Bytes;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::config::StorageConfig;
use crate::error::{AppError, AppResult};

pub const BUCKETS: [&str; 2] = ["photos", "files"];

/// Source of upload chunks, read until `None`
#[async_trait]
pub trait ChunkSource: Send {
    async fn next_chunk(&mut self) -> AppResult<Option<Bytes>>;
}

/// Upload written under a staging key, not yet visible
#[derive(Debug)]
pub struct StagedObject {
    pub key: String,
    pub size: usize,
}

pub fn too_large(max_size: usize) -> AppError {
    AppError::PayloadTooLarge(format!(
        "파일 크기가 제한을 초과했습니다. 최대 {}MB까지 업로드할 수 있습니다.",
        max_size / (1024 * 1024)
    ))
}

async fn write_chunks<S>(mut file: fs::File, source: &mut S, max_size: usize) -> AppResult<usize>
where
    S: ChunkSource + ?Sized,
{
    let mut size: usize = 0;
    while let Some(chunk) = source.next_chunk().await? {
        size += chunk.len();
        if size > max_size {
            tracing::warn!("Upload rejected: {} bytes exceeds limit {}", size, max_size);
            return Err(too_large(max_size));
        }
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(size)
}

#[derive(Clone, Debug)]
pub struct ObjectStorage {
    root_dir: PathBuf,
    public_prefix: String,
}

/// Check that a key only has normal path segments
fn is_safe_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('/')
        && Path::new(key)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

/// Check if a filename is safe (no path separators)
pub fn is_safe_filename(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }

    // Windows restricted characters
    if name.chars().any(|c| "<>:\"/\\|?*".contains(c)) {
        return false;
    }

    if name.chars().any(|c| c.is_control()) {
        return false;
    }

    // Names made only of dots
    if name.chars().all(|c| c == '.') {
        return false;
    }

    let path = Path::new(name);
    let mut components = path.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(c)), None) => c == name,
        _ => false,
    }
}

/// Object key for the n-th file of an upload: `{post_id}/{millis}-{n}.{ext}`
pub fn object_key(post_id: i64, millis: i64, n: usize, file_name: &str) -> String {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()));
    match ext {
        Some(ext) => format!("{}/{}-{}.{}", post_id, millis, n, ext),
        None => format!("{}/{}-{}", post_id, millis, n),
    }
}

/// Key an upload is streamed to before it gets its final name
pub fn staging_key(post_id: i64) -> String {
    format!("{}/{}.uploading", post_id, uuid::Uuid::new_v4())
}

/// MIME type guessed from the file extension
pub fn mime_type(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "txt" | "md" => "text/plain",
        "zip" => "application/zip",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "hwp" => "application/x-hwp",
        _ => "application/octet-stream",
    }
}

/// Human readable size: "0 Bytes", "1.5 KB", "2.25 MB"
pub fn format_file_size(bytes: i64) -> String {
    if bytes <= 0 {
        return "0 Bytes".to_string();
    }
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    // Same trimming as parseFloat(x.toFixed(2))
    let text = format!("{:.2}", rounded);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", text, UNITS[unit])
}

impl ObjectStorage {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            root_dir: config.root_dir.clone(),
            public_prefix: config.public_prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn public_prefix(&self) -> &str {
        &self.public_prefix
    }

    fn object_path(&self, bucket: &str, key: &str) -> AppResult<PathBuf> {
        if !BUCKETS.contains(&bucket) || !is_safe_key(key) {
            return Err(AppError::BadRequest(format!("invalid object: {}/{}", bucket, key)));
        }
        Ok(self.root_dir.join(bucket).join(key))
    }

    /// Public URL of an object
    pub fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/{}/{}", self.public_prefix, bucket, key)
    }

    /// Create an empty object file, parent directories included
    pub async fn create(&self, bucket: &str, key: &str) -> AppResult<fs::File> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(fs::File::create(&path).await?)
    }

    /// Move a finished object to its final key
    pub async fn rename(&self, bucket: &str, from: &str, to: &str) -> AppResult<()> {
        let from = self.object_path(bucket, from)?;
        let to = self.object_path(bucket, to)?;
        fs::rename(&from, &to).await?;
        Ok(())
    }

    /// Stream a source into a fresh staging object of the post.
    /// On any failure the staging object is removed before returning.
    pub async fn stage<S>(
        &self,
        bucket: &str,
        post_id: i64,
        source: &mut S,
        max_size: usize,
    ) -> AppResult<StagedObject>
    where
        S: ChunkSource + ?Sized,
    {
        let key = staging_key(post_id);
        let file = self.create(bucket, &key).await?;
        match write_chunks(file, source, max_size).await {
            Ok(size) => Ok(StagedObject { key, size }),
            Err(e) => {
                self.discard(bucket, std::slice::from_ref(&key)).await;
                Err(e)
            }
        }
    }

    /// Best-effort removal of objects left by a failed request
    pub async fn discard(&self, bucket: &str, keys: &[String]) {
        for key in keys {
            if let Err(e) = self.remove(bucket, key).await {
                tracing::warn!("Failed to remove {}/{}: {}", bucket, key, e);
            }
        }
    }

    /// Write a whole object at once
    pub async fn put(&self, bucket: &str, key: &str, data: &[u8]) -> AppResult<()> {
        let mut file = self.create(bucket, key).await?;
        file.write_all(data).await?;
        file.flush().await?;
        Ok(())
    }

    pub async fn open(&self, bucket: &str, key: &str) -> AppResult<fs::File> {
        let path = self.object_path(bucket, key)?;
        match fs::File::open(&path).await {
            Ok(file) => Ok(file),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AppError::NotFound(format!("{}/{}", bucket, key)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove an object; a missing object is not an error
    pub async fn remove(&self, bucket: &str, key: &str) -> AppResult<()> {
        let path = self.object_path(bucket, key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    fn temp_storage(tag: &str) -> ObjectStorage {
        let root = std::env::temp_dir().join(format!("studyclub-{}-{}", tag, uuid::Uuid::new_v4()));
        ObjectStorage::new(&StorageConfig {
            root_dir: root,
            public_prefix: "/storage/".to_string(),
        })
    }

    #[test]
    fn safe_filename_rejects_invalid_names() {
        assert!(!is_safe_filename(""));
        assert!(!is_safe_filename(".."));
        assert!(!is_safe_filename("a/b"));
        assert!(!is_safe_filename(r"a\b"));
        assert!(!is_safe_filename("a\nb"));
        assert!(is_safe_filename("발표자료 1주차.pptx"));
    }

    #[test]
    fn object_key_keeps_clean_extension() {
        assert_eq!(object_key(7, 1700000000000, 0, "사진.JPG"), "7/1700000000000-0.jpg");
        assert_eq!(object_key(7, 1, 2, "README"), "7/1-2");
        assert_eq!(object_key(7, 1, 3, "weird.t@r"), "7/1-3");
    }

    #[test]
    fn staging_keys_are_unique_per_upload() {
        let a = staging_key(4);
        assert!(a.starts_with("4/") && a.ends_with(".uploading"));
        assert_ne!(a, staging_key(4));
        assert!(is_safe_key(&a));
    }

    #[tokio::test]
    async fn rename_moves_object() {
        let storage = temp_storage("mv");
        storage.put("photos", "5/tmp.uploading", b"img").await.unwrap();
        storage.rename("photos", "5/tmp.uploading", "5/1-0.png").await.unwrap();
        assert!(storage.open("photos", "5/1-0.png").await.is_ok());
        assert!(storage.open("photos", "5/tmp.uploading").await.is_err());
        let _ = tokio::fs::remove_dir_all(storage.root_dir()).await;
    }

    #[test]
    fn public_url_trims_trailing_slash() {
        let storage = temp_storage("url");
        assert_eq!(storage.public_url("photos", "1/2.png"), "/storage/photos/1/2.png");
    }

    #[test]
    fn file_size_labels() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(512), "512 Bytes");
        assert_eq!(format_file_size(1024), "1 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024 + 256 * 1024), "5.25 MB");
        assert_eq!(format_file_size(3 * 1024 * 1024 * 1024), "3 GB");
    }

    #[test]
    fn mime_type_from_extension() {
        assert_eq!(mime_type("photo.jpg"), "image/jpeg");
        assert_eq!(mime_type("slides.PPTX"), "application/vnd.openxmlformats-officedocument.presentationml.presentation");
        assert_eq!(mime_type("unknown.bin"), "application/octet-stream");
    }

    #[tokio::test]
    async fn put_open_remove_round_trip() {
        let storage = temp_storage("rw");
        storage.put("files", "3/1-0.txt", b"hello").await.unwrap();

        let mut file = storage.open("files", "3/1-0.txt").await.unwrap();
        let mut body = String::new();
        file.read_to_string(&mut body).await.unwrap();
        assert_eq!(body, "hello");

        storage.remove("files", "3/1-0.txt").await.unwrap();
        assert!(matches!(storage.open("files", "3/1-0.txt").await, Err(AppError::NotFound(_))));
        // removing twice is fine
        storage.remove("files", "3/1-0.txt").await.unwrap();

        let _ = tokio::fs::remove_dir_all(storage.root_dir()).await;
    }

    struct Chunks {
        parts: Vec<AppResult<Bytes>>,
    }

    #[async_trait]
    impl ChunkSource for Chunks {
        async fn next_chunk(&mut self) -> AppResult<Option<Bytes>> {
            if self.parts.is_empty() {
                return Ok(None);
            }
            self.parts.remove(0).map(Some)
        }
    }

    fn post_dir_entries(storage: &ObjectStorage, bucket: &str, post_id: i64) -> Vec<String> {
        match std::fs::read_dir(storage.root_dir().join(bucket).join(post_id.to_string())) {
            Ok(dir) => dir
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    #[tokio::test]
    async fn stage_writes_all_chunks() {
        let storage = temp_storage("stage");
        let mut source = Chunks {
            parts: vec![Ok(Bytes::from_static(b"hello ")), Ok(Bytes::from_static(b"club"))],
        };
        let staged = storage.stage("files", 8, &mut source, 1024).await.unwrap();
        assert_eq!(staged.size, 10);
        assert!(staged.key.ends_with(".uploading"));

        let mut body = String::new();
        let mut file = storage.open("files", &staged.key).await.unwrap();
        file.read_to_string(&mut body).await.unwrap();
        assert_eq!(body, "hello club");
        let _ = tokio::fs::remove_dir_all(storage.root_dir()).await;
    }

    #[tokio::test]
    async fn failed_read_leaves_no_staging_file() {
        let storage = temp_storage("stage-err");
        let mut source = Chunks {
            parts: vec![
                Ok(Bytes::from_static(b"partial")),
                Err(AppError::BadRequest("connection reset".to_string())),
            ],
        };
        let err = storage.stage("files", 8, &mut source, 1024).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(post_dir_entries(&storage, "files", 8).is_empty());
        let _ = tokio::fs::remove_dir_all(storage.root_dir()).await;
    }

    #[tokio::test]
    async fn oversized_upload_leaves_no_staging_file() {
        let storage = temp_storage("stage-big");
        let mut source = Chunks {
            parts: vec![Ok(Bytes::from(vec![0u8; 600])), Ok(Bytes::from(vec![0u8; 600]))],
        };
        let err = storage.stage("photos", 9, &mut source, 1000).await.unwrap_err();
        assert!(matches!(err, AppError::PayloadTooLarge(_)));
        assert!(post_dir_entries(&storage, "photos", 9).is_empty());
        let _ = tokio::fs::remove_dir_all(storage.root_dir()).await;
    }

    #[test]
    fn too_large_message_in_megabytes() {
        let err = too_large(50 * 1024 * 1024);
        assert!(matches!(err, AppError::PayloadTooLarge(ref m) if m.contains("50MB")));
    }

    #[tokio::test]
    async fn rejects_unknown_bucket_and_traversal() {
        let storage = temp_storage("guard");
        assert!(matches!(storage.put("avatars", "a.png", b"x").await, Err(AppError::BadRequest(_))));
        assert!(matches!(storage.put("files", "../a.png", b"x").await, Err(AppError::BadRequest(_))));
    }
}
