use crate::model::StorageError;
use crate::utils::to_kebab_case;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;

/// Writes downloaded images under `dir` with content-addressed names and
/// hands back their public paths.
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
    public_prefix: String,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>, public_prefix: &str) -> Self {
        Self { dir: dir.into(), public_prefix: public_prefix.trim_end_matches('/').to_string() }
    }

    /// Same bytes and prefix always map to the same file name.
    pub fn file_name(bytes: &[u8], content_type: Option<&str>, prefix: &str) -> String {
        let hash = format!("{:x}", Sha256::digest(bytes));
        let stem: String = to_kebab_case(prefix)
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
            .collect();
        let ext = extension_for(content_type);
        if stem.is_empty() {
            format!("{}.{}", &hash[..8], ext)
        } else {
            format!("{}-{}.{}", stem, &hash[..8], ext)
        }
    }

    pub async fn save(&self, bytes: &[u8], content_type: Option<&str>, prefix: &str) -> Result<String, StorageError> {
        let name = Self::file_name(bytes, content_type, prefix);
        fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(&name);
        if fs::try_exists(&path).await? {
            debug!("Image {} already stored", name);
        } else {
            fs::write(&path, bytes).await?;
            debug!("Stored image {}", path.display());
        }
        Ok(format!("{}/{}", self.public_prefix, name))
    }
}

fn extension_for(content_type: Option<&str>) -> &'static str {
    let mime = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .unwrap_or_default();
    match mime.as_str() {
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "jpg",
    }
}
