// JSON interchange file: a pretty-printed array of listing records
use crate::model::{ListingRecord, StorageError};
use std::fs;
use std::path::Path;

pub fn save_listings(path: impl AsRef<Path>, listings: &[ListingRecord]) -> Result<(), StorageError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(listings)?;
    fs::write(path, json)?;
    Ok(())
}

pub fn load_listings(path: impl AsRef<Path>) -> Result<Vec<ListingRecord>, StorageError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
