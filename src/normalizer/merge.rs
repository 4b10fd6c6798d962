// Dedup/Merge Policy: match keys and field-level merge rules
use crate::config::NormalizerConfig;
use crate::model::ListingRecord;
use crate::utils::normalize_key;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;

/// Key used to decide whether two records describe the same listing.
/// Heuristic: distinct listings can collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MatchKey {
    Title(String),
    YearConverter(i32, String),
    Content(String),
}

impl fmt::Display for MatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchKey::Title(t) => write!(f, "title:{t}"),
            MatchKey::YearConverter(y, c) => write!(f, "year-converter:{y}:{c}"),
            MatchKey::Content(h) => write!(f, "content:{h}"),
        }
    }
}

/// Derives a match key from a record. `None` means the record can't be
/// matched and always counts as new.
pub trait KeyStrategy: Send + Sync {
    fn key(&self, record: &ListingRecord) -> Option<MatchKey>;
}

/// Normalized title, or (year, converter) when the title is only the
/// generic fallback.
#[derive(Debug, Clone)]
pub struct TitleOrYearConverter {
    generic_title: String,
}

impl TitleOrYearConverter {
    pub fn new(cfg: &NormalizerConfig) -> Self {
        Self { generic_title: normalize_key(&cfg.generic_title) }
    }
}

impl KeyStrategy for TitleOrYearConverter {
    fn key(&self, record: &ListingRecord) -> Option<MatchKey> {
        let title = normalize_key(&record.title);
        if !title.is_empty() && title != self.generic_title {
            return Some(MatchKey::Title(title));
        }
        match (record.year, record.converter.as_deref()) {
            (Some(year), Some(converter)) => Some(MatchKey::YearConverter(year, normalize_key(converter))),
            _ => None,
        }
    }
}

/// SHA-256 over normalized description and price.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentHash;

impl KeyStrategy for ContentHash {
    fn key(&self, record: &ListingRecord) -> Option<MatchKey> {
        let description = normalize_key(&record.description);
        if description.is_empty() {
            return None;
        }
        let mut hasher = Sha256::new();
        hasher.update(description.as_bytes());
        hasher.update(b"\n");
        if let Some(price) = record.price {
            hasher.update(price.to_string().as_bytes());
        }
        Some(MatchKey::Content(format!("{:x}", hasher.finalize())))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    New,
    Existing,
}

/// Field-level overwrite rules for an incoming record landing on an
/// existing one. Nulls never overwrite; non-null values always do.
#[derive(Debug, Clone)]
pub struct MergePolicy {
    default_manufacturer: String,
    default_location: String,
}

impl MergePolicy {
    pub fn new(cfg: &NormalizerConfig) -> Self {
        Self {
            default_manufacturer: cfg.default_manufacturer.clone(),
            default_location: cfg.default_location.clone(),
        }
    }

    pub fn merge(&self, existing: &ListingRecord, incoming: &ListingRecord) -> ListingRecord {
        let description = if incoming.description.trim().is_empty() {
            existing.description.clone()
        } else {
            incoming.description.clone()
        };

        let manufacturer = match incoming.manufacturer.as_deref() {
            Some(m) if m != self.default_manufacturer => Some(m.to_string()),
            _ => existing.manufacturer.clone().or_else(|| incoming.manufacturer.clone()),
        };

        let location = if incoming.location.trim().is_empty() || incoming.location == self.default_location {
            existing.location.clone()
        } else {
            incoming.location.clone()
        };

        // Zero slides is the assembler's default, so it never erases a known count.
        let slide_count = match incoming.slide_count {
            Some(0) if existing.slide_count.is_some_and(|n| n > 0) => existing.slide_count,
            Some(n) => Some(n),
            None => existing.slide_count,
        };

        let featured_image_path = incoming
            .featured_image_path
            .clone()
            .or_else(|| existing.featured_image_path.clone());

        // A replaced featured image stays with the listing as an extra.
        let mut additional_image_paths = Vec::new();
        let candidates = existing
            .additional_image_paths
            .iter()
            .chain(existing.featured_image_path.iter())
            .chain(incoming.additional_image_paths.iter());
        for path in candidates {
            if featured_image_path.as_ref() == Some(path) || additional_image_paths.contains(path) {
                continue;
            }
            additional_image_paths.push(path.clone());
        }

        ListingRecord {
            title: existing.title.clone(),
            description,
            price: incoming.price.or(existing.price),
            year: incoming.year.or(existing.year),
            manufacturer,
            converter: incoming.converter.clone().or_else(|| existing.converter.clone()),
            chassis_model: incoming.chassis_model.clone().or_else(|| existing.chassis_model.clone()),
            mileage: incoming.mileage.or(existing.mileage),
            length_feet: incoming.length_feet.or(existing.length_feet),
            slide_count,
            location,
            featured_image_path,
            additional_image_paths,
        }
    }
}

/// In-memory listing set keyed by a `KeyStrategy`. Callers must not
/// upsert the same key from two threads at once; `&mut self` enforces
/// that here.
pub struct ListingIndex {
    strategy: Box<dyn KeyStrategy>,
    policy: MergePolicy,
    records: Vec<ListingRecord>,
    keys: HashMap<MatchKey, usize>,
}

impl ListingIndex {
    pub fn new(strategy: Box<dyn KeyStrategy>, policy: MergePolicy) -> Self {
        Self { strategy, policy, records: Vec::new(), keys: HashMap::new() }
    }

    /// Heuristic title/(year, converter) keys with the configured defaults.
    pub fn with_defaults(cfg: &NormalizerConfig) -> Self {
        Self::new(Box::new(TitleOrYearConverter::new(cfg)), MergePolicy::new(cfg))
    }

    /// What `upsert` would do with this record, without changing anything.
    pub fn resolve(&self, record: &ListingRecord) -> MergeOutcome {
        match self.strategy.key(record) {
            Some(key) if self.keys.contains_key(&key) => MergeOutcome::Existing,
            _ => MergeOutcome::New,
        }
    }

    pub fn upsert(&mut self, record: ListingRecord) -> MergeOutcome {
        let Some(key) = self.strategy.key(&record) else {
            self.records.push(record);
            return MergeOutcome::New;
        };
        match self.keys.get(&key) {
            Some(&idx) => {
                self.records[idx] = self.policy.merge(&self.records[idx], &record);
                MergeOutcome::Existing
            }
            None => {
                self.keys.insert(key, self.records.len());
                self.records.push(record);
                MergeOutcome::New
            }
        }
    }

    pub fn records(&self) -> &[ListingRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ListingRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
