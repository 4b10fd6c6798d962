// Core structs: ListingRecord, RawListing, ImageSet and the collaborator errors
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Canonical listing produced by the normalizer.
///
/// Field names serialize in camelCase; this is the interchange shape of the
/// JSON files passed between the scrape and import steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingRecord {
    pub title: String,
    pub description: String,
    pub price: Option<u64>,
    pub year: Option<i32>,
    pub manufacturer: Option<String>,
    pub converter: Option<String>,
    pub chassis_model: Option<String>,
    pub mileage: Option<u64>,
    pub length_feet: Option<u32>,
    pub slide_count: Option<u32>,
    pub location: String,
    pub featured_image_path: Option<String>,
    #[serde(default)]
    pub additional_image_paths: Vec<String>,
}

impl ListingRecord {
    /// True when the price is the configured "call for price" sentinel.
    pub fn is_call_for_price(&self, sentinel: u64) -> bool {
        self.price == Some(sentinel)
    }
}

/// Raw text fragments for one listing, as handed over by the HTML parser.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawListing {
    pub title: Option<String>,
    pub description: Option<String>,
    /// Labelled cells such as `Year:2005Model:H3-45-Price:$450,000`.
    pub details: Vec<String>,
    pub price_text: Option<String>,
    pub image_urls: Vec<String>,
    pub detail_url: Option<String>,
}

/// Image paths handed back by the image collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageSet {
    pub featured: Option<String>,
    pub additional: Vec<String>,
}

/// Image URLs the collaborator should fetch, split into primary and the rest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImagePlan {
    pub primary: Option<String>,
    pub additional: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config read error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status} for {url}")]
    InvalidResponse { url: String, status: u16 },
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("empty body from {0}")]
    EmptyBody(String),
}

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("html parse error: {0}")]
    HtmlParseError(String),
    #[error("no listings found")]
    NoListings,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("listing {0} not found")]
    NotFound(i64),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ListingRecord {
        ListingRecord {
            title: "2009 Liberty H3-45 Prevost".into(),
            description: "Elegant Lady, double slide".into(),
            price: Some(999_999),
            year: Some(2009),
            manufacturer: Some("Prevost".into()),
            converter: Some("Liberty".into()),
            chassis_model: Some("H3-45".into()),
            mileage: None,
            length_feet: Some(45),
            slide_count: Some(2),
            location: "United States".into(),
            featured_image_path: Some("/images/rv_listings/rv_1a2b3c4d.jpg".into()),
            additional_image_paths: vec!["/images/rv_listings/rv_5e6f7a8b.jpg".into()],
        }
    }

    #[test]
    fn test_json_round_trip_is_exact() {
        let record = sample();
        let json = serde_json::to_string(&record).unwrap();
        let back: ListingRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_json_uses_camel_case_names() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!(json.get("chassisModel").is_some());
        assert!(json.get("lengthFeet").is_some());
        assert!(json.get("slideCount").is_some());
        assert!(json.get("featuredImagePath").is_some());
        assert!(json.get("additionalImagePaths").is_some());
        assert!(json["mileage"].is_null());
    }

    #[test]
    fn test_sentinel_is_not_absence() {
        let mut record = sample();
        assert!(record.is_call_for_price(999_999));
        record.price = None;
        assert!(!record.is_call_for_price(999_999));
    }
}
