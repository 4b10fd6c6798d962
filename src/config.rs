use crate::model::ConfigError;
use serde::Deserialize;
use std::fs;

/// Vocabulary and defaults for the listing normalizer.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    pub known_converters: Vec<String>,
    pub known_chassis_models: Vec<String>,
    pub default_manufacturer: String,
    pub default_location: String,
    pub call_for_price_sentinel: u64,
    pub min_title_length: usize,
    pub brand_suffix: String,
    pub generic_title: String,
    pub max_additional_images: usize,
    pub synthesize_description: bool,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        let converters = [
            "Marathon", "Liberty", "Millennium", "Featherlite", "Vantare",
            "Emerald", "Newell", "Country Coach", "Angola", "American Heritage",
            "Foretravel", "Newmar", "Entegra", "Tiffin", "Monaco", "Parliament",
            "Executive", "Royale", "Vogue", "Epic", "Nashville", "Prevost",
        ];
        let chassis = [
            "H3-45", "X3-45", "H3-40", "XL II", "XLII", "H345", "X345",
            "Le Mirage", "XL", "H3", "X3",
        ];
        Self {
            known_converters: converters.iter().map(|s| s.to_string()).collect(),
            known_chassis_models: chassis.iter().map(|s| s.to_string()).collect(),
            default_manufacturer: "Prevost".into(),
            default_location: "United States".into(),
            call_for_price_sentinel: 999_999,
            min_title_length: 5,
            brand_suffix: "Prevost".into(),
            generic_title: "Luxury RV Coach".into(),
            max_additional_images: 5,
            synthesize_description: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub listings_url: String,
    #[serde(default = "default_detail_base_url")]
    pub detail_base_url: String,
    #[serde(default = "default_output_file")]
    pub output_file: String,
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_image_dir")]
    pub image_dir: String,
    #[serde(default = "default_image_public_prefix")]
    pub image_public_prefix: String,
    #[serde(default = "default_max_listings")]
    pub max_listings: usize,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub normalizer: NormalizerConfig,
}

fn default_detail_base_url() -> String {
    "https://www.prevost-stuff.com/forsale/".into()
}

fn default_output_file() -> String {
    "prevost_listings.json".into()
}

fn default_database_path() -> String {
    "listings.db".into()
}

fn default_image_dir() -> String {
    "public/images/rv_listings".into()
}

fn default_image_public_prefix() -> String {
    "/images/rv_listings".into()
}

fn default_max_listings() -> usize {
    20
}

fn default_max_concurrency() -> usize {
    4
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_max_retries() -> u32 {
    3
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) RvScoutBot/0.1".into()
}

pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = serde_json::from_str(content)?;
    Ok(config)
}
