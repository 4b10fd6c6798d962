// Listing normalizer: raw fragments in, canonical ListingRecord out.

pub mod assemble;
pub mod extract;
pub mod merge;
pub mod patterns;
pub mod title;

use crate::config::NormalizerConfig;
use crate::model::ConfigError;
use chrono::{Datelike, Utc};
use patterns::PatternLibrary;
use title::TitleSynthesizer;

/// Immutable normalization engine. Shared freely across workers.
#[derive(Debug, Clone)]
pub struct Normalizer {
    config: NormalizerConfig,
    patterns: PatternLibrary,
    titles: TitleSynthesizer,
    max_year: i32,
}

impl Normalizer {
    pub fn new(config: NormalizerConfig) -> Result<Self, ConfigError> {
        let max_year = Utc::now().year() + 1;
        Self::with_max_year(config, max_year)
    }

    /// Fixes the upper bound of accepted years instead of reading the clock.
    pub fn with_max_year(config: NormalizerConfig, max_year: i32) -> Result<Self, ConfigError> {
        Ok(Self {
            patterns: PatternLibrary::new(&config)?,
            titles: TitleSynthesizer::new(&config),
            config,
            max_year,
        })
    }

    pub fn patterns(&self) -> &PatternLibrary {
        &self.patterns
    }

    pub fn titles(&self) -> &TitleSynthesizer {
        &self.titles
    }
}
