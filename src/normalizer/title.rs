// Title Synthesizer and the small text builders around it
use crate::config::NormalizerConfig;
use crate::model::ListingRecord;
use crate::utils::{collapse_whitespace, contains_words, normalize_key};

/// Fields the synthesizer may draw on.
#[derive(Debug, Clone, Copy, Default)]
pub struct TitleParts<'a> {
    pub year: Option<i32>,
    pub converter: Option<&'a str>,
    pub chassis_model: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct TitleSynthesizer {
    min_title_length: usize,
    brand_suffix: String,
    generic_title: String,
}

impl TitleSynthesizer {
    pub fn new(cfg: &NormalizerConfig) -> Self {
        Self {
            min_title_length: cfg.min_title_length,
            brand_suffix: cfg.brand_suffix.clone(),
            generic_title: cfg.generic_title.clone(),
        }
    }

    pub fn generic_title(&self) -> &str {
        &self.generic_title
    }

    /// A bare price or year, or anything shorter than the configured
    /// minimum, is not a title.
    pub fn is_usable(&self, title: &str) -> bool {
        let title = title.trim();
        title.chars().count() >= self.min_title_length && title.chars().any(char::is_alphabetic)
    }

    /// Whether `title` is the generic fallback, i.e. carries no identity.
    pub fn is_generic(&self, title: &str) -> bool {
        normalize_key(title) == normalize_key(&self.generic_title)
    }

    /// Collapses whitespace and keeps the year at the front when the title
    /// doesn't mention it.
    pub fn clean(&self, title: &str, year: Option<i32>) -> String {
        let title = collapse_whitespace(title);
        match year {
            Some(y) if !contains_words(&title, &y.to_string()) => format!("{y} {title}"),
            _ => title,
        }
    }

    /// Year, converter, chassis model, brand suffix, in that order. A token
    /// already present in the accumulated title is skipped.
    pub fn synthesize(&self, parts: TitleParts<'_>) -> String {
        if parts.year.is_none() && parts.converter.is_none() && parts.chassis_model.is_none() {
            return self.generic_title.clone();
        }

        let year = parts.year.map(|y| y.to_string());
        let tokens = [
            year.as_deref(),
            parts.converter,
            parts.chassis_model,
            Some(self.brand_suffix.as_str()),
        ];

        let mut title = String::new();
        for token in tokens.into_iter().flatten() {
            let token = token.trim();
            if token.is_empty() || contains_words(&title, token) {
                continue;
            }
            if !title.is_empty() {
                title.push(' ');
            }
            title.push_str(token);
        }
        title
    }

    /// Usable raw title, cleaned; otherwise a synthesized one.
    pub fn resolve(&self, raw: Option<&str>, parts: TitleParts<'_>) -> String {
        match raw {
            Some(t) if self.is_usable(t) => self.clean(t, parts.year),
            _ => {
                let title = self.synthesize(parts);
                tracing::debug!(raw = ?raw, title = %title, "synthesized listing title");
                title
            }
        }
    }
}

/// `Year: 2009 | Manufacturer: Prevost | Converter: Liberty | ...` from the
/// fields already on the record. Used only when a listing has no description.
pub fn synthesize_description(record: &ListingRecord, sentinel: u64) -> String {
    let mut parts = Vec::new();
    if let Some(year) = record.year {
        parts.push(format!("Year: {year}"));
    }
    if let Some(m) = &record.manufacturer {
        parts.push(format!("Manufacturer: {m}"));
    }
    if let Some(c) = &record.converter {
        parts.push(format!("Converter: {c}"));
    }
    if let Some(c) = &record.chassis_model {
        parts.push(format!("Chassis Model: {c}"));
    }
    if let Some(s) = record.slide_count.filter(|s| *s > 0) {
        parts.push(format!("Slides: {s}"));
    }
    match record.price {
        Some(p) if p == sentinel => parts.push("Price: Call for pricing".into()),
        Some(p) => parts.push(format!("Price: ${}", group_thousands(p))),
        None => {}
    }

    if parts.is_empty() {
        "Luxury RV coach for sale.".into()
    } else {
        parts.join(" | ")
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
