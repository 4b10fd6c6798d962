// Pattern Library: closed vocabularies and compiled field regexes
use crate::config::NormalizerConfig;
use crate::model::ConfigError;
use crate::normalizer::extract::Extracted;
use regex::Regex;
use std::ops::Range;

/// One vocabulary term with its word-bounded, case-insensitive matcher.
#[derive(Debug, Clone)]
pub struct VocabEntry {
    pub name: String,
    pattern: Regex,
}

/// Ordered closed vocabulary. Earlier entries have priority.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    entries: Vec<VocabEntry>,
}

impl Vocabulary {
    pub fn new(names: &[String]) -> Result<Self, ConfigError> {
        let mut entries = Vec::with_capacity(names.len());
        for raw in names {
            let name = trim_separators(raw);
            if name.is_empty() || entries.iter().any(|e: &VocabEntry| e.name.eq_ignore_ascii_case(name)) {
                continue;
            }
            let pattern = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(name)))?;
            entries.push(VocabEntry { name: name.to_string(), pattern });
        }
        Ok(Self { entries })
    }

    /// Same as `new`, but most specific (longest) terms first. Ties keep
    /// their configured order.
    pub fn longest_first(names: &[String]) -> Result<Self, ConfigError> {
        let mut vocab = Self::new(names)?;
        vocab.entries.sort_by(|a, b| b.name.len().cmp(&a.name.len()));
        Ok(vocab)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact (case-insensitive) lookup after trimming trailing separators.
    pub fn lookup(&self, value: &str) -> Option<&str> {
        let value = trim_separators(value);
        self.entries
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(value))
            .map(|e| e.name.as_str())
    }

    /// Scans `text` for vocabulary terms.
    ///
    /// A hit lying inside a longer hit (`H3` inside `H3-45`) is ignored.
    /// Among the remaining hits the earliest vocabulary entry wins.
    pub fn detect(&self, text: &str) -> Option<Extracted<String>> {
        let hits: Vec<Vec<Range<usize>>> = self
            .entries
            .iter()
            .map(|e| e.pattern.find_iter(text).map(|m| m.range()).collect())
            .collect();

        for (idx, spans) in hits.iter().enumerate() {
            let free = spans.iter().find(|span| {
                !hits.iter().enumerate().any(|(other, others)| {
                    other != idx && others.iter().any(|o| strictly_contains(o, span))
                })
            });
            if let Some(span) = free {
                return Some(Extracted::new(self.entries[idx].name.clone(), span.clone()));
            }
        }
        None
    }

    /// `lookup` first, then a scan of the value text.
    pub fn canonicalize(&self, value: &str) -> Option<String> {
        self.lookup(value)
            .map(str::to_string)
            .or_else(|| self.detect(value).map(|m| m.value))
    }
}

fn strictly_contains(outer: &Range<usize>, inner: &Range<usize>) -> bool {
    outer.start <= inner.start && inner.end <= outer.end && outer.len() > inner.len()
}

/// Strips whitespace and trailing `-` separators, e.g. `H3-45-` -> `H3-45`.
pub fn trim_separators(value: &str) -> &str {
    value.trim().trim_end_matches(|c: char| c == '-' || c.is_whitespace())
}

/// Read-only tables the extractors run against. Built once at start-up.
#[derive(Debug, Clone)]
pub struct PatternLibrary {
    pub converters: Vocabulary,
    pub chassis_models: Vocabulary,
    pub price: Regex,
    pub call_for_price: Regex,
    pub year: Regex,
    pub mileage: Regex,
    pub length: Regex,
    pub slides: Regex,
    pub slides_word: Regex,
    pub location: Regex,
    pub label: Regex,
    pub quantity: Regex,
    /// `2009Prevost` style run-together year in a file name.
    pub year_prefix: Regex,
}

impl PatternLibrary {
    pub fn new(cfg: &NormalizerConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            converters: Vocabulary::new(&cfg.known_converters)?,
            chassis_models: Vocabulary::longest_first(&cfg.known_chassis_models)?,
            price: Regex::new(r"\$\s*([0-9][0-9,]*(?:\.[0-9]+)?)([A-Za-z]?)")?,
            call_for_price: Regex::new(r"(?i)\bcall\b[^.$\n]{0,20}?\bpric(?:e|es|ing)\b")?,
            year: Regex::new(r"\b(19[0-9]{2}|20[0-2][0-9])\b|'([0-2][0-9])\b")?,
            mileage: Regex::new(r"(?i)\b([0-9][0-9,]*(?:\.[0-9]+)?)\s*(k)?[\s-]*miles\b")?,
            length: Regex::new(r"(?i)\b([0-9]{1,3})(?:\.[0-9]+)?\s*-?\s*(?:feet|foot|ft\b|')")?,
            slides: Regex::new(r"(?i)\b([0-9])\s*-?\s*slides?\b")?,
            slides_word: Regex::new(
                r"(?i)\b(single|one|double|two|triple|three|quad|four)[\s-]*slides?\b",
            )?,
            location: Regex::new(
                r"(?i)\b(?:located|location)\b\s*:?\s*(?:in\s+|at\s+)?([^.()\n|:]{2,80})",
            )?,
            label: Regex::new(
                r"(?i)(year|model|price|converter|slides|mileage|miles|length|location|chassis)\s*:",
            )?,
            quantity: Regex::new(r"(?i)\b([0-9][0-9,]*(?:\.[0-9]+)?)\s*(k)?\b")?,
            year_prefix: Regex::new(r"^((?:19|20)[0-9]{2})([A-Za-z])")?,
        })
    }
}
