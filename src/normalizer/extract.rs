//! Field extractors.
//!
//! Every extractor is a pure function over a text fragment. A miss, a
//! malformed number or an overflow all come back as `None`; nothing here
//! panics or returns an error.

use crate::normalizer::patterns::PatternLibrary;
use std::ops::Range;
use url::Url;

/// An extracted value together with the byte span it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted<T> {
    pub value: T,
    pub span: Range<usize>,
}

impl<T> Extracted<T> {
    pub fn new(value: T, span: Range<usize>) -> Self {
        Self { value, span }
    }
}

type Source<'a, T> = Box<dyn Fn() -> Option<T> + 'a>;

/// Ordered candidate sources for one field. Sources are tried lazily in the
/// order they were added; the first `Some` wins.
pub struct FirstMatch<'a, T> {
    sources: Vec<(&'static str, Source<'a, T>)>,
}

impl<'a, T> FirstMatch<'a, T> {
    pub fn new() -> Self {
        Self { sources: Vec::new() }
    }

    pub fn source(mut self, name: &'static str, f: impl Fn() -> Option<T> + 'a) -> Self {
        self.sources.push((name, Box::new(f)));
        self
    }

    /// Winning value and the name of the source that produced it.
    pub fn resolve_named(self) -> Option<(&'static str, T)> {
        self.sources
            .into_iter()
            .find_map(|(name, f)| f().map(|value| (name, value)))
    }

    pub fn resolve(self) -> Option<T> {
        self.resolve_named().map(|(_, value)| value)
    }
}

impl<T> Default for FirstMatch<'_, T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Price in whole currency units. `$450,000`, `$ 950K`, `$1.2M`.
/// A "call for pricing" phrase yields `sentinel`, even next to a dollar amount.
pub fn extract_price(lib: &PatternLibrary, text: &str, sentinel: u64) -> Option<Extracted<u64>> {
    lib.call_for_price
        .find(text)
        .map(|m| Extracted::new(sentinel, m.range()))
        .or_else(|| extract_dollar_amount(lib, text))
}

/// First parseable `$` amount in the text.
pub fn extract_dollar_amount(lib: &PatternLibrary, text: &str) -> Option<Extracted<u64>> {
    for caps in lib.price.captures_iter(text) {
        let (Some(whole), Some(number)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let suffix = caps.get(2).filter(|s| !s.as_str().is_empty());
        let multiplier = suffix
            .filter(|s| !text[s.end()..].starts_with(|c: char| c.is_alphanumeric()))
            .and_then(|s| match s.as_str() {
                "K" | "k" => Some(1_000),
                "M" | "m" => Some(1_000_000),
                _ => None,
            });
        let end = if multiplier.is_some() { whole.end() } else { number.end() };
        if let Some(value) = parse_scaled(number.as_str(), multiplier.unwrap_or(1)) {
            return Some(Extracted::new(value, whole.start()..end));
        }
    }
    None
}

/// Whether the text carries a "call for price" cue.
pub fn detect_call_for_price(lib: &PatternLibrary, text: &str) -> bool {
    lib.call_for_price.is_match(text)
}

/// Four-digit year in 1900..=2029, or `'22` style short year mapped to 20xx.
pub fn extract_year(lib: &PatternLibrary, text: &str) -> Option<Extracted<i32>> {
    let caps = lib.year.captures(text)?;
    let whole = caps.get(0)?;
    let year = match (caps.get(1), caps.get(2)) {
        (Some(full), _) => full.as_str().parse::<i32>().ok()?,
        (None, Some(short)) => 2000 + short.as_str().parse::<i32>().ok()?,
        (None, None) => return None,
    };
    Some(Extracted::new(year, whole.range()))
}

/// `12,345 miles`, `12K miles`, `85k-miles`.
pub fn extract_mileage(lib: &PatternLibrary, text: &str) -> Option<Extracted<u64>> {
    lib.mileage.captures_iter(text).find_map(|caps| {
        let whole = caps.get(0)?;
        let multiplier = if caps.get(2).is_some() { 1_000 } else { 1 };
        parse_scaled(caps.get(1)?.as_str(), multiplier).map(|v| Extracted::new(v, whole.range()))
    })
}

/// `45 foot`, `45-ft`, `40 feet`, `45'`.
pub fn extract_length(lib: &PatternLibrary, text: &str) -> Option<Extracted<u32>> {
    let caps = lib.length.captures(text)?;
    let feet = caps.get(1)?.as_str().parse::<u32>().ok()?;
    Some(Extracted::new(feet, caps.get(0)?.range()))
}

/// `2 slides`, `4-slide`, `double slide`. Leftmost mention wins.
pub fn extract_slides(lib: &PatternLibrary, text: &str) -> Option<Extracted<u32>> {
    let numeric = lib.slides.captures(text).and_then(|caps| {
        let count = caps.get(1)?.as_str().parse::<u32>().ok()?;
        Some(Extracted::new(count, caps.get(0)?.range()))
    });
    let worded = lib.slides_word.captures(text).and_then(|caps| {
        let count = match caps.get(1)?.as_str().to_lowercase().as_str() {
            "single" | "one" => 1,
            "double" | "two" => 2,
            "triple" | "three" => 3,
            "quad" | "four" => 4,
            _ => return None,
        };
        Some(Extracted::new(count, caps.get(0)?.range()))
    });
    match (numeric, worded) {
        (Some(n), Some(w)) => Some(if w.span.start < n.span.start { w } else { n }),
        (n, w) => n.or(w),
    }
}

/// Bare number with an optional `k`, for labelled values like `Mileage: 85k`.
pub fn extract_quantity(lib: &PatternLibrary, text: &str) -> Option<Extracted<u64>> {
    lib.quantity.captures_iter(text).find_map(|caps| {
        let whole = caps.get(0)?;
        let multiplier = if caps.get(2).is_some() { 1_000 } else { 1 };
        parse_scaled(caps.get(1)?.as_str(), multiplier).map(|v| Extracted::new(v, whole.range()))
    })
}

pub fn extract_converter(lib: &PatternLibrary, text: &str) -> Option<Extracted<String>> {
    lib.converters.detect(text)
}

pub fn extract_chassis_model(lib: &PatternLibrary, text: &str) -> Option<Extracted<String>> {
    lib.chassis_models.detect(text)
}

/// `Located in Naples, FL.` or `Location: Austin, TX`.
pub fn extract_location(lib: &PatternLibrary, text: &str) -> Option<Extracted<String>> {
    let caps = lib.location.captures(text)?;
    let m = caps.get(1)?;
    let raw = m.as_str();
    let trimmed = raw.trim_end_matches(|c: char| c == ',' || c.is_whitespace());
    let lead = trimmed.len() - trimmed.trim_start().len();
    let value = trimmed.trim_start();
    if value.is_empty() {
        return None;
    }
    let start = m.start() + lead;
    Some(Extracted::new(value.to_string(), start..start + value.len()))
}

/// Value of a `Label: value` pair. Values run to the next known label, a `|`
/// or a newline, so run-together cells like `Year:2005Model:H3-45-` split
/// correctly.
pub fn labeled_field(lib: &PatternLibrary, text: &str, label: &str) -> Option<Extracted<String>> {
    let labels: Vec<_> = lib.label.captures_iter(text).collect();
    for (i, caps) in labels.iter().enumerate() {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if !name.as_str().eq_ignore_ascii_case(label) {
            continue;
        }
        let start = whole.end();
        let next_label = labels
            .get(i + 1)
            .and_then(|c| c.get(0))
            .map_or(text.len(), |m| m.start());
        let end = text[start..next_label]
            .find(['|', '\n'])
            .map_or(next_label, |off| start + off);

        let slice = &text[start..end];
        let lead = slice.len() - slice.trim_start().len();
        let value = slice.trim();
        if value.is_empty() {
            continue;
        }
        let vstart = start + lead;
        return Some(Extracted::new(value.to_string(), vstart..vstart + value.len()));
    }
    None
}

/// Words in a detail page's file name, so the other extractors can run on
/// it. `.../2009Prevost_Liberty_H3-45.html` becomes `2009 Prevost Liberty H3-45`.
pub fn url_slug_text(lib: &PatternLibrary, url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let file = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let stem = file.rsplit_once('.').map_or(file, |(stem, _)| stem);

    let words: Vec<String> = stem
        .split(['_', '+'])
        .flat_map(|part| part.split("%20"))
        .filter(|w| !w.is_empty())
        .map(|w| lib.year_prefix.replace(w, "$1 $2").into_owned())
        .collect();
    let text = words.join(" ");
    (!text.is_empty()).then_some(text)
}

/// Parses `1,234.5` style numbers and applies a multiplier without going
/// through floating point. Fractional remainders are truncated.
fn parse_scaled(number: &str, multiplier: u64) -> Option<u64> {
    let cleaned: String = number.chars().filter(|c| *c != ',').collect();
    let (int_part, frac_part) = match cleaned.split_once('.') {
        Some((i, f)) => (i, f),
        None => (cleaned.as_str(), ""),
    };
    let whole = int_part.parse::<u64>().ok()?.checked_mul(multiplier)?;
    let frac_digits = &frac_part[..frac_part.len().min(6)];
    if frac_digits.is_empty() {
        return Some(whole);
    }
    let frac = frac_digits.parse::<u64>().ok()?;
    let scale = 10u64.pow(frac_digits.len() as u32);
    whole.checked_add(frac.checked_mul(multiplier)? / scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NormalizerConfig;

    const SENTINEL: u64 = 999_999;

    fn lib() -> PatternLibrary {
        PatternLibrary::new(&NormalizerConfig::default()).unwrap()
    }

    fn price(text: &str) -> Option<u64> {
        extract_price(&lib(), text, SENTINEL).map(|m| m.value)
    }

    #[test]
    fn test_price_with_commas() {
        assert_eq!(price("Asking $1,234,567 firm"), Some(1_234_567));
        assert_eq!(price("Price: $ 450,000"), Some(450_000));
    }

    #[test]
    fn test_price_suffixes() {
        assert_eq!(price("only $950K"), Some(950_000));
        assert_eq!(price("$1.2M OBO"), Some(1_200_000));
        assert_eq!(price("$875k."), Some(875_000));
    }

    #[test]
    fn test_price_suffix_needs_word_end() {
        // "M" here starts a word, it is not a millions suffix.
        assert_eq!(price("$950 Must sell"), Some(950));
        assert_eq!(price("$950Must"), Some(950));
    }

    #[test]
    fn test_price_keeps_cents_out() {
        assert_eq!(price("$450,000.00"), Some(450_000));
    }

    #[test]
    fn test_call_for_price_maps_to_sentinel() {
        assert_eq!(price("Please Call For Pricing"), Some(SENTINEL));
        assert_eq!(price("call for price"), Some(SENTINEL));
        assert!(detect_call_for_price(&lib(), "PLEASE CALL FOR PRICING"));
    }

    #[test]
    fn test_url_slug_text() {
        let lib = lib();
        assert_eq!(
            url_slug_text(&lib, "https://www.prevost-stuff.com/2009Prevost_Liberty_Elegant_Lady_H3-45.html").as_deref(),
            Some("2009 Prevost Liberty Elegant Lady H3-45")
        );
        assert_eq!(url_slug_text(&lib, "https://www.prevost-stuff.com/").as_deref(), None);
        assert_eq!(url_slug_text(&lib, "not a url"), None);

        let text = url_slug_text(&lib, "https://x.test/forsale/2012Prevost_Marathon_X3-45.html").unwrap();
        assert_eq!(extract_year(&lib, &text).unwrap().value, 2012);
        assert_eq!(extract_converter(&lib, &text).unwrap().value, "Marathon");
        assert_eq!(extract_chassis_model(&lib, &text).unwrap().value, "X3-45");
    }

    #[test]
    fn test_call_cue_beats_dollar_amount() {
        assert_eq!(price("Please Call For Pricing - was $500,000"), Some(SENTINEL));
        assert_eq!(price("Call for pricing, was $500,000"), Some(SENTINEL));
    }

    #[test]
    fn test_malformed_price_is_none() {
        assert_eq!(price("$abc"), None);
        assert_eq!(price("no price here"), None);
        assert_eq!(price("$99999999999999999999999"), None);
        assert_eq!(price("$99999999999999M"), None);
    }

    #[test]
    fn test_price_span_covers_match() {
        let m = extract_price(&lib(), "Now $950K!", SENTINEL).unwrap();
        assert_eq!(m.span, 4..9);
    }

    #[test]
    fn test_year_forms() {
        let lib = lib();
        assert_eq!(extract_year(&lib, "2022 Prevost").unwrap().value, 2022);
        assert_eq!(extract_year(&lib, "Marathon '22 H3-45").unwrap().value, 2022);
        assert_eq!(extract_year(&lib, "built 1998, refit 2015").unwrap().value, 1998);
        assert!(extract_year(&lib, "2031 model").is_none());
        assert!(extract_year(&lib, "stock 12022").is_none());
    }

    #[test]
    fn test_mileage() {
        let lib = lib();
        assert_eq!(extract_mileage(&lib, "only 12,345 miles").unwrap().value, 12_345);
        assert_eq!(extract_mileage(&lib, "12K miles").unwrap().value, 12_000);
        assert_eq!(extract_mileage(&lib, "85k-miles").unwrap().value, 85_000);
        assert_eq!(extract_mileage(&lib, "12.5K Miles").unwrap().value, 12_500);
        assert!(extract_mileage(&lib, "low mileage").is_none());
    }

    #[test]
    fn test_length() {
        let lib = lib();
        assert_eq!(extract_length(&lib, "45 foot coach").unwrap().value, 45);
        assert_eq!(extract_length(&lib, "a 40-ft shell").unwrap().value, 40);
        assert_eq!(extract_length(&lib, "45' long").unwrap().value, 45);
        assert_eq!(extract_length(&lib, "45.5 Feet").unwrap().value, 45);
        assert!(extract_length(&lib, "2009 Prevost").is_none());
    }

    #[test]
    fn test_slides() {
        let lib = lib();
        assert_eq!(extract_slides(&lib, "4 slides").unwrap().value, 4);
        assert_eq!(extract_slides(&lib, "3-slide Marathon").unwrap().value, 3);
        assert_eq!(extract_slides(&lib, "Double Slide").unwrap().value, 2);
        assert_eq!(extract_slides(&lib, "quad slide, not 2 slides").unwrap().value, 4);
        assert!(extract_slides(&lib, "12 slides").is_none());
        assert!(extract_slides(&lib, "no slideouts").is_none());
    }

    #[test]
    fn test_quantity() {
        let lib = lib();
        assert_eq!(extract_quantity(&lib, " 120,000").unwrap().value, 120_000);
        assert_eq!(extract_quantity(&lib, "85k").unwrap().value, 85_000);
        assert!(extract_quantity(&lib, "unknown").is_none());
    }

    #[test]
    fn test_chassis_prefers_most_specific() {
        let lib = lib();
        let m = extract_chassis_model(&lib, "This H3 shell is an H3-45 VIP").unwrap();
        assert_eq!(m.value, "H3-45");
        let m = extract_chassis_model(&lib, "Prevost H3-45 with H3 styling").unwrap();
        assert_eq!(m.value, "H3-45");
    }

    #[test]
    fn test_converter_word_boundaries() {
        let lib = lib();
        assert_eq!(extract_converter(&lib, "2009 LIBERTY Elegant Lady").unwrap().value, "Liberty");
        assert_eq!(
            extract_converter(&lib, "2005 Prevost Country Coach").unwrap().value,
            "Country Coach"
        );
        assert!(extract_converter(&lib, "Libertyville estate").is_none());
    }

    #[test]
    fn test_converter_priority_puts_manufacturer_last() {
        let lib = lib();
        assert_eq!(extract_converter(&lib, "2012 Prevost Newell").unwrap().value, "Newell");
    }

    #[test]
    fn test_location() {
        let lib = lib();
        let m = extract_location(&lib, "Coach is located in Naples, FL. Call today").unwrap();
        assert_eq!(m.value, "Naples, FL");
        assert_eq!(&"Coach is located in Naples, FL. Call today"[m.span.clone()], "Naples, FL");
        assert_eq!(extract_location(&lib, "Location: Austin, TX").unwrap().value, "Austin, TX");
        assert!(extract_location(&lib, "no place given").is_none());
    }

    #[test]
    fn test_labeled_fields_in_run_together_cell() {
        let lib = lib();
        let text = "Year:2005Model:H3-45-Price:$450,000";
        assert_eq!(labeled_field(&lib, text, "Year").unwrap().value, "2005");
        assert_eq!(labeled_field(&lib, text, "model").unwrap().value, "H3-45-");
        assert_eq!(labeled_field(&lib, text, "Price").unwrap().value, "$450,000");
        assert!(labeled_field(&lib, text, "Converter").is_none());
    }

    #[test]
    fn test_labeled_field_stops_at_pipe() {
        let lib = lib();
        let text = "Converter: Marathon | Slides: 2";
        let m = labeled_field(&lib, text, "Converter").unwrap();
        assert_eq!(m.value, "Marathon");
        assert_eq!(&text[m.span], "Marathon");
        assert_eq!(labeled_field(&lib, text, "Slides").unwrap().value, "2");
    }

    #[test]
    fn test_first_match_stops_at_first_hit() {
        use std::cell::Cell;
        let calls = Cell::new(0);
        let winner = FirstMatch::new()
            .source("label", || {
                calls.set(calls.get() + 1);
                None
            })
            .source("title", || {
                calls.set(calls.get() + 1);
                Some(1)
            })
            .source("description", || {
                calls.set(calls.get() + 1);
                Some(2)
            })
            .resolve_named();
        assert_eq!(winner, Some(("title", 1)));
        assert_eq!(calls.get(), 2);
    }
}
