// Record Assembler: fragments + image paths -> ListingRecord
use crate::model::{ImagePlan, ImageSet, ListingRecord, RawListing};
use crate::normalizer::Normalizer;
use crate::normalizer::extract::{
    FirstMatch, detect_call_for_price, extract_chassis_model, extract_converter,
    extract_dollar_amount, extract_length, extract_location, extract_mileage, extract_price,
    extract_quantity, extract_slides, extract_year, labeled_field, url_slug_text,
};
use crate::normalizer::patterns::Vocabulary;
use crate::normalizer::title::{TitleParts, synthesize_description};
use crate::utils::collapse_whitespace;
use tracing::debug;

/// Image URLs containing any of these are page furniture, not photos.
const SKIPPED_IMAGE_MARKERS: [&str; 5] = ["icon", "button", "thumb", "logo", "banner"];

impl Normalizer {
    /// Builds the canonical record for one listing. Never fails: anything
    /// that can't be extracted ends up as a default or a null.
    pub fn assemble(&self, raw: &RawListing, images: &ImageSet) -> ListingRecord {
        let lib = &self.patterns;
        let cfg = &self.config;
        let sentinel = cfg.call_for_price_sentinel;

        let title = raw.title.as_deref().map(str::trim).filter(|t| !t.is_empty());
        let description = raw
            .description
            .as_deref()
            .map(collapse_whitespace)
            .unwrap_or_default();
        let desc = description.as_str();
        let slug = raw.detail_url.as_deref().and_then(|u| url_slug_text(lib, u));
        let slug = slug.as_deref();
        let labeled = |label: &str| {
            raw.details
                .iter()
                .find_map(|cell| labeled_field(lib, cell, label))
                .map(|m| m.value)
        };

        let price = FirstMatch::new()
            .source("label", || {
                labeled("Price").and_then(|v| extract_price(lib, &v, sentinel)).map(|m| m.value)
            })
            .source("price_text", || {
                raw.price_text
                    .as_deref()
                    .and_then(|t| extract_price(lib, t, sentinel))
                    .map(|m| m.value)
            })
            .source("title", || title.and_then(|t| extract_dollar_amount(lib, t)).map(|m| m.value))
            .source("description", || extract_price(lib, desc, sentinel).map(|m| m.value))
            .resolve()
            .or_else(|| self.has_price_cue(raw, desc).then_some(sentinel));

        let in_range = |y: &i32| (1900..=self.max_year).contains(y);
        let year = FirstMatch::new()
            .source("label", || {
                labeled("Year").and_then(|v| extract_year(lib, &v)).map(|m| m.value).filter(in_range)
            })
            .source("title", || title.and_then(|t| extract_year(lib, t)).map(|m| m.value).filter(in_range))
            .source("url", || slug.and_then(|t| extract_year(lib, t)).map(|m| m.value).filter(in_range))
            .source("description", || extract_year(lib, desc).map(|m| m.value).filter(in_range))
            .resolve();

        let converter = match labeled("Converter") {
            Some(value) => canonical_or_null("converter", &lib.converters, &value),
            None => FirstMatch::new()
                .source("title", || title.and_then(|t| extract_converter(lib, t)).map(|m| m.value))
                .source("url", || slug.and_then(|t| extract_converter(lib, t)).map(|m| m.value))
                .source("description", || extract_converter(lib, desc).map(|m| m.value))
                .resolve(),
        };

        let chassis_model = match labeled("Chassis").or_else(|| labeled("Model")) {
            Some(value) => canonical_or_null("chassis model", &lib.chassis_models, &value),
            None => FirstMatch::new()
                .source("title", || title.and_then(|t| extract_chassis_model(lib, t)).map(|m| m.value))
                .source("url", || slug.and_then(|t| extract_chassis_model(lib, t)).map(|m| m.value))
                .source("description", || extract_chassis_model(lib, desc).map(|m| m.value))
                .resolve(),
        };

        let mileage = FirstMatch::new()
            .source("label", || {
                labeled("Mileage")
                    .or_else(|| labeled("Miles"))
                    .and_then(|v| extract_mileage(lib, &v).or_else(|| extract_quantity(lib, &v)))
                    .map(|m| m.value)
            })
            .source("title", || title.and_then(|t| extract_mileage(lib, t)).map(|m| m.value))
            .source("description", || extract_mileage(lib, desc).map(|m| m.value))
            .resolve();

        let length_feet = FirstMatch::new()
            .source("label", || {
                labeled("Length").and_then(|v| {
                    extract_length(lib, &v)
                        .map(|m| m.value)
                        .or_else(|| extract_quantity(lib, &v).and_then(|m| to_u32(m.value)))
                })
            })
            .source("title", || title.and_then(|t| extract_length(lib, t)).map(|m| m.value))
            .source("description", || extract_length(lib, desc).map(|m| m.value))
            .resolve();

        let slide_count = FirstMatch::new()
            .source("label", || {
                labeled("Slides").and_then(|v| {
                    extract_slides(lib, &v)
                        .map(|m| m.value)
                        .or_else(|| extract_quantity(lib, &v).and_then(|m| to_u32(m.value)))
                })
            })
            .source("title", || title.and_then(|t| extract_slides(lib, t)).map(|m| m.value))
            .source("description", || extract_slides(lib, desc).map(|m| m.value))
            .resolve()
            .unwrap_or(0);

        let location = FirstMatch::new()
            .source("label", || labeled("Location").map(|v| collapse_whitespace(&v)))
            .source("description", || extract_location(lib, desc).map(|m| m.value))
            .resolve()
            .unwrap_or_else(|| cfg.default_location.clone());

        let manufacturer = Some(cfg.default_manufacturer.trim())
            .filter(|m| !m.is_empty())
            .map(str::to_string);

        let (featured_image_path, additional_image_paths) = arrange_images(images);

        let title = self.titles.resolve(
            title,
            TitleParts {
                year,
                converter: converter.as_deref(),
                chassis_model: chassis_model.as_deref(),
            },
        );

        let mut record = ListingRecord {
            title,
            description,
            price,
            year,
            manufacturer,
            converter,
            chassis_model,
            mileage,
            length_feet,
            slide_count: Some(slide_count),
            location,
            featured_image_path,
            additional_image_paths,
        };
        if record.description.is_empty() && cfg.synthesize_description {
            record.description = synthesize_description(&record, sentinel);
        }
        record
    }

    /// Splits scraped image URLs into the primary image and the rest.
    /// Page furniture, query strings and repeats are dropped.
    pub fn plan_images<S: AsRef<str>>(&self, urls: &[S]) -> ImagePlan {
        let mut kept: Vec<String> = Vec::new();
        for url in urls {
            let url = url.as_ref().trim();
            let url = url.split_once('?').map_or(url, |(base, _)| base);
            if url.is_empty() || kept.iter().any(|k| k == url) {
                continue;
            }
            let lower = url.to_lowercase();
            if SKIPPED_IMAGE_MARKERS.iter().any(|m| lower.contains(m)) {
                continue;
            }
            kept.push(url.to_string());
        }

        let mut kept = kept.into_iter();
        ImagePlan {
            primary: kept.next(),
            additional: kept.take(self.config.max_additional_images).collect(),
        }
    }

    fn has_price_cue(&self, raw: &RawListing, description: &str) -> bool {
        let lib = &self.patterns;
        raw.price_text.iter().chain(raw.title.iter()).chain(raw.details.iter())
            .any(|t| detect_call_for_price(lib, t))
            || detect_call_for_price(lib, description)
    }
}

fn canonical_or_null(field: &str, vocab: &Vocabulary, value: &str) -> Option<String> {
    let canonical = vocab.canonicalize(value);
    if canonical.is_none() {
        debug!(field, value, "labelled value not in vocabulary");
    }
    canonical
}

fn to_u32(value: u64) -> Option<u32> {
    u32::try_from(value).ok()
}

/// Featured path plus de-duplicated additional paths. Without a featured
/// path, the first additional one is promoted.
fn arrange_images(images: &ImageSet) -> (Option<String>, Vec<String>) {
    let mut featured = images
        .featured
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string);

    let mut additional: Vec<String> = Vec::new();
    for path in &images.additional {
        let path = path.trim();
        if path.is_empty() || featured.as_deref() == Some(path) || additional.iter().any(|a| a == path) {
            continue;
        }
        additional.push(path.to_string());
    }

    if featured.is_none() && !additional.is_empty() {
        featured = Some(additional.remove(0));
    }
    (featured, additional)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NormalizerConfig;

    fn normalizer() -> Normalizer {
        Normalizer::with_max_year(NormalizerConfig::default(), 2027).unwrap()
    }

    fn raw(title: Option<&str>, description: Option<&str>, details: &[&str]) -> RawListing {
        RawListing {
            title: title.map(String::from),
            description: description.map(String::from),
            details: details.iter().map(|d| d.to_string()).collect(),
            ..RawListing::default()
        }
    }

    #[test]
    fn test_table_row_labels() {
        let n = normalizer();
        let record = n.assemble(
            &raw(
                Some("2005 Marathon H3-45 Double Slide"),
                None,
                &["Year:2005Model:H3-45-Price:$450,000", "Converter:MarathonSlides:2"],
            ),
            &ImageSet::default(),
        );
        assert_eq!(record.price, Some(450_000));
        assert_eq!(record.year, Some(2005));
        assert_eq!(record.chassis_model.as_deref(), Some("H3-45"));
        assert_eq!(record.converter.as_deref(), Some("Marathon"));
        assert_eq!(record.slide_count, Some(2));
        assert_eq!(record.manufacturer.as_deref(), Some("Prevost"));
        assert_eq!(record.location, "United States");
        assert_eq!(record.title, "2005 Marathon H3-45 Double Slide");
    }

    #[test]
    fn test_untitled_listing_from_description() {
        let n = normalizer();
        let record = n.assemble(
            &raw(
                None,
                Some("Beautiful 2009 Liberty Elegant Lady H3-45 with 2 slides,\n 45 foot, 120,000 miles. Located in Naples, FL. Call Bob."),
                &[],
            ),
            &ImageSet::default(),
        );
        assert_eq!(record.title, "2009 Liberty H3-45 Prevost");
        assert_eq!(record.year, Some(2009));
        assert_eq!(record.slide_count, Some(2));
        assert_eq!(record.length_feet, Some(45));
        assert_eq!(record.mileage, Some(120_000));
        assert_eq!(record.location, "Naples, FL");
        assert_eq!(record.price, None);
        assert!(!record.description.contains('\n'));
    }

    #[test]
    fn test_slides_default_to_zero() {
        let record = normalizer().assemble(&raw(Some("2009 Liberty H3-45"), None, &[]), &ImageSet::default());
        assert_eq!(record.slide_count, Some(0));
    }

    #[test]
    fn test_call_for_price_cue_sets_sentinel() {
        let n = normalizer();
        let record = n.assemble(
            &raw(Some("2012 Marathon X3-45"), Some("Please call for pricing."), &[]),
            &ImageSet::default(),
        );
        assert_eq!(record.price, Some(999_999));
        assert!(record.is_call_for_price(999_999));

        let record = n.assemble(&raw(Some("2012 Marathon X3-45"), Some("Nice coach."), &[]), &ImageSet::default());
        assert_eq!(record.price, None);
    }

    #[test]
    fn test_malformed_price_text_is_null() {
        let mut input = raw(Some("2012 Marathon X3-45"), None, &[]);
        input.price_text = Some("Price: $abc".into());
        let record = normalizer().assemble(&input, &ImageSet::default());
        assert_eq!(record.price, None);
    }

    #[test]
    fn test_price_text_suffix() {
        let mut input = raw(Some("2012 Marathon X3-45"), None, &[]);
        input.price_text = Some("$ 1.2M".into());
        assert_eq!(normalizer().assemble(&input, &ImageSet::default()).price, Some(1_200_000));
    }

    #[test]
    fn test_price_from_description_only() {
        let record = normalizer().assemble(
            &raw(Some("2009 Liberty H3-45"), Some("Asking $450,000 firm."), &[]),
            &ImageSet::default(),
        );
        assert_eq!(record.price, Some(450_000));
    }

    #[test]
    fn test_price_text_beats_description() {
        let mut input = raw(Some("2009 Liberty H3-45"), Some("New engine, $40,000 of work."), &[]);
        input.price_text = Some("$450,000".into());
        assert_eq!(normalizer().assemble(&input, &ImageSet::default()).price, Some(450_000));
    }

    #[test]
    fn test_call_cue_wins_in_price_text() {
        let mut input = raw(Some("2009 Liberty H3-45"), None, &[]);
        input.price_text = Some("Please Call For Pricing - was $500,000".into());
        assert_eq!(normalizer().assemble(&input, &ImageSet::default()).price, Some(999_999));
    }

    #[test]
    fn test_fields_from_detail_url() {
        let mut input = raw(None, Some("Beautiful coach, fully loaded."), &[]);
        input.detail_url = Some("https://www.prevost-stuff.com/2009Prevost_Liberty_Elegant_Lady_H3-45.html".into());
        let record = normalizer().assemble(&input, &ImageSet::default());
        assert_eq!(record.year, Some(2009));
        assert_eq!(record.converter.as_deref(), Some("Liberty"));
        assert_eq!(record.chassis_model.as_deref(), Some("H3-45"));
        assert_eq!(record.title, "2009 Liberty H3-45 Prevost");
    }

    #[test]
    fn test_title_beats_detail_url() {
        let mut input = raw(Some("2011 Marathon X3-45"), None, &[]);
        input.detail_url = Some("https://www.prevost-stuff.com/2009Prevost_Liberty_H3-45.html".into());
        let record = normalizer().assemble(&input, &ImageSet::default());
        assert_eq!(record.year, Some(2011));
        assert_eq!(record.converter.as_deref(), Some("Marathon"));
    }

    #[test]
    fn test_label_beats_title() {
        let record = normalizer().assemble(
            &raw(Some("2009 Marathon XLII"), None, &["Year:2011"]),
            &ImageSet::default(),
        );
        assert_eq!(record.year, Some(2011));
    }

    #[test]
    fn test_title_beats_description() {
        let record = normalizer().assemble(
            &raw(Some("2009 Marathon XLII"), Some("Refit by Liberty in 2015"), &[]),
            &ImageSet::default(),
        );
        assert_eq!(record.year, Some(2009));
        assert_eq!(record.converter.as_deref(), Some("Marathon"));
    }

    #[test]
    fn test_unknown_labelled_converter_is_null() {
        let record = normalizer().assemble(
            &raw(Some("Liberty styled coach"), None, &["Converter: Homebuilt"]),
            &ImageSet::default(),
        );
        assert_eq!(record.converter, None);
    }

    #[test]
    fn test_year_above_range_is_dropped() {
        let record = normalizer().assemble(
            &raw(Some("Future Marathon"), Some("Model year 2029"), &[]),
            &ImageSet::default(),
        );
        assert_eq!(record.year, None);
    }

    #[test]
    fn test_empty_input_gets_generic_title() {
        let record = normalizer().assemble(&raw(Some("   "), None, &[]), &ImageSet::default());
        assert_eq!(record.title, "Luxury RV Coach");
        assert_eq!(record.description, "");
        assert_eq!(record.converter, None);
        assert_eq!(record.slide_count, Some(0));
    }

    #[test]
    fn test_featured_image_not_repeated() {
        let images = ImageSet {
            featured: Some("/images/a.jpg".into()),
            additional: vec!["/images/a.jpg".into(), "/images/b.jpg".into(), "/images/b.jpg".into(), "".into()],
        };
        let record = normalizer().assemble(&raw(Some("2009 Liberty H3-45"), None, &[]), &images);
        assert_eq!(record.featured_image_path.as_deref(), Some("/images/a.jpg"));
        assert_eq!(record.additional_image_paths, vec!["/images/b.jpg".to_string()]);
    }

    #[test]
    fn test_first_additional_promoted_without_featured() {
        let images = ImageSet {
            featured: None,
            additional: vec!["/images/a.jpg".into(), "/images/b.jpg".into()],
        };
        let record = normalizer().assemble(&raw(Some("2009 Liberty H3-45"), None, &[]), &images);
        assert_eq!(record.featured_image_path.as_deref(), Some("/images/a.jpg"));
        assert_eq!(record.additional_image_paths, vec!["/images/b.jpg".to_string()]);
    }

    #[test]
    fn test_plan_images() {
        let n = normalizer();
        let urls = [
            "https://x.test/img/icon_home.png",
            "https://x.test/img/coach1.jpg?w=200",
            "https://x.test/img/coach1.jpg",
            "https://x.test/img/Thumb_coach1.jpg",
            "https://x.test/img/coach2.jpg",
            "https://x.test/img/coach3.jpg",
            "https://x.test/img/coach4.jpg",
            "https://x.test/img/coach5.jpg",
            "https://x.test/img/coach6.jpg",
            "https://x.test/img/coach7.jpg",
        ];
        let plan = n.plan_images(&urls);
        assert_eq!(plan.primary.as_deref(), Some("https://x.test/img/coach1.jpg"));
        assert_eq!(plan.additional.len(), 5);
        assert_eq!(plan.additional[0], "https://x.test/img/coach2.jpg");
        assert!(!plan.additional.iter().any(|u| u.contains("coach7")));
    }

    #[test]
    fn test_synthesized_description_when_enabled() {
        let cfg = NormalizerConfig { synthesize_description: true, ..NormalizerConfig::default() };
        let n = Normalizer::with_max_year(cfg, 2027).unwrap();
        let record = n.assemble(&raw(Some("2009 Liberty H3-45"), None, &[]), &ImageSet::default());
        assert_eq!(
            record.description,
            "Year: 2009 | Manufacturer: Prevost | Converter: Liberty | Chassis Model: H3-45"
        );
    }
}
