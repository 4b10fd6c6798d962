use rv_scout::config::{AppConfig, load_config};
use rv_scout::model::{ImageSet, ListingRecord, RawListing};
use rv_scout::normalizer::Normalizer;
use rv_scout::normalizer::merge::{ListingIndex, MergeOutcome, MergePolicy, TitleOrYearConverter};
use rv_scout::parser::{Parser, PrevostParser};
use rv_scout::scraper::{Scraper, ScraperImpl};
use rv_scout::storage::json_file::{load_listings, save_listings};
use rv_scout::storage::{ImageStore, SqliteStorage};

use chrono::Utc;
use futures::future::join_all;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, Semaphore};
use tracing::{error, info, warn};

const DEFAULT_CONFIG: &str = "config.json";
const DEBUG_HTML_DIR: &str = "logs/html";

/// Everything a listing needs on its way from HTML to stored record.
struct Pipeline {
    scraper: ScraperImpl,
    parser: PrevostParser,
    normalizer: Normalizer,
    images: ImageStore,
    /// Single writer: workers upsert one at a time.
    storage: Mutex<SqliteStorage>,
    keys: TitleOrYearConverter,
    policy: MergePolicy,
}

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt::init();

    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Panic occurred: {:?}", panic_info);
    }));

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("scrape");

    match command {
        "scrape" => {
            let config_path = args.get(1).map(String::as_str).unwrap_or(DEFAULT_CONFIG);
            let Some(config) = read_config(config_path) else { return };
            run_scrape(config).await;
        }
        "import" => {
            let Some(file) = args.get(1) else {
                error!("Usage: rv-scout import <file> [config]");
                return;
            };
            let config_path = args.get(2).map(String::as_str).unwrap_or(DEFAULT_CONFIG);
            let Some(config) = read_config(config_path) else { return };
            run_import(&config, file);
        }
        other => {
            error!("Unknown command '{}'. Usage: rv-scout [scrape [config] | import <file> [config]]", other);
        }
    }
}

fn read_config(path: &str) -> Option<AppConfig> {
    match load_config(path) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            error!("Config load error ({}): {}", path, e);
            None
        }
    }
}

fn open_storage(config: &AppConfig) -> Option<SqliteStorage> {
    match SqliteStorage::new(&config.database_path) {
        Ok(s) => Some(s),
        Err(e) => {
            error!("Failed to initialize storage: {:?}", e);
            None
        }
    }
}

async fn run_scrape(config: AppConfig) {
    let normalizer = match Normalizer::new(config.normalizer.clone()) {
        Ok(n) => n,
        Err(e) => {
            error!("Invalid normalizer configuration: {}", e);
            return;
        }
    };
    let scraper = match ScraperImpl::new(&config) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to build HTTP client: {}", e);
            return;
        }
    };
    let parser = match PrevostParser::new(&config.detail_base_url) {
        Ok(p) => p,
        Err(e) => {
            error!("Invalid detail base url: {}", e);
            return;
        }
    };
    info!(
        "Normalizer ready: {} converters, {} chassis models",
        normalizer.patterns().converters.len(),
        normalizer.patterns().chassis_models.len()
    );
    let Some(storage) = open_storage(&config) else { return };

    let pipeline = Pipeline {
        scraper,
        parser,
        normalizer,
        images: ImageStore::new(&config.image_dir, &config.image_public_prefix),
        storage: Mutex::new(storage),
        keys: TitleOrYearConverter::new(&config.normalizer),
        policy: MergePolicy::new(&config.normalizer),
    };

    info!("Fetching listing page {}", config.listings_url);
    let html = match pipeline.scraper.fetch_page(&config.listings_url).await {
        Ok(html) => html,
        Err(e) => {
            error!("Scraper error: {}", e);
            return;
        }
    };

    let mut raw_listings = match pipeline.parser.parse(&html) {
        Ok(listings) => listings,
        Err(e) => {
            error!("Parse error: {}", e);
            match save_debug_html(Path::new(DEBUG_HTML_DIR), &html, "listings") {
                Ok(path) => info!("Saved page for inspection: {}", path.display()),
                Err(e) => warn!("Could not save page for inspection: {}", e),
            }
            return;
        }
    };
    raw_listings.truncate(config.max_listings);
    info!("Processing {} listings (concurrency {})", raw_listings.len(), config.max_concurrency);

    let semaphore = Semaphore::new(config.max_concurrency.max(1));
    let (semaphore, pipeline) = (&semaphore, &pipeline);
    let tasks: Vec<_> = raw_listings
        .into_iter()
        .map(|raw| async move {
            let _permit = semaphore.acquire().await.ok();
            process_listing(raw, pipeline).await
        })
        .collect();
    let results = join_all(tasks).await;

    let mut index = ListingIndex::with_defaults(&config.normalizer);
    let (mut inserted, mut merged) = (0, 0);
    for (record, outcome) in results {
        match outcome {
            Some(MergeOutcome::New) => inserted += 1,
            Some(MergeOutcome::Existing) => merged += 1,
            None => {}
        }
        index.upsert(record);
    }
    info!("Stored listings: {} new, {} merged", inserted, merged);

    match save_listings(&config.output_file, index.records()) {
        Ok(()) => info!("Wrote {} listings to {}", index.len(), config.output_file),
        Err(e) => error!("Failed to write {}: {}", config.output_file, e),
    }
}

/// Detail page, images, assembly, storage. Collaborator failures degrade the
/// record instead of dropping it; a failed write yields no outcome.
async fn process_listing(mut raw: RawListing, pipeline: &Pipeline) -> (ListingRecord, Option<MergeOutcome>) {
    if let Some(url) = raw.detail_url.clone() {
        match pipeline.scraper.fetch_page(&url).await {
            Ok(html) => match pipeline.parser.parse_detail(&html, &url) {
                Ok(detail) => detail.merge_into(&mut raw),
                Err(e) => warn!("Detail parse error for {}: {}", url, e),
            },
            Err(e) => warn!("Detail fetch error for {}: {}", url, e),
        }
    }

    let plan = pipeline.normalizer.plan_images(&raw.image_urls);
    let prefix = raw.title.clone().unwrap_or_else(|| pipeline.normalizer.titles().generic_title().to_string());

    let mut images = ImageSet::default();
    if let Some(url) = &plan.primary {
        images.featured = download_image(pipeline, url, &prefix).await;
    }
    for url in &plan.additional {
        if let Some(path) = download_image(pipeline, url, &prefix).await {
            images.additional.push(path);
        }
    }

    let record = pipeline.normalizer.assemble(&raw, &images);
    info!(
        "Normalized '{}' (price {:?}, year {:?}, {} images)",
        record.title,
        record.price,
        record.year,
        record.featured_image_path.iter().count() + record.additional_image_paths.len()
    );

    let outcome = pipeline
        .storage
        .lock()
        .await
        .upsert_listing(&record, &pipeline.keys, &pipeline.policy);
    match outcome {
        Ok(outcome) => (record, Some(outcome)),
        Err(e) => {
            warn!("DB save error for '{}': {:?}", record.title, e);
            (record, None)
        }
    }
}

async fn download_image(pipeline: &Pipeline, url: &str, prefix: &str) -> Option<String> {
    let (bytes, content_type) = match pipeline.scraper.fetch_bytes(url).await {
        Ok(fetched) => fetched,
        Err(e) => {
            warn!("Image download failed for {}: {}", url, e);
            return None;
        }
    };
    match pipeline.images.save(&bytes, content_type.as_deref(), prefix).await {
        Ok(path) => Some(path),
        Err(e) => {
            warn!("Image save failed for {}: {:?}", url, e);
            None
        }
    }
}

fn run_import(config: &AppConfig, file: &str) {
    let listings = match load_listings(file) {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to read {}: {}", file, e);
            return;
        }
    };
    let Some(mut storage) = open_storage(config) else { return };

    let keys = TitleOrYearConverter::new(&config.normalizer);
    let policy = MergePolicy::new(&config.normalizer);
    let (mut inserted, mut merged, mut failed) = (0, 0, 0);
    for listing in &listings {
        match storage.upsert_listing(listing, &keys, &policy) {
            Ok(MergeOutcome::New) => inserted += 1,
            Ok(MergeOutcome::Existing) => merged += 1,
            Err(e) => {
                failed += 1;
                warn!("Import failed for '{}': {:?}", listing.title, e);
            }
        }
    }
    info!(
        "Imported {} listings from {}: {} new, {} merged, {} failed",
        listings.len(),
        file,
        inserted,
        merged,
        failed
    );
}

/// Writes a page that failed to parse under `dir`, stamped with the time.
fn save_debug_html(dir: &Path, html: &str, name: &str) -> std::io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let stamp = Utc::now().format("%Y%m%d-%H%M%S");
    let path = dir.join(format!("{}-{}.html", name.replace(' ', "_"), stamp));
    fs::write(&path, html)?;
    Ok(path)
}
