// prevost-stuff.com HTML parsing: list pages and detail pages
use crate::model::{ParserError, RawListing};
use crate::normalizer::extract::FirstMatch;
use crate::parser::Parser;
use crate::utils::collapse_whitespace;
use ::scraper::{ElementRef, Html, Selector};
use regex::Regex;
use std::collections::HashSet;
use tracing::debug;
use url::Url;

/// Extra text and images found on a listing's own page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailPage {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price_text: Option<String>,
    pub image_urls: Vec<String>,
}

impl DetailPage {
    /// Fills gaps in `listing`. List-page values win, except that a longer
    /// description replaces a shorter one.
    pub fn merge_into(self, listing: &mut RawListing) {
        if listing.title.is_none() {
            listing.title = self.title;
        }
        let longer = match (&listing.description, &self.description) {
            (None, Some(_)) => true,
            (Some(old), Some(new)) => new.len() > old.len(),
            _ => false,
        };
        if longer {
            listing.description = self.description;
        }
        if listing.price_text.is_none() {
            listing.price_text = self.price_text;
        }
        for url in self.image_urls {
            if !listing.image_urls.contains(&url) {
                listing.image_urls.push(url);
            }
        }
    }
}

/// Selectors for the listing index page, compiled once.
struct ListSelectors {
    row: Selector,
    heading: Selector,
    table: Selector,
    tr: Selector,
    th: Selector,
    red_price: Selector,
    img: Selector,
    link: Selector,
}

impl ListSelectors {
    fn new() -> Result<Self, ParserError> {
        Ok(Self {
            row: selector("div.row")?,
            heading: selector("h5")?,
            table: selector("table")?,
            tr: selector("tr")?,
            th: selector("th")?,
            red_price: selector(".redprice, .redprice1")?,
            img: selector("img")?,
            link: selector("a[href]")?,
        })
    }
}

pub struct PrevostParser {
    base_url: Url,
    list: ListSelectors,
    /// Coach pages are named like `2009Prevost_Liberty_H3-45.html`.
    coach_page: Regex,
}

impl PrevostParser {
    pub fn new(base_url: &str) -> Result<Self, ParserError> {
        let base_url = Url::parse(base_url).map_err(|e| ParserError::HtmlParseError(e.to_string()))?;
        let coach_page =
            Regex::new(r"Prevost[^/]*\.html?$").map_err(|e| ParserError::HtmlParseError(e.to_string()))?;
        Ok(Self { base_url, list: ListSelectors::new()?, coach_page })
    }

    /// Parses a listing's detail page. Relative links resolve against
    /// `page_url`.
    pub fn parse_detail(&self, html: &str, page_url: &str) -> Result<DetailPage, ParserError> {
        let document = Html::parse_document(html);
        let page = Url::parse(page_url)
            .or_else(|_| self.base_url.join(page_url))
            .map_err(|e| ParserError::HtmlParseError(e.to_string()))?;

        let heading = selector("h2, h1")?;
        let detail_desc = selector("div.detail-description")?;
        let blurbs = selector(".blackname, .Descrip21")?;
        let paragraphs = selector("p")?;
        let divs = selector("div")?;
        let price = selector(".redprice, .redprice1")?;
        let images = selector("img")?;

        let title = document.select(&heading).map(element_text).find(|t| !t.is_empty());

        let description = FirstMatch::new()
            .source("detail-description", || {
                document.select(&detail_desc).map(element_text).find(|t| !t.is_empty())
            })
            .source("blurbs", || {
                let joined = document
                    .select(&blurbs)
                    .map(element_text)
                    .filter(|t| t.len() > 20)
                    .collect::<Vec<_>>()
                    .join(" ");
                (!joined.is_empty()).then_some(joined)
            })
            .source("paragraph", || document.select(&paragraphs).map(element_text).find(|t| t.len() > 100))
            .source("div", || {
                document
                    .select(&divs)
                    .map(element_text)
                    .find(|t| t.len() > 100 && !t.contains("Price:"))
            })
            .resolve();

        let price_text = document.select(&price).map(element_text).find(|t| !t.is_empty());

        let image_urls = document
            .select(&images)
            .filter_map(|img| img.value().attr("src"))
            .filter(|src| !src.to_lowercase().ends_with(".gif"))
            .filter_map(|src| page.join(src).ok())
            .map(String::from)
            .collect();

        Ok(DetailPage { title, description, price_text, image_urls })
    }

    /// `div.row` cards: an `h5` title, a `Price:` text node, an image, a link.
    fn parse_rows(&self, document: &Html) -> Vec<RawListing> {
        let sel = &self.list;
        let mut listings = Vec::new();
        for row in document.select(&sel.row) {
            let Some(title) = row.select(&sel.heading).map(element_text).find(|t| !t.is_empty()) else {
                continue;
            };
            let price_text = row
                .text()
                .find(|t| t.contains("Price:"))
                .map(collapse_whitespace);
            listings.push(RawListing {
                title: Some(title),
                description: None,
                details: Vec::new(),
                price_text,
                image_urls: self.attr_urls(row, &sel.img, "src"),
                detail_url: self.attr_urls(row, &sel.link, "href").into_iter().next(),
            });
        }
        listings
    }

    /// Table layout: title/image/link cell, details cell, info cell.
    fn parse_tables(&self, document: &Html) -> Vec<RawListing> {
        let sel = &self.list;
        let mut listings = Vec::new();
        for table in document.select(&sel.table) {
            let rows: Vec<_> = table.select(&sel.tr).collect();
            if rows.len() <= 2 {
                continue;
            }
            for row in rows {
                if row.select(&sel.th).next().is_some() {
                    continue;
                }
                let cells: Vec<ElementRef> = row
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|e| e.value().name() == "td")
                    .collect();
                if cells.len() < 3 {
                    continue;
                }
                let title_cell = cells[0];
                let title = title_cell
                    .select(&sel.link)
                    .map(element_text)
                    .find(|t| !t.is_empty())
                    .unwrap_or_else(|| element_text(title_cell));
                let details = cells[1..]
                    .iter()
                    .map(|c| element_text(*c))
                    .filter(|t| !t.is_empty())
                    .collect();

                listings.push(RawListing {
                    title: Some(title).filter(|t| !t.is_empty()),
                    description: None,
                    details,
                    price_text: None,
                    image_urls: self.attr_urls(title_cell, &sel.img, "src"),
                    detail_url: self.attr_urls(title_cell, &sel.link, "href").into_iter().next(),
                });
            }
        }
        listings
    }

    /// Free-form sections found through their red price element.
    fn parse_price_sections(&self, document: &Html) -> Vec<RawListing> {
        let sel = &self.list;
        let mut seen = HashSet::new();
        let mut listings = Vec::new();
        for price in document.select(&sel.red_price) {
            let Some(section) = price.parent().and_then(ElementRef::wrap) else {
                continue;
            };
            if !seen.insert(section.id()) {
                continue;
            }
            listings.push(RawListing {
                title: None,
                description: Some(element_text(section)).filter(|t| !t.is_empty()),
                details: Vec::new(),
                price_text: Some(element_text(price)).filter(|t| !t.is_empty()),
                image_urls: self.attr_urls(section, &sel.img, "src"),
                detail_url: self.attr_urls(section, &sel.link, "href").into_iter().next(),
            });
        }
        listings
    }

    /// Bare links to coach pages. Everything else comes from the detail page
    /// and the page's file name.
    fn parse_coach_links(&self, document: &Html) -> Vec<RawListing> {
        let mut seen = HashSet::new();
        let mut listings = Vec::new();
        for link in document.select(&self.list.link) {
            let Some(href) = link.value().attr("href").map(str::trim) else {
                continue;
            };
            let path = href.split(['?', '#']).next().unwrap_or(href);
            if !self.coach_page.is_match(path) {
                continue;
            }
            let Ok(url) = self.base_url.join(href) else {
                continue;
            };
            let url = String::from(url);
            if !seen.insert(url.clone()) {
                continue;
            }
            listings.push(RawListing {
                title: Some(element_text(link)).filter(|t| !t.is_empty()),
                detail_url: Some(url),
                ..RawListing::default()
            });
        }
        listings
    }

    fn attr_urls(&self, scope: ElementRef, sel: &Selector, attr: &str) -> Vec<String> {
        scope
            .select(sel)
            .filter_map(|e| e.value().attr(attr))
            .filter_map(|raw| self.base_url.join(raw.trim()).ok())
            .map(String::from)
            .collect()
    }
}

impl Parser for PrevostParser {
    fn parse(&self, html: &str) -> Result<Vec<RawListing>, ParserError> {
        let document = Html::parse_document(html);

        let found = FirstMatch::new()
            .source("div.row", || non_empty(self.parse_rows(&document)))
            .source("table", || non_empty(self.parse_tables(&document)))
            .source("redprice", || non_empty(self.parse_price_sections(&document)))
            .source("coach links", || non_empty(self.parse_coach_links(&document)))
            .resolve_named();

        match found {
            Some((layout, listings)) => {
                debug!(layout, count = listings.len(), "parsed listing page");
                Ok(listings)
            }
            None => Err(ParserError::NoListings),
        }
    }
}

fn non_empty(listings: Vec<RawListing>) -> Option<Vec<RawListing>> {
    (!listings.is_empty()).then_some(listings)
}

fn selector(css: &str) -> Result<Selector, ParserError> {
    Selector::parse(css).map_err(|e| ParserError::HtmlParseError(e.to_string()))
}

fn element_text(element: ElementRef) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}
