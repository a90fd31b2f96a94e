//! OpenDAP (Hyrax) directory listing parsing.
//!
//! Catalog pages hold a `DataCatalog` table. Each row links a child
//! directory or a file; file rows carry the `Dataset` itemtype and a byte
//! size in the third column.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use sif_common::parse_yymmdd;

static CATALOG_ROWS: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"table[itemtype="http://schema.org/DataCatalog"] tr"#)
        .expect("static selector")
});
static CELLS: Lazy<Selector> = Lazy::new(|| Selector::parse("td").expect("static selector"));
static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("static selector"));

static YEAR_DIR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(\d{4})/contents\.html$").expect("static regex"));
static DOY_DIR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(\d{3})/contents\.html$").expect("static regex"));
static GRANULE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/([^/]*?)_(\d{6})_.*?\.nc4?(?:\.dmr)?\.html$").expect("static regex")
});

const DATASET_ITEMTYPE: &str = "http://schema.org/Dataset";

/// One row of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    /// Absolute URL of the linked item.
    pub url: String,
    /// File size in bytes; 0 for directories or unparseable sizes.
    pub size: u64,
}

/// Parse a catalog page. Relative links are resolved against `base`.
///
/// Pages without a catalog table yield no entries.
pub fn parse_listing(html: &str, base: &Url) -> Vec<ListingEntry> {
    let document = Html::parse_document(html);
    let mut entries = Vec::new();

    for row in document.select(&CATALOG_ROWS) {
        let cells: Vec<ElementRef> = row.select(&CELLS).collect();
        if cells.len() < 3 {
            continue;
        }
        let Some(href) = cells[0]
            .select(&LINK)
            .next()
            .and_then(|a| a.value().attr("href"))
        else {
            continue;
        };
        if href == "#" {
            continue;
        }

        let url = if href.starts_with("http://") || href.starts_with("https://") {
            href.trim().to_string()
        } else {
            match base.join(href.trim()) {
                Ok(url) => url.to_string(),
                Err(_) => continue,
            }
        };

        let size = if row.value().attr("itemtype") == Some(DATASET_ITEMTYPE) {
            cells[2]
                .text()
                .collect::<String>()
                .trim()
                .parse()
                .unwrap_or(0)
        } else {
            0
        };

        entries.push(ListingEntry { url, size });
    }

    entries
}

/// Dataset name of a root catalog entry: the second-to-last path segment.
pub fn dataset_name(url: &str) -> Option<&str> {
    let mut segments = url.rsplit('/');
    segments.next()?;
    segments.next().filter(|s| !s.is_empty())
}

/// Year of a `<year>/contents.html` directory link.
pub fn year_of(url: &str) -> Option<i32> {
    YEAR_DIR.captures(url)?.get(1)?.as_str().parse().ok()
}

/// Day of year of a `<ddd>/contents.html` directory link.
pub fn doy_of(url: &str) -> Option<u32> {
    DOY_DIR.captures(url)?.get(1)?.as_str().parse().ok()
}

/// Date stamp of a granule link, e.g. `oco2_LtSIF_191201_....nc4.dmr.html`.
pub fn granule_date(url: &str) -> Option<NaiveDate> {
    parse_yymmdd(GRANULE.captures(url)?.get(2)?.as_str())
}

/// Strip the `.html` and then `.dmr` suffixes of a granule page link.
pub fn granule_data_url(url: &str) -> &str {
    let url = url.strip_suffix(".html").unwrap_or(url);
    url.strip_suffix(".dmr").unwrap_or(url)
}

/// Last path segment of a URL.
pub fn filename_of(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}
