//! GES DISC OpenDAP catalog client.
//!
//! Resolves dataset time coverage and granule URLs from the OpenDAP catalog
//! and downloads granules from the direct data portal.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};
use url::Url;

use sif_common::{daily_range, year_doy_to_date};

use crate::config::ArchiveConfig;
use crate::download::ArchiveTransport;
use crate::error::{ArchiveError, ArchiveResult};
use crate::listing::{
    dataset_name, doy_of, filename_of, granule_data_url, granule_date, parse_listing, year_of,
    ListingEntry,
};

/// A dataset on the archive. Time coverage is filled in on first use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dataset {
    pub name: String,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// One granule file per day, as opposed to day-of-year directories.
    pub daily: bool,
}

impl Dataset {
    fn new(name: String) -> Self {
        Self {
            name,
            start: None,
            end: None,
            daily: false,
        }
    }

    fn timerange(&self) -> Option<(NaiveDate, NaiveDate)> {
        Some((self.start?, self.end?))
    }
}

/// A single daily granule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GranuleRef {
    pub date: NaiveDate,
    /// OpenDAP data URL (catalog page suffixes removed).
    pub opendap_url: String,
    /// Direct download URL on the data portal.
    pub archive_url: String,
    pub size: u64,
}

impl GranuleRef {
    pub fn filename(&self) -> &str {
        filename_of(&self.archive_url)
    }
}

/// Granules resolved for a date range, before anything is downloaded.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadPlan {
    pub dataset: String,
    pub outdir: PathBuf,
    pub granules: Vec<GranuleRef>,
    pub not_found: Vec<NaiveDate>,
    /// Bytes of granules not already present in `outdir`.
    pub pending_bytes: u64,
}

impl DownloadPlan {
    pub fn pending_megabytes(&self) -> u64 {
        self.pending_bytes / (1024 * 1024)
    }
}

/// Outcome of a batch download.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DownloadReport {
    /// Files now present locally, including ones that were already there.
    pub downloaded: Vec<PathBuf>,
    /// Requested dates with no granule on the archive.
    pub not_found: Vec<NaiveDate>,
    /// Archive URLs that failed to download.
    pub failed: Vec<String>,
}

#[derive(Clone, Copy)]
enum Extreme {
    Earliest,
    Latest,
}

/// Client for the OCO-2/OCO-3 GES DISC.
pub struct GesDiscClient {
    transport: Arc<dyn ArchiveTransport>,
    config: ArchiveConfig,
    datasets: RwLock<Option<HashMap<String, Dataset>>>,
}

impl GesDiscClient {
    pub fn new(transport: Arc<dyn ArchiveTransport>, config: ArchiveConfig) -> Self {
        Self {
            transport,
            config,
            datasets: RwLock::new(None),
        }
    }

    // ========================================================================
    // Catalog queries
    // ========================================================================

    /// Names of all datasets in the OpenDAP root catalog.
    #[instrument(skip(self))]
    pub async fn list_datasets(&self) -> ArchiveResult<Vec<String>> {
        let root = self.config.opendap_url.clone();
        let entries = self.list_directory(&root).await?;

        let mut names: Vec<String> = Vec::new();
        for entry in &entries {
            if let Some(name) = dataset_name(&entry.url) {
                if name != "test" && !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
        }

        let mut guard = self.datasets.write().await;
        let known = guard.get_or_insert_with(HashMap::new);
        for name in &names {
            known
                .entry(name.clone())
                .or_insert_with(|| Dataset::new(name.clone()));
        }

        info!(count = names.len(), "Listed datasets");
        Ok(names)
    }

    /// First and last available dates of a dataset. Memoised per dataset.
    #[instrument(skip(self))]
    pub async fn dataset_timerange(&self, dataset: &str) -> ArchiveResult<(NaiveDate, NaiveDate)> {
        let resolved = self.resolve_dataset(dataset).await?;
        resolved
            .timerange()
            .ok_or_else(|| ArchiveError::NoProducts(dataset.to_string()))
    }

    /// The daily granule of `dataset` for `date`.
    #[instrument(skip(self))]
    pub async fn granule_by_date(&self, dataset: &str, date: NaiveDate) -> ArchiveResult<GranuleRef> {
        let resolved = self.resolve_daily_dataset(dataset).await?;

        if let Some((start, end)) = resolved.timerange() {
            if date < start || date > end {
                return Err(ArchiveError::DateOutOfRange {
                    dataset: dataset.to_string(),
                    date,
                    start,
                    end,
                });
            }
        }

        let mut granules = self.year_granules(dataset, date.year()).await?;
        granules
            .remove(&date)
            .ok_or_else(|| ArchiveError::GranuleNotFound {
                dataset: dataset.to_string(),
                date,
            })
    }

    /// Resolve every granule between `start` and `end` inclusive.
    ///
    /// A year whose listing fails contributes its dates to `not_found`.
    #[instrument(skip(self, outdir))]
    pub async fn plan_timerange(
        &self,
        dataset: &str,
        start: NaiveDate,
        end: NaiveDate,
        outdir: &Path,
    ) -> ArchiveResult<DownloadPlan> {
        self.known_dataset(dataset).await?;
        if start > end {
            return Err(ArchiveError::InvalidRange { start, end });
        }
        self.resolve_daily_dataset(dataset).await?;

        let mut by_year: BTreeMap<i32, Vec<NaiveDate>> = BTreeMap::new();
        for date in daily_range(start, end) {
            by_year.entry(date.year()).or_default().push(date);
        }

        let mut plan = DownloadPlan {
            dataset: dataset.to_string(),
            outdir: outdir.to_path_buf(),
            granules: Vec::new(),
            not_found: Vec::new(),
            pending_bytes: 0,
        };

        for (year, dates) in by_year {
            let granules = match self.year_granules(dataset, year).await {
                Ok(granules) => granules,
                Err(e) => {
                    warn!(year, error = %e, "Failed to list year directory");
                    plan.not_found.extend(dates);
                    continue;
                }
            };

            for date in dates {
                match granules.get(&date) {
                    Some(granule) => {
                        if !outdir.join(granule.filename()).exists() {
                            plan.pending_bytes += granule.size;
                        }
                        plan.granules.push(granule.clone());
                    }
                    None => plan.not_found.push(date),
                }
            }
        }

        plan.not_found.sort();
        info!(
            granules = plan.granules.len(),
            not_found = plan.not_found.len(),
            pending_mb = plan.pending_megabytes(),
            "Planned download"
        );
        Ok(plan)
    }

    // ========================================================================
    // Downloads
    // ========================================================================

    /// Download every granule of a plan into its output directory.
    ///
    /// Existing files are skipped and reported as downloaded. A failed
    /// granule is recorded and never stops the others.
    pub async fn download(&self, plan: &DownloadPlan, parallel: bool) -> ArchiveResult<DownloadReport> {
        fs::create_dir_all(&plan.outdir).await?;

        let outdir = plan.outdir.as_path();
        let results: Vec<(String, ArchiveResult<PathBuf>)> = if parallel {
            stream::iter(plan.granules.iter())
                .map(|granule| self.download_granule(granule, outdir))
                .buffer_unordered(self.config.max_parallel.max(1))
                .collect()
                .await
        } else {
            let mut results = Vec::with_capacity(plan.granules.len());
            for granule in &plan.granules {
                results.push(self.download_granule(granule, outdir).await);
            }
            results
        };

        let mut report = DownloadReport {
            not_found: plan.not_found.clone(),
            ..Default::default()
        };
        for (url, result) in results {
            match result {
                Ok(path) => report.downloaded.push(path),
                Err(e) => {
                    warn!(url = %url, error = %e, "Failed to download granule");
                    report.failed.push(url);
                }
            }
        }
        report.downloaded.sort();
        report.failed.sort();

        info!(
            downloaded = report.downloaded.len(),
            failed = report.failed.len(),
            not_found = report.not_found.len(),
            "Download session complete"
        );
        Ok(report)
    }

    /// Plan and download a date range in one step.
    pub async fn download_timerange(
        &self,
        dataset: &str,
        start: NaiveDate,
        end: NaiveDate,
        outdir: &Path,
        parallel: bool,
    ) -> ArchiveResult<DownloadReport> {
        let plan = self.plan_timerange(dataset, start, end, outdir).await?;
        if plan.granules.is_empty() {
            info!(dataset, "No granules found in the requested date range");
            return Ok(DownloadReport {
                not_found: plan.not_found,
                ..Default::default()
            });
        }
        self.download(&plan, parallel).await
    }

    async fn download_granule(
        &self,
        granule: &GranuleRef,
        outdir: &Path,
    ) -> (String, ArchiveResult<PathBuf>) {
        let dest = outdir.join(granule.filename());
        if dest.exists() {
            debug!(path = %dest.display(), "File already exists, skipping download");
            return (granule.archive_url.clone(), Ok(dest));
        }

        let result = self
            .transport
            .download_to(&granule.archive_url, &dest)
            .await
            .map(|_| dest);
        (granule.archive_url.clone(), result)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn list_directory(&self, url: &Url) -> ArchiveResult<Vec<ListingEntry>> {
        let html = self.transport.get_text(url.as_str()).await?;
        Ok(parse_listing(&html, url))
    }

    /// Look a dataset up, listing the catalog on first use.
    async fn known_dataset(&self, dataset: &str) -> ArchiveResult<Dataset> {
        {
            let guard = self.datasets.read().await;
            if let Some(known) = guard.as_ref() {
                return known
                    .get(dataset)
                    .cloned()
                    .ok_or_else(|| ArchiveError::UnknownDataset(dataset.to_string()));
            }
        }

        self.list_datasets().await?;
        let guard = self.datasets.read().await;
        guard
            .as_ref()
            .and_then(|known| known.get(dataset))
            .cloned()
            .ok_or_else(|| ArchiveError::UnknownDataset(dataset.to_string()))
    }

    /// Known dataset with its time range filled in.
    async fn resolve_dataset(&self, dataset: &str) -> ArchiveResult<Dataset> {
        let mut resolved = self.known_dataset(dataset).await?;
        if resolved.timerange().is_some() {
            return Ok(resolved);
        }

        info!(dataset, "Checking available dates");
        let dataset_url = self.dataset_url(dataset)?;
        let entries = self.list_directory(&dataset_url).await?;

        let years: BTreeMap<i32, String> = entries
            .iter()
            .filter_map(|e| {
                year_of(&e.url).map(|year| (year, e.url.trim_end_matches("contents.html").to_string()))
            })
            .collect();

        let (Some((&first_year, first_url)), Some((&last_year, last_url))) =
            (years.first_key_value(), years.last_key_value())
        else {
            return Err(ArchiveError::NoProducts(dataset.to_string()));
        };

        let (start, daily) = self
            .year_extreme(dataset, first_url, first_year, Extreme::Earliest)
            .await?;
        let (end, _) = self
            .year_extreme(dataset, last_url, last_year, Extreme::Latest)
            .await?;

        resolved.start = Some(start);
        resolved.end = Some(end);
        resolved.daily = daily;

        let mut guard = self.datasets.write().await;
        if let Some(known) = guard.as_mut() {
            known.insert(dataset.to_string(), resolved.clone());
        }

        info!(dataset, %start, %end, daily, "Resolved dataset time range");
        Ok(resolved)
    }

    async fn resolve_daily_dataset(&self, dataset: &str) -> ArchiveResult<Dataset> {
        let resolved = self.resolve_dataset(dataset).await?;
        if !resolved.daily {
            return Err(ArchiveError::SubDailyUnsupported(dataset.to_string()));
        }
        Ok(resolved)
    }

    /// Earliest or latest date in a year directory, and whether the year is
    /// laid out as daily granule files.
    async fn year_extreme(
        &self,
        dataset: &str,
        year_url: &str,
        year: i32,
        extreme: Extreme,
    ) -> ArchiveResult<(NaiveDate, bool)> {
        let url = Url::parse(year_url)?;
        let entries = self.list_directory(&url).await?;

        let doy_dates: Vec<NaiveDate> = entries
            .iter()
            .filter_map(|e| doy_of(&e.url))
            .filter_map(|doy| year_doy_to_date(year, doy))
            .collect();

        let (dates, daily) = if !doy_dates.is_empty() {
            (doy_dates, false)
        } else {
            let granule_dates: Vec<NaiveDate> =
                entries.iter().filter_map(|e| granule_date(&e.url)).collect();
            (granule_dates, true)
        };

        let picked = match extreme {
            Extreme::Earliest => dates.iter().min(),
            Extreme::Latest => dates.iter().max(),
        };
        picked
            .map(|date| (*date, daily))
            .ok_or_else(|| ArchiveError::NoProducts(dataset.to_string()))
    }

    /// Granules of a daily dataset's year directory, keyed by date.
    async fn year_granules(&self, dataset: &str, year: i32) -> ArchiveResult<BTreeMap<NaiveDate, GranuleRef>> {
        let year_url = self.dataset_url(dataset)?.join(&format!("{}/", year))?;
        let entries = self.list_directory(&year_url).await?;

        let mut granules = BTreeMap::new();
        for entry in entries {
            let Some(date) = granule_date(&entry.url) else {
                continue;
            };
            let opendap_url = granule_data_url(&entry.url).to_string();
            let archive_url = self.archive_url(dataset, year, filename_of(&opendap_url))?;
            granules.insert(
                date,
                GranuleRef {
                    date,
                    opendap_url,
                    archive_url,
                    size: entry.size,
                },
            );
        }
        Ok(granules)
    }

    fn dataset_url(&self, dataset: &str) -> ArchiveResult<Url> {
        Ok(self.config.opendap_url.join(&format!("{}/", dataset))?)
    }

    /// Data portal URL of a granule file.
    fn archive_url(&self, dataset: &str, year: i32, filename: &str) -> ArchiveResult<String> {
        let data_dir = if dataset.starts_with("OCO2") {
            "OCO2_DATA"
        } else {
            "OCO3_DATA"
        };
        let url = self
            .config
            .data_url
            .join(&format!("{}/{}/{}/{}", data_dir, dataset, year, filename))?;
        Ok(url.to_string())
    }
}
