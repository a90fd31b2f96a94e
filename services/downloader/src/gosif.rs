//! GOSIF product downloads from the UNH global ecology data store.
//!
//! Files are gzipped GeoTIFFs laid out as
//! `<dataset>/{Annual,Monthly,8day}/<name>_<period>.tif.gz`, where `<name>`
//! is the dataset name without its `_v2` suffix.

use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use flate2::read::GzDecoder;
use tokio::fs;
use tracing::{debug, info, instrument};
use url::Url;

use sif_common::{day_of_year, eight_day_period_start, year_doy_to_date};

use crate::download::{partial_path, ArchiveTransport};
use crate::error::{ArchiveError, ArchiveResult};

pub const DEFAULT_GOSIF_DATASET: &str = "GOSIF_v2";

/// Temporal aggregation of a GOSIF product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GosifPeriod {
    Annual,
    Monthly { month: u32 },
    /// 8-day composite starting on day of year `doy`.
    EightDay { doy: u32 },
}

impl GosifPeriod {
    /// Pick the period from optional month and day.
    ///
    /// With only `day`, it is a day of year. With both, `day` is a day of
    /// the month. Either way the 8-day composite containing it is chosen.
    pub fn from_parts(year: i32, month: Option<u32>, day: Option<u32>) -> ArchiveResult<Self> {
        match (month, day) {
            (None, None) => Ok(GosifPeriod::Annual),
            (Some(month), None) => {
                if !(1..=12).contains(&month) {
                    return Err(ArchiveError::InvalidRequest(format!(
                        "month {} is not between 1 and 12",
                        month
                    )));
                }
                Ok(GosifPeriod::Monthly { month })
            }
            (None, Some(doy)) => {
                year_doy_to_date(year, doy).ok_or_else(|| {
                    ArchiveError::InvalidRequest(format!("day {} is not a day of {}", doy, year))
                })?;
                Ok(GosifPeriod::EightDay {
                    doy: eight_day_period_start(doy),
                })
            }
            (Some(month), Some(day)) => {
                let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
                    ArchiveError::InvalidRequest(format!(
                        "{}-{:02}-{:02} is not a valid date",
                        year, month, day
                    ))
                })?;
                Ok(GosifPeriod::EightDay {
                    doy: eight_day_period_start(day_of_year(date)),
                })
            }
        }
    }

    fn directory(&self) -> &'static str {
        match self {
            GosifPeriod::Annual => "Annual",
            GosifPeriod::Monthly { .. } => "Monthly",
            GosifPeriod::EightDay { .. } => "8day",
        }
    }

    fn stamp(&self, year: i32) -> String {
        match self {
            GosifPeriod::Annual => format!("{}", year),
            GosifPeriod::Monthly { month } => format!("{}.M{:02}", year, month),
            GosifPeriod::EightDay { doy } => format!("{}{:03}", year, doy),
        }
    }
}

/// Download URL of a GOSIF product.
pub fn gosif_url(base: &Url, dataset: &str, year: i32, period: GosifPeriod) -> ArchiveResult<Url> {
    let name = dataset.replace("_v2", "");
    let path = format!(
        "{}/{}/{}_{}.tif.gz",
        dataset,
        period.directory(),
        name,
        period.stamp(year)
    );
    Ok(base.join(&path)?)
}

/// Fetch a GOSIF product into `outdir`, optionally decompressing it.
///
/// An archive already present locally is not fetched again. Returns the
/// path of the decompressed file when `unpack` is set, else the archive.
#[instrument(skip(transport, base, outdir))]
pub async fn download_gosif(
    transport: &dyn ArchiveTransport,
    base: &Url,
    dataset: &str,
    year: i32,
    period: GosifPeriod,
    outdir: &Path,
    unpack: bool,
) -> ArchiveResult<PathBuf> {
    fs::create_dir_all(outdir).await?;

    let url = gosif_url(base, dataset, year, period)?;
    let filename = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default()
        .to_string();
    let archive = outdir.join(&filename);

    if archive.exists() {
        debug!(path = %archive.display(), "File already exists, skipping download");
    } else {
        info!(url = %url, "Downloading GOSIF product");
        transport.download_to(url.as_str(), &archive).await?;
    }

    if !unpack {
        return Ok(archive);
    }
    gunzip_file(&archive).await
}

/// Decompress `<name>.gz` next to itself as `<name>`.
pub async fn gunzip_file(src: &Path) -> ArchiveResult<PathBuf> {
    let dest = src.with_extension("");
    let src = src.to_path_buf();
    let out = dest.clone();

    tokio::task::spawn_blocking(move || -> io::Result<()> {
        let temp = partial_path(&out);
        let mut decoder = GzDecoder::new(BufReader::new(File::open(&src)?));
        let mut writer = BufWriter::new(File::create(&temp)?);
        if let Err(e) = io::copy(&mut decoder, &mut writer) {
            drop(writer);
            std::fs::remove_file(&temp).ok();
            return Err(e);
        }
        drop(writer);
        std::fs::rename(&temp, &out)
    })
    .await
    .map_err(|e| ArchiveError::Io(io::Error::new(io::ErrorKind::Other, e.to_string())))??;

    info!(path = %dest.display(), "Unpacked GOSIF product");
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_GOSIF_URL;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn base() -> Url {
        Url::parse(DEFAULT_GOSIF_URL).unwrap()
    }

    #[test]
    fn test_annual_url() {
        let url = gosif_url(&base(), "GOSIF_v2", 2019, GosifPeriod::Annual).unwrap();
        assert_eq!(
            url.as_str(),
            "https://data.globalecology.unh.edu/data/GOSIF_v2/Annual/GOSIF_2019.tif.gz"
        );
    }

    #[test]
    fn test_monthly_url() {
        let period = GosifPeriod::from_parts(2019, Some(3), None).unwrap();
        let url = gosif_url(&base(), "GOSIF_v2", 2019, period).unwrap();
        assert!(url.as_str().ends_with("GOSIF_v2/Monthly/GOSIF_2019.M03.tif.gz"));
    }

    #[test]
    fn test_eight_day_from_day_of_year() {
        let period = GosifPeriod::from_parts(2019, None, Some(12)).unwrap();
        assert_eq!(period, GosifPeriod::EightDay { doy: 9 });
        let url = gosif_url(&base(), "GOSIF_v2", 2019, period).unwrap();
        assert!(url.as_str().ends_with("GOSIF_v2/8day/GOSIF_2019009.tif.gz"));
    }

    #[test]
    fn test_eight_day_from_calendar_date() {
        // 2019-02-10 is day 41, in the composite starting on day 41
        let period = GosifPeriod::from_parts(2019, Some(2), Some(10)).unwrap();
        assert_eq!(period, GosifPeriod::EightDay { doy: 41 });
        // 2019-02-11 still belongs to it
        let period = GosifPeriod::from_parts(2019, Some(2), Some(11)).unwrap();
        assert_eq!(period, GosifPeriod::EightDay { doy: 41 });
    }

    #[test]
    fn test_invalid_parts() {
        assert!(GosifPeriod::from_parts(2019, Some(13), None).is_err());
        assert!(GosifPeriod::from_parts(2019, Some(2), Some(30)).is_err());
        assert!(GosifPeriod::from_parts(2019, None, Some(366)).is_err());
        assert!(GosifPeriod::from_parts(2020, None, Some(366)).is_ok());
    }

    #[tokio::test]
    async fn test_gunzip_file() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("GOSIF_2019.tif.gz");

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"II*\0fake tiff").unwrap();
        std::fs::write(&src, encoder.finish().unwrap()).unwrap();

        let dest = gunzip_file(&src).await.unwrap();
        assert_eq!(dest, dir.path().join("GOSIF_2019.tif"));
        assert_eq!(std::fs::read(&dest).unwrap(), b"II*\0fake tiff");
        assert!(!partial_path(&dest).exists());
    }
}
