use crate::data::snapshot::SnapshotRecord;
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, Trim};
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct CsvRecord {
    date: String,
    spot_price: f64,
    futures_price: f64,
    futures_expiry: String,
    #[serde(default)]
    pair: Option<String>,
    #[serde(default)]
    etf_price: Option<f64>,
    #[serde(default)]
    etf_nav: Option<f64>,
}

//loads snapshot records from a csv file, grouped by pair in first-seen order
//rows without a pair column belong to default_pair
//row order is kept as is, ordering is checked when the records are replayed
pub fn load_csv<P: AsRef<Path>>(
    path: P,
    default_pair: &str,
) -> Result<IndexMap<String, Vec<SnapshotRecord>>> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_path(path)
        .context(format!("Failed to open CSV file: {:?}", path))?;

    let mut series: IndexMap<String, Vec<SnapshotRecord>> = IndexMap::new();

    for (index, result) in reader.deserialize().enumerate() {
        let line = index + 2;
        let row: CsvRecord =
            result.context(format!("Failed to parse CSV record at line {}", line))?;

        let date = parse_date(&row.date)
            .context(format!("Failed to parse date '{}' at line {}", row.date, line))?;
        let futures_expiry = parse_date(&row.futures_expiry).context(format!(
            "Failed to parse futures_expiry '{}' at line {}",
            row.futures_expiry, line
        ))?;

        let pair = match row.pair {
            Some(pair) if !pair.is_empty() => pair.to_uppercase(),
            _ => default_pair.to_uppercase(),
        };

        let record = SnapshotRecord {
            date,
            spot_price: row.spot_price,
            futures_price: row.futures_price,
            futures_expiry,
            etf_price: row.etf_price,
            etf_nav: row.etf_nav,
        };

        series.entry(pair).or_default().push(record);
    }

    Ok(series)
}

//accepts plain dates, iso datetimes and rfc3339 timestamps, keeping only the date
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Ok(dt.date());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt.date());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.date_naive());
    }

    anyhow::bail!("unrecognized date format: {}", s)
}

//writes records back out in the same column layout load_csv reads
pub fn save_csv<P: AsRef<Path>>(
    series: &IndexMap<String, Vec<SnapshotRecord>>,
    path: P,
) -> Result<()> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)
        .context(format!("Failed to create CSV file: {:?}", path))?;

    writer.write_record([
        "date",
        "pair",
        "spot_price",
        "futures_price",
        "futures_expiry",
        "etf_price",
        "etf_nav",
    ])?;

    for (pair, records) in series {
        for record in records {
            writer.write_record([
                record.date.to_string(),
                pair.clone(),
                record.spot_price.to_string(),
                record.futures_price.to_string(),
                record.futures_expiry.to_string(),
                record.etf_price.map(|v| v.to_string()).unwrap_or_default(),
                record.etf_nav.map(|v| v.to_string()).unwrap_or_default(),
            ])?;
        }
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn loads_single_pair_without_pair_column() {
        let file = write_csv(
            "date,spot_price,futures_price,futures_expiry\n\
             2024-01-02,42000,42500,2024-01-26\n\
             2024-01-03,42100.5,42550,2024-01-26\n",
        );

        let series = load_csv(file.path(), "btc").unwrap();
        assert_eq!(series.len(), 1);
        let records = &series["BTC"];
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].date, d(2024, 1, 2));
        assert_eq!(records[1].spot_price, 42100.5);
        assert_eq!(records[1].futures_expiry, d(2024, 1, 26));
        assert_eq!(records[0].etf_price, None);
    }

    #[test]
    fn groups_by_pair_in_first_seen_order_and_keeps_row_order() {
        let file = write_csv(
            "date,pair,spot_price,futures_price,futures_expiry,etf_price,etf_nav\n\
             2024-01-03,gold,2050,2060,2024-01-26,,\n\
             2024-01-02,BTC,42000,42500,2024-01-26,24.1,24.2\n\
             2024-01-02,gold,2040,2051,2024-01-26,,\n",
        );

        let series = load_csv(file.path(), "BTC").unwrap();
        assert_eq!(series.keys().collect::<Vec<_>>(), vec!["GOLD", "BTC"]);

        let gold = &series["GOLD"];
        assert_eq!(gold[0].date, d(2024, 1, 3));
        assert_eq!(gold[1].date, d(2024, 1, 2));

        let btc = &series["BTC"][0];
        assert_eq!(btc.etf_price, Some(24.1));
        assert_eq!(btc.etf_nav, Some(24.2));
    }

    #[test]
    fn accepts_timestamps_and_reports_bad_dates() {
        assert_eq!(parse_date("2024-02-29T00:00:00").unwrap(), d(2024, 2, 29));
        assert_eq!(parse_date("2024-02-29 16:00:00").unwrap(), d(2024, 2, 29));
        assert_eq!(
            parse_date("2024-02-29T16:00:00+00:00").unwrap(),
            d(2024, 2, 29)
        );
        assert!(parse_date("29/02/2024").is_err());

        let file = write_csv(
            "date,spot_price,futures_price,futures_expiry\n\
             2024-01-02,42000,42500,soon\n",
        );
        let err = load_csv(file.path(), "BTC").unwrap_err();
        assert!(format!("{:#}", err).contains("line 2"));
    }

    #[test]
    fn saved_series_loads_back() {
        let mut series = IndexMap::new();
        series.insert(
            "ETH".to_string(),
            vec![SnapshotRecord::new(d(2024, 3, 1), 3400.0, 3420.0, d(2024, 3, 29)).with_etf(26.0, 26.1)],
        );
        let file = NamedTempFile::new().unwrap();

        save_csv(&series, file.path()).unwrap();
        let loaded = load_csv(file.path(), "BTC").unwrap();
        assert_eq!(loaded, series);
    }
}
