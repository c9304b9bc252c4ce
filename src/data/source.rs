use crate::data::loader::load_csv;
use crate::data::snapshot::SnapshotRecord;
use indexmap::IndexMap;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to load {path:?}: {message}")]
    Load { path: PathBuf, message: String },
    #[error("No data for pair {0}")]
    MissingPair(String),
    #[error("Invalid source parameter {field}: {reason}")]
    InvalidParameter {
        field: &'static str,
        reason: String,
    },
}

//where snapshot series come from
//implementations only acquire raw records, validation happens in the engine
pub trait SnapshotSource {
    //every series this source can provide, keyed by pair id
    fn load_all(&self) -> Result<IndexMap<String, Vec<SnapshotRecord>>, SourceError>;

    //a single pair's series
    fn load(&self, pair_id: &str) -> Result<Vec<SnapshotRecord>, SourceError> {
        let mut all = self.load_all()?;
        all.shift_remove(&pair_id.to_uppercase())
            .ok_or_else(|| SourceError::MissingPair(pair_id.to_string()))
    }
}

//historical snapshots from a csv file
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
    default_pair: String,
}

impl CsvSource {
    pub fn new<P: Into<PathBuf>>(path: P, default_pair: &str) -> Self {
        CsvSource {
            path: path.into(),
            default_pair: default_pair.to_string(),
        }
    }
}

impl SnapshotSource for CsvSource {
    fn load_all(&self) -> Result<IndexMap<String, Vec<SnapshotRecord>>, SourceError> {
        load_csv(&self.path, &self.default_pair).map_err(|e| SourceError::Load {
            path: self.path.clone(),
            message: format!("{:#}", e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn csv_source_serves_pairs() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(
            b"date,pair,spot_price,futures_price,futures_expiry\n\
              2024-01-02,btc,42000,42500,2024-01-26\n",
        )
        .unwrap();

        let source = CsvSource::new(file.path(), "BTC");
        assert_eq!(source.load("btc").unwrap().len(), 1);
        assert!(matches!(
            source.load("ETH"),
            Err(SourceError::MissingPair(pair)) if pair == "ETH"
        ));
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let source = CsvSource::new("/nonexistent/basis.csv", "BTC");
        assert!(matches!(source.load_all(), Err(SourceError::Load { .. })));
    }
}
