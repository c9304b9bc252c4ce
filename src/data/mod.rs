pub mod loader;
pub mod snapshot;
pub mod source;
pub mod synthetic;

pub use loader::{load_csv, parse_date, save_csv};
pub use snapshot::{MarketSnapshot, SnapshotError, SnapshotRecord};
pub use source::{CsvSource, SnapshotSource, SourceError};
pub use synthetic::{SyntheticParams, SyntheticSource};
