mod refresh;
mod retry_ledger;
mod snapshot_cache;

pub use refresh::{RefreshReport, Refresher};
pub use retry_ledger::{RetryLedger, LEDGER_KEY};
pub use snapshot_cache::{CacheEntry, LoadToken, SnapshotCache};
