//! Per-user opinion ledger and tone policy.

pub mod ledger;
pub mod record;
pub mod tone;

pub use ledger::{LedgerError, OpinionLedger, MATCH_THRESHOLD};
pub use record::UserRecord;
pub use tone::Tone;
