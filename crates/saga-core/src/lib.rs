pub mod config;
pub mod fsutil;
pub mod hash;

pub use config::Config;
pub use fsutil::{lock_file, write_atomic, LockGuard};
pub use hash::{sha256_file, sha256_hex};

/// Current UTC time as an RFC-3339 string.
pub fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .expect("RFC3339 formatting should not fail")
}
