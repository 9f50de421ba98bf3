//! Millisecond timestamps as stored in the ledgers

use filetime::FileTime;
use std::fs;
use std::io;
use std::path::Path;

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Last modification time of `path` in milliseconds since the Unix epoch.
pub fn modified_millis(path: &Path) -> io::Result<i64> {
    let metadata = fs::metadata(path)?;
    let mtime = FileTime::from_last_modification_time(&metadata);
    Ok(mtime.unix_seconds() * 1000 + i64::from(mtime.nanoseconds() / 1_000_000))
}

/// Set the modification time of `path`, returning the value the filesystem
/// actually stored (coarse filesystems truncate).
pub fn stamp_millis(path: &Path, millis: i64) -> io::Result<i64> {
    let seconds = millis.div_euclid(1000);
    // rem_euclid(1000) is in 0..1000, so the cast cannot truncate
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let nanos = (millis.rem_euclid(1000) * 1_000_000) as u32;
    filetime::set_file_mtime(path, FileTime::from_unix_time(seconds, nanos))?;
    modified_millis(path)
}
