//! Time-based output file rotation: bucket arithmetic and filename
//! construction, kept as pure functions so they are testable without I/O.

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

/// Rotation buckets are `unix_seconds / interval`; a bucket change means the
/// current file closes and a freshly named one opens.
pub fn rotation_due(last_bucket: u64, now_unix_secs: u64, interval_secs: u64) -> Option<u64> {
    let bucket = now_unix_secs / interval_secs.max(1);
    (bucket != last_bucket).then_some(bucket)
}

/// Build `<basename>-<YYYYMMDD-HHMMSS><ext>` from the configured output
/// path, splitting on the last extension separator.
pub fn timestamped_path(configured: &Path, at: DateTime<Local>) -> PathBuf {
    let stamp = at.format("%Y%m%d-%H%M%S");
    let stem = configured
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match configured.extension() {
        Some(ext) => format!("{stem}-{stamp}.{}", ext.to_string_lossy()),
        None => format!("{stem}-{stamp}"),
    };
    match configured.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(name),
        _ => PathBuf::from(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn stamp_goes_before_extension() {
        let p = timestamped_path(Path::new("samples.bin"), at(2014, 3, 1, 12, 34, 56));
        assert_eq!(p, PathBuf::from("samples-20140301-123456.bin"));
    }

    #[test]
    fn no_extension_appends_stamp() {
        let p = timestamped_path(Path::new("samples"), at(2014, 3, 1, 0, 0, 0));
        assert_eq!(p, PathBuf::from("samples-20140301-000000"));
    }

    #[test]
    fn parent_directory_preserved() {
        let p = timestamped_path(Path::new("/data/run7/raw.dat"), at(2020, 12, 31, 23, 59, 59));
        assert_eq!(p, PathBuf::from("/data/run7/raw-20201231-235959.dat"));
    }

    #[test]
    fn due_only_on_bucket_change() {
        assert_eq!(rotation_due(10, 10, 1), None);
        assert_eq!(rotation_due(10, 11, 1), Some(11));
        // 3599s and 3600s straddle an hourly boundary.
        assert_eq!(rotation_due(0, 3_599, 3_600), None);
        assert_eq!(rotation_due(0, 3_600, 3_600), Some(1));
    }
}
