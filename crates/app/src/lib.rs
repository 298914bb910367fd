//! Shared helpers for the rfgrab binaries.

use clap::error::ErrorKind;

/// Whether a clap parse outcome is a clean exit (help or version) rather
/// than an argument error. Argument errors must leave the process with
/// exit code 1, not clap's default of 2.
pub fn is_clean_cli_exit(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::DisplayHelp | ErrorKind::DisplayVersion)
}
