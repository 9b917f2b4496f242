//! Utility functions for the CLI.

use indicatif::{ProgressBar, ProgressStyle};
use oxiflate_core::Wrap;
use std::path::{Path, PathBuf};

/// Path argument meaning stdin or stdout.
pub const STDIO: &str = "-";

/// Create a byte progress bar with standard styling.
pub fn create_progress_bar(len: Option<u64>, enable: bool) -> ProgressBar {
    let Some(len) = len.filter(|_| enable) else {
        return ProgressBar::hidden();
    };

    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
            .expect("progress bar template is valid")
            .progress_chars("█▓▒░ "),
    );
    pb
}

/// File suffix conventionally used for each framing.
pub fn suffix(wrap: Wrap) -> &'static str {
    match wrap {
        Wrap::None => "deflate",
        Wrap::Zlib => "zz",
        Wrap::Gzip => "gz",
    }
}

/// Default output for `compress`: the input with the framing suffix appended.
pub fn compressed_path(input: &Path, wrap: Wrap) -> PathBuf {
    if input == Path::new(STDIO) {
        return PathBuf::from(STDIO);
    }
    let mut name = input.as_os_str().to_owned();
    name.push(".");
    name.push(suffix(wrap));
    PathBuf::from(name)
}

/// Default output for `decompress`: the input with the framing suffix removed.
///
/// Returns `None` when the input does not carry the suffix, since there is
/// no sensible name to fall back on.
pub fn decompressed_path(input: &Path, wrap: Wrap) -> Option<PathBuf> {
    if input == Path::new(STDIO) {
        return Some(PathBuf::from(STDIO));
    }
    let ext = input.extension()?;
    if ext != suffix(wrap) {
        return None;
    }
    let stem = input.file_stem()?;
    Some(input.with_file_name(stem))
}

/// Print a one-line size summary to stderr.
pub fn print_summary(label: &str, bytes_in: u64, bytes_out: u64) {
    let ratio = if bytes_in == 0 {
        0.0
    } else {
        bytes_out as f64 / bytes_in as f64 * 100.0
    };
    eprintln!("{label}: {bytes_in} -> {bytes_out} bytes ({ratio:.1}%)");
}
