//! Stored file naming for uploaded clips and rendered montages.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

/// Maximum length of the sanitized original-name part.
const MAX_STEM_LEN: usize = 80;

static UNSAFE_CHARS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("valid regex"));

/// Replace anything outside `[A-Za-z0-9._-]` with `_` and strip leading dots
/// so the result is safe as a single path component.
///
/// ```
/// use clipcraftr_core::naming::sanitize_file_name;
///
/// assert_eq!(sanitize_file_name("my clip (1).mp4"), "my_clip_1_.mp4");
/// assert_eq!(sanitize_file_name("../../etc/passwd"), "_.._etc_passwd");
/// ```
pub fn sanitize_file_name(name: &str) -> String {
    let replaced = UNSAFE_CHARS_RE.replace_all(name.trim(), "_");
    let trimmed = replaced.trim_start_matches('.');
    let mut out: String = trimmed.chars().take(MAX_STEM_LEN).collect();
    if out.is_empty() {
        out.push_str("clip");
    }
    out
}

/// Unique stored name for an uploaded clip:
/// `clipcraftr_{owner}_{millis}_{sanitized original}`.
pub fn stored_clip_name(owner: &str, millis: i64, original_name: &str) -> String {
    format!(
        "clipcraftr_{}_{millis}_{}",
        sanitize_file_name(owner),
        sanitize_file_name(original_name)
    )
}

/// Output name for a rendered montage.
pub fn montage_output_name(montage_id: i64, format: &str) -> String {
    format!("montage_{montage_id}.{}", sanitize_file_name(format))
}

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// SHA-256 hex digest of a file, read in fixed-size chunks.
pub async fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
