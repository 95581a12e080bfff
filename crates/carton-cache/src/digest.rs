//! Integrity digest formatting.
//!
//! A digest string is `sha512-<base64>` with URL-safe, unpadded base64. The
//! digest doubles as the cache's content address, so the mapping from digest
//! to filename must be identical on the read path (cache-hit probe) and the
//! write path (promotion): filesystem-unsafe characters are substituted and
//! padding is stripped the same way in both.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use sha2::{Digest, Sha512};

/// Algorithm prefix carried by every digest string
pub const DIGEST_PREFIX: &str = "sha512-";

/// Render finalized sha512 output as an algorithm-prefixed digest string
pub fn format_digest(hash: &[u8]) -> String {
    format!("{}{}", DIGEST_PREFIX, URL_SAFE_NO_PAD.encode(hash))
}

/// Hash a complete byte buffer into a digest string
pub fn compute_digest(content: &[u8]) -> String {
    let mut hasher = Sha512::new();
    hasher.update(content);
    format_digest(&hasher.finalize())
}

/// Normalize a digest string into a filesystem-safe cache filename.
///
/// Digests produced here are already URL-safe, but a lockfile may carry a
/// digest written with standard base64 (`/`, `+`, `=` padding); those map to
/// the same filename a URL-safe rendering of the same bytes would.
pub fn digest_filename(digest: &str) -> String {
    digest
        .chars()
        .filter(|c| *c != '=')
        .map(|c| match c {
            '/' => '_',
            '+' => '-',
            c => c,
        })
        .collect()
}
