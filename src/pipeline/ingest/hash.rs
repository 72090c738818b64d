use sha2::{Digest, Sha256};

pub const HASH_PREFIX: &str = "sha256:";

/// SHA-256 content hash, rendered as `sha256:<lowercase hex>`.
pub fn compute_content_hash(bytes: &[u8]) -> String {
    format!("{HASH_PREFIX}{:x}", Sha256::digest(bytes))
}

/// Shannon entropy of a byte distribution, in bits per byte (0-8).
pub fn shannon_entropy(bytes: &[u8]) -> f64 {
    if bytes.is_empty() {
        return 0.0;
    }
    let mut counts = [0u64; 256];
    for &b in bytes {
        counts[b as usize] += 1;
    }
    let total = bytes.len() as f64;
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / total;
            -p * p.log2()
        })
        .sum::<f64>()
        .clamp(0.0, 8.0)
}
