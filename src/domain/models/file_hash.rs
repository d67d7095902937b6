use sha2::{Digest, Sha256};

/// Distinguished hash for empty or unreadable file content (§4.2).
pub const EMPTY_DIGEST: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Computes the SHA-256 hex digest of file content (C2, §4.2).
pub fn compute_file_hash(content: &[u8]) -> String {
    if content.is_empty() {
        return EMPTY_DIGEST.to_string();
    }
    format!("{:x}", Sha256::digest(content))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_file_hash_is_deterministic() {
        let a = compute_file_hash(b"fn main() {}");
        let b = compute_file_hash(b"fn main() {}");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_different_content_hashes_differently() {
        let a = compute_file_hash(b"fn main() {}");
        let b = compute_file_hash(b"fn main() { println!(\"x\"); }");
        assert_ne!(a, b);
    }

    #[test]
    fn test_empty_content_hashes_to_distinguished_digest() {
        assert_eq!(compute_file_hash(b""), EMPTY_DIGEST);
    }
}
