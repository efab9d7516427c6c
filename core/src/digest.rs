use sha2::{Digest, Sha256};

/// Hex SHA-256 over the given parts, each followed by a NUL separator so
/// `("ab", "c")` and `("a", "bc")` differ.
pub fn sha256_hex(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separator_prevents_concatenation_collisions() {
        assert_ne!(sha256_hex(&["ab", "c"]), sha256_hex(&["a", "bc"]));
        assert_eq!(sha256_hex(&["x"]), sha256_hex(&["x"]));
        assert_eq!(sha256_hex(&["x"]).len(), 64);
    }
}
