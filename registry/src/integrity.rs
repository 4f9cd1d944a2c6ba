//! SHA-256 digests and `checksums.txt` handling.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use crate::error::{RegistryError, Result};

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Parses `sha256sum`-style lines: `<hex digest>  <file name>`. Blank lines and `#` comments
/// are skipped; a leading `*` (binary mode marker) on the file name is dropped.
pub fn parse_checksums(text: &str) -> Result<BTreeMap<String, String>> {
    let mut out = BTreeMap::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.split_whitespace();
        let (Some(digest), Some(name)) = (parts.next(), parts.next()) else {
            return Err(RegistryError::parse(
                "checksums.txt",
                format!("line {}: expected '<sha256> <file>'", lineno + 1),
            ));
        };
        if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(RegistryError::parse(
                "checksums.txt",
                format!("line {}: '{}' is not a sha256 digest", lineno + 1, digest),
            ));
        }
        out.insert(
            name.trim_start_matches('*').to_string(),
            digest.to_ascii_lowercase(),
        );
    }
    Ok(out)
}

/// Renders checksums in the same format [`parse_checksums`] reads.
pub fn render_checksums(checksums: &BTreeMap<String, String>) -> String {
    checksums
        .iter()
        .map(|(name, digest)| format!("{}  {}\n", digest, name))
        .collect()
}

/// Fails with `IntegrityCheckFailed` unless `bytes` hashes to the digest listed for `file`.
pub fn verify(file: &str, bytes: &[u8], checksums: &BTreeMap<String, String>) -> Result<()> {
    let expected = checksums
        .get(file)
        .ok_or_else(|| RegistryError::IntegrityCheckFailed {
            file: file.to_string(),
            expected: "<listed digest>".to_string(),
            actual: "<not listed>".to_string(),
        })?;
    let actual = sha256_hex(bytes);
    if &actual != expected {
        return Err(RegistryError::IntegrityCheckFailed {
            file: file.to_string(),
            expected: expected.clone(),
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_of_known_input() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn parse_and_verify() {
        let text = format!(
            "# data release\n{}  models.yaml\n{} *overrides.yaml\n",
            sha256_hex(b"models"),
            sha256_hex(b"overrides")
        );
        let sums = parse_checksums(&text).unwrap();
        assert_eq!(sums.len(), 2);
        assert!(verify("models.yaml", b"models", &sums).is_ok());
        assert!(verify("overrides.yaml", b"overrides", &sums).is_ok());
        assert!(matches!(
            verify("models.yaml", b"tampered", &sums),
            Err(RegistryError::IntegrityCheckFailed { .. })
        ));
        assert!(verify("other.yaml", b"x", &sums).is_err());
        assert_eq!(parse_checksums(&render_checksums(&sums)).unwrap(), sums);
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(parse_checksums("abc models.yaml\n").is_err());
        assert!(parse_checksums("onlyonefield\n").is_err());
    }
}
