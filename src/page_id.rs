use std::fmt::{Display, Formatter};

use crate::error::{PublishError, Result};

/// Number of random bytes behind a page id. Hex encoding doubles it.
pub const PAGE_ID_BYTES: usize = 8;

#[derive(Debug, Clone, Eq, Hash, PartialEq, Ord, PartialOrd)]
pub struct PageId(String);

impl PageId {
    /// Mints a fresh id from the OS random source.
    ///
    /// Nothing checks the id against pages already on disk; the page store
    /// refuses to create over an existing directory and the publisher retries.
    pub fn generate() -> Result<PageId> {
        let mut buf = [0u8; PAGE_ID_BYTES];
        getrandom::getrandom(&mut buf).map_err(PublishError::Entropy)?;
        Ok(PageId(hex::encode(buf)))
    }

    /// Accepts an id coming from a request path.
    ///
    /// Only path traversal is guarded here: anything with a `.` or `/` is
    /// rejected, everything else is looked up as-is.
    pub fn parse(id: &str) -> Result<PageId> {
        if id.is_empty() || id.contains('.') || id.contains('/') {
            return Err(PublishError::Validation("Invalid page ID".to_string()));
        }
        Ok(PageId(id.to_string()))
    }

    /// True when `id` has the shape [`PageId::generate`] produces: 16
    /// lowercase hex digits.
    pub fn is_generated(id: &str) -> bool {
        id.len() == 2 * PAGE_ID_BYTES && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Public path the rendered page is served from.
    pub fn url(&self) -> String {
        format!("/{}/", self.0)
    }
}

impl Display for PageId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PageId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_lowercase_hex() {
        for _ in 0..32 {
            let id = PageId::generate().unwrap();
            assert!(PageId::is_generated(id.as_str()), "unexpected id {}", id);
        }
    }

    #[test]
    fn test_generate_differs() {
        let a = PageId::generate().unwrap();
        let b = PageId::generate().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_url() {
        let id = PageId::parse("0a1b2c3d4e5f6789").unwrap();
        assert_eq!(id.url(), "/0a1b2c3d4e5f6789/");
    }

    #[test]
    fn test_parse_rejects_traversal() {
        for bad in ["", ".", "..", "../etc", "a/b", "index.html", "abc."] {
            assert!(matches!(PageId::parse(bad), Err(PublishError::Validation(_))), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_is_generated() {
        assert!(PageId::is_generated("0a1b2c3d4e5f6789"));
        for other in ["", "assets", ".well-known", "0A1B2C3D4E5F6789", "0a1b2c3d4e5f678", "0a1b2c3d4e5f67890", "0a1b2c3d4e5f678g"] {
            assert!(!PageId::is_generated(other), "accepted {:?}", other);
        }
    }

    #[test]
    fn test_parse_accepts_anything_else() {
        // Not restricted to hex: ids are looked up, not trusted.
        assert_eq!(PageId::parse("not-hex_but-ok").unwrap().as_str(), "not-hex_but-ok");
    }
}
