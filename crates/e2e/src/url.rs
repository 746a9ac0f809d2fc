//! Base-URL joining for the application under test

/// Builds full URLs from a base URL and relative paths.
///
/// Joining is plain concatenation: no slash is added or removed, so
/// `"http://host/"` + `"/a"` gives `"http://host//a"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlBuilder {
    base_url: String,
}

impl UrlBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, relative: &str) -> String {
        format!("{}{}", self.base_url, relative)
    }
}
