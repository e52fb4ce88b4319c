//! Document configuration

use url::Url;

/// Document configuration
#[derive(Debug, Clone)]
pub struct DocumentConfig {
    /// Document URL; relative resource URIs resolve against it
    pub url: Option<Url>,
    /// Global image loading switch
    pub images_enabled: bool,
    /// Whether external style sheets are fetched
    pub external_css_enabled: bool,
    /// User agent string sent with resource requests
    pub user_agent: String,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            url: None,
            images_enabled: true,
            external_css_enabled: true,
            user_agent: "Arbor/0.1".to_string(),
        }
    }
}

impl DocumentConfig {
    pub fn with_url(mut self, url: &str) -> Self {
        match Url::parse(url) {
            Ok(url) => self.url = Some(url),
            Err(e) => tracing::warn!("ignoring document URL {}: {}", url, e),
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DocumentConfig::default();
        assert!(config.url.is_none());
        assert!(config.images_enabled);
        assert!(config.external_css_enabled);
        assert!(config.user_agent.starts_with("Arbor"));
    }

    #[test]
    fn test_with_url() {
        let config = DocumentConfig::default().with_url("http://example.com/index.html");
        assert_eq!(config.url.unwrap().host_str(), Some("example.com"));

        let config = DocumentConfig::default().with_url("not a url");
        assert!(config.url.is_none());
    }
}
