use async_trait::async_trait;
use reqwest::Url;
use tracing::info;

use super::UrlSharer;
use crate::task::{UploadResult, UrlSharingServiceType};

/// Builds a share link for a URL; nothing is sent over the network
#[derive(Debug, Clone)]
pub struct ShareLinkSharer {
    service: UrlSharingServiceType,
    template: Option<String>,
}

impl ShareLinkSharer {
    pub fn new(service: UrlSharingServiceType) -> Self {
        Self {
            service,
            template: None,
        }
    }

    /// Custom service whose template contains `{url}`
    pub fn custom(template: impl Into<String>) -> Self {
        Self {
            service: UrlSharingServiceType::CustomUrlSharingService,
            template: Some(template.into()),
        }
    }

    pub fn link_for(&self, url: &str) -> Result<String, String> {
        let link = match self.service {
            UrlSharingServiceType::Email => Url::parse_with_params("mailto:", &[("body", url)]),
            UrlSharingServiceType::Twitter => {
                Url::parse_with_params("https://twitter.com/intent/tweet", &[("text", url)])
            }
            UrlSharingServiceType::Reddit => {
                Url::parse_with_params("https://www.reddit.com/submit", &[("url", url)])
            }
            UrlSharingServiceType::CustomUrlSharingService => {
                let template = self
                    .template
                    .as_deref()
                    .ok_or_else(|| "custom sharing service has no template".to_string())?;
                return Ok(template.replace("{url}", &percent_encode(url)));
            }
        };

        link.map(String::from).map_err(|e| e.to_string())
    }
}

#[async_trait]
impl UrlSharer for ShareLinkSharer {
    async fn share(&self, url: &str) -> UploadResult {
        let mut result = UploadResult {
            is_url_expected: false,
            ..UploadResult::default()
        };

        if url.trim().is_empty() {
            result.push_error("Nothing to share: URL is empty");
            return result;
        }

        match self.link_for(url) {
            Ok(link) => {
                info!(service = %self.service, link, "Share link ready");
                result.share_url = Some(link);
            }
            Err(e) => result.push_error(format!("Failed to build share link: {e}")),
        }
        result
    }
}

/// Percent-encode everything outside the RFC 3986 unreserved set
fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len() * 3);
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
