use serde::{Deserialize, Serialize};

/// Outcome of one backend call (upload, shorten or share)
///
/// Backends translate transport faults into `errors` entries instead of
/// returning them as `Err`, so a result always exists once the stage ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    pub url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub deletion_url: Option<String>,
    pub shortened_url: Option<String>,
    /// Link produced by a sharing service
    pub share_url: Option<String>,
    /// Raw response body, kept for diagnostics
    pub response: Option<String>,
    pub errors: Vec<String>,
    /// When false, a missing URL is not an error
    pub is_url_expected: bool,
}

impl Default for UploadResult {
    fn default() -> Self {
        Self {
            url: None,
            thumbnail_url: None,
            deletion_url: None,
            shortened_url: None,
            share_url: None,
            response: None,
            errors: Vec::new(),
            is_url_expected: true,
        }
    }
}

impl UploadResult {
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn from_error(error: impl Into<String>) -> Self {
        Self {
            errors: vec![error.into()],
            ..Self::default()
        }
    }

    pub fn push_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    pub fn is_error(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_url(&self) -> bool {
        self.url.as_deref().is_some_and(|u| !u.is_empty())
    }

    pub fn has_shortened_url(&self) -> bool {
        self.shortened_url.as_deref().is_some_and(|u| !u.is_empty())
    }

    pub fn is_success(&self) -> bool {
        !self.is_error() && (self.has_url() || !self.is_url_expected)
    }

    /// The most useful link for display: shortened first, then the plain URL
    pub fn best_url(&self) -> Option<&str> {
        self.shortened_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .or_else(|| self.url.as_deref().filter(|u| !u.is_empty()))
    }

    pub fn first_error(&self) -> Option<&str> {
        self.errors.first().map(String::as_str)
    }
}
