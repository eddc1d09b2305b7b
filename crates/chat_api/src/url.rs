use url::Url;

use crate::error::ChatApiError;

/// Default origin of a locally running chat service.
pub const DEFAULT_BASE_URL: &str = "http://localhost:61990";

/// Resolved endpoint set for one base URL.
///
/// Any path on the base URL is kept as a prefix, so a service mounted under
/// `/proxy` yields `/proxy/api/chat`. Chat ids are percent-encoded as single
/// path segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base: Url,
}

impl Endpoints {
    pub fn new(base_url: &str) -> Result<Self, ChatApiError> {
        let base = if base_url.trim().is_empty() {
            DEFAULT_BASE_URL
        } else {
            base_url.trim()
        };

        let url = Url::parse(base)
            .map_err(|error| ChatApiError::InvalidBaseUrl(format!("{base}: {error}")))?;
        if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
            return Err(ChatApiError::InvalidBaseUrl(base.to_owned()));
        }
        Ok(Self { base: url })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// `POST /api/chat`: start or continue a chat.
    pub fn chat(&self) -> Url {
        self.join(&["api", "chat"])
    }

    /// `POST /api/chat/retry`
    pub fn retry(&self) -> Url {
        self.join(&["api", "chat", "retry"])
    }

    /// `POST /api/chat/edit`
    pub fn edit(&self) -> Url {
        self.join(&["api", "chat", "edit"])
    }

    /// `POST /api/chat/{id}/abort`
    pub fn abort(&self, chat_id: &str) -> Url {
        self.join(&["api", "chat", chat_id, "abort"])
    }

    /// `GET /api/chat/{id}`
    pub fn history(&self, chat_id: &str) -> Url {
        self.join(&["api", "chat", chat_id])
    }

    fn join(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        url.set_query(None);
        url.set_fragment(None);
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}
