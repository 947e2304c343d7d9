use std::time::Duration;

use log::{debug, info};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, AUTHORIZATION, USER_AGENT};
use reqwest::StatusCode;
use url::Url;

use crate::account::Profile;
use crate::error::{ExtractionError, SessionError};

/// One raw record surfaced by an extraction pass, before validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Candidate {
    /// Profile link or handle as rendered (`/alice`, `@alice`, ...).
    pub link: Option<String>,
    pub profile: Profile,
}

impl Candidate {
    pub fn new(link: impl Into<String>, display_name: impl Into<String>) -> Self {
        Candidate {
            link: Some(link.into()),
            profile: Profile {
                display_name: display_name.into(),
                ..Profile::default()
            },
        }
    }
}

/// A browsing session that can load a list view and make it grow.
pub trait SessionProvider {
    type Page;

    fn navigate(&mut self, url: &str) -> Result<(), SessionError>;

    /// Current rendered state of the loaded view.
    fn snapshot(&mut self) -> Result<Self::Page, SessionError>;

    /// Ask the view to load more entries (scroll, next chunk, ...).
    fn reveal_more(&mut self) -> Result<(), SessionError>;

    fn close(&mut self) {}
}

/// Turns a rendered page into candidate records.
pub trait ItemExtractor<P> {
    fn extract(&self, page: &P) -> Vec<Result<Candidate, ExtractionError>>;
}

/// Accumulated documents of an incrementally loaded view.
#[derive(Debug, Clone, Default)]
pub struct PageSnapshot {
    pub url: String,
    pub documents: Vec<String>,
}

/// Session over plain HTTP against a server that renders list views and
/// serves further chunks under `?page=N`.
pub struct HttpSession {
    client: Client,
    base_url: Url,
    current: Option<Url>,
    documents: Vec<String>,
    next_page: u32,
}

impl HttpSession {
    pub fn connect(
        base_url: &str,
        auth_token: Option<&str>,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, SessionError> {
        let base_url =
            Url::parse(base_url).map_err(|_| SessionError::InvalidUrl(base_url.to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        let agent = HeaderValue::from_str(user_agent)
            .map_err(|_| SessionError::Auth("user agent is not a valid header".to_string()))?;
        headers.insert(USER_AGENT, agent);
        if let Some(token) = auth_token.filter(|t| !t.is_empty()) {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| SessionError::Auth("token is not a valid header".to_string()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .cookie_store(true)
            .build()?;

        let session = HttpSession {
            client,
            base_url,
            current: None,
            documents: Vec::new(),
            next_page: 2,
        };

        // Credentials are checked before any target is touched.
        session.fetch(&session.base_url)?;
        info!("Session established against {}", session.base_url);
        Ok(session)
    }

    fn fetch(&self, url: &Url) -> Result<String, SessionError> {
        debug!("GET {}", url);
        let resp = self.client.get(url.clone()).send()?;
        let status = resp.status();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(SessionError::Auth(format!("{} returned {}", url, status)))
            }
            StatusCode::TOO_MANY_REQUESTS => Err(SessionError::RateLimited {
                url: url.to_string(),
            }),
            s if !s.is_success() => Err(SessionError::Navigation {
                url: url.to_string(),
                reason: s.to_string(),
            }),
            _ => Ok(resp.text()?),
        }
    }
}

impl SessionProvider for HttpSession {
    type Page = PageSnapshot;

    fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        let url = Url::parse(url).map_err(|_| SessionError::InvalidUrl(url.to_string()))?;
        let html = self.fetch(&url)?;
        self.documents = vec![html];
        self.current = Some(url);
        self.next_page = 2;
        Ok(())
    }

    fn snapshot(&mut self) -> Result<PageSnapshot, SessionError> {
        let url = self.current.as_ref().ok_or(SessionError::NoPage)?;
        Ok(PageSnapshot {
            url: url.to_string(),
            documents: self.documents.clone(),
        })
    }

    fn reveal_more(&mut self) -> Result<(), SessionError> {
        let mut next = self.current.clone().ok_or(SessionError::NoPage)?;
        next.query_pairs_mut()
            .append_pair("page", &self.next_page.to_string());

        match self.fetch(&next) {
            Ok(html) => {
                self.documents.push(html);
                self.next_page += 1;
                Ok(())
            }
            // Past the last chunk. Nothing new renders, the stall window ends the list.
            Err(SessionError::Navigation { url, reason }) => {
                debug!("No further content at {}: {}", url, reason);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn close(&mut self) {
        self.current = None;
        self.documents.clear();
        info!("Session closed.");
    }
}

