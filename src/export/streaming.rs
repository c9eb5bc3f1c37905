//! Paginated result streaming for export operations
//!
//! The search backend is an external collaborator reached through
//! [`SearchBackend`]. [`ScrollingQuery`] turns the initial page plus the
//! continuation token into a sequence of batches, one backend call at a time.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::record::SearchHit;

/// Search request handed to the backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchRequest {
    /// Indices to search; all indices when empty
    pub indices: Vec<String>,
    /// Document types to search; all types when empty
    pub types: Vec<String>,
    /// Query body (`source` parameter or request body)
    pub source: Option<Value>,
    /// `q` query-string
    pub query_string: Option<String>,
    /// Offset of the first hit
    pub from: Option<u64>,
    /// Number of hits to return
    pub size: Option<u64>,
    /// Keep-alive of the scroll context; None disables scrolling
    pub scroll: Option<Duration>,
}

impl SearchRequest {
    /// Create a request over `indices`
    pub fn new<I, S>(indices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            indices: indices.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Whether the backend should open a scroll context
    pub fn is_scroll(&self) -> bool {
        self.scroll.is_some()
    }
}

/// One page of results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPage {
    pub hits: Vec<SearchHit>,
    /// Continuation token; None when there is nothing to continue
    pub scroll_id: Option<String>,
    /// Number of hits matching the query overall
    pub total_hits: u64,
}

/// Search backend consumed by the export pipeline.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Run the initial search
    ///
    /// # Arguments
    /// * `request` - Search request
    ///
    /// # Returns
    /// * `Result<SearchPage>` - First page, with a scroll id when scrolling
    async fn search(&self, request: &SearchRequest) -> Result<SearchPage>;

    /// Fetch the page following `scroll_id`
    async fn scroll(&self, scroll_id: &str, keep_alive: Duration) -> Result<SearchPage>;

    /// Release the scroll context
    async fn clear_scroll(&self, scroll_id: &str) -> Result<()>;
}

/// Continuation state of a scrolled search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrollState {
    /// Last continuation token seen
    pub token: Option<String>,
    /// Set once no further page may be requested
    pub exhausted: bool,
}

impl ScrollState {
    /// Record a fetched page
    ///
    /// An empty page or a missing token ends the scroll; either one is enough.
    pub fn advance(&mut self, page: &SearchPage) {
        if page.scroll_id.is_some() {
            self.token = page.scroll_id.clone();
        }
        if page.hits.is_empty() || page.scroll_id.is_none() {
            self.exhausted = true;
        }
    }
}

/// Trait for streaming query results in batches
#[async_trait]
pub trait StreamingQuery: Send {
    /// Fetch the next batch of hits
    ///
    /// # Returns
    /// * `Result<Option<Vec<SearchHit>>>` - Next non-empty batch, or None if exhausted
    async fn next_batch(&mut self) -> Result<Option<Vec<SearchHit>>>;

    /// Close the query and release backend resources
    async fn close(&mut self) -> Result<()>;
}

/// Streams the pages of a search, continuing through its scroll context.
pub struct ScrollingQuery {
    backend: Arc<dyn SearchBackend>,
    /// First page, already fetched by the caller
    initial: Option<SearchPage>,
    /// Keep-alive for continuation calls; None when scrolling is disabled
    keep_alive: Option<Duration>,
    state: ScrollState,
    pages: u64,
    total_fetched: u64,
    closed: bool,
}

impl ScrollingQuery {
    /// Create a scrolling query
    ///
    /// # Arguments
    /// * `backend` - Backend to continue the scroll against
    /// * `initial` - Page returned by the initial search
    /// * `keep_alive` - Scroll keep-alive, None to treat the initial page as the only one
    pub fn new(
        backend: Arc<dyn SearchBackend>,
        initial: SearchPage,
        keep_alive: Option<Duration>,
    ) -> Self {
        // cleared on close even when no page is ever read
        let state = ScrollState {
            token: initial.scroll_id.clone(),
            exhausted: false,
        };
        Self {
            backend,
            initial: Some(initial),
            keep_alive,
            state,
            pages: 0,
            total_fetched: 0,
            closed: false,
        }
    }

    /// Current continuation state
    pub fn state(&self) -> &ScrollState {
        &self.state
    }

    /// Number of non-empty pages handed out so far
    pub fn pages(&self) -> u64 {
        self.pages
    }

    fn accept(&mut self, page: SearchPage) -> Option<Vec<SearchHit>> {
        self.state.advance(&page);
        if self.keep_alive.is_none() {
            self.state.exhausted = true;
        }

        debug!(
            "scroll_id: {:?}, total_hits: {}, hits: {}, current: {}",
            page.scroll_id,
            page.total_hits,
            page.hits.len(),
            self.total_fetched + page.hits.len() as u64
        );

        if page.hits.is_empty() {
            return None;
        }
        self.pages += 1;
        self.total_fetched += page.hits.len() as u64;
        Some(page.hits)
    }
}

#[async_trait]
impl StreamingQuery for ScrollingQuery {
    async fn next_batch(&mut self) -> Result<Option<Vec<SearchHit>>> {
        if self.closed {
            return Ok(None);
        }

        if let Some(page) = self.initial.take() {
            return Ok(self.accept(page));
        }

        if self.state.exhausted {
            return Ok(None);
        }

        let (Some(token), Some(keep_alive)) = (self.state.token.clone(), self.keep_alive) else {
            self.state.exhausted = true;
            return Ok(None);
        };

        match self.backend.scroll(&token, keep_alive).await {
            Ok(page) => Ok(self.accept(page)),
            Err(e) => {
                self.state.exhausted = true;
                Err(e)
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.state.exhausted = true;

        if let Some(token) = self.state.token.take() {
            if let Err(e) = self.backend.clear_scroll(&token).await {
                warn!("Failed to clear scroll {}: {}", token, e);
            }
        }

        info!(
            "Closed scrolling query after {} pages ({} hits)",
            self.pages, self.total_fetched
        );
        Ok(())
    }
}

impl Drop for ScrollingQuery {
    fn drop(&mut self) {
        if !self.closed && self.state.token.is_some() {
            debug!("ScrollingQuery dropped without explicit close");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use serde_json::Map;

    /// Replays a fixed list of continuation pages.
    struct ScriptedBackend {
        pages: Mutex<Vec<SearchPage>>,
        cleared: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn new(mut pages: Vec<SearchPage>) -> Self {
            pages.reverse();
            Self {
                pages: Mutex::new(pages),
                cleared: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SearchBackend for ScriptedBackend {
        async fn search(&self, _request: &SearchRequest) -> Result<SearchPage> {
            unreachable!("initial page is supplied by the test")
        }

        async fn scroll(&self, _scroll_id: &str, _keep_alive: Duration) -> Result<SearchPage> {
            Ok(self.pages.lock().unwrap().pop().unwrap_or_default())
        }

        async fn clear_scroll(&self, scroll_id: &str) -> Result<()> {
            self.cleared.lock().unwrap().push(scroll_id.to_string());
            Ok(())
        }
    }

    fn page(ids: &[&str], scroll_id: Option<&str>) -> SearchPage {
        SearchPage {
            hits: ids.iter().map(|id| SearchHit::new("idx", *id, Map::new())).collect(),
            scroll_id: scroll_id.map(String::from),
            total_hits: 10,
        }
    }

    async fn drain(query: &mut ScrollingQuery) -> Vec<String> {
        let mut ids = Vec::new();
        while let Some(batch) = query.next_batch().await.unwrap() {
            ids.extend(batch.into_iter().map(|hit| hit.id));
        }
        ids
    }

    #[tokio::test]
    async fn test_scroll_until_empty_page() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            page(&["3", "4"], Some("s2")),
            page(&[], Some("s3")),
            page(&["never"], Some("s4")),
        ]));
        let mut query = ScrollingQuery::new(
            backend.clone(),
            page(&["1", "2"], Some("s1")),
            Some(Duration::from_secs(60)),
        );

        assert_eq!(drain(&mut query).await, vec!["1", "2", "3", "4"]);
        assert!(query.state().exhausted);
        assert_eq!(query.pages(), 2);

        query.close().await.unwrap();
        assert_eq!(*backend.cleared.lock().unwrap(), vec!["s3".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_token_ends_after_page() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            page(&["3"], None),
            page(&["never"], Some("x")),
        ]));
        let mut query =
            ScrollingQuery::new(backend, page(&["1"], Some("s1")), Some(Duration::from_secs(1)));

        assert_eq!(drain(&mut query).await, vec!["1", "3"]);
    }

    #[tokio::test]
    async fn test_scrolling_disabled_yields_single_page() {
        let backend = Arc::new(ScriptedBackend::new(vec![page(&["never"], Some("s2"))]));
        let mut query = ScrollingQuery::new(backend, page(&["1", "2"], None), None);

        assert_eq!(drain(&mut query).await, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_empty_initial_page() {
        let backend = Arc::new(ScriptedBackend::new(vec![page(&["never"], Some("s2"))]));
        let mut query =
            ScrollingQuery::new(backend, page(&[], Some("s1")), Some(Duration::from_secs(1)));

        assert!(query.next_batch().await.unwrap().is_none());
        assert!(query.next_batch().await.unwrap().is_none());
    }

    #[test]
    fn test_scroll_state_advance() {
        let mut state = ScrollState::default();
        state.advance(&page(&["1"], Some("a")));
        assert_eq!(state.token.as_deref(), Some("a"));
        assert!(!state.exhausted);

        state.advance(&page(&["2"], None));
        assert_eq!(state.token.as_deref(), Some("a"));
        assert!(state.exhausted);
    }
}
