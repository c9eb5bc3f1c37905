//! In-process search backend
//!
//! [`MemoryBackend`] keeps named indices of hits in memory and implements
//! [`SearchBackend`] over them, scroll contexts included. The command-line
//! binary exports NDJSON files through it and the test-suite uses it as the
//! backend of end-to-end exports.
//!
//! Supported queries:
//! - `q` query-string: `*:*` or `field:value`
//! - body queries: `match_all`, `term` and `match` on a single field

use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::error::{BackendError, ConfigError, Result};
use crate::export::streaming::{SearchBackend, SearchPage, SearchRequest};
use crate::record::{path, value_to_string, Record, SearchHit};

/// Hits returned by a plain search that names no `size`.
const DEFAULT_SIZE: usize = 10;

/// Snapshot of a scrolled search.
struct ScrollContext {
    hits: Vec<SearchHit>,
    position: usize,
    total: u64,
    /// Renewed by every continuation call; None never expires
    expires: Option<Instant>,
}

/// Condition a hit must satisfy.
enum Filter {
    All,
    Equals(String, Value),
}

impl Filter {
    fn accepts(&self, source: &Record) -> bool {
        match self {
            Filter::All => true,
            Filter::Equals(field, expected) => path::get(source, field).is_some_and(|found| {
                found == expected || value_to_string(found) == value_to_string(expected)
            }),
        }
    }
}

/// Search backend over in-memory indices.
pub struct MemoryBackend {
    indices: RwLock<IndexMap<String, Vec<SearchHit>>>,
    scrolls: Mutex<HashMap<String, ScrollContext>>,
    /// Hits per scroll page
    page_size: usize,
}

impl MemoryBackend {
    /// Create an empty backend
    ///
    /// # Arguments
    /// * `page_size` - Hits per scroll page
    pub fn new(page_size: usize) -> Self {
        Self {
            indices: RwLock::new(IndexMap::new()),
            scrolls: Mutex::new(HashMap::new()),
            page_size: page_size.max(1),
        }
    }

    /// Add a hit to its index, creating the index if needed
    pub async fn insert(&self, hit: SearchHit) {
        let mut indices = self.indices.write().await;
        indices.entry(hit.index.clone()).or_default().push(hit);
    }

    /// Load hits from an NDJSON file
    ///
    /// Each line is either a hit object (`_index`, `_type`, `_id`, `_source`)
    /// or a bare source document. Missing indices default to `index`, missing
    /// ids to the line number.
    ///
    /// # Arguments
    /// * `file` - NDJSON file
    /// * `index` - Index for lines that do not name one
    ///
    /// # Returns
    /// * `Result<usize>` - Number of hits loaded
    pub async fn load_ndjson(&self, file: &Path, index: &str) -> Result<usize> {
        if !file.is_file() {
            return Err(ConfigError::FileNotFound(file.display().to_string()).into());
        }
        let reader = BufReader::new(tokio::fs::File::open(file).await?);
        let mut lines = reader.lines();
        let mut loaded = 0usize;
        let mut line_no = 0usize;

        while let Some(line) = lines.next_line().await? {
            line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            let value: Value = serde_json::from_str(&line).map_err(|e| ConfigError::InvalidValue {
                field: format!("{}:{}", file.display(), line_no),
                value: e.to_string(),
            })?;
            let Value::Object(mut object) = value else {
                return Err(ConfigError::InvalidValue {
                    field: format!("{}:{}", file.display(), line_no),
                    value: "not a JSON object".to_string(),
                }
                .into());
            };

            let hit = match object.remove("_source") {
                Some(Value::Object(source)) => {
                    let hit_index = object.get("_index").and_then(Value::as_str).unwrap_or(index);
                    let id = object
                        .get("_id")
                        .and_then(value_to_string)
                        .unwrap_or_else(|| line_no.to_string());
                    let mut hit = SearchHit::new(hit_index, id, source);
                    hit.doc_type = object.get("_type").and_then(Value::as_str).map(str::to_string);
                    hit
                }
                _ => SearchHit::new(index, line_no.to_string(), object),
            };
            self.insert(hit).await;
            loaded += 1;
        }

        debug!("Loaded {} hits from {}", loaded, file.display());
        Ok(loaded)
    }

    /// Number of scroll contexts still open
    pub async fn open_scrolls(&self) -> usize {
        self.scrolls.lock().await.len()
    }

    /// Drop contexts whose keep-alive has run out
    fn expire(scrolls: &mut HashMap<String, ScrollContext>) {
        let now = Instant::now();
        scrolls.retain(|scroll_id, context| {
            let alive = context.expires.is_none_or(|expires| expires > now);
            if !alive {
                debug!("Scroll {} expired", scroll_id);
            }
            alive
        });
    }

    fn filter(request: &SearchRequest) -> Result<Filter> {
        if let Some(q) = request.query_string.as_deref() {
            let q = q.trim();
            if q.is_empty() || q == "*" || q == "*:*" {
                return Ok(Filter::All);
            }
            return match q.split_once(':') {
                Some((field, value)) => Ok(Filter::Equals(
                    field.trim().to_string(),
                    Value::String(value.trim().trim_matches('"').to_string()),
                )),
                None => {
                    Err(BackendError::SearchFailed(format!("unsupported query string: {q}")).into())
                }
            };
        }

        let Some(query) = request.source.as_ref().and_then(|s| s.get("query")) else {
            return Ok(Filter::All);
        };
        let Some((kind, clause)) = query.as_object().and_then(|q| q.iter().next()) else {
            return Ok(Filter::All);
        };

        match kind.as_str() {
            "match_all" => Ok(Filter::All),
            "term" | "match" => {
                let (field, value) = clause
                    .as_object()
                    .and_then(|c| c.iter().next())
                    .ok_or_else(|| BackendError::SearchFailed(format!("malformed {kind} query")))?;
                let value = match value {
                    Value::Object(inner) => inner
                        .get("value")
                        .or_else(|| inner.get("query"))
                        .cloned()
                        .unwrap_or(Value::Null),
                    other => other.clone(),
                };
                Ok(Filter::Equals(field.clone(), value))
            }
            other => Err(BackendError::SearchFailed(format!("unsupported query: {other}")).into()),
        }
    }

    async fn matching(&self, request: &SearchRequest, filter: &Filter) -> Result<Vec<SearchHit>> {
        let indices = self.indices.read().await;
        let selected: Vec<&Vec<SearchHit>> = if request.indices.is_empty()
            || request.indices.iter().any(|i| i == "_all")
        {
            indices.values().collect()
        } else {
            request
                .indices
                .iter()
                .map(|name| {
                    indices
                        .get(name)
                        .ok_or_else(|| BackendError::IndexNotFound(name.clone()).into())
                })
                .collect::<Result<_>>()?
        };

        Ok(selected
            .into_iter()
            .flatten()
            .filter(|hit| {
                request.types.is_empty()
                    || hit.doc_type.as_ref().is_some_and(|t| request.types.contains(t))
            })
            .filter(|hit| filter.accepts(&hit.source))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SearchBackend for MemoryBackend {
    async fn search(&self, request: &SearchRequest) -> Result<SearchPage> {
        let filter = Self::filter(request)?;
        let mut hits = self.matching(request, &filter).await?;
        let total = hits.len() as u64;

        if let Some(keep_alive) = request.scroll {
            let rest = hits.split_off(self.page_size.min(hits.len()));
            let scroll_id = Uuid::new_v4().to_string();
            let mut scrolls = self.scrolls.lock().await;
            Self::expire(&mut scrolls);
            scrolls.insert(
                scroll_id.clone(),
                ScrollContext {
                    hits: rest,
                    position: 0,
                    total,
                    expires: Instant::now().checked_add(keep_alive),
                },
            );
            debug!("Opened scroll {} over {} hits", scroll_id, total);
            return Ok(SearchPage {
                hits,
                scroll_id: Some(scroll_id),
                total_hits: total,
            });
        }

        let from = request.from.unwrap_or(0) as usize;
        let size = request.size.map(|s| s as usize).unwrap_or(DEFAULT_SIZE);
        let page = hits.into_iter().skip(from).take(size).collect();
        Ok(SearchPage {
            hits: page,
            scroll_id: None,
            total_hits: total,
        })
    }

    async fn scroll(&self, scroll_id: &str, keep_alive: Duration) -> Result<SearchPage> {
        let mut scrolls = self.scrolls.lock().await;
        Self::expire(&mut scrolls);
        let context = scrolls.get_mut(scroll_id).ok_or_else(|| {
            BackendError::ScrollFailed(format!("No search context found for id [{scroll_id}]"))
        })?;
        context.expires = Instant::now().checked_add(keep_alive);

        let end = (context.position + self.page_size).min(context.hits.len());
        let hits = context.hits[context.position..end].to_vec();
        context.position = end;
        debug!(
            "Scroll {} (keep alive {:?}): {} hits, {} left",
            scroll_id,
            keep_alive,
            hits.len(),
            context.hits.len() - end
        );

        Ok(SearchPage {
            hits,
            scroll_id: Some(scroll_id.to_string()),
            total_hits: context.total,
        })
    }

    async fn clear_scroll(&self, scroll_id: &str) -> Result<()> {
        if self.scrolls.lock().await.remove(scroll_id).is_some() {
            debug!("Cleared scroll {}", scroll_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn backend() -> MemoryBackend {
        let backend = MemoryBackend::new(2);
        for i in 0..5 {
            let group = if i % 2 == 0 { "even" } else { "odd" };
            let source = json!({ "n": i, "group": { "name": group } });
            let hit = SearchHit::new("items", i.to_string(), source.as_object().cloned().unwrap());
            backend.insert(hit.with_type("item")).await;
        }
        backend
    }

    fn ids(page: &SearchPage) -> Vec<&str> {
        page.hits.iter().map(|h| h.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_scroll_through_index() {
        let backend = backend().await;
        let mut request = SearchRequest::new(["items"]);
        request.scroll = Some(Duration::from_secs(60));

        let first = backend.search(&request).await.unwrap();
        assert_eq!(ids(&first), vec!["0", "1"]);
        assert_eq!(first.total_hits, 5);
        let scroll_id = first.scroll_id.clone().unwrap();

        let second = backend.scroll(&scroll_id, Duration::from_secs(60)).await.unwrap();
        let third = backend.scroll(&scroll_id, Duration::from_secs(60)).await.unwrap();
        let last = backend.scroll(&scroll_id, Duration::from_secs(60)).await.unwrap();
        assert_eq!(ids(&second), vec!["2", "3"]);
        assert_eq!(ids(&third), vec!["4"]);
        assert!(last.hits.is_empty());
        assert_eq!(last.scroll_id.as_deref(), Some(scroll_id.as_str()));

        backend.clear_scroll(&scroll_id).await.unwrap();
        assert_eq!(backend.open_scrolls().await, 0);
        assert!(backend.scroll(&scroll_id, Duration::from_secs(1)).await.is_err());
    }

    #[tokio::test]
    async fn test_from_size_without_scroll() {
        let backend = backend().await;
        let mut request = SearchRequest::new(["items"]);
        request.from = Some(3);
        request.size = Some(10);

        let page = backend.search(&request).await.unwrap();
        assert_eq!(ids(&page), vec!["3", "4"]);
        assert!(page.scroll_id.is_none());
    }

    #[tokio::test]
    async fn test_queries() {
        let backend = backend().await;

        let mut request = SearchRequest::new(["items"]);
        request.query_string = Some("group.name:odd".to_string());
        request.size = Some(10);
        assert_eq!(ids(&backend.search(&request).await.unwrap()), vec!["1", "3"]);

        let mut request = SearchRequest::new(["items"]);
        request.source = Some(json!({ "query": { "term": { "n": { "value": 4 } } } }));
        request.size = Some(10);
        assert_eq!(ids(&backend.search(&request).await.unwrap()), vec!["4"]);

        request.source = Some(json!({ "query": { "fuzzy": { "n": 1 } } }));
        assert!(backend.search(&request).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_index_and_types() {
        let backend = backend().await;
        let err = backend.search(&SearchRequest::new(["missing"])).await.unwrap_err();
        assert_eq!(err.status_code(), 404);

        let mut request = SearchRequest::new(Vec::<String>::new());
        request.types = vec!["other".to_string()];
        assert!(backend.search(&request).await.unwrap().hits.is_empty());
    }

    #[tokio::test]
    async fn test_load_ndjson() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("data.ndjson");
        tokio::fs::write(
            &file,
            "{\"_index\":\"a\",\"_type\":\"t\",\"_id\":\"x\",\"_source\":{\"k\":1}}\n\n{\"k\":2}\n",
        )
        .await
        .unwrap();

        let backend = MemoryBackend::new(10);
        assert_eq!(backend.load_ndjson(&file, "b").await.unwrap(), 2);

        let page = backend.search(&SearchRequest::new(["a"])).await.unwrap();
        assert_eq!(page.hits[0].id, "x");
        assert_eq!(page.hits[0].doc_type.as_deref(), Some("t"));
        let page = backend.search(&SearchRequest::new(["b"])).await.unwrap();
        assert_eq!(page.hits[0].id, "3");

        assert!(backend.load_ndjson(&dir.path().join("none"), "b").await.is_err());
    }

    #[tokio::test]
    async fn test_scroll_context_expires() {
        let backend = backend().await;
        let mut request = SearchRequest::new(["items"]);
        request.scroll = Some(Duration::ZERO);

        let first = backend.search(&request).await.unwrap();
        let scroll_id = first.scroll_id.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert!(backend.scroll(&scroll_id, Duration::from_secs(60)).await.is_err());
        assert_eq!(backend.open_scrolls().await, 0);

        request.scroll = Some(Duration::from_secs(60));
        let kept = backend.search(&request).await.unwrap().scroll_id.unwrap();
        let next = backend.scroll(&kept, Duration::from_secs(60)).await.unwrap();
        assert_eq!(ids(&next), vec!["2", "3"]);
        assert_eq!(backend.open_scrolls().await, 1);
    }
}
