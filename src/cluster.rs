//! Thin HTTP client for the search-cluster contract (see spec §6 `Cluster contract`).
//!
//! Deliberately not a full client SDK: the core only ever needs scroll-style
//! search, a single-document fetch, and a partial update. Each worker in the
//! engine (§4.F) owns one of these; it is cheap to build (a `reqwest::Client`
//! clone) and holds no document-specific state.

use anyhow::Context;
use serde_json::{json, Value};

/// A single search hit, trimmed to the fields the core touches.
#[derive(Clone, Debug)]
pub struct Hit {
    pub index: String,
    pub id: String,
    pub routing: Option<String>,
    pub source: Value,
}

pub struct ClusterClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, serde::Deserialize)]
struct ScrollResponse {
    #[serde(rename = "_scroll_id")]
    scroll_id: Option<String>,
    hits: ScrollHits,
}

#[derive(Debug, serde::Deserialize)]
struct ScrollHits {
    hits: Vec<RawHit>,
}

#[derive(Debug, serde::Deserialize)]
struct RawHit {
    #[serde(rename = "_index")]
    index: String,
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_routing")]
    routing: Option<String>,
    #[serde(rename = "_source", default)]
    source: Value,
}

impl From<RawHit> for Hit {
    fn from(raw: RawHit) -> Self {
        Hit {
            index: raw.index,
            id: raw.id,
            routing: raw.routing,
            source: raw.source,
        }
    }
}

/// One page of a scroll, plus the cursor to fetch the next page.
pub struct ScrollPage {
    pub hits: Vec<Hit>,
    pub scroll_id: Option<String>,
}

impl ClusterClient {
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("build cluster http client")?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    /// Opens a scroll over `index`, optionally filtered by `query_string`,
    /// projecting only `source_fields`, page size `size`, cursor lifetime
    /// `scroll`.
    pub async fn open_scroll(
        &self,
        index: &str,
        query_string: Option<&str>,
        source_fields: &[&str],
        size: usize,
        scroll: &str,
    ) -> anyhow::Result<ScrollPage> {
        let mut body = json!({
            "size": size,
            "_source": source_fields,
        });
        if let Some(q) = query_string.filter(|q| !q.is_empty()) {
            body["query"] = json!({ "query_string": { "query": q } });
        }
        let url = format!(
            "{}/{}/_search?scroll={}",
            self.base_url.trim_end_matches('/'),
            index,
            scroll
        );
        let resp: ScrollResponse = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("open scroll")?
            .error_for_status()
            .context("open scroll response status")?
            .json()
            .await
            .context("decode scroll response")?;
        Ok(ScrollPage {
            hits: resp.hits.hits.into_iter().map(Hit::from).collect(),
            scroll_id: resp.scroll_id,
        })
    }

    /// Fetches the next page for an open scroll cursor.
    pub async fn scroll_next(&self, scroll_id: &str, scroll: &str) -> anyhow::Result<ScrollPage> {
        let url = format!("{}/_search/scroll", self.base_url.trim_end_matches('/'));
        let body = json!({ "scroll": scroll, "scroll_id": scroll_id });
        let resp: ScrollResponse = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("continue scroll")?
            .error_for_status()
            .context("continue scroll response status")?
            .json()
            .await
            .context("decode scroll continuation")?;
        Ok(ScrollPage {
            hits: resp.hits.hits.into_iter().map(Hit::from).collect(),
            scroll_id: resp.scroll_id,
        })
    }

    /// Fetches a single document by `{index, id, routing}`.
    pub async fn get_document(
        &self,
        index: &str,
        id: &str,
        routing: Option<&str>,
    ) -> anyhow::Result<Hit> {
        let mut url = format!("{}/{}/_doc/{}", self.base_url.trim_end_matches('/'), index, id);
        if let Some(r) = routing {
            url.push_str("?routing=");
            url.push_str(r);
        }
        #[derive(serde::Deserialize)]
        struct GetResponse {
            #[serde(rename = "_index")]
            index: String,
            #[serde(rename = "_id")]
            id: String,
            #[serde(rename = "_routing")]
            routing: Option<String>,
            #[serde(rename = "_source")]
            source: Value,
        }
        let resp: GetResponse = self
            .http
            .get(&url)
            .send()
            .await
            .context("get document")?
            .error_for_status()
            .context("get document response status")?
            .json()
            .await
            .context("decode document")?;
        Ok(Hit {
            index: resp.index,
            id: resp.id,
            routing: resp.routing,
            source: resp.source,
        })
    }

    /// Issues a partial update of `doc` onto `{index, id, routing}`. The body
    /// carries only the changed fields — it must never clobber unrelated
    /// document content.
    pub async fn update(
        &self,
        index: &str,
        id: &str,
        routing: Option<&str>,
        doc: Value,
    ) -> anyhow::Result<()> {
        let mut url = format!("{}/{}/_update/{}", self.base_url.trim_end_matches('/'), index, id);
        if let Some(r) = routing {
            url.push_str("?routing=");
            url.push_str(r);
        }
        self.http
            .post(&url)
            .json(&json!({ "doc": doc }))
            .send()
            .await
            .context("update document")?
            .error_for_status()
            .context("update response status")?;
        Ok(())
    }

    /// Total hit count for a query, used only for progress reporting.
    pub async fn count(&self, index: &str, query_string: Option<&str>) -> anyhow::Result<u64> {
        let mut body = json!({});
        if let Some(q) = query_string.filter(|q| !q.is_empty()) {
            body["query"] = json!({ "query_string": { "query": q } });
        }
        let url = format!("{}/{}/_count", self.base_url.trim_end_matches('/'), index);
        #[derive(serde::Deserialize)]
        struct CountResponse {
            count: u64,
        }
        let resp: CountResponse = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("count")?
            .error_for_status()
            .context("count response status")?
            .json()
            .await
            .context("decode count")?;
        Ok(resp.count)
    }
}

impl Clone for ClusterClient {
    fn clone(&self) -> Self {
        Self {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
        }
    }
}
