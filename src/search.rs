//! Scroll/cursor search streamer (§4.E).
//!
//! Pulls one page at a time from the cluster and hands hits out one by one;
//! never materializes the full result set.

use std::collections::VecDeque;

use crate::cluster::{ClusterClient, Hit};

pub struct SearchStream {
    client: ClusterClient,
    scroll: String,
    scroll_id: Option<String>,
    buffer: VecDeque<Hit>,
    exhausted: bool,
}

impl SearchStream {
    /// Opens a scroll over `index`/`query_string`, projecting `source_fields`,
    /// paging `batch_size` hits at a time, keep-alive `scroll`.
    pub async fn open(
        client: ClusterClient,
        index: &str,
        query_string: Option<&str>,
        source_fields: &[&str],
        batch_size: usize,
        scroll: &str,
    ) -> anyhow::Result<Self> {
        let page = client
            .open_scroll(index, query_string, source_fields, batch_size, scroll)
            .await?;
        let exhausted = page.hits.is_empty();
        Ok(Self {
            client,
            scroll: scroll.to_string(),
            scroll_id: page.scroll_id,
            buffer: page.hits.into(),
            exhausted,
        })
    }

    /// Returns the next hit, fetching a fresh page from the cluster when the
    /// local buffer runs dry. `None` once the scroll is exhausted.
    pub async fn next(&mut self) -> anyhow::Result<Option<Hit>> {
        if let Some(hit) = self.buffer.pop_front() {
            return Ok(Some(hit));
        }
        if self.exhausted {
            return Ok(None);
        }
        let Some(scroll_id) = self.scroll_id.clone() else {
            self.exhausted = true;
            return Ok(None);
        };
        let page = self.client.scroll_next(&scroll_id, &self.scroll).await?;
        self.scroll_id = page.scroll_id;
        if page.hits.is_empty() {
            self.exhausted = true;
            return Ok(None);
        }
        self.buffer = page.hits.into();
        Ok(self.buffer.pop_front())
    }
}
