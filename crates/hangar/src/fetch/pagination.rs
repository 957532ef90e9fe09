//! `page[number]` / `page[size]` pagination.
//!
//! Pages are requested as `GET {path}?page[number]={n}&page[size]={size}` and answered with
//! `{ "data": [...], "meta": { "current_page", "last_page", "per_page", "total" } }`.
//! Fetching stops when a page has no records or `current_page >= last_page`.

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::client::{FetchClient, decode};
use super::error::{FetchError, Result};

/// Default number of records requested per page.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Hard stop for upstreams that never report a last page.
const MAX_PAGES: u32 = 10_000;

/// One page of a paginated response.
///
/// Records are kept as raw JSON so adapters can skip individual malformed entries.
#[derive(Debug, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub data: Vec<serde_json::Value>,
    #[serde(default)]
    pub meta: Option<PageMeta>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageMeta {
    pub current_page: u32,
    pub last_page: u32,
    #[serde(default)]
    pub per_page: Option<u32>,
    #[serde(default)]
    pub total: Option<u64>,
}

impl Page {
    /// True when no further page should be requested after this one.
    pub fn is_last(&self) -> bool {
        if self.data.is_empty() {
            return true;
        }
        match self.meta {
            Some(meta) => meta.current_page >= meta.last_page,
            None => true,
        }
    }
}

/// Build the URL of page `number` for `base`.
///
/// Existing query parameters on `base` are preserved.
pub fn page_url(base: &str, number: u32, size: u32) -> Result<String> {
    let parsed = Url::parse(base).map_err(|e| FetchError::InvalidUrl {
        url: base.to_string(),
        message: e.to_string(),
    })?;
    let separator = if parsed.query().is_some() { '&' } else { '?' };
    Ok(format!(
        "{}{separator}page[number]={number}&page[size]={size}",
        parsed.as_str()
    ))
}

impl FetchClient {
    /// Fetch every page of `base` and return all records in upstream order.
    ///
    /// A failed page aborts the whole fetch; no partial result is returned.
    pub async fn fetch_paginated(
        &self,
        base: &str,
        page_size: u32,
        cancel: &CancellationToken,
    ) -> Result<Vec<serde_json::Value>> {
        let mut records = Vec::new();

        for number in 1..=MAX_PAGES {
            let url = page_url(base, number, page_size)?;
            let body = self.fetch(&url, cancel).await?;
            let page: Page = decode(&url, &body)?;

            tracing::debug!(
                url = %url,
                page = number,
                count = page.data.len(),
                last_page = page.meta.map(|m| m.last_page),
                "Fetched page"
            );

            let done = page.is_last();
            records.extend(page.data);
            if done {
                return Ok(records);
            }
        }

        tracing::warn!(url = %base, max_pages = MAX_PAGES, "Pagination did not terminate, stopping");
        Ok(records)
    }
}
