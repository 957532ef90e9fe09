//! GraphQL storefront adapter.
//!
//! The storefront expects a batch array even for a single query, and paginates with its
//! own `page`/`limit`/`totalCount` convention instead of `page[number]`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::fetch::{FetchClient, FetchError};
use crate::sync::Category;

use super::SourceAdapter;
use super::error::{Result, SourceError};
use super::types::{CategoryRecords, FetchedCategory, ImageSet, StoreListingRecord, warn_skipped};

pub const DEFAULT_STORE_URL: &str = "https://robertsspaceindustries.com/graphql";
pub const DEFAULT_PAGE_LIMIT: u32 = 100;

/// Origin used to absolutize relative listing URLs.
const STORE_ORIGIN: &str = "https://robertsspaceindustries.com";

/// Host of the legacy media CDN whose URLs can be rewritten to size variants.
const MEDIA_HOST: &str = "media.robertsspaceindustries.com";

/// Hard stop for a listing that never reports its total.
const MAX_STORE_PAGES: u32 = 1_000;

const LISTING_QUERY: &str = "query GetShips($query: SearchQuery) { \
    store(name: \"pledge\", browse: true) { \
        listing: search(query: $query) { \
            resources { name url msrp media { thumbnail { storeSmall } } } \
            totalCount \
        } \
    } \
}";

const CATEGORIES: &[Category] = &[Category::Store];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub url: String,
    pub page_limit: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_STORE_URL.to_string(),
            page_limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

/// Adapter for the storefront GraphQL API.
pub struct StorefrontSource {
    client: FetchClient,
    config: StoreConfig,
}

impl StorefrontSource {
    pub fn new(client: FetchClient, config: StoreConfig) -> Self {
        Self { client, config }
    }

    async fn fetch_page(&self, page: u32, cancel: &CancellationToken) -> Result<Listing> {
        let body = json!([{
            "query": LISTING_QUERY,
            "variables": {
                "query": {"page": page, "limit": self.config.page_limit}
            }
        }]);

        let responses: Vec<GraphQlResponse> =
            self.client.post_json(&self.config.url, &body, cancel).await?;
        let Some(response) = responses.into_iter().next() else {
            return Err(FetchError::GraphQl {
                messages: vec!["empty batch response".to_string()],
            }
            .into());
        };

        if !response.errors.is_empty() {
            let messages = response.errors.into_iter().map(|e| e.message).collect();
            return Err(FetchError::GraphQl { messages }.into());
        }

        Ok(response
            .data
            .and_then(|d| d.store)
            .and_then(|s| s.listing)
            .unwrap_or_default())
    }
}

#[async_trait]
impl SourceAdapter for StorefrontSource {
    fn name(&self) -> &'static str {
        "rsi"
    }

    fn categories(&self) -> &'static [Category] {
        CATEGORIES
    }

    async fn fetch_category(
        &self,
        category: Category,
        cancel: &CancellationToken,
    ) -> Result<FetchedCategory> {
        if category != Category::Store {
            return Err(SourceError::UnsupportedCategory {
                source_name: self.name(),
                category,
            });
        }

        let mut resources = Vec::new();
        for page in 1..=MAX_STORE_PAGES {
            let listing = self.fetch_page(page, cancel).await?;
            tracing::debug!(
                page,
                received = listing.resources.len(),
                total = listing.total_count,
                "Fetched storefront page"
            );
            if listing.resources.is_empty() {
                break;
            }
            resources.extend(listing.resources);
            if listing
                .total_count
                .is_some_and(|total| resources.len() as u64 >= total)
            {
                break;
            }
        }

        let mut records = Vec::with_capacity(resources.len());
        let mut skipped = 0;
        for raw in resources {
            match listing_record(&raw) {
                Ok(record) => records.push(record),
                Err(error) => {
                    warn_skipped("store_listing", &raw, &error);
                    skipped += 1;
                }
            }
        }

        Ok(FetchedCategory {
            records: CategoryRecords::Store(records),
            skipped,
        })
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<StoreData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct StoreData {
    #[serde(default)]
    store: Option<StoreNode>,
}

#[derive(Debug, Deserialize)]
struct StoreNode {
    #[serde(default)]
    listing: Option<Listing>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Listing {
    #[serde(default)]
    resources: Vec<serde_json::Value>,
    #[serde(default)]
    total_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Resource {
    name: String,
    #[serde(default)]
    url: Option<String>,
    /// Price in cents.
    #[serde(default)]
    msrp: Option<f64>,
    #[serde(default)]
    media: Option<Media>,
}

#[derive(Debug, Deserialize)]
struct Media {
    #[serde(default)]
    thumbnail: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Thumbnail {
    #[serde(default)]
    store_small: Option<String>,
}

fn listing_record(raw: &serde_json::Value) -> std::result::Result<StoreListingRecord, String> {
    let resource = Resource::deserialize(raw).map_err(|e| e.to_string())?;
    let name = resource.name.trim().to_string();
    if name.is_empty() {
        return Err("listing has no name".to_string());
    }

    let image_url = resource
        .media
        .and_then(|m| m.thumbnail)
        .and_then(|t| t.store_small)
        .filter(|s| !s.is_empty());
    let images = image_url.as_deref().map(image_variants).unwrap_or_default();

    Ok(StoreListingRecord {
        name,
        store_url: resource
            .url
            .filter(|u| !u.is_empty())
            .map(|u| absolute_store_url(&u)),
        pledge_price: resource.msrp.map(|cents| cents / 100.0),
        image_url,
        images,
    })
}

fn absolute_store_url(url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("{STORE_ORIGIN}/{}", url.trim_start_matches('/'))
    }
}

/// Derive size variants from a media CDN URL.
///
/// `https://media.robertsspaceindustries.com/{id}/{file}.{ext}` is rewritten to the
/// `store_small`, `store_large` and `source` renditions of the same media id. Any other URL
/// (including the newer CDN) is used unchanged for every size.
pub fn image_variants(url: &str) -> ImageSet {
    let passthrough = || ImageSet {
        small: Some(url.to_string()),
        medium: Some(url.to_string()),
        large: Some(url.to_string()),
    };

    let Ok(parsed) = Url::parse(url) else {
        return passthrough();
    };
    if parsed.host_str() != Some(MEDIA_HOST) {
        return passthrough();
    }
    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();
    let [media_id, file] = segments.as_slice() else {
        return passthrough();
    };
    let Some((_, ext)) = file.rsplit_once('.') else {
        return passthrough();
    };
    if media_id.is_empty() || ext.is_empty() {
        return passthrough();
    }

    let variant = |size: &str| format!("https://{MEDIA_HOST}/{media_id}/{size}.{ext}");
    ImageSet {
        small: Some(variant("store_small")),
        medium: Some(variant("store_large")),
        large: Some(variant("source")),
    }
}
