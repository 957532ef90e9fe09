//! Image-only adapter for the legacy vehicle API.
//!
//! The legacy API is kept only for its image URLs. Records carry a slug and image fields,
//! nothing else, so the writer can merge them without touching other vehicle columns.

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::fetch::{DEFAULT_PAGE_SIZE, FetchClient};
use crate::resolve::normalize;
use crate::sync::Category;

use super::SourceAdapter;
use super::error::{Result, SourceError};
use super::types::{CategoryRecords, FetchedCategory, ImageRecord, ImageSet, warn_skipped};

const CATEGORIES: &[Category] = &[Category::Images];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyConfig {
    pub base_url: String,
    pub page_size: u32,
}

impl LegacyConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

pub struct LegacyImageSource {
    client: FetchClient,
    config: LegacyConfig,
}

impl LegacyImageSource {
    pub fn new(client: FetchClient, config: LegacyConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl SourceAdapter for LegacyImageSource {
    fn name(&self) -> &'static str {
        "legacy"
    }

    fn categories(&self) -> &'static [Category] {
        CATEGORIES
    }

    async fn fetch_category(
        &self,
        category: Category,
        cancel: &CancellationToken,
    ) -> Result<FetchedCategory> {
        if category != Category::Images {
            return Err(SourceError::UnsupportedCategory {
                source_name: self.name(),
                category,
            });
        }

        let url = format!("{}/vehicles", self.config.base_url.trim_end_matches('/'));
        let raw = self
            .client
            .fetch_paginated(&url, self.config.page_size, cancel)
            .await?;

        let mut records = Vec::with_capacity(raw.len());
        let mut skipped = 0;
        for value in &raw {
            match image_record(value) {
                Ok(Some(record)) => records.push(record),
                // No image fields at all: nothing to merge.
                Ok(None) => {}
                Err(error) => {
                    warn_skipped("image", value, &error);
                    skipped += 1;
                }
            }
        }

        Ok(FetchedCategory {
            records: CategoryRecords::Images(records),
            skipped,
        })
    }
}

#[derive(Debug, Deserialize)]
struct LegacyVehicle {
    #[serde(default)]
    slug: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default, alias = "image")]
    image_url: Option<String>,
    #[serde(default, alias = "media")]
    images: Option<ImageSet>,
}

fn image_record(value: &serde_json::Value) -> std::result::Result<Option<ImageRecord>, String> {
    let wire = LegacyVehicle::deserialize(value).map_err(|e| e.to_string())?;
    let slug = wire
        .slug
        .or(wire.name)
        .map(|s| normalize(&s))
        .filter(|s| !s.is_empty())
        .ok_or("record has neither slug nor name")?;

    let keep = |s: Option<String>| s.filter(|s| !s.trim().is_empty());
    let images = wire.images.unwrap_or_default();
    let images = ImageSet {
        small: keep(images.small),
        medium: keep(images.medium),
        large: keep(images.large),
    };
    let image_url = keep(wire.image_url);

    if image_url.is_none() && images == ImageSet::default() {
        return Ok(None);
    }
    Ok(Some(ImageRecord {
        slug,
        image_url,
        images,
    }))
}
