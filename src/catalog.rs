//! Listing browser: the property catalog with its client-side sort and
//! filter modes. The store returns rows newest-first; everything else
//! (spread math, saved filter, sort order) happens here.

use crate::errors::MarketError;
use crate::models::{Property, PropertyOfferCount, PropertyStatus, SavedProperty};
use crate::store::{collections, Credential, Query, Store};
use serde::Deserialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    /// New listings first, then by spread.
    #[default]
    Newest,
    /// Price, low to high.
    Price,
    /// Spread, high to low.
    Spread,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    #[default]
    All,
    Saved,
}

pub async fn fetch_properties(
    store: &Store,
    credential: Credential<'_>,
) -> Result<Vec<Property>, MarketError> {
    store
        .select::<Property>(
            credential,
            Query::from(collections::PROPERTIES).order_desc("created_at"),
        )
        .await
}

pub async fn fetch_property(
    store: &Store,
    credential: Credential<'_>,
    property_id: &str,
) -> Result<Property, MarketError> {
    store
        .select_one::<Property>(
            credential,
            Query::from(collections::PROPERTIES).eq("id", property_id),
        )
        .await?
        .ok_or_else(|| MarketError::NotFound(format!("Property not found: {property_id}")))
}

/// Ids of the caller's saved properties.
pub async fn fetch_saved_ids(
    store: &Store,
    credential: Credential<'_>,
    user_id: &str,
) -> Result<HashSet<String>, MarketError> {
    let rows = store
        .select::<SavedProperty>(
            credential,
            Query::from(collections::SAVED_PROPERTIES)
                .columns("user_id,property_id")
                .eq("user_id", user_id),
        )
        .await?;
    Ok(rows.into_iter().map(|r| r.property_id).collect())
}

/// Pending-offer counts from the derived view, for the admin console badges.
pub async fn fetch_offer_counts(
    store: &Store,
    credential: Credential<'_>,
) -> Result<Vec<PropertyOfferCount>, MarketError> {
    store
        .select::<PropertyOfferCount>(
            credential,
            Query::from(collections::PROPERTY_OFFER_COUNTS),
        )
        .await
}

/// Apply the browser's filter, then sort. Sorting is stable on top of the
/// store's newest-first order.
pub fn apply(
    properties: Vec<Property>,
    sort: SortMode,
    filter: FilterMode,
    saved_ids: &HashSet<String>,
) -> Vec<Property> {
    let mut rows: Vec<Property> = match filter {
        FilterMode::All => properties,
        FilterMode::Saved => properties
            .into_iter()
            .filter(|p| saved_ids.contains(&p.id))
            .collect(),
    };

    match sort {
        SortMode::Price => rows.sort_by_key(|p| p.price),
        SortMode::Spread => rows.sort_by_key(|p| std::cmp::Reverse(p.spread())),
        SortMode::Newest => rows.sort_by_key(|p| {
            let is_new = p.status == PropertyStatus::New;
            (std::cmp::Reverse(is_new), std::cmp::Reverse(p.spread()))
        }),
    }

    rows
}
