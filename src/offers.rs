//! The buyer's offer history: their own offers joined with the listings,
//! grouped by status for the tabbed view.

use crate::errors::MarketError;
use crate::models::{Offer, OfferStatus, OfferWithProperty, Property};
use crate::store::{collections, Credential, Query, Store};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct OffersSummary {
    pub pending: usize,
    pub accepted: usize,
    pub rejected: usize,
}

pub fn summarize(offers: &[OfferWithProperty]) -> OffersSummary {
    let mut summary = OffersSummary::default();
    for row in offers {
        match row.offer.status {
            OfferStatus::Pending => summary.pending += 1,
            OfferStatus::Accepted => summary.accepted += 1,
            OfferStatus::Rejected => summary.rejected += 1,
            OfferStatus::Withdrawn => {}
        }
    }
    summary
}

/// The caller's offers, newest first, with their listings attached.
/// Withdrawn rows never exist in the store (withdrawal deletes), so only the
/// three live statuses are requested.
pub async fn fetch_my_offers(
    store: &Store,
    credential: Credential<'_>,
    user_id: &str,
) -> Result<Vec<OfferWithProperty>, MarketError> {
    let offers = store
        .select::<Offer>(
            credential,
            Query::from(collections::OFFERS)
                .eq("user_id", user_id)
                .is_in("status", &["pending", "accepted", "rejected"])
                .order_desc("created_at"),
        )
        .await?;

    join_properties(store, credential, offers).await
}

/// Attach each offer's listing with a single `in` query, tolerating listings
/// that were deleted out from under their offers.
pub(crate) async fn join_properties(
    store: &Store,
    credential: Credential<'_>,
    offers: Vec<Offer>,
) -> Result<Vec<OfferWithProperty>, MarketError> {
    if offers.is_empty() {
        return Ok(Vec::new());
    }

    let mut ids: Vec<&str> = offers.iter().map(|o| o.property_id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();

    let properties = store
        .select::<Property>(
            credential,
            Query::from(collections::PROPERTIES).is_in("id", &ids),
        )
        .await?;

    let by_id: HashMap<String, Property> =
        properties.into_iter().map(|p| (p.id.clone(), p)).collect();

    Ok(offers
        .into_iter()
        .map(|offer| {
            let property = by_id.get(&offer.property_id).cloned();
            OfferWithProperty::new(offer, property)
        })
        .collect())
}
