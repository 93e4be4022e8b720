//! Deal sheet actions: saving a listing and submitting or withdrawing an
//! offer on it.
//!
//! Submission approximates "at most one live offer per (property, user)" by
//! updating an existing row instead of inserting a duplicate. Withdrawal
//! deletes the row outright, so a later submit starts fresh. The offer gate
//! is computed from the fetched property fields; the store provides no
//! transactional guarantee behind it.

use crate::catalog;
use crate::errors::MarketError;
use crate::events::{Signal, Signals};
use crate::models::{Offer, Property, SavedProperty};
use crate::store::{collections, Credential, Match, Query, Store};
use chrono::{DateTime, Utc};
use serde_json::json;

/// Refuse an offer when the listing is locked or its deadline has passed.
pub fn offer_gate(property: &Property, now: DateTime<Utc>) -> Result<(), MarketError> {
    if !property.is_accepting_offers {
        return Err(MarketError::BadRequest(
            "This property is no longer accepting offers.".to_string(),
        ));
    }
    if property.accepted_offer_id.is_some() {
        return Err(MarketError::BadRequest(
            "An offer has already been accepted for this property.".to_string(),
        ));
    }
    if let Some(deadline) = property.offer_deadline {
        if now > deadline {
            return Err(MarketError::BadRequest(
                "The offer deadline for this property has passed.".to_string(),
            ));
        }
    }
    Ok(())
}

pub async fn save_property(
    store: &Store,
    signals: &Signals,
    credential: Credential<'_>,
    user_id: &str,
    property_id: &str,
) -> Result<(), MarketError> {
    let existing = store
        .select_one::<SavedProperty>(
            credential,
            Query::from(collections::SAVED_PROPERTIES)
                .columns("user_id,property_id")
                .eq("user_id", user_id)
                .eq("property_id", property_id),
        )
        .await?;

    if existing.is_none() {
        store
            .insert::<SavedProperty>(
                credential,
                collections::SAVED_PROPERTIES,
                &json!({ "user_id": user_id, "property_id": property_id }),
            )
            .await?;
    }

    signals.notify(Signal::SavesChanged);
    Ok(())
}

pub async fn unsave_property(
    store: &Store,
    signals: &Signals,
    credential: Credential<'_>,
    user_id: &str,
    property_id: &str,
) -> Result<(), MarketError> {
    store
        .delete(
            credential,
            collections::SAVED_PROPERTIES,
            Match::new()
                .eq("user_id", user_id)
                .eq("property_id", property_id),
        )
        .await?;

    signals.notify(Signal::SavesChanged);
    Ok(())
}

/// The caller's own offer on a property, if any.
pub async fn my_offer(
    store: &Store,
    credential: Credential<'_>,
    user_id: &str,
    property_id: &str,
) -> Result<Option<Offer>, MarketError> {
    store
        .select_one::<Offer>(
            credential,
            Query::from(collections::OFFERS)
                .eq("property_id", property_id)
                .eq("user_id", user_id),
        )
        .await
}

/// Submit an offer: validate the price, gate on the listing state, then
/// update the existing row (resetting it to pending) or insert a fresh one.
pub async fn submit_offer(
    store: &Store,
    signals: &Signals,
    credential: Credential<'_>,
    user_id: &str,
    property_id: &str,
    offer_price: i64,
    notes: Option<String>,
) -> Result<Offer, MarketError> {
    if offer_price <= 0 {
        return Err(MarketError::BadRequest(
            "Offer price must be a positive number.".to_string(),
        ));
    }

    let property = catalog::fetch_property(store, credential, property_id).await?;
    offer_gate(&property, Utc::now())?;

    let notes = notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());

    let offer = match my_offer(store, credential, user_id, property_id).await? {
        Some(existing) => {
            tracing::info!(offer_id = %existing.id, %property_id, "updating existing offer");
            let mut updated = store
                .update::<Offer>(
                    credential,
                    collections::OFFERS,
                    Match::new().eq("id", &existing.id),
                    &json!({
                        "offer_price": offer_price,
                        "notes": notes,
                        "status": "pending",
                    }),
                )
                .await?;
            if updated.is_empty() {
                return Err(MarketError::NotFound(format!(
                    "Offer not found: {}",
                    existing.id
                )));
            }
            updated.remove(0)
        }
        None => {
            tracing::info!(%property_id, "inserting new offer");
            store
                .insert::<Offer>(
                    credential,
                    collections::OFFERS,
                    &json!({
                        "property_id": property_id,
                        "user_id": user_id,
                        "offer_price": offer_price,
                        "notes": notes,
                        "status": "pending",
                    }),
                )
                .await?
        }
    };

    signals.notify(Signal::OffersChanged);
    Ok(offer)
}

/// Withdraw the caller's offer by deleting the row. The `withdrawn` status
/// is never actually written.
pub async fn withdraw_offer(
    store: &Store,
    signals: &Signals,
    credential: Credential<'_>,
    user_id: &str,
    property_id: &str,
) -> Result<(), MarketError> {
    store
        .delete(
            credential,
            collections::OFFERS,
            Match::new()
                .eq("property_id", property_id)
                .eq("user_id", user_id),
        )
        .await?;

    signals.notify(Signal::OffersChanged);
    Ok(())
}
