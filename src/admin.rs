//! Admin console operations: listing CRUD, per-property offer review, the
//! offer-acceptance sequence, and the global pending-offer inbox.

use crate::catalog;
use crate::errors::MarketError;
use crate::events::{Signal, Signals};
use crate::models::{
    Offer, OfferWithProperty, Property, PropertyOfferCount, PropertyStatus, PHOTO_PLACEHOLDER,
};
use crate::offers;
use crate::store::{collections, Credential, Match, Query, Store};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Deserialize)]
pub struct NewProperty {
    pub address: String,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub status: Option<PropertyStatus>,
    pub price: i64,
    pub beds: i64,
    pub baths: f64,
    pub sqft: i64,
    pub acres: f64,
    pub arv: i64,
    pub repairs: i64,
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub offer_deadline: Option<chrono::DateTime<chrono::Utc>>,
}

impl NewProperty {
    fn validate(&self) -> Result<(), MarketError> {
        if self.address.trim().is_empty() {
            return Err(MarketError::BadRequest("Address is required.".to_string()));
        }
        let floats = [self.baths, self.acres, self.lat, self.lng];
        if floats.iter().any(|n| !n.is_finite()) {
            return Err(MarketError::BadRequest(
                "Please fill all required fields with valid numbers.".to_string(),
            ));
        }
        Ok(())
    }
}

pub async fn create_property(
    store: &Store,
    credential: Credential<'_>,
    input: NewProperty,
) -> Result<Property, MarketError> {
    input.validate()?;

    let photo_url = input
        .photo_url
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| PHOTO_PLACEHOLDER.to_string());

    let row = json!({
        "address": input.address.trim(),
        "photo_url": photo_url,
        "status": input.status.unwrap_or(PropertyStatus::New),
        "price": input.price,
        "beds": input.beds,
        "baths": input.baths,
        "sqft": input.sqft,
        "acres": input.acres,
        "arv": input.arv,
        "repairs": input.repairs,
        "lat": input.lat,
        "lng": input.lng,
        "offer_deadline": input.offer_deadline,
        "is_accepting_offers": true,
    });

    let property = store
        .insert::<Property>(credential, collections::PROPERTIES, &row)
        .await?;
    tracing::info!(property_id = %property.id, address = %property.address, "property created");
    Ok(property)
}

pub async fn delete_property(
    store: &Store,
    credential: Credential<'_>,
    property_id: &str,
) -> Result<(), MarketError> {
    store
        .delete(
            credential,
            collections::PROPERTIES,
            Match::new().eq("id", property_id),
        )
        .await?;
    tracing::info!(%property_id, "property deleted");
    Ok(())
}

/// All offers on one property, oldest first, for the review panel.
pub async fn offers_for_property(
    store: &Store,
    credential: Credential<'_>,
    property_id: &str,
) -> Result<Vec<Offer>, MarketError> {
    store
        .select::<Offer>(
            credential,
            Query::from(collections::OFFERS)
                .eq("property_id", property_id)
                .order_asc("created_at"),
        )
        .await
}

/// Accept one offer. Three independent store writes, in order:
///
/// 1. the chosen offer becomes `accepted`;
/// 2. every other `pending` offer on the property becomes `rejected`;
/// 3. the property goes `Under Contract`, records the accepted offer id, and
///    stops accepting offers.
///
/// There is no rollback: a failure at step 2 or 3 is reported while the
/// earlier writes stay committed. Nothing prevents two admins from racing on
/// the same property; the property row ends up with the last write.
pub async fn accept_offer(
    store: &Store,
    signals: &Signals,
    credential: Credential<'_>,
    property_id: &str,
    offer_id: &str,
) -> Result<Offer, MarketError> {
    let mut accepted = store
        .update::<Offer>(
            credential,
            collections::OFFERS,
            Match::new().eq("id", offer_id),
            &json!({ "status": "accepted" }),
        )
        .await?;
    if accepted.is_empty() {
        return Err(MarketError::NotFound(format!("Offer not found: {offer_id}")));
    }
    let accepted = accepted.remove(0);

    store
        .update::<Offer>(
            credential,
            collections::OFFERS,
            Match::new()
                .eq("property_id", property_id)
                .neq("id", offer_id)
                .eq("status", "pending"),
            &json!({ "status": "rejected" }),
        )
        .await?;

    store
        .update::<Property>(
            credential,
            collections::PROPERTIES,
            Match::new().eq("id", property_id),
            &json!({
                "status": "Under Contract",
                "accepted_offer_id": offer_id,
                "is_accepting_offers": false,
            }),
        )
        .await?;

    tracing::info!(%property_id, %offer_id, "offer accepted; property under contract");
    signals.notify(Signal::OffersChanged);
    Ok(accepted)
}

/// Everything pending across all properties, newest first, with listings
/// attached.
pub async fn pending_inbox(
    store: &Store,
    credential: Credential<'_>,
) -> Result<Vec<OfferWithProperty>, MarketError> {
    let pending = store
        .select::<Offer>(
            credential,
            Query::from(collections::OFFERS)
                .eq("status", "pending")
                .order_desc("created_at"),
        )
        .await?;
    offers::join_properties(store, credential, pending).await
}

#[derive(Debug, Serialize)]
pub struct Console {
    pub properties: Vec<Property>,
    pub pending_offers: Vec<OfferWithProperty>,
    pub offer_counts: Vec<PropertyOfferCount>,
}

/// Combined console refresh. Properties and the pending-offer inbox are the
/// two reads issued concurrently; the counts view follows.
pub async fn console(store: &Store, credential: Credential<'_>) -> Result<Console, MarketError> {
    let (properties, pending_offers) = tokio::try_join!(
        catalog::fetch_properties(store, credential),
        pending_inbox(store, credential),
    )?;
    let offer_counts = catalog::fetch_offer_counts(store, credential).await?;

    Ok(Console {
        properties,
        pending_offers,
        offer_counts,
    })
}
