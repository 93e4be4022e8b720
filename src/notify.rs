//! Offer-event notifier: the webhook handler fired by the store on inserts
//! and updates to the offers collection.
//!
//! A new offer emails the fixed admin address with the ask/offer delta; a
//! status change into accepted/rejected emails the buyer. A failed
//! buyer-email lookup skips that email rather than failing the handler.

use crate::errors::MarketError;
use crate::mailer::Mailer;
use crate::models::{format_delta, format_money, short_id, Property};
use crate::store::{collections, Credential, Query, Store};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Change-event payload delivered by the store's webhook.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub table: String,
    pub schema: String,
    pub record: OfferRecord,
    #[serde(default)]
    pub old_record: Option<OfferRecord>,
}

/// Loosely-typed offer row as it arrives in the event; fields the handler
/// does not need may be absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OfferRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub property_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub offer_price: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Outcome the webhook route turns into an HTTP response.
#[derive(Debug, PartialEq, Eq)]
pub enum NotifyOutcome {
    Sent,
    Ignored,
    NoBuyerEmail,
}

/// `true` only when the status actually transitioned into accepted/rejected.
pub fn is_decision_transition(new_status: Option<&str>, old_status: Option<&str>) -> bool {
    match new_status {
        Some("accepted") | Some("rejected") => new_status != old_status,
        _ => false,
    }
}

pub async fn handle(
    store: &Store,
    mailer: &Mailer,
    payload: WebhookPayload,
) -> Result<NotifyOutcome, MarketError> {
    if payload.schema != "public" || payload.table != collections::OFFERS {
        return Ok(NotifyOutcome::Ignored);
    }

    match payload.kind {
        ChangeKind::Insert => offer_created(store, mailer, &payload.record).await,
        ChangeKind::Update => {
            let old_status = payload
                .old_record
                .as_ref()
                .and_then(|r| r.status.as_deref());
            if !is_decision_transition(payload.record.status.as_deref(), old_status) {
                return Ok(NotifyOutcome::Ignored);
            }
            offer_decided(store, mailer, &payload.record).await
        }
        ChangeKind::Delete => Ok(NotifyOutcome::Ignored),
    }
}

async fn fetch_property(
    store: &Store,
    property_id: Option<&str>,
) -> Result<Option<Property>, MarketError> {
    let Some(property_id) = property_id else {
        return Ok(None);
    };
    store
        .select_one::<Property>(
            Credential::Service,
            Query::from(collections::PROPERTIES).eq("id", property_id),
        )
        .await
}

/// Buyer email via the privileged auth API. Lookup failures degrade to
/// `None` instead of failing the handler.
async fn buyer_email(store: &Store, user_id: Option<&str>) -> Option<String> {
    let user_id = user_id?;
    match store.admin_user_email(user_id).await {
        Ok(email) => email,
        Err(err) => {
            tracing::warn!(%user_id, error = %err, "buyer email lookup failed");
            None
        }
    }
}

/// New offer: alert the admin with the ask/offer delta.
async fn offer_created(
    store: &Store,
    mailer: &Mailer,
    offer: &OfferRecord,
) -> Result<NotifyOutcome, MarketError> {
    let property = fetch_property(store, offer.property_id.as_deref()).await?;

    let buyer_label = match buyer_email(store, offer.user_id.as_deref()).await {
        Some(email) => email,
        None => match offer.user_id.as_deref() {
            Some(id) => format!("User: {}", short_id(id)),
            None => "Unknown".to_string(),
        },
    };

    let address = property
        .as_ref()
        .map(|p| p.address.as_str())
        .unwrap_or("Property");
    let ask = property.as_ref().map(|p| p.price);
    let delta = match (ask, offer.offer_price) {
        (Some(ask), Some(offered)) => Some(offered - ask),
        _ => None,
    };

    let subject = format!("New offer received — {address}");
    let html = format!(
        r#"<div style="font-family: ui-sans-serif, system-ui; line-height: 1.45;">
  <h2 style="margin:0 0 8px;">New offer received</h2>
  <div style="color:#444; margin-bottom:14px;">{address}</div>
  <table style="border-collapse:collapse; width:100%; max-width:560px;">
    <tr><td style="padding:6px 0; color:#666;">Ask</td><td style="padding:6px 0;"><b>{ask}</b></td></tr>
    <tr><td style="padding:6px 0; color:#666;">Offer</td><td style="padding:6px 0;"><b>{offer}</b></td></tr>
    <tr><td style="padding:6px 0; color:#666;">Delta</td><td style="padding:6px 0;"><b>{delta}</b></td></tr>
    <tr><td style="padding:6px 0; color:#666;">Buyer</td><td style="padding:6px 0;"><b>{buyer}</b></td></tr>
    <tr><td style="padding:6px 0; color:#666;">Notes</td><td style="padding:6px 0;">{notes}</td></tr>
  </table>
  <div style="margin-top:16px;"><a href="{admin_link}">Open Admin</a></div>
  <div style="margin-top:12px; color:#888; font-size:12px;">Offer ID: {offer_id}</div>
</div>"#,
        address = address,
        ask = money(ask),
        offer = money(offer.offer_price),
        delta = delta.map(format_delta).unwrap_or_else(|| "—".to_string()),
        buyer = buyer_label,
        notes = offer.notes.as_deref().unwrap_or("—"),
        admin_link = mailer.admin_link(),
        offer_id = offer.id.as_deref().unwrap_or(""),
    );

    mailer.send(mailer.admin_to(), &subject, &html).await?;
    Ok(NotifyOutcome::Sent)
}

/// Accepted or rejected: tell the buyer.
async fn offer_decided(
    store: &Store,
    mailer: &Mailer,
    offer: &OfferRecord,
) -> Result<NotifyOutcome, MarketError> {
    let property = fetch_property(store, offer.property_id.as_deref()).await?;

    let Some(to) = buyer_email(store, offer.user_id.as_deref()).await else {
        return Ok(NotifyOutcome::NoBuyerEmail);
    };

    let status = offer.status.as_deref().unwrap_or("");
    let accepted = status == "accepted";
    let address = property
        .as_ref()
        .map(|p| p.address.as_str())
        .unwrap_or("Property");

    let subject = if accepted {
        format!("Offer accepted — {address}")
    } else {
        format!("Offer update — {address}")
    };

    let next_steps = if accepted {
        "Your offer has been accepted. We will reach out with next steps."
    } else {
        "Your offer was not selected. You can continue browsing and submitting offers."
    };

    let html = format!(
        r#"<div style="font-family: ui-sans-serif, system-ui; line-height: 1.45;">
  <h2 style="margin:0 0 8px;">Offer update</h2>
  <div style="margin-bottom:14px; color:#444;">{address}</div>
  <div style="margin-bottom:14px;">Status: <b style="text-transform: uppercase;">{status}</b></div>
  <table style="border-collapse:collapse; width:100%; max-width:560px;">
    <tr><td style="padding:6px 0; color:#666;">Your offer</td><td style="padding:6px 0;"><b>{offer}</b></td></tr>
    <tr><td style="padding:6px 0; color:#666;">Ask</td><td style="padding:6px 0;"><b>{ask}</b></td></tr>
  </table>
  <div style="margin-top:16px; color:#666; font-size:13px;">{next_steps}</div>
</div>"#,
        address = address,
        status = status,
        offer = money(offer.offer_price),
        ask = money(property.as_ref().map(|p| p.price)),
        next_steps = next_steps,
    );

    mailer.send(&to, &subject, &html).await?;
    Ok(NotifyOutcome::Sent)
}

fn money(n: Option<i64>) -> String {
    match n {
        Some(n) => format_money(n),
        None => "—".to_string(),
    }
}
