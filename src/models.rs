//! Domain records mirrored from the hosted store's collections, plus the
//! display helpers shared by every surface (money formatting, spread).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fallback photo link used when a listing is created without one.
pub const PHOTO_PLACEHOLDER: &str = "https://photos.google.com/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyStatus {
    New,
    #[serde(rename = "Price Drop")]
    PriceDrop,
    #[serde(rename = "Under Contract")]
    UnderContract,
}

impl PropertyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyStatus::New => "New",
            PropertyStatus::PriceDrop => "Price Drop",
            PropertyStatus::UnderContract => "Under Contract",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub id: String,
    pub address: String,
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
    pub photo_url: Option<String>,
    pub status: PropertyStatus,
    #[serde(default = "default_true")]
    pub is_accepting_offers: bool,
    #[serde(default)]
    pub accepted_offer_id: Option<String>,
    #[serde(default)]
    pub offer_deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

impl Property {
    /// The investor margin heuristic shown everywhere: ARV minus price minus
    /// repair estimate. Computed on the fly, never persisted.
    pub fn spread(&self) -> i64 {
        self.arv - self.price - self.repairs
    }

    /// A locked listing no longer takes offers.
    pub fn is_locked(&self) -> bool {
        !self.is_accepting_offers || self.accepted_offer_id.is_some()
    }

    pub fn photo_url(&self) -> &str {
        self.photo_url.as_deref().unwrap_or(PHOTO_PLACEHOLDER)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferStatus {
    Pending,
    Accepted,
    Rejected,
    // Defined in the store's enum but never written: withdrawal deletes the
    // row instead of soft-deleting it.
    Withdrawn,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    pub id: String,
    pub property_id: String,
    pub user_id: String,
    pub offer_price: i64,
    #[serde(default)]
    pub notes: Option<String>,
    pub status: OfferStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// An offer joined with its listing, as shown on the buyer's offers page and
/// in the admin inbox. The listing may have been deleted out from under the
/// offer, hence the `Option`.
#[derive(Debug, Clone, Serialize)]
pub struct OfferWithProperty {
    #[serde(flatten)]
    pub offer: Offer,
    pub property: Option<Property>,
    pub spread: Option<i64>,
}

impl OfferWithProperty {
    pub fn new(offer: Offer, property: Option<Property>) -> Self {
        let spread = property.as_ref().map(Property::spread);
        Self {
            offer,
            property,
            spread,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Buyer,
    Admin,
    /// Signed up, not yet approved. Unknown role values resolve here as well
    /// so an unreadable role fails closed.
    #[serde(other)]
    Pending,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Buyer => "buyer",
            Role::Admin => "admin",
            Role::Pending => "pending",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    pub role: Role,
    /// Legacy admin flag, superseded by `role` but still checked by the
    /// privileged admin-users handler.
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Profile {
    /// "First Last", falling back to email, falling back to a short user id.
    pub fn display_name(&self) -> String {
        let name = format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or(""),
            self.last_name.as_deref().unwrap_or("")
        )
        .trim()
        .to_string();
        if !name.is_empty() {
            return name;
        }
        if let Some(email) = &self.email {
            return email.clone();
        }
        short_id(&self.user_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedProperty {
    pub user_id: String,
    pub property_id: String,
}

/// Row of the derived `property_offer_counts` view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyOfferCount {
    pub property_id: String,
    pub offer_count: i64,
}

/// `$1,234,567` with thousands separators; negatives render as `-$12,345`.
pub fn format_money(n: i64) -> String {
    let negative = n < 0;
    let digits = n.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if negative {
        format!("-${grouped}")
    } else {
        format!("${grouped}")
    }
}

/// Signed delta shown in offer emails: `+$10,000` / `-$5,000`.
pub fn format_delta(n: i64) -> String {
    if n >= 0 {
        format!("+{}", format_money(n))
    } else {
        format_money(n)
    }
}

/// `abc123…wxyz` style id shortening for logs and labels.
pub fn short_id(id: &str) -> String {
    if id.len() <= 10 {
        return id.to_string();
    }
    format!("{}…{}", &id[..6], &id[id.len() - 4..])
}
