use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Snapshot of a food listing taken when it was favorited.
///
/// Field names on the wire match the listing objects served by the
/// foodshare API, so a listing document deserializes straight into this
/// type. Unknown listing fields are ignored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FavoriteItem {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "foodName")]
    pub name: String,
    #[serde(rename = "foodImage", default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(rename = "pickupLocation", default)]
    pub pickup_location: String,
    #[serde(rename = "expireDate", default)]
    pub expire_date: String,
    #[serde(rename = "donorName", default)]
    pub donor_name: String,
    #[serde(rename = "foodQuantity", default)]
    pub quantity: String,
}

impl FavoriteItem {
    /// Create a new favorite with only the required fields set
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            image_url: None,
            pickup_location: String::new(),
            expire_date: String::new(),
            donor_name: String::new(),
            quantity: String::new(),
        }
    }

    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    pub fn with_pickup_location(mut self, location: impl Into<String>) -> Self {
        self.pickup_location = location.into();
        self
    }

    pub fn with_expire_date(mut self, expire_date: impl Into<String>) -> Self {
        self.expire_date = expire_date.into();
        self
    }

    pub fn with_donor_name(mut self, donor: impl Into<String>) -> Self {
        self.donor_name = donor.into();
        self
    }

    pub fn with_quantity(mut self, quantity: impl Into<String>) -> Self {
        self.quantity = quantity.into();
        self
    }

    /// Build a snapshot from a raw listing JSON document
    pub fn from_listing_json(listing: &str) -> Result<Self> {
        let item: FavoriteItem = serde_json::from_str(listing)?;
        item.validate()?;
        Ok(item)
    }

    /// Reject items without a usable id or name
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::InvalidInput("Favorite id must not be empty".to_string()));
        }
        if self.name.trim().is_empty() {
            return Err(Error::InvalidInput(format!(
                "Favorite '{}' has an empty name",
                self.id
            )));
        }
        Ok(())
    }
}
