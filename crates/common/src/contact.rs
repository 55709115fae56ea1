//! Contact record model
//!
//! A contact card belongs to exactly one user. Ownership is fixed when the
//! card is created and every read or write is scoped by the caller's identity.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Identity of the authenticated user a record belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Owner(String);

impl Owner {
    pub fn new(email: impl Into<String>) -> Self {
        Self(email.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single contact card as stored in the `contact_card` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub id: i64,
    pub user_email: String,
    #[serde(default)]
    pub contact_name: String,
    #[serde(default)]
    pub contact_affiliation: String,
    #[serde(default)]
    pub contact_description: String,
    /// Image reference or inline `data:` URL
    #[serde(default)]
    pub contact_image: String,
}

impl ContactRecord {
    /// Read one editable field
    pub fn field(&self, field: ContactField) -> &str {
        match field {
            ContactField::Name => &self.contact_name,
            ContactField::Affiliation => &self.contact_affiliation,
            ContactField::Description => &self.contact_description,
            ContactField::Image => &self.contact_image,
        }
    }

    pub fn is_owned_by(&self, owner: &Owner) -> bool {
        self.user_email == owner.as_str()
    }
}

/// Fields a user may edit after creating a card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactField {
    Name,
    Affiliation,
    Description,
    Image,
}

impl ContactField {
    /// Column backing this field
    pub fn column(&self) -> &'static str {
        match self {
            ContactField::Name => "contact_name",
            ContactField::Affiliation => "contact_affiliation",
            ContactField::Description => "contact_description",
            ContactField::Image => "contact_image",
        }
    }
}

impl FromStr for ContactField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" | "contact_name" => Ok(ContactField::Name),
            "affiliation" | "contact_affiliation" => Ok(ContactField::Affiliation),
            "description" | "contact_description" => Ok(ContactField::Description),
            "image" | "photo" | "contact_image" => Ok(ContactField::Image),
            other => Err(Error::UnknownField(other.to_string())),
        }
    }
}
