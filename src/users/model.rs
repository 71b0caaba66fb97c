use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::Error;

/// Authorization level of a user record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Student,
    Admin,
}

impl Role {
    /// Parse a role name, rejecting anything outside the closed set.
    pub fn parse(s: &str) -> Result<Self, Error> {
        match s {
            "student" => Ok(Self::Student),
            "admin" => Ok(Self::Admin),
            _ => Err(Error::InvalidRole(s.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// User record as stored.
///
/// Profile data (name, skills, saved roadmaps, preferences) lives in
/// `profile` and is opaque to the reconciler: it is filled with defaults at
/// creation and never touched again by this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: Uuid,
    /// Auth provider UID. Written once, at creation; absent for records
    /// created before the identity was linked.
    pub external_id: Option<String>,
    pub email: String,
    pub role: Role,
    pub profile: serde_json::Value,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// The pair (email, optional provider UID) designating one person across the
/// auth provider and the local store.
#[derive(Debug, Clone)]
pub struct Identity {
    email: String,
    external_id: Option<String>,
}

impl Identity {
    /// Normalize the email (trim + lowercase, matching registration) and
    /// validate its shape.
    pub fn new(email: &str, external_id: Option<&str>) -> Result<Self, Error> {
        let email = email.trim().to_lowercase();
        if !is_valid_email(&email) {
            return Err(Error::InvalidIdentity(email));
        }
        Ok(Self {
            email,
            external_id: external_id.map(str::to_owned),
        })
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn external_id(&self) -> Option<&str> {
        self.external_id.as_deref()
    }
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}
