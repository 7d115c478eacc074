//! Data models for the CrediLink auth server

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use sqlx::types::Json;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub mod auth;
pub use auth::*;

/// Identity record, one per (address, role) claim
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct IdentityRecord {
    pub id: Uuid,
    pub address: String,
    pub role: Role,
    pub display_name: String,
    pub verified: bool,
    pub ens_name: Option<String>,
    pub email: Option<String>,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub skills: Json<Vec<String>>,
    pub company: Option<String>,
    pub experience: Option<String>,
    pub wallet_type: Option<String>,
    pub chain_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The unit of identity uniqueness
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityClaim {
    pub address: String,
    pub role: Role,
}

impl IdentityClaim {
    pub fn new(address: impl Into<String>, role: Role) -> Self {
        Self {
            address: address.into(),
            role,
        }
    }
}

/// Identity roles
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    Student,
    Recruiter,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Recruiter => "recruiter",
        }
    }

    /// Title-case label used in default display names
    pub fn label(&self) -> &'static str {
        match self {
            Role::Student => "Student",
            Role::Recruiter => "Recruiter",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "recruiter" => Ok(Role::Recruiter),
            other => Err(format!(
                "Invalid role: '{}'. Expected: student or recruiter",
                other
            )),
        }
    }
}

/// Identity response (sanitized for API)
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct IdentityResponse {
    pub id: Uuid,
    pub address: String,
    pub role: Role,
    pub display_name: String,
    pub verified: bool,
    pub ens_name: Option<String>,
    pub email: Option<String>,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub skills: Vec<String>,
    pub company: Option<String>,
    pub experience: Option<String>,
    pub wallet_type: Option<String>,
    pub chain_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<IdentityRecord> for IdentityResponse {
    fn from(record: IdentityRecord) -> Self {
        Self {
            id: record.id,
            address: record.address,
            role: record.role,
            display_name: record.display_name,
            verified: record.verified,
            ens_name: record.ens_name,
            email: record.email,
            avatar: record.avatar,
            bio: record.bio,
            skills: record.skills.0,
            company: record.company,
            experience: record.experience,
            wallet_type: record.wallet_type,
            chain_id: record.chain_id,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Partial profile update; absent fields are left untouched
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub ens_name: Option<String>,
    pub email: Option<String>,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub skills: Option<Vec<String>>,
    pub company: Option<String>,
    pub experience: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none()
            && self.ens_name.is_none()
            && self.email.is_none()
            && self.avatar.is_none()
            && self.bio.is_none()
            && self.skills.is_none()
            && self.company.is_none()
            && self.experience.is_none()
    }
}
