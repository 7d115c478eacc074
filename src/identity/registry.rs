//! Identity registry
//!
//! Persists one identity record per (address, role) claim. A wallet that is
//! registered under one role cannot register again under the other.

use chrono::Utc;
use sqlx::types::Json;
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::short_address;
use crate::models::{IdentityClaim, IdentityRecord, ProfileUpdate, Role};

/// Wallet type recorded for identities created through wallet sign-in
const DEFAULT_WALLET_TYPE: &str = "metamask";

const IDENTITY_COLUMNS: &str = "id, address, role, display_name, verified, ens_name, email, \
     avatar, bio, skills, company, experience, wallet_type, chain_id, created_at, updated_at";

/// Registry errors
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("This wallet is already registered as a {existing}. Please log in with that role.")]
    RoleConflict { address: String, existing: Role },

    #[error("Identity not found")]
    NotFound,
}

impl From<sqlx::Error> for RegistryError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => RegistryError::NotFound,
            _ => RegistryError::DatabaseError(e.to_string()),
        }
    }
}

/// Identity registry backed by SQLite
#[derive(Clone)]
pub struct IdentityRegistry {
    db_pool: SqlitePool,
}

impl IdentityRegistry {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    /// Return the record for `claim`, registering it on first sight
    ///
    /// The insert only happens when the address has no record under any
    /// role, in one statement, so concurrent first logins for the same
    /// wallet create exactly one row.
    pub async fn find_or_create(
        &self,
        claim: &IdentityClaim,
        chain_id: Option<i64>,
    ) -> Result<(IdentityRecord, bool), RegistryError> {
        let now = Utc::now();
        let display_name = format!("{} {}", claim.role.label(), short_address(&claim.address));

        let rows_affected = sqlx::query(
            r#"
            INSERT INTO identities (id, address, role, display_name, verified, skills, wallet_type, chain_id, created_at, updated_at)
            SELECT $1, $2, $3, $4, TRUE, $5, $6, $7, $8, $9
            WHERE NOT EXISTS (SELECT 1 FROM identities WHERE address = $2)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&claim.address)
        .bind(claim.role)
        .bind(&display_name)
        .bind(Json(Vec::<String>::new()))
        .bind(DEFAULT_WALLET_TYPE)
        .bind(chain_id)
        .bind(now)
        .bind(now)
        .execute(&self.db_pool)
        .await?
        .rows_affected();

        let created = rows_affected == 1;

        let existing = self.find_by_address(&claim.address).await?;

        if let Some(record) = existing.iter().find(|r| r.role == claim.role) {
            if created {
                tracing::info!(
                    address = %claim.address,
                    role = %claim.role,
                    identity_id = %record.id,
                    "Registered new identity"
                );
            }
            return Ok((record.clone(), created));
        }

        match existing.first() {
            Some(other) => {
                tracing::warn!(
                    address = %claim.address,
                    requested = %claim.role,
                    existing = %other.role,
                    "Rejected registration under a second role"
                );
                Err(RegistryError::RoleConflict {
                    address: claim.address.clone(),
                    existing: other.role,
                })
            }
            None => Err(RegistryError::DatabaseError(
                "identity missing after insert".to_string(),
            )),
        }
    }

    /// Get an identity by ID
    pub async fn get(&self, id: Uuid) -> Result<IdentityRecord, RegistryError> {
        sqlx::query_as(&format!(
            "SELECT {} FROM identities WHERE id = $1",
            IDENTITY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or(RegistryError::NotFound)
    }

    /// All identities registered for an address
    pub async fn find_by_address(&self, address: &str) -> Result<Vec<IdentityRecord>, RegistryError> {
        let records = sqlx::query_as(&format!(
            "SELECT {} FROM identities WHERE address = $1 ORDER BY created_at ASC",
            IDENTITY_COLUMNS
        ))
        .bind(address)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(records)
    }

    /// Merge `fields` into the identity; absent fields keep their value
    ///
    /// Free-text fields are stored as given.
    pub async fn update(
        &self,
        id: Uuid,
        fields: ProfileUpdate,
    ) -> Result<IdentityRecord, RegistryError> {
        if fields.is_empty() {
            return self.get(id).await;
        }

        let rows_affected = sqlx::query(
            r#"
            UPDATE identities
            SET display_name = COALESCE($1, display_name),
                ens_name = COALESCE($2, ens_name),
                email = COALESCE($3, email),
                avatar = COALESCE($4, avatar),
                bio = COALESCE($5, bio),
                skills = COALESCE($6, skills),
                company = COALESCE($7, company),
                experience = COALESCE($8, experience),
                updated_at = $9
            WHERE id = $10
            "#,
        )
        .bind(fields.display_name)
        .bind(fields.ens_name)
        .bind(fields.email)
        .bind(fields.avatar)
        .bind(fields.bio)
        .bind(fields.skills.map(Json))
        .bind(fields.company)
        .bind(fields.experience)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.db_pool)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(RegistryError::NotFound);
        }

        tracing::info!(identity_id = %id, "Updated identity profile");

        self.get(id).await
    }

    /// Record that the wallet switched to another chain
    pub async fn switch_chain(
        &self,
        id: Uuid,
        chain_id: i64,
    ) -> Result<IdentityRecord, RegistryError> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE identities SET chain_id = $1, updated_at = $2 WHERE id = $3
            "#,
        )
        .bind(chain_id)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.db_pool)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(RegistryError::NotFound);
        }

        tracing::info!(identity_id = %id, chain_id, "Identity switched chain");

        self.get(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;

    const ADDRESS: &str = "0xabcabc0000000000000000000000000000001234";

    async fn registry() -> IdentityRegistry {
        IdentityRegistry::new(memory_pool().await.unwrap())
    }

    #[tokio::test]
    async fn test_find_or_create_registers_verified_identity() {
        let registry = registry().await;
        let claim = IdentityClaim::new(ADDRESS, Role::Student);

        let (record, created) = registry.find_or_create(&claim, Some(1)).await.unwrap();

        assert!(created);
        assert!(record.verified);
        assert_eq!(record.address, ADDRESS);
        assert_eq!(record.role, Role::Student);
        assert_eq!(record.display_name, "Student 0xabca...1234");
        assert_eq!(record.wallet_type.as_deref(), Some("metamask"));
        assert_eq!(record.chain_id, Some(1));
        assert!(record.skills.0.is_empty());
    }

    #[tokio::test]
    async fn test_find_or_create_returns_existing() {
        let registry = registry().await;
        let claim = IdentityClaim::new(ADDRESS, Role::Recruiter);

        let (first, created_first) = registry.find_or_create(&claim, None).await.unwrap();
        let (second, created_second) = registry.find_or_create(&claim, Some(5)).await.unwrap();

        assert!(created_first);
        assert!(!created_second);
        assert_eq!(first.id, second.id);
        // Existing records come back unchanged
        assert_eq!(second.chain_id, None);
    }

    #[tokio::test]
    async fn test_role_conflict() {
        let registry = registry().await;
        registry
            .find_or_create(&IdentityClaim::new(ADDRESS, Role::Recruiter), None)
            .await
            .unwrap();

        let result = registry
            .find_or_create(&IdentityClaim::new(ADDRESS, Role::Student), None)
            .await;

        match result {
            Err(RegistryError::RoleConflict { existing, .. }) => {
                assert_eq!(existing, Role::Recruiter)
            }
            other => panic!("expected role conflict, got {:?}", other),
        }

        assert_eq!(registry.find_by_address(ADDRESS).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_find_or_create_creates_once() {
        let registry = registry().await;
        let claim = IdentityClaim::new(ADDRESS, Role::Student);

        let mut handles = Vec::new();
        for _ in 0..10 {
            let registry = registry.clone();
            let claim = claim.clone();
            handles.push(tokio::spawn(async move {
                registry.find_or_create(&claim, None).await.unwrap()
            }));
        }

        let mut created = 0;
        let mut ids = Vec::new();
        for handle in handles {
            let (record, was_created) = handle.await.unwrap();
            if was_created {
                created += 1;
            }
            ids.push(record.id);
        }

        assert_eq!(created, 1);
        assert!(ids.iter().all(|id| *id == ids[0]));
        assert_eq!(registry.find_by_address(ADDRESS).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let registry = registry().await;
        let (record, _) = registry
            .find_or_create(&IdentityClaim::new(ADDRESS, Role::Student), None)
            .await
            .unwrap();

        let updated = registry
            .update(
                record.id,
                ProfileUpdate {
                    bio: Some("Building on-chain credentials".to_string()),
                    skills: Some(vec!["rust".to_string(), "react".to_string()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.bio.as_deref(), Some("Building on-chain credentials"));
        assert_eq!(updated.skills.0, vec!["rust", "react"]);
        assert_eq!(updated.display_name, record.display_name);
        assert!(updated.updated_at >= record.updated_at);

        let renamed = registry
            .update(
                record.id,
                ProfileUpdate {
                    display_name: Some("Ada".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.display_name, "Ada");
        assert_eq!(renamed.skills.0, vec!["rust", "react"]);
    }

    #[tokio::test]
    async fn test_update_missing_identity() {
        let registry = registry().await;
        let result = registry
            .update(
                Uuid::new_v4(),
                ProfileUpdate {
                    company: Some("Acme".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(RegistryError::NotFound)));

        let empty = registry.update(Uuid::new_v4(), ProfileUpdate::default()).await;
        assert!(matches!(empty, Err(RegistryError::NotFound)));
    }

    #[tokio::test]
    async fn test_switch_chain() {
        let registry = registry().await;
        let (record, _) = registry
            .find_or_create(&IdentityClaim::new(ADDRESS, Role::Student), Some(1))
            .await
            .unwrap();

        let switched = registry.switch_chain(record.id, 137).await.unwrap();
        assert_eq!(switched.chain_id, Some(137));

        let missing = registry.switch_chain(Uuid::new_v4(), 137).await;
        assert!(matches!(missing, Err(RegistryError::NotFound)));
    }
}
