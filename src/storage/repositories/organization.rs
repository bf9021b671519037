//! Organization and membership repositories
//!
//! Memberships reference either a profile or, for pending invitations, a bare
//! email. Role grants are upserts so that re-inviting updates the existing
//! row. The last-owner guard runs inside the same transaction as the write.

use crate::domain::{MemberIdentifier, Membership, MembershipId, OrgId, Organization, ProfileId, Role};
use crate::errors::{Result, TenancyError};
use crate::storage::DbPool;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, Sqlite, Transaction};
use std::str::FromStr;
use tracing::instrument;

const MEMBERSHIP_RETURNING: &str =
    "RETURNING id, organization_id, profile_id, email, role, created_at, updated_at";

// Database row structures

#[derive(Debug, Clone, FromRow)]
pub(crate) struct OrganizationRow {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<OrganizationRow> for Organization {
    fn from(row: OrganizationRow) -> Self {
        Organization {
            id: OrgId::from_string(row.id),
            name: row.name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
struct MembershipRow {
    pub id: String,
    pub organization_id: String,
    pub profile_id: Option<String>,
    pub email: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<MembershipRow> for Membership {
    type Error = TenancyError;

    fn try_from(row: MembershipRow) -> Result<Self> {
        let role = Role::from_str(&row.role).map_err(|e| {
            TenancyError::internal(format!("Invalid membership role '{}': {}", row.role, e))
        })?;

        Ok(Membership {
            id: MembershipId::from_string(row.id),
            organization_id: OrgId::from_string(row.organization_id),
            profile_id: row.profile_id.map(ProfileId::from_string),
            email: row.email,
            role,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Membership rows targeted by a removal
#[derive(Debug, Clone, FromRow)]
struct RemovalCandidate {
    pub id: String,
    pub profile_id: Option<String>,
    pub role: String,
}

// Repository traits

#[async_trait]
pub trait OrganizationRepository: Send + Sync {
    /// Create an organization and make `owner` its owner.
    async fn create_with_owner(&self, name: &str, owner: &ProfileId) -> Result<Organization>;
    async fn find_by_id(&self, id: &OrgId) -> Result<Option<Organization>>;
    async fn rename(&self, id: &OrgId, name: &str) -> Result<Organization>;
    async fn delete(&self, id: &OrgId) -> Result<()>;
    /// Organizations the profile holds any membership in, oldest first.
    async fn list_for_profile(&self, profile_id: &ProfileId) -> Result<Vec<Organization>>;
}

#[async_trait]
pub trait MembershipRepository: Send + Sync {
    async fn find_role(&self, org_id: &OrgId, profile_id: &ProfileId) -> Result<Option<Role>>;

    /// Members of an organization. Bound members carry their profile's email.
    async fn list_members(&self, org_id: &OrgId) -> Result<Vec<Membership>>;

    /// Grant `role` to `email`: a bound membership when a profile has that
    /// email, a placeholder otherwise.
    async fn grant_role(
        &self,
        org_id: &OrgId,
        email: &str,
        role: Role,
        protect_last_owner: bool,
    ) -> Result<Membership>;

    async fn remove(
        &self,
        org_id: &OrgId,
        identifier: &MemberIdentifier,
        protect_last_owner: bool,
    ) -> Result<()>;
}

// Repository implementations

#[derive(Debug, Clone)]
pub struct SqlxOrganizationRepository {
    pool: DbPool,
}

impl SqlxOrganizationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrganizationRepository for SqlxOrganizationRepository {
    #[instrument(skip(self), fields(owner = %owner), name = "db_create_organization")]
    async fn create_with_owner(&self, name: &str, owner: &ProfileId) -> Result<Organization> {
        let now = Utc::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| TenancyError::database(e, "Failed to begin organization creation"))?;

        let row = sqlx::query_as::<_, OrganizationRow>(
            "INSERT INTO organizations (id, name, created_at, updated_at) VALUES (?, ?, ?, ?) \
             RETURNING id, name, created_at, updated_at",
        )
        .bind(OrgId::new().as_str())
        .bind(name)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| TenancyError::database(e, "Failed to create organization"))?;

        sqlx::query(
            "INSERT INTO memberships (id, organization_id, profile_id, email, role, created_at, updated_at) \
             VALUES (?, ?, ?, NULL, ?, ?, ?)",
        )
        .bind(MembershipId::new().as_str())
        .bind(&row.id)
        .bind(owner.as_str())
        .bind(Role::Owner.as_str())
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| TenancyError::database(e, "Failed to create owner membership"))?;

        tx.commit()
            .await
            .map_err(|e| TenancyError::database(e, "Failed to commit organization creation"))?;

        Ok(row.into())
    }

    #[instrument(skip(self), fields(org_id = %id), name = "db_get_organization_by_id")]
    async fn find_by_id(&self, id: &OrgId) -> Result<Option<Organization>> {
        let row = sqlx::query_as::<_, OrganizationRow>(
            "SELECT id, name, created_at, updated_at FROM organizations WHERE id = ?",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            TenancyError::database(e, format!("Failed to fetch organization by ID: {}", id))
        })?;

        Ok(row.map(Organization::from))
    }

    #[instrument(skip(self), fields(org_id = %id), name = "db_rename_organization")]
    async fn rename(&self, id: &OrgId, name: &str) -> Result<Organization> {
        let row = sqlx::query_as::<_, OrganizationRow>(
            "UPDATE organizations SET name = ?, updated_at = ? WHERE id = ? \
             RETURNING id, name, created_at, updated_at",
        )
        .bind(name)
        .bind(Utc::now())
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| TenancyError::database(e, "Failed to rename organization"))?
        .ok_or_else(|| TenancyError::not_found("Organization", id.as_str()))?;

        Ok(row.into())
    }

    #[instrument(skip(self), fields(org_id = %id), name = "db_delete_organization")]
    async fn delete(&self, id: &OrgId) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| TenancyError::database(e, "Failed to begin organization deletion"))?;

        sqlx::query("DELETE FROM memberships WHERE organization_id = ?")
            .bind(id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| TenancyError::database(e, "Failed to delete organization memberships"))?;

        let result = sqlx::query("DELETE FROM organizations WHERE id = ?")
            .bind(id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| TenancyError::database(e, "Failed to delete organization"))?;

        if result.rows_affected() == 0 {
            return Err(TenancyError::not_found("Organization", id.as_str()));
        }

        tx.commit()
            .await
            .map_err(|e| TenancyError::database(e, "Failed to commit organization deletion"))?;

        Ok(())
    }

    #[instrument(skip(self), fields(profile_id = %profile_id), name = "db_list_profile_organizations")]
    async fn list_for_profile(&self, profile_id: &ProfileId) -> Result<Vec<Organization>> {
        let rows = sqlx::query_as::<_, OrganizationRow>(
            "SELECT o.id, o.name, o.created_at, o.updated_at
             FROM organizations o
             JOIN memberships m ON m.organization_id = o.id
             WHERE m.profile_id = ?
             ORDER BY o.created_at, o.id",
        )
        .bind(profile_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| TenancyError::database(e, "Failed to list profile organizations"))?;

        Ok(rows.into_iter().map(Organization::from).collect())
    }
}

#[derive(Debug, Clone)]
pub struct SqlxMembershipRepository {
    pool: DbPool,
}

impl SqlxMembershipRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

async fn count_owners(tx: &mut Transaction<'_, Sqlite>, org_id: &OrgId) -> Result<i64> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM memberships
         WHERE organization_id = ? AND role = 'owner' AND profile_id IS NOT NULL",
    )
    .bind(org_id.as_str())
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| TenancyError::database(e, "Failed to count organization owners"))
}

#[async_trait]
impl MembershipRepository for SqlxMembershipRepository {
    #[instrument(skip(self), fields(org_id = %org_id, profile_id = %profile_id), name = "db_find_membership_role")]
    async fn find_role(&self, org_id: &OrgId, profile_id: &ProfileId) -> Result<Option<Role>> {
        let role = sqlx::query_scalar::<_, String>(
            "SELECT role FROM memberships WHERE organization_id = ? AND profile_id = ?",
        )
        .bind(org_id.as_str())
        .bind(profile_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| TenancyError::database(e, "Failed to fetch membership role"))?;

        role.map(|r| {
            Role::from_str(&r).map_err(|e| {
                TenancyError::internal(format!("Invalid membership role '{}': {}", r, e))
            })
        })
        .transpose()
    }

    #[instrument(skip(self), fields(org_id = %org_id), name = "db_list_org_members")]
    async fn list_members(&self, org_id: &OrgId) -> Result<Vec<Membership>> {
        let rows = sqlx::query_as::<_, MembershipRow>(
            "SELECT m.id, m.organization_id, m.profile_id, COALESCE(m.email, p.email) AS email,
                    m.role, m.created_at, m.updated_at
             FROM memberships m
             LEFT JOIN profiles p ON p.id = m.profile_id
             WHERE m.organization_id = ?
             ORDER BY m.created_at, m.id",
        )
        .bind(org_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| TenancyError::database(e, "Failed to list organization members"))?;

        rows.into_iter().map(Membership::try_from).collect()
    }

    #[instrument(skip(self), fields(org_id = %org_id, role = %role), name = "db_grant_membership_role")]
    async fn grant_role(
        &self,
        org_id: &OrgId,
        email: &str,
        role: Role,
        protect_last_owner: bool,
    ) -> Result<Membership> {
        let now = Utc::now();
        let mut tx = self
            .pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(|e| TenancyError::database(e, "Failed to begin role grant"))?;

        let profile_id = sqlx::query_scalar::<_, String>("SELECT id FROM profiles WHERE email = ?")
            .bind(email)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| TenancyError::database(e, "Failed to resolve profile by email"))?;

        let row = match profile_id {
            Some(profile_id) => {
                if protect_last_owner && role != Role::Owner {
                    let current = sqlx::query_scalar::<_, String>(
                        "SELECT role FROM memberships WHERE organization_id = ? AND profile_id = ?",
                    )
                    .bind(org_id.as_str())
                    .bind(&profile_id)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(|e| TenancyError::database(e, "Failed to fetch current role"))?;

                    if current.as_deref() == Some(Role::Owner.as_str())
                        && count_owners(&mut tx, org_id).await? <= 1
                    {
                        return Err(TenancyError::conflict(
                            "Cannot downgrade the last owner of an organization",
                            "Membership",
                        ));
                    }
                }

                let row = sqlx::query_as::<_, MembershipRow>(&format!(
                    "INSERT INTO memberships (id, organization_id, profile_id, email, role, created_at, updated_at)
                     VALUES (?, ?, ?, NULL, ?, ?, ?)
                     ON CONFLICT(organization_id, profile_id)
                     DO UPDATE SET role = excluded.role, updated_at = excluded.updated_at
                     {}",
                    MEMBERSHIP_RETURNING
                ))
                .bind(MembershipId::new().as_str())
                .bind(org_id.as_str())
                .bind(&profile_id)
                .bind(role.as_str())
                .bind(now)
                .bind(now)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| TenancyError::from_write(e, "Membership", "Failed to upsert membership"))?;

                sqlx::query(
                    "DELETE FROM memberships WHERE organization_id = ? AND email = ? AND profile_id IS NULL",
                )
                .bind(org_id.as_str())
                .bind(email)
                .execute(&mut *tx)
                .await
                .map_err(|e| TenancyError::database(e, "Failed to drop superseded invitation"))?;

                row
            }
            None => sqlx::query_as::<_, MembershipRow>(&format!(
                "INSERT INTO memberships (id, organization_id, profile_id, email, role, created_at, updated_at)
                 VALUES (?, ?, NULL, ?, ?, ?, ?)
                 ON CONFLICT(organization_id, email)
                 DO UPDATE SET role = excluded.role, updated_at = excluded.updated_at
                 {}",
                MEMBERSHIP_RETURNING
            ))
            .bind(MembershipId::new().as_str())
            .bind(org_id.as_str())
            .bind(email)
            .bind(role.as_str())
            .bind(now)
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| TenancyError::from_write(e, "Membership", "Failed to upsert invitation"))?,
        };

        tx.commit().await.map_err(|e| TenancyError::database(e, "Failed to commit role grant"))?;

        let mut membership = Membership::try_from(row)?;
        membership.email = Some(email.to_string());
        Ok(membership)
    }

    #[instrument(skip(self), fields(org_id = %org_id, identifier = %identifier), name = "db_remove_membership")]
    async fn remove(
        &self,
        org_id: &OrgId,
        identifier: &MemberIdentifier,
        protect_last_owner: bool,
    ) -> Result<()> {
        let mut tx = self
            .pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(|e| TenancyError::database(e, "Failed to begin membership removal"))?;

        let candidates = match identifier {
            MemberIdentifier::Profile(profile_id) => sqlx::query_as::<_, RemovalCandidate>(
                "SELECT id, profile_id, role FROM memberships
                 WHERE organization_id = ? AND profile_id = ?",
            )
            .bind(org_id.as_str())
            .bind(profile_id.as_str())
            .fetch_all(&mut *tx)
            .await,
            MemberIdentifier::Email(email) => sqlx::query_as::<_, RemovalCandidate>(
                "SELECT id, profile_id, role FROM memberships
                 WHERE organization_id = ?
                   AND (email = ? OR profile_id IN (SELECT id FROM profiles WHERE email = ?))",
            )
            .bind(org_id.as_str())
            .bind(email)
            .bind(email)
            .fetch_all(&mut *tx)
            .await,
        }
        .map_err(|e| TenancyError::database(e, "Failed to fetch membership for removal"))?;

        if candidates.is_empty() {
            return Err(TenancyError::not_found(
                "Membership",
                format!("{} in organization {}", identifier, org_id),
            ));
        }

        if protect_last_owner {
            let removed_owners = candidates
                .iter()
                .filter(|c| c.profile_id.is_some() && c.role == Role::Owner.as_str())
                .count() as i64;
            if removed_owners > 0 && count_owners(&mut tx, org_id).await? - removed_owners < 1 {
                return Err(TenancyError::conflict(
                    "Cannot remove the last owner of an organization",
                    "Membership",
                ));
            }
        }

        for candidate in &candidates {
            sqlx::query("DELETE FROM memberships WHERE id = ?")
                .bind(&candidate.id)
                .execute(&mut *tx)
                .await
                .map_err(|e| TenancyError::database(e, "Failed to delete membership"))?;
        }

        tx.commit()
            .await
            .map_err(|e| TenancyError::database(e, "Failed to commit membership removal"))?;

        Ok(())
    }
}
