//! Profile repository
//!
//! Profiles are looked up by provider subject on every authenticated request.
//! First-time provisioning writes the profile, its default organization and
//! the owner membership in a single transaction.

use crate::domain::{MembershipId, NewProfile, OrgId, Organization, Profile, ProfileId, Role};
use crate::errors::{Result, TenancyError};
use crate::storage::repositories::organization::OrganizationRow;
use crate::storage::DbPool;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use tracing::instrument;

const PROFILE_COLUMNS: &str = "id, auth_subject_id, email, name, avatar_url, \
     subscribed_to_newsletter_at, created_at, updated_at, last_seen_at";

#[derive(Debug, Clone, FromRow)]
struct ProfileRow {
    pub id: String,
    pub auth_subject_id: String,
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub subscribed_to_newsletter_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Profile {
            id: ProfileId::from_string(row.id),
            auth_subject_id: row.auth_subject_id,
            email: row.email,
            name: row.name,
            avatar_url: row.avatar_url,
            subscribed_to_newsletter_at: row.subscribed_to_newsletter_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
            last_seen_at: row.last_seen_at,
        }
    }
}

/// Result of first-time provisioning.
#[derive(Debug, Clone)]
pub struct ProvisionedProfile {
    pub profile: Profile,
    pub organization: Organization,
    /// Placeholder memberships rebound to the new profile
    pub reconciled_invitations: u64,
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn find_by_subject(&self, auth_subject_id: &str) -> Result<Option<Profile>>;
    async fn find_by_id(&self, id: &ProfileId) -> Result<Option<Profile>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<Profile>>;
    async fn touch_last_seen(&self, id: &ProfileId) -> Result<Profile>;

    /// Insert the profile, a default organization it owns and, when
    /// `reconcile_invitations` is set, bind pending email invitations to it.
    async fn provision(
        &self,
        profile: NewProfile,
        organization_name: &str,
        reconcile_invitations: bool,
    ) -> Result<ProvisionedProfile>;

    async fn set_newsletter_subscription(
        &self,
        id: &ProfileId,
        subscribed_at: Option<DateTime<Utc>>,
    ) -> Result<Profile>;

    /// Delete the profile together with every membership it holds.
    async fn delete(&self, id: &ProfileId) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct SqlxProfileRepository {
    pool: DbPool,
}

impl SqlxProfileRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn find_one(&self, column: &str, value: &str) -> Result<Option<Profile>> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            "SELECT {} FROM profiles WHERE {} = ?",
            PROFILE_COLUMNS, column
        ))
        .bind(value)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| TenancyError::database(e, format!("Failed to fetch profile by {}", column)))?;

        Ok(row.map(Profile::from))
    }
}

#[async_trait]
impl ProfileRepository for SqlxProfileRepository {
    #[instrument(skip(self), name = "db_find_profile_by_subject")]
    async fn find_by_subject(&self, auth_subject_id: &str) -> Result<Option<Profile>> {
        self.find_one("auth_subject_id", auth_subject_id).await
    }

    #[instrument(skip(self), fields(profile_id = %id), name = "db_find_profile_by_id")]
    async fn find_by_id(&self, id: &ProfileId) -> Result<Option<Profile>> {
        self.find_one("id", id.as_str()).await
    }

    #[instrument(skip(self), name = "db_find_profile_by_email")]
    async fn find_by_email(&self, email: &str) -> Result<Option<Profile>> {
        self.find_one("email", email).await
    }

    #[instrument(skip(self), fields(profile_id = %id), name = "db_touch_profile_last_seen")]
    async fn touch_last_seen(&self, id: &ProfileId) -> Result<Profile> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            "UPDATE profiles SET last_seen_at = ? WHERE id = ? RETURNING {}",
            PROFILE_COLUMNS
        ))
        .bind(Utc::now())
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| TenancyError::database(e, "Failed to update profile last_seen_at"))?
        .ok_or_else(|| TenancyError::not_found("Profile", id.as_str()))?;

        Ok(row.into())
    }

    #[instrument(
        skip(self, profile),
        fields(profile_id = %profile.id, subject = %profile.auth_subject_id),
        name = "db_provision_profile"
    )]
    async fn provision(
        &self,
        profile: NewProfile,
        organization_name: &str,
        reconcile_invitations: bool,
    ) -> Result<ProvisionedProfile> {
        let now = Utc::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| TenancyError::database(e, "Failed to begin provisioning transaction"))?;

        let profile_row = sqlx::query_as::<_, ProfileRow>(&format!(
            "INSERT INTO profiles (id, auth_subject_id, email, name, avatar_url, \
             subscribed_to_newsletter_at, created_at, updated_at, last_seen_at) \
             VALUES (?, ?, ?, ?, ?, NULL, ?, ?, ?) RETURNING {}",
            PROFILE_COLUMNS
        ))
        .bind(profile.id.as_str())
        .bind(&profile.auth_subject_id)
        .bind(&profile.email)
        .bind(&profile.name)
        .bind(&profile.avatar_url)
        .bind(now)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| TenancyError::from_write(e, "Profile", "Failed to create profile"))?;

        let org_row = sqlx::query_as::<_, OrganizationRow>(
            "INSERT INTO organizations (id, name, created_at, updated_at) VALUES (?, ?, ?, ?) \
             RETURNING id, name, created_at, updated_at",
        )
        .bind(OrgId::new().as_str())
        .bind(organization_name)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| TenancyError::database(e, "Failed to create default organization"))?;

        sqlx::query(
            "INSERT INTO memberships (id, organization_id, profile_id, email, role, created_at, updated_at) \
             VALUES (?, ?, ?, NULL, ?, ?, ?)",
        )
        .bind(MembershipId::new().as_str())
        .bind(&org_row.id)
        .bind(profile.id.as_str())
        .bind(Role::Owner.as_str())
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| TenancyError::database(e, "Failed to create owner membership"))?;

        let reconciled_invitations = if reconcile_invitations {
            // The new profile is only a member of its default org here
            sqlx::query(
                "UPDATE memberships SET profile_id = ?, email = NULL, updated_at = ? \
                 WHERE email = ? AND profile_id IS NULL",
            )
            .bind(profile.id.as_str())
            .bind(now)
            .bind(&profile.email)
            .execute(&mut *tx)
            .await
            .map_err(|e| TenancyError::database(e, "Failed to reconcile pending invitations"))?
            .rows_affected()
        } else {
            0
        };

        tx.commit()
            .await
            .map_err(|e| TenancyError::database(e, "Failed to commit profile provisioning"))?;

        Ok(ProvisionedProfile {
            profile: profile_row.into(),
            organization: org_row.into(),
            reconciled_invitations,
        })
    }

    #[instrument(skip(self), fields(profile_id = %id), name = "db_set_newsletter_subscription")]
    async fn set_newsletter_subscription(
        &self,
        id: &ProfileId,
        subscribed_at: Option<DateTime<Utc>>,
    ) -> Result<Profile> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            "UPDATE profiles SET subscribed_to_newsletter_at = ?, updated_at = ? WHERE id = ? RETURNING {}",
            PROFILE_COLUMNS
        ))
        .bind(subscribed_at)
        .bind(Utc::now())
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| TenancyError::database(e, "Failed to update newsletter subscription"))?
        .ok_or_else(|| TenancyError::not_found("Profile", id.as_str()))?;

        Ok(row.into())
    }

    #[instrument(skip(self), fields(profile_id = %id), name = "db_delete_profile")]
    async fn delete(&self, id: &ProfileId) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| TenancyError::database(e, "Failed to begin profile deletion"))?;

        sqlx::query("DELETE FROM memberships WHERE profile_id = ?")
            .bind(id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| TenancyError::database(e, "Failed to delete profile memberships"))?;

        let result = sqlx::query("DELETE FROM profiles WHERE id = ?")
            .bind(id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| TenancyError::database(e, "Failed to delete profile"))?;

        if result.rows_affected() == 0 {
            return Err(TenancyError::not_found("Profile", id.as_str()));
        }

        tx.commit()
            .await
            .map_err(|e| TenancyError::database(e, "Failed to commit profile deletion"))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_helpers::TestDatabase;

    fn new_profile(subject: &str, email: &str) -> NewProfile {
        NewProfile {
            id: ProfileId::new(),
            auth_subject_id: subject.to_string(),
            email: email.to_string(),
            name: Some("Test User".to_string()),
            avatar_url: None,
        }
    }

    async fn membership_count(pool: &DbPool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM memberships").fetch_one(pool).await.unwrap()
    }

    #[tokio::test]
    async fn test_provision_and_lookup() {
        let db = TestDatabase::new("profile_provision").await;
        let repo = SqlxProfileRepository::new(db.pool.clone());

        let provisioned =
            repo.provision(new_profile("sub-1", "a@example.com"), "Personal", true).await.unwrap();
        assert_eq!(provisioned.organization.name, "Personal");
        assert_eq!(provisioned.reconciled_invitations, 0);

        let by_subject = repo.find_by_subject("sub-1").await.unwrap().unwrap();
        assert_eq!(by_subject.id, provisioned.profile.id);
        assert!(!by_subject.is_subscribed_to_newsletter());

        let by_email = repo.find_by_email("a@example.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, provisioned.profile.id);

        let role: String = sqlx::query_scalar(
            "SELECT role FROM memberships WHERE organization_id = ? AND profile_id = ?",
        )
        .bind(provisioned.organization.id.as_str())
        .bind(provisioned.profile.id.as_str())
        .fetch_one(&db.pool)
        .await
        .unwrap();
        assert_eq!(role, "owner");
    }

    #[tokio::test]
    async fn test_duplicate_subject_or_email_conflicts_and_rolls_back() {
        let db = TestDatabase::new("profile_conflict").await;
        let repo = SqlxProfileRepository::new(db.pool.clone());

        repo.provision(new_profile("sub-1", "a@example.com"), "Personal", true).await.unwrap();

        let err =
            repo.provision(new_profile("sub-1", "b@example.com"), "Personal", true).await.unwrap_err();
        assert!(matches!(err, TenancyError::Conflict { .. }));

        let err =
            repo.provision(new_profile("sub-2", "a@example.com"), "Personal", true).await.unwrap_err();
        assert!(matches!(err, TenancyError::Conflict { .. }));

        let orgs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM organizations")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(orgs, 1);
        assert_eq!(membership_count(&db.pool).await, 1);
    }

    #[tokio::test]
    async fn test_touch_last_seen_advances() {
        let db = TestDatabase::new("profile_touch").await;
        let repo = SqlxProfileRepository::new(db.pool.clone());

        let provisioned =
            repo.provision(new_profile("sub-1", "a@example.com"), "Personal", true).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let touched = repo.touch_last_seen(&provisioned.profile.id).await.unwrap();
        assert!(touched.last_seen_at > provisioned.profile.last_seen_at);

        let missing = repo.touch_last_seen(&ProfileId::new()).await.unwrap_err();
        assert!(matches!(missing, TenancyError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_newsletter_subscription_toggle() {
        let db = TestDatabase::new("profile_newsletter").await;
        let repo = SqlxProfileRepository::new(db.pool.clone());
        let id = repo
            .provision(new_profile("sub-1", "a@example.com"), "Personal", true)
            .await
            .unwrap()
            .profile
            .id;

        let subscribed = repo.set_newsletter_subscription(&id, Some(Utc::now())).await.unwrap();
        assert!(subscribed.is_subscribed_to_newsletter());

        let unsubscribed = repo.set_newsletter_subscription(&id, None).await.unwrap();
        assert!(!unsubscribed.is_subscribed_to_newsletter());
    }

    #[tokio::test]
    async fn test_delete_profile_removes_memberships_but_keeps_orgs() {
        let db = TestDatabase::new("profile_delete").await;
        let repo = SqlxProfileRepository::new(db.pool.clone());
        let provisioned =
            repo.provision(new_profile("sub-1", "a@example.com"), "Personal", true).await.unwrap();

        repo.delete(&provisioned.profile.id).await.unwrap();

        assert!(repo.find_by_id(&provisioned.profile.id).await.unwrap().is_none());
        assert_eq!(membership_count(&db.pool).await, 0);
        let orgs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM organizations")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(orgs, 1);

        let err = repo.delete(&provisioned.profile.id).await.unwrap_err();
        assert!(matches!(err, TenancyError::NotFound { .. }));
    }
}
