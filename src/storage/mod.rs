//! # Storage and Persistence
//!
//! SQLite connectivity, embedded migrations and the repositories backing
//! profiles, organizations and memberships.

pub mod migrations;
pub mod pool;
pub mod repositories;

#[cfg(test)]
pub mod test_helpers;

pub use crate::config::DatabaseConfig;

pub use migrations::{
    get_migration_version, list_applied_migrations, run_migrations, validate_migrations,
    MigrationInfo,
};
pub use pool::{create_pool, get_pool_stats, DbPool, PoolStats};
pub use repositories::{
    MembershipRepository, OrganizationRepository, ProfileRepository, ProvisionedProfile,
    SqlxMembershipRepository, SqlxOrganizationRepository, SqlxProfileRepository,
};

use crate::errors::{Result, TenancyError};

/// Check database connectivity
pub async fn check_connection(pool: &DbPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .map_err(|e| TenancyError::database(e, "Database connectivity check failed"))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_check_connection() {
        let db = test_helpers::TestDatabase::new("storage_connection").await;
        check_connection(&db.pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_database_url() {
        let config = DatabaseConfig { url: "invalid://url".to_string(), ..Default::default() };

        let result = create_pool(&config).await;
        assert!(result.is_err());
    }
}
