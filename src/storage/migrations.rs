//! # Database Migration Management
//!
//! SQL migrations are embedded in the binary and applied in filename order.
//! Each applied migration is recorded in `_tenancy_migrations`.

use crate::errors::{Result, TenancyError};
use crate::storage::DbPool;
use serde::{Deserialize, Serialize};
use sqlx::Row;
use tracing::{error, info, warn, Instrument};

const MIGRATION_TABLE: &str = "_tenancy_migrations";

/// Embedded migrations as `(name, sql)`; names start with a numeric version.
const MIGRATIONS: &[(&str, &str)] = &[
    (
        "20260101000001_create_profiles",
        include_str!("../../migrations/20260101000001_create_profiles.sql"),
    ),
    (
        "20260101000002_create_organizations",
        include_str!("../../migrations/20260101000002_create_organizations.sql"),
    ),
    (
        "20260101000003_create_memberships",
        include_str!("../../migrations/20260101000003_create_memberships.sql"),
    ),
];

/// Migration information structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationInfo {
    pub version: i64,
    pub description: String,
    pub installed_on: chrono::DateTime<chrono::Utc>,
    pub execution_time: i64,
    pub checksum: Vec<u8>,
}

/// Run all pending database migrations
pub async fn run_migrations(pool: &DbPool) -> Result<()> {
    info!("Starting database migration process");

    create_migration_table(pool).await?;
    let applied = get_applied_migration_versions(pool).await?;

    let mut migrations_run = 0;
    for (name, sql) in MIGRATIONS {
        let version = extract_version_from_filename(name)?;

        if applied.contains(&version) {
            info!(version = version, "Migration already applied: {}", name);
            continue;
        }

        info!(version = version, "Running migration: {}", name);
        let execution_time = apply_migration(pool, name, sql, version)
            .instrument(crate::db_span!("apply_migration", version = version))
            .await?;

        migrations_run += 1;
        info!(version = version, execution_time_ms = execution_time, "Migration completed: {}", name);
    }

    if migrations_run > 0 {
        info!(count = migrations_run, "Database migrations completed");
    } else {
        info!("No pending migrations");
    }

    Ok(())
}

/// Apply one migration and record it in the same transaction. Returns the
/// execution time in milliseconds.
async fn apply_migration(pool: &DbPool, name: &str, sql: &str, version: i64) -> Result<i64> {
    let start_time = std::time::Instant::now();

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| TenancyError::database(e, "Failed to start migration transaction"))?;

    sqlx::raw_sql(sql).execute(&mut *tx).await.map_err(|e| {
        error!(error = %e, migration = name, "Migration failed");
        TenancyError::database(e, format!("Migration failed: {}", name))
    })?;

    let execution_time = start_time.elapsed().as_millis() as i64;
    sqlx::query(&format!(
        "INSERT INTO {} (version, description, checksum, execution_time, installed_on) VALUES (?, ?, ?, ?, ?)",
        MIGRATION_TABLE
    ))
    .bind(version)
    .bind(name)
    .bind(calculate_checksum(sql))
    .bind(execution_time)
    .bind(chrono::Utc::now())
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        error!(error = %e, migration = name, "Failed to record migration");
        TenancyError::database(e, format!("Failed to record migration: {}", name))
    })?;

    tx.commit()
        .await
        .map_err(|e| TenancyError::database(e, "Failed to commit migration transaction"))?;

    Ok(execution_time)
}

async fn create_migration_table(pool: &DbPool) -> Result<()> {
    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            checksum BLOB NOT NULL,
            execution_time INTEGER NOT NULL,
            installed_on TEXT NOT NULL
        )
    "#,
        MIGRATION_TABLE
    ))
    .execute(pool)
    .await
    .map_err(|e| TenancyError::database(e, "Failed to create migration tracking table"))?;

    Ok(())
}

async fn get_applied_migration_versions(pool: &DbPool) -> Result<Vec<i64>> {
    let rows = sqlx::query(&format!("SELECT version FROM {} ORDER BY version", MIGRATION_TABLE))
        .fetch_all(pool)
        .await
        .map_err(|e| TenancyError::database(e, "Failed to get applied migrations"))?;

    Ok(rows.into_iter().map(|row| row.get::<i64, _>("version")).collect())
}

fn extract_version_from_filename(filename: &str) -> Result<i64> {
    let version_str = filename.split('_').next().ok_or_else(|| {
        TenancyError::validation(format!("Invalid migration filename: {}", filename))
    })?;

    version_str
        .parse::<i64>()
        .map_err(|_| TenancyError::validation(format!("Invalid version in filename: {}", filename)))
}

fn calculate_checksum(content: &str) -> Vec<u8> {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    hasher.finish().to_le_bytes().to_vec()
}

/// Check that exactly the embedded migrations have been applied
pub async fn validate_migrations(pool: &DbPool) -> Result<bool> {
    create_migration_table(pool).await?;
    let applied_versions = get_applied_migration_versions(pool).await?;
    let expected_versions = MIGRATIONS
        .iter()
        .map(|(name, _)| extract_version_from_filename(name))
        .collect::<Result<Vec<_>>>()?;

    for expected in &expected_versions {
        if !applied_versions.contains(expected) {
            warn!(version = expected, "Missing migration");
            return Ok(false);
        }
    }

    for applied in &applied_versions {
        if !expected_versions.contains(applied) {
            warn!(version = applied, "Unexpected migration found");
            return Ok(false);
        }
    }

    Ok(true)
}

/// Highest applied migration version, 0 when none
pub async fn get_migration_version(pool: &DbPool) -> Result<i64> {
    create_migration_table(pool).await?;
    let applied = get_applied_migration_versions(pool).await?;
    Ok(applied.into_iter().max().unwrap_or(0))
}

pub async fn list_applied_migrations(pool: &DbPool) -> Result<Vec<MigrationInfo>> {
    create_migration_table(pool).await?;
    let rows = sqlx::query(&format!(
        "SELECT version, description, checksum, execution_time, installed_on FROM {} ORDER BY version",
        MIGRATION_TABLE
    ))
    .fetch_all(pool)
    .await
    .map_err(|e| TenancyError::database(e, "Failed to list applied migrations"))?;

    rows.into_iter()
        .map(|row| -> Result<MigrationInfo> {
            Ok(MigrationInfo {
                version: row.try_get("version")?,
                description: row.try_get("description")?,
                installed_on: row.try_get("installed_on")?,
                execution_time: row.try_get("execution_time")?,
                checksum: row.try_get("checksum")?,
            })
        })
        .collect()
}
