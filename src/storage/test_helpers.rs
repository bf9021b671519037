//! Test database utilities for in-library tests.
//!
//! Each `TestDatabase` is a fresh SQLite file in its own temporary directory
//! with all migrations applied. A file is used instead of `:memory:` so that
//! every pooled connection sees the same database.

use crate::config::DatabaseConfig;
use crate::storage::{create_pool, DbPool};
use tempfile::TempDir;

/// A migrated SQLite database removed when dropped.
pub struct TestDatabase {
    pub pool: DbPool,
    _dir: TempDir,
}

impl TestDatabase {
    /// Create a new test database with all migrations applied.
    /// The `prefix` names the temporary directory for easier debugging.
    pub async fn new(prefix: &str) -> Self {
        let dir = tempfile::Builder::new()
            .prefix(&format!("tenancy-{}-", prefix))
            .tempdir()
            .unwrap_or_else(|e| panic!("Failed to create temp dir for {}: {}", prefix, e));

        let config = DatabaseConfig {
            url: format!("sqlite://{}", dir.path().join("test.db").display()),
            auto_migrate: true,
            max_connections: 5,
            min_connections: 1,
            ..Default::default()
        };

        let pool = create_pool(&config)
            .await
            .unwrap_or_else(|e| panic!("Failed to create test pool for {}: {}", prefix, e));

        Self { pool, _dir: dir }
    }
}
