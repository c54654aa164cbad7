//! # acervo-db
//!
//! PostgreSQL database layer for acervo.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for every core entity
//! - Tenant scoping: every content query filters by organization
//!
//! ## Example
//!
//! ```rust,ignore
//! use acervo_db::{Database, MemoryRepository, Page};
//!
//! let db = Database::connect("postgres://localhost/acervo").await?;
//! let mine = db.memories.list_owned(org_id, user_id, Page::default()).await?;
//! ```

pub mod agents;
pub mod ai_usage;
pub mod audit;
pub mod lesson_plans;
pub mod memories;
pub mod organizations;
pub mod pool;
pub mod roles;
pub mod tokens;
pub mod users;

// Always compiled so integration tests (in tests/) can use it.
pub mod test_fixtures;

pub use acervo_core::*;

pub use agents::PgAgentRepository;
pub use ai_usage::PgAiUsageRepository;
pub use audit::PgAuditLogRepository;
pub use lesson_plans::PgLessonPlanRepository;
pub use memories::PgMemoryRepository;
pub use organizations::PgOrganizationRepository;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use roles::PgRoleRepository;
pub use tokens::PgTokenRepository;
pub use users::PgUserRepository;

/// Postgres SQLSTATE for unique_violation.
const UNIQUE_VIOLATION: &str = "23505";

/// Map a unique-constraint violation to `Conflict`, anything else to `Database`.
pub(crate) fn conflict_or_db(e: sqlx::Error, what: &str) -> Error {
    let is_unique = e
        .as_database_error()
        .and_then(|d| d.code())
        .is_some_and(|code| code == UNIQUE_VIOLATION);
    if is_unique {
        Error::Conflict(format!("{} already exists", what))
    } else {
        Error::Database(e)
    }
}

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    pub pool: sqlx::Pool<sqlx::Postgres>,
    pub organizations: PgOrganizationRepository,
    pub users: PgUserRepository,
    pub roles: PgRoleRepository,
    pub memories: PgMemoryRepository,
    pub agents: PgAgentRepository,
    pub lesson_plans: PgLessonPlanRepository,
    pub audit: PgAuditLogRepository,
    pub ai_usage: PgAiUsageRepository,
    pub tokens: PgTokenRepository,
}

impl Database {
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            organizations: PgOrganizationRepository::new(pool.clone()),
            users: PgUserRepository::new(pool.clone()),
            roles: PgRoleRepository::new(pool.clone()),
            memories: PgMemoryRepository::new(pool.clone()),
            agents: PgAgentRepository::new(pool.clone()),
            lesson_plans: PgLessonPlanRepository::new(pool.clone()),
            audit: PgAuditLogRepository::new(pool.clone()),
            ai_usage: PgAiUsageRepository::new(pool.clone()),
            tokens: PgTokenRepository::new(pool.clone()),
            pool,
        }
    }

    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Round-trip a trivial query.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        log_pool_metrics(&self.pool);
        Ok(())
    }

    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
