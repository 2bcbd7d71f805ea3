use anyhow::Result;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Creates a PostgreSQL connection pool and brings the schema up to date.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    info!("PostgreSQL connection pool established");

    MIGRATOR.run(&pool).await?;
    info!("Database migrations applied");

    Ok(pool)
}

/// True when the error is a unique-constraint violation (SQLSTATE 23505).
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

/// True when the error is a foreign-key violation (SQLSTATE 23503).
pub fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23503"))
}


#[cfg(test)]
mod tests {
    use super::test_support::sql_error;
    use super::*;

    #[test]
    fn test_constraint_violations_by_sqlstate() {
        assert!(is_unique_violation(&sql_error("23505")));
        assert!(!is_unique_violation(&sql_error("23503")));
        assert!(is_foreign_key_violation(&sql_error("23503")));
        assert!(!is_foreign_key_violation(&sqlx::Error::RowNotFound));
    }
}
