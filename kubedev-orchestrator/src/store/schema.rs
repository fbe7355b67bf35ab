use deadpool_postgres::Pool;

use crate::error::Result;

/// Creates the `environment_records` table if absent. Migrations are
/// expressed as explicit `ALTER TABLE ... ADD COLUMN IF NOT EXISTS`
/// statements, matching the application-level timestamping/migration
/// convention the rest of this platform's services use rather than
/// relying on a migration framework.
pub async fn init_schema(pool: &Pool) -> Result<()> {
    let client = pool.get().await?;

    client
        .execute(
            r#"
            CREATE TABLE IF NOT EXISTS environment_records (
                id UUID PRIMARY KEY,
                owner_id UUID NOT NULL,
                template_id TEXT NOT NULL,
                display_name TEXT NOT NULL,
                sanitized_name TEXT NOT NULL,
                cr_name TEXT NOT NULL,
                cr_namespace TEXT NOT NULL,
                workload_name TEXT NOT NULL,
                state TEXT NOT NULL,
                state_message TEXT,
                access_url TEXT,
                access_code TEXT NOT NULL,
                declared_git TEXT,
                declared_ports INT[] NOT NULL DEFAULT '{}',
                declared_env JSONB NOT NULL DEFAULT '{}',
                declared_resources JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                started_at TIMESTAMPTZ,
                stopped_at TIMESTAMPTZ,
                last_access_at TIMESTAMPTZ,
                expires_at TIMESTAMPTZ NOT NULL,
                version INT NOT NULL DEFAULT 0
            )
            "#,
            &[],
        )
        .await?;

    client
        .execute(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_environment_records_cr
            ON environment_records (cr_namespace, cr_name)
            "#,
            &[],
        )
        .await?;

    client
        .execute(
            r#"
            CREATE INDEX IF NOT EXISTS idx_environment_records_owner
            ON environment_records (owner_id)
            "#,
            &[],
        )
        .await?;

    tracing::info!("environment_records schema initialized");
    Ok(())
}
