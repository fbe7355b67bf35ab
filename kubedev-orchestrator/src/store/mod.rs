pub mod schema;

use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use kubedev_common::wait::backoff_full_jitter;
use kubedev_types::{DeclaredResources, EnvironmentRecord, EnvironmentState};
use tokio_postgres::Row;
use uuid::Uuid;

use crate::error::{Error, Result};

const MAX_CONFLICT_RETRIES: usize = 3;

/// Postgres-backed implementation of component B (§4.2). Every write goes
/// through [`EnvironmentStore::update`], which enforces the row-level
/// invariants from §3 and retries on a detected version conflict with a
/// short jittered backoff before surfacing [`Error::Conflict`].
#[derive(Clone)]
pub struct EnvironmentStore {
    pool: Pool,
}

impl EnvironmentStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, record: EnvironmentRecord) -> Result<EnvironmentRecord> {
        validate_invariants(&record)?;
        let client = self.pool.get().await?;
        let resources = serde_json::to_value(&record.declared_resources)?;
        let env = serde_json::to_value(&record.declared_env)?;
        let ports: Vec<i32> = record.declared_ports.iter().map(|p| *p as i32).collect();

        let row = client
            .query_one(
                r#"
                INSERT INTO environment_records (
                    id, owner_id, template_id, display_name, sanitized_name,
                    cr_name, cr_namespace, workload_name, state, state_message,
                    access_url, access_code, declared_git, declared_ports, declared_env,
                    declared_resources, created_at, started_at, stopped_at,
                    last_access_at, expires_at, version
                ) VALUES (
                    $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                    $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22
                )
                RETURNING *
                "#,
                &[
                    &record.id,
                    &record.owner_id,
                    &record.template_id,
                    &record.display_name,
                    &record.sanitized_name,
                    &record.cr_name,
                    &record.cr_namespace,
                    &record.workload_name,
                    &record.state.to_string(),
                    &record.state_message,
                    &record.access_url,
                    &record.access_code,
                    &record.declared_git,
                    &ports,
                    &env,
                    &resources,
                    &record.created_at,
                    &record.started_at,
                    &record.stopped_at,
                    &record.last_access_at,
                    &record.expires_at,
                    &record.version,
                ],
            )
            .await
            .map_err(|e| {
                if e.code() == Some(&tokio_postgres::error::SqlState::UNIQUE_VIOLATION) {
                    Error::Conflict(format!(
                        "an environment already exists for cr {}/{}",
                        record.cr_namespace, record.cr_name
                    ))
                } else {
                    Error::Db { source: e }
                }
            })?;

        row_to_record(&row)
    }

    pub async fn get(&self, id: Uuid) -> Result<EnvironmentRecord> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT * FROM environment_records WHERE id = $1",
                &[&id],
            )
            .await?;
        match row {
            Some(row) => row_to_record(&row),
            None => Err(Error::NotFound),
        }
    }

    pub async fn find_by_cr(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<EnvironmentRecord>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT * FROM environment_records WHERE cr_namespace = $1 AND cr_name = $2",
                &[&namespace, &name],
            )
            .await?;
        row.map(|r| row_to_record(&r)).transpose()
    }

    pub async fn list(
        &self,
        owner_id: Option<Uuid>,
        state: Option<EnvironmentState>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<EnvironmentRecord>> {
        let client = self.pool.get().await?;
        let state_str = state.map(|s| s.to_string());
        let rows = client
            .query(
                r#"
                SELECT * FROM environment_records
                WHERE ($1::uuid IS NULL OR owner_id = $1)
                  AND ($2::text IS NULL OR state = $2)
                ORDER BY created_at DESC
                LIMIT $3 OFFSET $4
                "#,
                &[&owner_id, &state_str, &limit, &offset],
            )
            .await?;
        rows.iter().map(row_to_record).collect()
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let client = self.pool.get().await?;
        let affected = client
            .execute("DELETE FROM environment_records WHERE id = $1", &[&id])
            .await?;
        if affected == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    /// Flips every `Running`/`Stopped` record whose `expires_at` has
    /// passed to `Expired` (§4.4 "Expiry"). A bulk statement rather than a
    /// per-row [`Self::update`] call: the sweep has no single record to
    /// lock and no mutator-supplied invariant to re-check beyond the state
    /// transition itself. Returns the number of rows flipped.
    pub async fn expire_due(&self) -> Result<u64> {
        let client = self.pool.get().await?;
        let affected = client
            .execute(
                r#"
                UPDATE environment_records
                SET state = 'expired', version = version + 1
                WHERE state IN ('running', 'stopped') AND expires_at <= now()
                "#,
                &[],
            )
            .await?;
        Ok(affected)
    }

    /// Applies `mutator` to the current row and commits it under an
    /// optimistic version check, retrying on conflict with full-jitter
    /// backoff (§4.2). The mutator may be called more than once if a
    /// concurrent writer wins the race in between.
    pub async fn update<F>(&self, id: Uuid, mutator: F) -> Result<EnvironmentRecord>
    where
        F: Fn(&mut EnvironmentRecord) -> Result<()>,
    {
        let base = Duration::from_millis(50);
        let cap = Duration::from_millis(500);

        for attempt in 0..=MAX_CONFLICT_RETRIES {
            let mut record = self.get(id).await?;
            let expected_version = record.version;
            mutator(&mut record)?;
            validate_invariants(&record)?;
            record.version = expected_version + 1;

            let resources = serde_json::to_value(&record.declared_resources)?;
            let env = serde_json::to_value(&record.declared_env)?;
            let ports: Vec<i32> = record.declared_ports.iter().map(|p| *p as i32).collect();

            let client = self.pool.get().await?;
            let row = client
                .query_opt(
                    r#"
                    UPDATE environment_records SET
                        display_name = $1, sanitized_name = $2, cr_name = $3,
                        cr_namespace = $4, workload_name = $5, state = $6,
                        state_message = $7, access_url = $8, declared_git = $9,
                        declared_ports = $10, declared_env = $11,
                        declared_resources = $12, started_at = $13,
                        stopped_at = $14, last_access_at = $15, expires_at = $16,
                        version = $17
                    WHERE id = $18 AND version = $19
                    RETURNING *
                    "#,
                    &[
                        &record.display_name,
                        &record.sanitized_name,
                        &record.cr_name,
                        &record.cr_namespace,
                        &record.workload_name,
                        &record.state.to_string(),
                        &record.state_message,
                        &record.access_url,
                        &record.declared_git,
                        &ports,
                        &env,
                        &resources,
                        &record.started_at,
                        &record.stopped_at,
                        &record.last_access_at,
                        &record.expires_at,
                        &record.version,
                        &id,
                        &expected_version,
                    ],
                )
                .await?;

            match row {
                Some(row) => return row_to_record(&row),
                None if attempt < MAX_CONFLICT_RETRIES => {
                    tokio::time::sleep(backoff_full_jitter(base, cap, attempt)).await;
                    continue;
                }
                None => {
                    return Err(Error::Conflict(format!(
                        "environment {id} was concurrently updated"
                    )));
                }
            }
        }

        unreachable!("loop always returns")
    }
}

fn validate_invariants(record: &EnvironmentRecord) -> Result<()> {
    if record.state == EnvironmentState::Running && record.access_url.is_none() {
        return Err(Error::Internal(
            "refusing to store a Running record without an access_url".into(),
        ));
    }
    if record.expires_at < record.created_at {
        return Err(Error::Internal(
            "refusing to store a record that expires before it was created".into(),
        ));
    }
    Ok(())
}

fn row_to_record(row: &Row) -> Result<EnvironmentRecord> {
    let state_str: String = row.get("state");
    let state = EnvironmentState::from_str(&state_str)
        .map_err(|e| Error::Internal(format!("corrupt state column: {e}")))?;
    let ports: Vec<i32> = row.get("declared_ports");
    let declared_env: serde_json::Value = row.get("declared_env");
    let declared_resources: serde_json::Value = row.get("declared_resources");

    Ok(EnvironmentRecord {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        template_id: row.get("template_id"),
        display_name: row.get("display_name"),
        sanitized_name: row.get("sanitized_name"),
        cr_name: row.get("cr_name"),
        cr_namespace: row.get("cr_namespace"),
        workload_name: row.get("workload_name"),
        state,
        state_message: row.get("state_message"),
        access_url: row.get("access_url"),
        access_code: row.get("access_code"),
        declared_git: row.get("declared_git"),
        declared_ports: ports.into_iter().map(|p| p as u16).collect(),
        declared_env: serde_json::from_value::<BTreeMap<String, String>>(declared_env)
            .map_err(|e| Error::Internal(format!("corrupt declared_env column: {e}")))?,
        declared_resources: serde_json::from_value::<DeclaredResources>(declared_resources)
            .map_err(|e| Error::Internal(format!("corrupt declared_resources column: {e}")))?,
        created_at: row.get::<_, DateTime<Utc>>("created_at"),
        started_at: row.get("started_at"),
        stopped_at: row.get("stopped_at"),
        last_access_at: row.get("last_access_at"),
        expires_at: row.get::<_, DateTime<Utc>>("expires_at"),
        version: row.get("version"),
    })
}
