//! PostgreSQL store (cargo feature `postgres`).
//!
//! Tables: `runs_table`, `logs_table`, `outcome_run_table`,
//! `data_run_types_table`. The schema is created on connect if missing.
//! Multi-statement operations run inside one transaction.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, QueryBuilder, Row};
use std::time::Duration;

use super::{
    DataRunType, DataRunTypeFilter, LogRecord, NewLog, NewOutcome, NewRun, OutcomeFilter,
    OutcomeRecord, OutcomeValue, RunId, RunOutcome, RunRecord, Store, StoreError,
};
use crate::config::StoreConfig;

const SCHEMA: [&str; 4] = [
    r#"CREATE TABLE IF NOT EXISTS runs_table (
        id_run BIGSERIAL PRIMARY KEY,
        id_script BIGINT NOT NULL,
        id_run_father BIGINT REFERENCES runs_table (id_run) ON DELETE SET NULL,
        timestamp TIMESTAMPTZ NOT NULL DEFAULT clock_timestamp()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS logs_table (
        id_log BIGSERIAL PRIMARY KEY,
        id_run BIGINT NOT NULL REFERENCES runs_table (id_run) ON DELETE CASCADE,
        log TEXT NOT NULL,
        debug BOOLEAN NOT NULL DEFAULT FALSE,
        warning BOOLEAN NOT NULL DEFAULT FALSE,
        error BOOLEAN NOT NULL DEFAULT FALSE,
        log_timestamp TIMESTAMPTZ NOT NULL DEFAULT clock_timestamp()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS outcome_run_table (
        id_outcome BIGSERIAL PRIMARY KEY,
        id_run BIGINT NOT NULL REFERENCES runs_table (id_run) ON DELETE CASCADE,
        id_category BIGINT NOT NULL,
        id_type BIGINT NOT NULL,
        v_integer BIGINT,
        v_floatpoint DOUBLE PRECISION,
        v_string TEXT,
        v_jsonb JSONB,
        v_boolean BOOLEAN,
        v_timestamp TIMESTAMP,
        timestamp TIMESTAMPTZ NOT NULL DEFAULT clock_timestamp()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS data_run_types_table (
        id_category BIGINT NOT NULL,
        id_type BIGINT NOT NULL,
        category_name TEXT NOT NULL,
        type_name TEXT NOT NULL,
        PRIMARY KEY (id_category, id_type)
    )"#,
];

const OUTCOME_COLUMNS: &str = "id_outcome, id_run, id_category, id_type, v_integer, v_floatpoint, \
     v_string, v_jsonb, v_boolean, v_timestamp, timestamp";

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed => StoreError::Unavailable(e.to_string()),
            sqlx::Error::Database(db) => match db.code().as_deref() {
                Some("23505") => StoreError::Conflict(db.message().to_string()),
                Some("23503") => StoreError::MissingReference(db.message().to_string()),
                // class 08: connection exceptions
                Some(code) if code.starts_with("08") => StoreError::Unavailable(e.to_string()),
                _ => StoreError::Backend(e.to_string()),
            },
            _ => StoreError::Backend(e.to_string()),
        }
    }
}

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let url = config
            .database_url
            .as_deref()
            .ok_or_else(|| StoreError::Backend("database_url is not configured".to_string()))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_millis(config.operation_timeout_ms))
            .connect(url)
            .await?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

fn run_from_row(row: &PgRow) -> Result<RunRecord, sqlx::Error> {
    Ok(RunRecord {
        id_run: row.try_get("id_run")?,
        id_script: row.try_get("id_script")?,
        id_run_father: row.try_get("id_run_father")?,
        timestamp: row.try_get("timestamp")?,
    })
}

fn log_from_row(row: &PgRow) -> Result<LogRecord, sqlx::Error> {
    Ok(LogRecord {
        id_run: row.try_get("id_run")?,
        log: row.try_get("log")?,
        debug: row.try_get("debug")?,
        warning: row.try_get("warning")?,
        error: row.try_get("error")?,
        log_timestamp: row.try_get("log_timestamp")?,
    })
}

fn outcome_from_row(row: &PgRow) -> Result<OutcomeRecord, sqlx::Error> {
    Ok(OutcomeRecord {
        id_outcome: row.try_get("id_outcome")?,
        id_run: row.try_get("id_run")?,
        id_category: row.try_get("id_category")?,
        id_type: row.try_get("id_type")?,
        value: OutcomeValue {
            v_integer: row.try_get("v_integer")?,
            v_floatpoint: row.try_get("v_floatpoint")?,
            v_string: row.try_get("v_string")?,
            v_jsonb: row.try_get("v_jsonb")?,
            v_boolean: row.try_get("v_boolean")?,
            v_timestamp: row.try_get("v_timestamp")?,
        },
        timestamp: row.try_get("timestamp")?,
    })
}

fn data_run_type_from_row(row: &PgRow) -> Result<DataRunType, sqlx::Error> {
    Ok(DataRunType {
        id_category: row.try_get("id_category")?,
        id_type: row.try_get("id_type")?,
        category_name: row.try_get("category_name")?,
        type_name: row.try_get("type_name")?,
    })
}

async fn insert_outcome_in<'e, E>(executor: E, outcome: NewOutcome) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query(
        "INSERT INTO outcome_run_table \
         (id_run, id_category, id_type, v_integer, v_floatpoint, v_string, v_jsonb, v_boolean, v_timestamp) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(outcome.id_run)
    .bind(outcome.id_category)
    .bind(outcome.id_type)
    .bind(outcome.value.v_integer)
    .bind(outcome.value.v_floatpoint)
    .bind(outcome.value.v_string)
    .bind(outcome.value.v_jsonb)
    .bind(outcome.value.v_boolean)
    .bind(outcome.value.v_timestamp)
    .execute(executor)
    .await?;
    Ok(())
}

#[async_trait]
impl Store for PostgresStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_log(&self, log: NewLog) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO logs_table (id_run, log, debug, warning, error) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(log.id_run)
        .bind(log.log)
        .bind(log.debug)
        .bind(log.warning)
        .bind(log.error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn logs_for_run(&self, id_run: RunId) -> Result<Vec<LogRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT id_run, log, debug, warning, error, log_timestamp FROM logs_table \
             WHERE id_run = $1 ORDER BY log_timestamp ASC, id_log ASC",
        )
        .bind(id_run)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(log_from_row).collect::<Result<_, _>>()?)
    }

    async fn insert_outcome(&self, outcome: NewOutcome) -> Result<(), StoreError> {
        insert_outcome_in(&self.pool, outcome).await?;
        Ok(())
    }

    async fn find_outcomes(&self, filter: &OutcomeFilter) -> Result<Vec<OutcomeRecord>, StoreError> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM outcome_run_table WHERE TRUE", OUTCOME_COLUMNS));
        if let Some(v) = filter.id_run {
            query.push(" AND id_run = ").push_bind(v);
        }
        if let Some(v) = filter.id_category {
            query.push(" AND id_category = ").push_bind(v);
        }
        if let Some(v) = filter.id_type {
            query.push(" AND id_type = ").push_bind(v);
        }
        if let Some(v) = filter.v_integer {
            query.push(" AND v_integer = ").push_bind(v);
        }
        if let Some(v) = filter.v_floatpoint {
            query.push(" AND v_floatpoint = ").push_bind(v);
        }
        if let Some(v) = &filter.v_string {
            query.push(" AND v_string = ").push_bind(v.clone());
        }
        if let Some(v) = filter.v_boolean {
            query.push(" AND v_boolean = ").push_bind(v);
        }
        if let Some(v) = filter.v_timestamp {
            query.push(" AND v_timestamp = ").push_bind(v);
        }
        query.push(" ORDER BY id_outcome ASC");

        let rows = query.build().fetch_all(&self.pool).await?;
        Ok(rows.iter().map(outcome_from_row).collect::<Result<_, _>>()?)
    }

    async fn create_run(&self, run: NewRun) -> Result<RunId, StoreError> {
        let row = sqlx::query(
            "INSERT INTO runs_table (id_script, id_run_father) VALUES ($1, $2) RETURNING id_run",
        )
        .bind(run.id_script)
        .bind(run.id_run_father)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("id_run")?)
    }

    async fn create_run_with_outcomes(
        &self,
        run: NewRun,
        outcomes: Vec<RunOutcome>,
    ) -> Result<RunId, StoreError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(
            "INSERT INTO runs_table (id_script, id_run_father) VALUES ($1, $2) RETURNING id_run",
        )
        .bind(run.id_script)
        .bind(run.id_run_father)
        .fetch_one(&mut *tx)
        .await?;
        let id_run: RunId = row.try_get("id_run")?;

        for outcome in outcomes {
            let outcome = NewOutcome {
                id_run,
                id_category: outcome.id_category,
                id_type: outcome.id_type,
                value: outcome.value,
            };
            insert_outcome_in(&mut *tx, outcome).await?;
        }

        tx.commit().await?;
        Ok(id_run)
    }

    async fn runs(&self) -> Result<Vec<RunRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT id_run, id_script, id_run_father, timestamp FROM runs_table \
             ORDER BY timestamp DESC, id_run DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(run_from_row).collect::<Result<_, _>>()?)
    }

    async fn father_runs(&self) -> Result<Vec<RunRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT id_run, id_script, id_run_father, timestamp FROM runs_table \
             WHERE id_run_father IS NULL ORDER BY id_run DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(run_from_row).collect::<Result<_, _>>()?)
    }

    async fn child_runs(&self, father: RunId) -> Result<Vec<RunId>, StoreError> {
        let rows = sqlx::query(
            "SELECT id_run FROM runs_table WHERE id_run_father = $1 ORDER BY id_run DESC",
        )
        .bind(father)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|row| row.try_get("id_run"))
            .collect::<Result<_, _>>()?)
    }

    async fn delete_run(&self, id_run: RunId) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM logs_table WHERE id_run = $1")
            .bind(id_run)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM outcome_run_table WHERE id_run = $1")
            .bind(id_run)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE runs_table SET id_run_father = NULL WHERE id_run_father = $1")
            .bind(id_run)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM runs_table WHERE id_run = $1")
            .bind(id_run)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            tx.rollback().await?;
            return Ok(false);
        }
        tx.commit().await?;
        Ok(true)
    }

    async fn insert_data_run_type(&self, item: DataRunType) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO data_run_types_table (id_category, id_type, category_name, type_name) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(item.id_category)
        .bind(item.id_type)
        .bind(item.category_name)
        .bind(item.type_name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_data_run_types(
        &self,
        filter: &DataRunTypeFilter,
    ) -> Result<Vec<DataRunType>, StoreError> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT id_category, id_type, category_name, type_name FROM data_run_types_table WHERE TRUE",
        );
        if let Some(v) = filter.id_category {
            query.push(" AND id_category = ").push_bind(v);
        }
        if let Some(v) = filter.id_type {
            query.push(" AND id_type = ").push_bind(v);
        }
        if let Some(v) = &filter.category_name {
            query.push(" AND category_name = ").push_bind(v.clone());
        }
        if let Some(v) = &filter.type_name {
            query.push(" AND type_name = ").push_bind(v.clone());
        }
        query.push(" ORDER BY id_category, id_type");

        let rows = query.build().fetch_all(&self.pool).await?;
        Ok(rows.iter().map(data_run_type_from_row).collect::<Result<_, _>>()?)
    }
}
