//! Storage backends for the persistence adapter.
//!
//! # Data Flow
//! ```text
//! PersistenceAdapter (typed route input)
//!     → Store trait (one call per route, atomic)
//!     → memory.rs (default, in-process)
//!     → postgres.rs (feature `postgres`, sqlx pool)
//! ```
//!
//! # Design Decisions
//! - Multi-step writes (sum_and_save, delete_run) are a single trait call so
//!   each backend can make them atomic
//! - Errors are classified, not stringly typed: only `Unavailable` is
//!   retried upstream

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{StoreBackend, StoreConfig};

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;

pub type RunId = i64;

/// Store failures, classified for the adapter's error mapping.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The backend could not be reached (connection refused, pool exhausted).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A uniqueness constraint was violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A referenced row does not exist.
    #[error("missing reference: {0}")]
    MissingReference(String),

    /// Anything else the backend reported.
    #[error("backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id_run: RunId,
    pub id_script: i64,
    pub id_run_father: Option<RunId>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewRun {
    pub id_script: i64,
    pub id_run_father: Option<RunId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub id_run: RunId,
    pub log: String,
    pub debug: bool,
    pub warning: bool,
    pub error: bool,
    pub log_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewLog {
    pub id_run: RunId,
    pub log: String,
    pub debug: bool,
    pub warning: bool,
    pub error: bool,
}

/// The typed value columns of one outcome; any subset may be set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OutcomeValue {
    pub v_integer: Option<i64>,
    pub v_floatpoint: Option<f64>,
    pub v_string: Option<String>,
    pub v_jsonb: Option<serde_json::Value>,
    pub v_boolean: Option<bool>,
    pub v_timestamp: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewOutcome {
    pub id_run: RunId,
    pub id_category: i64,
    pub id_type: i64,
    pub value: OutcomeValue,
}

/// An outcome attached to a run that does not exist yet.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub id_category: i64,
    pub id_type: i64,
    pub value: OutcomeValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub id_outcome: i64,
    pub id_run: RunId,
    pub id_category: i64,
    pub id_type: i64,
    #[serde(flatten)]
    pub value: OutcomeValue,
    pub timestamp: DateTime<Utc>,
}

/// Equality filters over outcomes; `None` matches anything.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OutcomeFilter {
    pub id_run: Option<RunId>,
    pub id_category: Option<i64>,
    pub id_type: Option<i64>,
    pub v_integer: Option<i64>,
    pub v_floatpoint: Option<f64>,
    pub v_string: Option<String>,
    pub v_boolean: Option<bool>,
    pub v_timestamp: Option<NaiveDateTime>,
}

impl OutcomeFilter {
    pub fn matches(&self, outcome: &OutcomeRecord) -> bool {
        fn eq<T: PartialEq>(want: &Option<T>, have: &T) -> bool {
            want.as_ref().map_or(true, |w| w == have)
        }
        fn eq_opt<T: PartialEq>(want: &Option<T>, have: &Option<T>) -> bool {
            want.is_none() || want == have
        }

        eq(&self.id_run, &outcome.id_run)
            && eq(&self.id_category, &outcome.id_category)
            && eq(&self.id_type, &outcome.id_type)
            && eq_opt(&self.v_integer, &outcome.value.v_integer)
            && eq_opt(&self.v_floatpoint, &outcome.value.v_floatpoint)
            && eq_opt(&self.v_string, &outcome.value.v_string)
            && eq_opt(&self.v_boolean, &outcome.value.v_boolean)
            && eq_opt(&self.v_timestamp, &outcome.value.v_timestamp)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRunType {
    pub id_category: i64,
    pub id_type: i64,
    pub category_name: String,
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DataRunTypeFilter {
    pub id_category: Option<i64>,
    pub id_type: Option<i64>,
    pub category_name: Option<String>,
    pub type_name: Option<String>,
}

impl DataRunTypeFilter {
    pub fn matches(&self, item: &DataRunType) -> bool {
        self.id_category.map_or(true, |v| v == item.id_category)
            && self.id_type.map_or(true, |v| v == item.id_type)
            && self.category_name.as_ref().map_or(true, |v| *v == item.category_name)
            && self.type_name.as_ref().map_or(true, |v| *v == item.type_name)
    }
}

/// CRUD backend behind the persistence adapter.
///
/// Every method is atomic on its own; no transaction spans two calls.
#[async_trait]
pub trait Store: Send + Sync {
    /// Cheap round trip proving the backend is reachable.
    async fn ping(&self) -> Result<(), StoreError>;

    async fn insert_log(&self, log: NewLog) -> Result<(), StoreError>;

    /// Logs of one run, oldest first.
    async fn logs_for_run(&self, id_run: RunId) -> Result<Vec<LogRecord>, StoreError>;

    async fn insert_outcome(&self, outcome: NewOutcome) -> Result<(), StoreError>;

    async fn find_outcomes(&self, filter: &OutcomeFilter) -> Result<Vec<OutcomeRecord>, StoreError>;

    async fn create_run(&self, run: NewRun) -> Result<RunId, StoreError>;

    /// Create a run and attach outcomes to it in one step.
    async fn create_run_with_outcomes(
        &self,
        run: NewRun,
        outcomes: Vec<RunOutcome>,
    ) -> Result<RunId, StoreError>;

    /// All runs, newest first.
    async fn runs(&self) -> Result<Vec<RunRecord>, StoreError>;

    /// Runs without a father, highest id first.
    async fn father_runs(&self) -> Result<Vec<RunRecord>, StoreError>;

    /// Ids of the children of `father`, highest first.
    async fn child_runs(&self, father: RunId) -> Result<Vec<RunId>, StoreError>;

    /// Delete a run with its logs and outcomes. Returns `false` if it did not exist.
    async fn delete_run(&self, id_run: RunId) -> Result<bool, StoreError>;

    async fn insert_data_run_type(&self, item: DataRunType) -> Result<(), StoreError>;

    async fn find_data_run_types(
        &self,
        filter: &DataRunTypeFilter,
    ) -> Result<Vec<DataRunType>, StoreError>;
}

/// Build the store selected by `config`.
pub async fn connect(config: &StoreConfig) -> Result<Arc<dyn Store>, StoreError> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::info!("Using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
        #[cfg(feature = "postgres")]
        StoreBackend::Postgres => {
            let store = PostgresStore::connect(config).await?;
            tracing::info!("Connected to postgres store");
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "postgres"))]
        StoreBackend::Postgres => Err(StoreError::Backend(
            "postgres backend not compiled in (enable the `postgres` feature)".to_string(),
        )),
    }
}
