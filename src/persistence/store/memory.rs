//! In-process store.
//!
//! All tables live behind one `RwLock`, so every trait call (including the
//! multi-row ones) is atomic with respect to the others.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::{
    DataRunType, DataRunTypeFilter, LogRecord, NewLog, NewOutcome, NewRun, OutcomeFilter,
    OutcomeRecord, RunId, RunOutcome, RunRecord, Store, StoreError,
};

#[derive(Debug, Default)]
struct Tables {
    next_run_id: RunId,
    next_outcome_id: i64,
    runs: BTreeMap<RunId, RunRecord>,
    logs: Vec<LogRecord>,
    outcomes: Vec<OutcomeRecord>,
    data_run_types: Vec<DataRunType>,
}

impl Tables {
    fn require_run(&self, id_run: RunId) -> Result<(), StoreError> {
        if self.runs.contains_key(&id_run) {
            Ok(())
        } else {
            Err(StoreError::MissingReference(format!("run {} does not exist", id_run)))
        }
    }

    fn insert_run(&mut self, run: NewRun) -> Result<RunId, StoreError> {
        if let Some(father) = run.id_run_father {
            self.require_run(father)?;
        }
        self.next_run_id += 1;
        let id_run = self.next_run_id;
        self.runs.insert(
            id_run,
            RunRecord {
                id_run,
                id_script: run.id_script,
                id_run_father: run.id_run_father,
                timestamp: Utc::now(),
            },
        );
        Ok(id_run)
    }

    fn insert_outcome(&mut self, outcome: NewOutcome) -> Result<(), StoreError> {
        self.require_run(outcome.id_run)?;
        self.next_outcome_id += 1;
        self.outcomes.push(OutcomeRecord {
            id_outcome: self.next_outcome_id,
            id_run: outcome.id_run,
            id_category: outcome.id_category,
            id_type: outcome.id_type,
            value: outcome.value,
            timestamp: Utc::now(),
        });
        Ok(())
    }
}

/// Default store: nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn insert_log(&self, log: NewLog) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.require_run(log.id_run)?;
        tables.logs.push(LogRecord {
            id_run: log.id_run,
            log: log.log,
            debug: log.debug,
            warning: log.warning,
            error: log.error,
            log_timestamp: Utc::now(),
        });
        Ok(())
    }

    async fn logs_for_run(&self, id_run: RunId) -> Result<Vec<LogRecord>, StoreError> {
        let tables = self.tables.read().await;
        let mut logs: Vec<LogRecord> = tables
            .logs
            .iter()
            .filter(|l| l.id_run == id_run)
            .cloned()
            .collect();
        // stable: equal timestamps keep insertion order
        logs.sort_by_key(|l| l.log_timestamp);
        Ok(logs)
    }

    async fn insert_outcome(&self, outcome: NewOutcome) -> Result<(), StoreError> {
        self.tables.write().await.insert_outcome(outcome)
    }

    async fn find_outcomes(&self, filter: &OutcomeFilter) -> Result<Vec<OutcomeRecord>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .outcomes
            .iter()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect())
    }

    async fn create_run(&self, run: NewRun) -> Result<RunId, StoreError> {
        self.tables.write().await.insert_run(run)
    }

    async fn create_run_with_outcomes(
        &self,
        run: NewRun,
        outcomes: Vec<RunOutcome>,
    ) -> Result<RunId, StoreError> {
        let mut tables = self.tables.write().await;
        let id_run = tables.insert_run(run)?;
        for outcome in outcomes {
            tables.insert_outcome(NewOutcome {
                id_run,
                id_category: outcome.id_category,
                id_type: outcome.id_type,
                value: outcome.value,
            })?;
        }
        Ok(id_run)
    }

    async fn runs(&self) -> Result<Vec<RunRecord>, StoreError> {
        let tables = self.tables.read().await;
        let mut runs: Vec<RunRecord> = tables.runs.values().cloned().collect();
        runs.sort_by(|a, b| (b.timestamp, b.id_run).cmp(&(a.timestamp, a.id_run)));
        Ok(runs)
    }

    async fn father_runs(&self) -> Result<Vec<RunRecord>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .runs
            .values()
            .rev()
            .filter(|r| r.id_run_father.is_none())
            .cloned()
            .collect())
    }

    async fn child_runs(&self, father: RunId) -> Result<Vec<RunId>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .runs
            .values()
            .rev()
            .filter(|r| r.id_run_father == Some(father))
            .map(|r| r.id_run)
            .collect())
    }

    async fn delete_run(&self, id_run: RunId) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.runs.remove(&id_run).is_none() {
            return Ok(false);
        }
        tables.logs.retain(|l| l.id_run != id_run);
        tables.outcomes.retain(|o| o.id_run != id_run);
        for run in tables.runs.values_mut() {
            if run.id_run_father == Some(id_run) {
                run.id_run_father = None;
            }
        }
        Ok(true)
    }

    async fn insert_data_run_type(&self, item: DataRunType) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables
            .data_run_types
            .iter()
            .any(|t| t.id_category == item.id_category && t.id_type == item.id_type)
        {
            return Err(StoreError::Conflict(format!(
                "data run type ({}, {}) already exists",
                item.id_category, item.id_type
            )));
        }
        tables.data_run_types.push(item);
        Ok(())
    }

    async fn find_data_run_types(
        &self,
        filter: &DataRunTypeFilter,
    ) -> Result<Vec<DataRunType>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .data_run_types
            .iter()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect())
    }
}
