//! Persistence adapter: route + payload in, structured result out.
//!
//! # Responsibilities
//! - Decode the typed input for each route (validation failures name the field)
//! - Run exactly one store call per request under a deadline
//! - Classify failures so the gateway picks the right status
//!
//! # Design Decisions
//! - Trusts that the gateway already authenticated the caller
//! - Store detail (SQL text, driver messages) only reaches the server log;
//!   clients see a sanitized message

use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::observability::metrics;
use crate::payload::{Mapping, Payload};
use crate::persistence::requests::{
    decode, CategoryTypeQuery, ChildRunsQuery, RunRef, SumAndSaveInput, SumInput,
};
use crate::persistence::store::{
    DataRunType, DataRunTypeFilter, NewLog, NewOutcome, NewRun, OutcomeFilter, OutcomeValue,
    RunId, RunOutcome, Store, StoreError,
};
use crate::protocol::{AdapterResult, ErrorDetail, ErrorKind};
use crate::resilience::with_deadline;
use crate::routing::Route;

/// Category/type pairs recorded by `sum_and_save`.
const SUM_INPUT_OUTCOME: (i64, i64) = (0, 0);
const SUM_RESULT_OUTCOME: (i64, i64) = (0, 1);

#[derive(Serialize)]
struct FatherRun {
    id_run: RunId,
    timestamp: chrono::DateTime<chrono::Utc>,
}

pub struct PersistenceAdapter {
    store: Arc<dyn Store>,
    operation_timeout: Duration,
}

impl PersistenceAdapter {
    pub fn new(store: Arc<dyn Store>, operation_timeout: Duration) -> Self {
        Self {
            store,
            operation_timeout,
        }
    }

    /// Execute one route against the store.
    pub async fn execute(&self, route: Route, payload: &Mapping, request_id: &str) -> AdapterResult {
        let result = self.dispatch(route, payload).await;

        match &result {
            Ok(_) => {
                metrics::record_adapter_operation(route.name(), "success");
                tracing::debug!(request_id = %request_id, route = %route, "Adapter operation succeeded");
            }
            Err(error) => {
                metrics::record_adapter_operation(route.name(), error.kind.as_str());
                match error.kind {
                    ErrorKind::BackendUnavailable | ErrorKind::Internal => tracing::error!(
                        request_id = %request_id,
                        route = %route,
                        kind = %error.kind,
                        "Adapter operation failed"
                    ),
                    _ => tracing::info!(
                        request_id = %request_id,
                        route = %route,
                        kind = %error.kind,
                        message = %error.message,
                        "Adapter operation rejected"
                    ),
                }
            }
        }

        AdapterResult::from(result)
    }

    /// Database round trip for the connection probe.
    pub async fn check_connection(&self) -> Result<Payload, ErrorDetail> {
        self.call(Route::CheckConnection, self.store.ping()).await?;
        Ok(message("Database connection successful"))
    }

    async fn dispatch(&self, route: Route, payload: &Mapping) -> Result<Payload, ErrorDetail> {
        match route {
            Route::Sum => {
                let input: SumInput = decode(payload)?;
                let sum = input.a.checked_add(input.b)?;
                let mut body = Mapping::new();
                body.insert("result", sum);
                Ok(body.into())
            }
            Route::SumAndSave => {
                let input: SumAndSaveInput = decode(payload)?;
                let sum = input.arg1.checked_add(input.arg2)?;
                let outcomes = sum_outcomes(&input, sum.into());
                let id_run = self
                    .call(route, self.store.create_run_with_outcomes(input.run, outcomes))
                    .await?;

                let mut body = Mapping::new();
                body.insert("arg1", input.arg1);
                body.insert("arg2", input.arg2);
                body.insert("sum", sum);
                body.insert("id_run", id_run);
                Ok(body.into())
            }
            Route::CheckConnection => self.check_connection().await,
            Route::InsertLog => {
                let log: NewLog = decode(payload)?;
                self.call(route, self.store.insert_log(log)).await?;
                Ok(message("Log inserted successfully"))
            }
            Route::GetLogs => {
                let RunRef { id_run } = decode(payload)?;
                let logs = self.call(route, self.store.logs_for_run(id_run)).await?;
                non_empty(&logs, "No logs found for the provided id_run")
            }
            Route::InsertOutcome => {
                let outcome: NewOutcome = decode(payload)?;
                self.call(route, self.store.insert_outcome(outcome)).await?;
                Ok(message("Outcome inserted successfully"))
            }
            Route::GetOutcomes => {
                let filter: OutcomeFilter = decode(payload)?;
                let outcomes = self.call(route, self.store.find_outcomes(&filter)).await?;
                non_empty(&outcomes, "No outcomes found for the provided parameters")
            }
            Route::GetOutcomeByCategoryType => {
                let query: CategoryTypeQuery = decode(payload)?;
                let filter = OutcomeFilter::from(query);
                let outcomes = self.call(route, self.store.find_outcomes(&filter)).await?;
                non_empty(
                    &outcomes,
                    "No outcomes found for the provided run ID, category, and type",
                )
            }
            Route::CreateRun => {
                let run: NewRun = decode(payload)?;
                let id_run = self.call(route, self.store.create_run(run)).await?;
                let mut body = Mapping::new();
                body.insert("id_run", id_run);
                Ok(body.into())
            }
            Route::GetRuns => {
                let runs = self.call(route, self.store.runs()).await?;
                non_empty(&runs, "No runs found")
            }
            Route::GetFatherRuns => {
                let runs = self.call(route, self.store.father_runs()).await?;
                let runs: Vec<FatherRun> = runs
                    .into_iter()
                    .map(|r| FatherRun {
                        id_run: r.id_run,
                        timestamp: r.timestamp,
                    })
                    .collect();
                non_empty(&runs, "No father runs found")
            }
            Route::GetChildRuns => {
                let ChildRunsQuery { father_run_id } = decode(payload)?;
                let children = self.call(route, self.store.child_runs(father_run_id)).await?;
                Ok(Payload::Sequence(children.into_iter().map(Payload::from).collect()))
            }
            Route::DeleteRun => {
                let RunRef { id_run } = decode(payload)?;
                if self.call(route, self.store.delete_run(id_run)).await? {
                    Ok(message(&format!("Run {} deleted", id_run)))
                } else {
                    Err(ErrorDetail::not_found(format!("run {} not found", id_run)))
                }
            }
            Route::InsertDataRunType => {
                let item: DataRunType = decode(payload)?;
                let (id_category, id_type) = (item.id_category, item.id_type);
                match self.call(route, self.store.insert_data_run_type(item)).await {
                    Ok(()) => Ok(message("Data run type inserted successfully")),
                    Err(e) if e.kind == ErrorKind::Validation => Err(ErrorDetail::validation(
                        format!("data run type ({}, {}) already exists", id_category, id_type),
                    )),
                    Err(e) => Err(e),
                }
            }
            Route::GetDataRunTypes => {
                let filter: DataRunTypeFilter = decode(payload)?;
                let items = self.call(route, self.store.find_data_run_types(&filter)).await?;
                non_empty(&items, "No data types found for the provided parameters")
            }
        }
    }

    /// Run a store call under the operation deadline and classify its failure.
    async fn call<T, F>(&self, route: Route, operation: F) -> Result<T, ErrorDetail>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match with_deadline(self.operation_timeout, operation).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(classify(route, e)),
            Err(elapsed) => {
                tracing::warn!(route = %route, error = %elapsed, "Store operation timed out");
                Err(ErrorDetail::backend_unavailable("storage backend timed out"))
            }
        }
    }
}

fn classify(route: Route, error: StoreError) -> ErrorDetail {
    match error {
        StoreError::Unavailable(detail) => {
            tracing::error!(route = %route, error = %detail, "Store unavailable");
            ErrorDetail::backend_unavailable("storage backend unavailable")
        }
        StoreError::Conflict(detail) => {
            tracing::debug!(route = %route, error = %detail, "Store conflict");
            ErrorDetail::validation("record already exists")
        }
        StoreError::MissingReference(detail) => {
            tracing::debug!(route = %route, error = %detail, "Store missing reference");
            ErrorDetail::not_found("referenced run does not exist")
        }
        StoreError::Backend(detail) => {
            tracing::error!(route = %route, error = %detail, "Store error");
            ErrorDetail::internal()
        }
    }
}

fn sum_outcomes(input: &SumAndSaveInput, sum: Payload) -> Vec<RunOutcome> {
    let mut arguments = Mapping::new();
    arguments.insert("arg1", input.arg1);
    arguments.insert("arg2", input.arg2);

    let mut result = Mapping::new();
    result.insert("sum", sum.clone());

    let (v_integer, v_floatpoint) = match sum {
        Payload::Integer(i) => (Some(i), None),
        Payload::Float(f) => (None, Some(f)),
        _ => (None, None),
    };

    vec![
        RunOutcome {
            id_category: SUM_INPUT_OUTCOME.0,
            id_type: SUM_INPUT_OUTCOME.1,
            value: OutcomeValue {
                v_jsonb: Some(Payload::Mapping(arguments).into()),
                ..OutcomeValue::default()
            },
        },
        RunOutcome {
            id_category: SUM_RESULT_OUTCOME.0,
            id_type: SUM_RESULT_OUTCOME.1,
            value: OutcomeValue {
                v_integer,
                v_floatpoint,
                v_jsonb: Some(Payload::Mapping(result).into()),
                ..OutcomeValue::default()
            },
        },
    ]
}

fn message(text: &str) -> Payload {
    let mut body = Mapping::new();
    body.insert("message", text);
    body.into()
}

/// Serialize a list of records, or report `not_found` when it is empty.
fn non_empty<T: Serialize>(items: &[T], not_found: &str) -> Result<Payload, ErrorDetail> {
    if items.is_empty() {
        return Err(ErrorDetail::not_found(not_found));
    }
    Payload::from_serialize(&items).map_err(|e| {
        tracing::error!(error = %e, "Failed to convert store records");
        ErrorDetail::internal()
    })
}
