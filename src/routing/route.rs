//! The compiled-in route table.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Named operation selecting adapter behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Sum,
    SumAndSave,
    CheckConnection,
    InsertLog,
    GetLogs,
    InsertOutcome,
    GetOutcomes,
    GetOutcomeByCategoryType,
    CreateRun,
    GetRuns,
    GetFatherRuns,
    GetChildRuns,
    DeleteRun,
    InsertDataRunType,
    GetDataRunTypes,
}

impl Route {
    pub const ALL: [Route; 15] = [
        Route::Sum,
        Route::SumAndSave,
        Route::CheckConnection,
        Route::InsertLog,
        Route::GetLogs,
        Route::InsertOutcome,
        Route::GetOutcomes,
        Route::GetOutcomeByCategoryType,
        Route::CreateRun,
        Route::GetRuns,
        Route::GetFatherRuns,
        Route::GetChildRuns,
        Route::DeleteRun,
        Route::InsertDataRunType,
        Route::GetDataRunTypes,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Route::Sum => "sum",
            Route::SumAndSave => "sum_and_save",
            Route::CheckConnection => "check_connection",
            Route::InsertLog => "insert_log",
            Route::GetLogs => "get_logs",
            Route::InsertOutcome => "insert_outcome",
            Route::GetOutcomes => "get_outcomes",
            Route::GetOutcomeByCategoryType => "get_outcome_by_category_type",
            Route::CreateRun => "create_run",
            Route::GetRuns => "get_runs",
            Route::GetFatherRuns => "get_father_runs",
            Route::GetChildRuns => "get_child_runs",
            Route::DeleteRun => "delete_run",
            Route::InsertDataRunType => "insert_data_run_type",
            Route::GetDataRunTypes => "get_data_run_types",
        }
    }

    /// Routes that never change stored state.
    pub fn is_read_only(self) -> bool {
        matches!(
            self,
            Route::Sum
                | Route::CheckConnection
                | Route::GetLogs
                | Route::GetOutcomes
                | Route::GetOutcomeByCategoryType
                | Route::GetRuns
                | Route::GetFatherRuns
                | Route::GetChildRuns
                | Route::GetDataRunTypes
        )
    }

    /// One-line description for the route summary page.
    pub fn summary(self) -> &'static str {
        match self {
            Route::Sum => "add numbers a and b",
            Route::SumAndSave => "add arg1 and arg2, store the run with its input and result",
            Route::CheckConnection => "probe the database connection",
            Route::InsertLog => "append a log line to a run",
            Route::GetLogs => "list the logs of a run ordered by time",
            Route::InsertOutcome => "store an outcome value for a run",
            Route::GetOutcomes => "list outcomes matching optional filters",
            Route::GetOutcomeByCategoryType => "list outcomes of a run for one category and type",
            Route::CreateRun => "create a run for a script, optionally under a father run",
            Route::GetRuns => "list all runs, newest first",
            Route::GetFatherRuns => "list runs without a father run",
            Route::GetChildRuns => "list child run ids of a father run",
            Route::DeleteRun => "delete a run with its logs and outcomes",
            Route::InsertDataRunType => "register a data run type",
            Route::GetDataRunTypes => "list data run types matching optional filters",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Route name outside the fixed set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown route: {0}")]
pub struct UnknownRoute(pub String);

impl FromStr for Route {
    type Err = UnknownRoute;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Route::ALL
            .iter()
            .copied()
            .find(|r| r.name() == s)
            .ok_or_else(|| UnknownRoute(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for route in Route::ALL {
            assert_eq!(route.name().parse::<Route>(), Ok(route));
        }
    }

    #[test]
    fn test_unknown_route() {
        assert_eq!("drop_tables".parse::<Route>(), Err(UnknownRoute("drop_tables".into())));
        assert!("SUM".parse::<Route>().is_err());
    }

    #[test]
    fn test_serde_name_matches() {
        let json = serde_json::to_string(&Route::GetOutcomeByCategoryType).unwrap();
        assert_eq!(json, "\"get_outcome_by_category_type\"");
    }

    #[test]
    fn test_read_only_classification() {
        assert!(Route::GetRuns.is_read_only());
        assert!(!Route::CreateRun.is_read_only());
        assert!(!Route::DeleteRun.is_read_only());
    }
}
