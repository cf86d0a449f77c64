//! Diagnostic records and call results.
//!
//! Every public call on a session or statement clears the owner's
//! [`DiagnosticSink`], runs, and reports a [`CallResult`]: the tri-state
//! outcome, the produced value, and a snapshot of the records the call
//! appended. The sink keeps the same records until the next call starts so
//! they can still be fetched one by one afterwards.

use crate::error::DriverError;
use gridlink_protocol::SqlState;
use std::fmt;

/// Row number of a record not associated with a row.
pub const NO_ROW_NUMBER: i32 = -1;

/// Column number of a record not associated with a column.
pub const NO_COLUMN_NUMBER: i32 = -1;

/// Outcome of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlResult {
    Success,
    SuccessWithInfo,
    Error,
}

impl SqlResult {
    /// Calling-convention return code.
    pub fn code(&self) -> i16 {
        match self {
            SqlResult::Success => 0,
            SqlResult::SuccessWithInfo => 1,
            SqlResult::Error => -1,
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, SqlResult::Error)
    }
}

/// A single status record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticRecord {
    state: SqlState,
    message: String,
    row_number: i32,
    column_number: i32,
}

impl DiagnosticRecord {
    pub fn new(state: SqlState, message: impl Into<String>) -> Self {
        Self {
            state,
            message: message.into(),
            row_number: NO_ROW_NUMBER,
            column_number: NO_COLUMN_NUMBER,
        }
    }

    pub fn with_position(mut self, row_number: i32, column_number: i32) -> Self {
        self.row_number = row_number;
        self.column_number = column_number;
        self
    }

    pub fn sql_state(&self) -> SqlState {
        self.state
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn row_number(&self) -> i32 {
        self.row_number
    }

    pub fn column_number(&self) -> i32 {
        self.column_number
    }

    pub fn class_origin(&self) -> &'static str {
        self.state.class_origin()
    }

    pub fn subclass_origin(&self) -> &'static str {
        self.state.subclass_origin()
    }
}

impl From<&DriverError> for DiagnosticRecord {
    fn from(err: &DriverError) -> Self {
        DiagnosticRecord::new(err.sql_state(), err.to_string())
    }
}

impl fmt::Display for DiagnosticRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.state, self.message)
    }
}

/// Ordered, append-only queue of records for the current call.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    records: Vec<DiagnosticRecord>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: DiagnosticRecord) {
        self.records.push(record);
    }

    /// Appends a warning that downgrades the call's result to
    /// [`SqlResult::SuccessWithInfo`].
    pub fn warn(&mut self, state: SqlState, message: impl Into<String>) {
        self.push(DiagnosticRecord::new(state, message));
    }

    /// Drops all records. Called when a new public call starts.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn records(&self) -> &[DiagnosticRecord] {
        &self.records
    }

    /// Returns the record at a 1-based position, as `SQLGetDiagRec` numbers them.
    pub fn status_record(&self, number: usize) -> Option<&DiagnosticRecord> {
        number.checked_sub(1).and_then(|i| self.records.get(i))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Converts the result of an internal operation into a [`CallResult`],
    /// recording the error if there is one.
    pub fn complete<R>(&mut self, outcome: Result<R, DriverError>) -> CallResult<R> {
        let (result, value) = match outcome {
            Ok(value) if self.records.is_empty() => (SqlResult::Success, Some(value)),
            Ok(value) => (SqlResult::SuccessWithInfo, Some(value)),
            Err(err) => {
                tracing::debug!("Call failed: [{}] {}", err.sql_state(), err);
                self.push(DiagnosticRecord::from(&err));
                (SqlResult::Error, None)
            }
        };

        CallResult {
            result,
            value,
            diagnostics: self.records.clone(),
        }
    }
}

/// Result of a public call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallResult<T> {
    pub result: SqlResult,
    pub value: Option<T>,
    pub diagnostics: Vec<DiagnosticRecord>,
}

impl<T> CallResult<T> {
    pub fn is_success(&self) -> bool {
        self.result.is_success()
    }

    pub fn is_error(&self) -> bool {
        self.result == SqlResult::Error
    }

    /// Returns the SQLSTATE of the first record, if any.
    pub fn sql_state(&self) -> Option<SqlState> {
        self.diagnostics.first().map(|r| r.sql_state())
    }

    /// Maps the produced value, keeping the outcome and records.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CallResult<U> {
        CallResult {
            result: self.result,
            value: self.value.map(f),
            diagnostics: self.diagnostics,
        }
    }

    /// Converts into a `Result`, yielding the last record on failure.
    pub fn into_result(self) -> Result<T, DiagnosticRecord> {
        match (self.result, self.value) {
            (SqlResult::Error, _) | (_, None) => {
                Err(self.diagnostics.last().cloned().unwrap_or_else(|| {
                    DiagnosticRecord::new(SqlState::SHY000GeneralError, "Unknown error.")
                }))
            }
            (_, Some(value)) => Ok(value),
        }
    }
}
