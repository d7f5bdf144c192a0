//! Shared Diesel error handling for the food-access repositories.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::debug;

use super::pool::PoolError;

/// Coarse classification of a Diesel failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DieselFailure {
    /// The connection dropped mid-operation.
    Connection,
    /// A constraint rejected the row being written.
    Constraint,
    /// Any other query failure.
    Query,
}

/// Classify `error` so callers can pick a port error variant.
pub fn classify_diesel_error(error: &DieselError) -> DieselFailure {
    match error {
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            DieselFailure::Connection
        }
        DieselError::DatabaseError(
            DatabaseErrorKind::UniqueViolation
            | DatabaseErrorKind::CheckViolation
            | DatabaseErrorKind::NotNullViolation
            | DatabaseErrorKind::ForeignKeyViolation,
            _,
        ) => DieselFailure::Constraint,
        _ => DieselFailure::Query,
    }
}

/// Extract a readable message from a pool error.
pub fn map_pool_error_message(error: PoolError) -> String {
    error.into_message()
}

/// Extract a readable message from a Diesel error and emit debug context.
pub fn map_diesel_error_message(error: &DieselError, operation: &str) -> String {
    let error_message = match error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), %operation, "diesel operation failed");
            info.message().to_owned()
        }
        other => {
            let error_message = other.to_string();
            debug!(%error_message, %operation, "diesel operation failed");
            error_message
        }
    };
    format!("{operation}: {error_message}")
}

/// Convert a database count into `u64`.
pub fn cast_count(total: i64) -> Result<u64, String> {
    u64::try_from(total).map_err(|_| format!("database returned negative count {total}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn not_found_is_a_query_failure() {
        assert_eq!(
            classify_diesel_error(&DieselError::NotFound),
            DieselFailure::Query
        );
    }

    #[rstest]
    fn messages_carry_the_operation() {
        let message = map_diesel_error_message(&DieselError::NotFound, "store lookup");
        assert!(message.starts_with("store lookup: "));
    }

    #[rstest]
    #[case(0, Ok(0))]
    #[case(42, Ok(42))]
    fn counts_convert(#[case] raw: i64, #[case] expected: Result<u64, String>) {
        assert_eq!(cast_count(raw), expected);
    }

    #[rstest]
    fn negative_counts_are_rejected() {
        assert!(cast_count(-1).is_err());
    }
}
