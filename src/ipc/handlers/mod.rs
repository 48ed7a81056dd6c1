pub mod classes;
pub mod core;
pub mod marks;
pub mod seating;
pub mod skills;
pub mod state;
pub mod students;

use crate::ipc::error::{err, ok};
use crate::store::StateContainer;

/// Persist the mutated state, answering with `result` on success. The
/// response is built before committing so it reflects exactly what was
/// written.
pub(crate) fn commit_ok(
    container: &mut StateContainer,
    id: &str,
    result: serde_json::Value,
) -> serde_json::Value {
    match container.commit() {
        Ok(()) => ok(id, result),
        Err(e) => err(id, "db_write_failed", e.to_string(), None),
    }
}
