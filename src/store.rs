use crate::model::State;
use crate::norm;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

/// Document key for the persisted state. Bump when the schema changes shape
/// in a way normalization cannot bridge.
pub const DOC_KEY: &str = "seating-monitor-v7-1";

/// Durable get/set port for state documents. The normalizer never touches
/// storage; all I/O goes through this interface from the container.
pub trait StateStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn set(&mut self, key: &str, body: &str) -> anyhow::Result<()>;
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(workspace: &Path) -> anyhow::Result<SqliteStore> {
        std::fs::create_dir_all(workspace)?;
        let conn = Connection::open(workspace.join("seatmon.sqlite3"))?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS state_doc(
                key TEXT PRIMARY KEY,
                body TEXT NOT NULL,
                updated_at TEXT
            )",
            [],
        )?;
        Ok(SqliteStore { conn })
    }
}

impl StateStore for SqliteStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let body = self
            .conn
            .query_row("SELECT body FROM state_doc WHERE key = ?", [key], |r| {
                r.get(0)
            })
            .optional()?;
        Ok(body)
    }

    fn set(&mut self, key: &str, body: &str) -> anyhow::Result<()> {
        self.conn.execute(
            "INSERT INTO state_doc(key, body, updated_at) VALUES(?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
            (key, body, Utc::now().to_rfc3339()),
        )?;
        Ok(())
    }
}

/// The one live state plus its storage port. Mutations go state-first:
/// callers change `state`, then `commit` persists the whole document, so a
/// reader never observes a partially-applied change.
pub struct StateContainer {
    store: Box<dyn StateStore>,
    pub state: State,
}

impl StateContainer {
    /// A failed or empty read is the same as no prior state: the session
    /// starts from the default document.
    pub fn open(store: Box<dyn StateStore>) -> StateContainer {
        let state = match store.get(DOC_KEY) {
            Ok(Some(raw)) => norm::normalize(&raw),
            _ => norm::default_state(),
        };
        StateContainer { store, state }
    }

    pub fn replace(&mut self, state: State) -> anyhow::Result<()> {
        self.state = state;
        self.commit()
    }

    pub fn commit(&mut self) -> anyhow::Result<()> {
        let body = serde_json::to_string(&self.state)?;
        self.store.set(DOC_KEY, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_workspace(prefix: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "{}-{}",
            prefix,
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ))
    }

    #[test]
    fn sqlite_store_roundtrips_a_document() {
        let ws = temp_workspace("seatmon-store");
        let mut store = SqliteStore::open(&ws).expect("open store");
        assert_eq!(store.get(DOC_KEY).expect("get"), None);

        store.set(DOC_KEY, "{\"v\":1}").expect("set");
        assert_eq!(store.get(DOC_KEY).expect("get"), Some("{\"v\":1}".into()));

        store.set(DOC_KEY, "{\"v\":2}").expect("overwrite");
        assert_eq!(store.get(DOC_KEY).expect("get"), Some("{\"v\":2}".into()));
    }

    #[test]
    fn container_normalizes_whatever_was_stored() {
        let ws = temp_workspace("seatmon-container");
        let mut store = SqliteStore::open(&ws).expect("open store");
        store
            .set(DOC_KEY, "{\"classes\": [{\"id\": \"A\", \"rows\": 99}]}")
            .expect("seed");

        let container = StateContainer::open(Box::new(SqliteStore::open(&ws).expect("reopen")));
        assert_eq!(container.state.classes[0].id, "A");
        assert_eq!(container.state.classes[0].rows, 24);
        assert_eq!(container.state.selected_class_id, "A");
    }

    #[test]
    fn container_starts_from_default_without_prior_state() {
        let ws = temp_workspace("seatmon-fresh");
        let mut container =
            StateContainer::open(Box::new(SqliteStore::open(&ws).expect("open store")));
        assert_eq!(container.state.classes.len(), 1);

        container.commit().expect("commit");
        let reopened = StateContainer::open(Box::new(SqliteStore::open(&ws).expect("reopen")));
        assert_eq!(reopened.state, container.state);
    }
}
