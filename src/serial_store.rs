// src/serial_store.rs

use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::PipelineError;

/// Display value offered to operators before anything has been stored.
const DEFAULT_DISPLAY_SERIAL: &str = "0888";

/// How long a claim waits for another process holding the write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Persisted sequence counter behind the serial part of NOMOR AJU.
///
/// Every increment runs in an IMMEDIATE transaction, so concurrent runs
/// (in this or another process) never receive the same serial.
pub struct SerialStore {
    conn: Connection,
}

impl SerialStore {
    /// Open (or create) the store. When it holds no value yet and a legacy
    /// plain-text tracker file exists, that file seeds the counter.
    pub fn open<P: AsRef<Path>>(
        db_path: P,
        legacy_file: Option<&Path>,
    ) -> Result<Self, PipelineError> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
        }

        let conn = Connection::open(db_path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let store = Self::init(conn)?;

        if let Some(legacy) = legacy_file {
            store.import_legacy(legacy)?;
        }

        info!(path = %db_path.display(), "Serial store ready");
        Ok(store)
    }

    /// Store that lives only as long as this value (tests, dry runs).
    pub fn in_memory() -> Result<Self, PipelineError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, PipelineError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS serial (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                value INTEGER NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;
        Ok(Self { conn })
    }

    fn import_legacy(&self, legacy: &Path) -> Result<(), PipelineError> {
        if self.current()? != 0 || !legacy.exists() {
            return Ok(());
        }
        let content = match fs::read_to_string(legacy) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %legacy.display(), error = %e, "Could not read legacy serial tracker");
                return Ok(());
            }
        };
        let value = parse_serial_text(&content);
        if value > 0 {
            write_value(&self.conn, value)?;
            info!(path = %legacy.display(), value, "Seeded serial store from legacy tracker");
        }
        Ok(())
    }

    /// Last serial handed out (0 when nothing has been stored).
    pub fn current(&self) -> Result<u64, PipelineError> {
        let value: Option<i64> = self
            .conn
            .query_row("SELECT value FROM serial WHERE id = 1", [], |row| row.get(0))
            .optional()?;
        Ok(value.map(|v| v.max(0) as u64).unwrap_or(0))
    }

    /// Claim the serial for one document.
    ///
    /// With `requested` the operator's serial is used verbatim and stored, so
    /// the next unrequested claim continues after it. Otherwise the stored
    /// value is incremented; an empty store starts from `fallback`.
    pub fn claim(&mut self, requested: Option<u64>, fallback: u64) -> Result<u64, PipelineError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current: u64 = tx
            .query_row("SELECT value FROM serial WHERE id = 1", [], |row| {
                row.get::<_, i64>(0)
            })
            .optional()?
            .map(|v| v.max(0) as u64)
            .unwrap_or(0);

        let next = match requested {
            Some(serial) => serial,
            None if current == 0 => fallback + 1,
            None => current + 1,
        };

        write_value(&tx, next)?;
        tx.commit()?;

        info!(previous = current, serial = next, requested = ?requested, "Serial claimed");
        Ok(next)
    }

    /// Next serial as an operator would type it: at least four digits.
    pub fn next_display(&self) -> Result<String, PipelineError> {
        match self.current()? {
            0 => Ok(DEFAULT_DISPLAY_SERIAL.to_string()),
            n => Ok(format!("{:04}", n + 1)),
        }
    }
}

fn write_value(conn: &Connection, value: u64) -> Result<(), PipelineError> {
    conn.execute(
        "INSERT INTO serial (id, value) VALUES (1, ?1)
         ON CONFLICT(id) DO UPDATE SET
            value = excluded.value,
            updated_at = CURRENT_TIMESTAMP",
        params![value as i64],
    )?;
    Ok(())
}

/// Decimal text, optionally zero-padded; anything else counts as 0.
pub fn parse_serial_text(content: &str) -> u64 {
    let trimmed = content.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return 0;
    }
    trimmed.parse().unwrap_or(0)
}
