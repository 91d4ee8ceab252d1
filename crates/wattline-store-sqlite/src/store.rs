//! [`SqliteStore`] — the SQLite implementation of [`EventStore`] and
//! [`ConfigStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;

use wattline_core::{
  config::ConfigValue,
  event::{Event, NewEvent, SourceState, format_timestamp},
  store::{ConfigStore, EventQuery, EventStore, SortOrder},
};

use crate::{Error, Result, schema::SCHEMA};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Wattline store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted. The unique
/// `(source, state, recorded_at)` constraint plus SQLite's single-statement
/// atomicity is what makes concurrent duplicate appends safe.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

/// Row shape as it comes off disk, decoded into domain types afterwards.
struct RawEvent {
  id:          i64,
  source:      String,
  state:       String,
  voltage:     Option<f64>,
  recorded_at: String,
}

impl RawEvent {
  fn into_event(self) -> Result<Event> {
    let state = SourceState::parse(&self.state)
      .ok_or_else(|| Error::Decode(format!("unknown state label: {:?}", self.state)))?;
    Ok(Event {
      id:        self.id,
      source:    self.source,
      state,
      voltage:   self.voltage,
      timestamp: self.recorded_at,
    })
  }
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── EventStore impl ─────────────────────────────────────────────────────────

impl EventStore for SqliteStore {
  type Error = Error;

  async fn append(&self, event: NewEvent) -> Result<bool> {
    let state_str = event.state.as_str();
    let inserted = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "INSERT OR IGNORE INTO events (source, state, voltage, recorded_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![event.source, state_str, event.voltage, event.timestamp],
        )?;
        Ok(changed > 0)
      })
      .await?;
    Ok(inserted)
  }

  async fn query(&self, query: EventQuery) -> Result<Vec<Event>> {
    let limit = query.effective_limit() as i64;

    let raws: Vec<RawEvent> = self
      .conn
      .call(move |conn| {
        let mut conds: Vec<&'static str> = vec![];
        if query.source.is_some() {
          conds.push("source = ?1");
        }
        if query.since.is_some() {
          conds.push("recorded_at >= ?2");
        }
        if query.until.is_some() {
          conds.push("recorded_at <= ?3");
        }

        let where_clause = if conds.is_empty() {
          String::new()
        } else {
          format!("WHERE {}", conds.join(" AND "))
        };

        // The surrogate id is the tiebreak for equal timestamps in both
        // directions, so pagination and replay see a stable order.
        let order_clause = match query.order {
          SortOrder::Descending => "ORDER BY recorded_at DESC, id DESC",
          SortOrder::Ascending => "ORDER BY recorded_at ASC, id ASC",
        };

        let sql = format!(
          "SELECT id, source, state, voltage, recorded_at
           FROM events
           {where_clause}
           {order_clause}
           LIMIT ?4"
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params![
              query.source.as_deref(),
              query.since.as_deref(),
              query.until.as_deref(),
              limit,
            ],
            |row| {
              Ok(RawEvent {
                id:          row.get(0)?,
                source:      row.get(1)?,
                state:       row.get(2)?,
                voltage:     row.get(3)?,
                recorded_at: row.get(4)?,
              })
            },
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEvent::into_event).collect()
  }
}

// ─── ConfigStore impl ────────────────────────────────────────────────────────

fn encode_value(value: &ConfigValue) -> Result<String> {
  Ok(match value {
    ConfigValue::Float(v) => v.to_string(),
    ConfigValue::Int(v) => v.to_string(),
    ConfigValue::Bool(v) => v.to_string(),
    ConfigValue::Json(v) => serde_json::to_string(v)?,
    ConfigValue::Text(v) => v.clone(),
  })
}

fn decode_value(value: &str, kind: &str) -> Result<ConfigValue> {
  match kind {
    "float" => value
      .parse()
      .map(ConfigValue::Float)
      .map_err(|_| Error::Decode(format!("not a float: {value:?}"))),
    "int" => value
      .parse()
      .map(ConfigValue::Int)
      .map_err(|_| Error::Decode(format!("not an int: {value:?}"))),
    "bool" => match value {
      "true" | "1" | "yes" => Ok(ConfigValue::Bool(true)),
      "false" | "0" | "no" => Ok(ConfigValue::Bool(false)),
      other => Err(Error::Decode(format!("not a bool: {other:?}"))),
    },
    "json" => Ok(ConfigValue::Json(serde_json::from_str(value)?)),
    "text" => Ok(ConfigValue::Text(value.to_owned())),
    other => Err(Error::Decode(format!("unknown setting kind: {other:?}"))),
  }
}

impl ConfigStore for SqliteStore {
  type Error = Error;

  async fn get_setting(&self, key: &str) -> Result<Option<ConfigValue>> {
    let key = key.to_owned();
    let row: Option<(String, String)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT value, kind FROM settings WHERE key = ?1",
              rusqlite::params![key],
              |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?,
        )
      })
      .await?;

    row
      .map(|(value, kind)| decode_value(&value, &kind))
      .transpose()
  }

  async fn put_setting(
    &self,
    key: &str,
    value: ConfigValue,
    updated_by: &str,
  ) -> Result<()> {
    let key = key.to_owned();
    let kind = value.kind();
    let encoded = encode_value(&value)?;
    let at = format_timestamp(Utc::now().naive_utc());
    let by = updated_by.to_owned();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO settings (key, value, kind, updated_at, updated_by)
           VALUES (?1, ?2, ?3, ?4, ?5)
           ON CONFLICT(key) DO UPDATE SET
             value = excluded.value,
             kind = excluded.kind,
             updated_at = excluded.updated_at,
             updated_by = excluded.updated_by",
          rusqlite::params![key, encoded, kind, at, by],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn seed_setting(&self, key: &str, value: ConfigValue) -> Result<()> {
    let key = key.to_owned();
    let kind = value.kind();
    let encoded = encode_value(&value)?;
    let at = format_timestamp(Utc::now().naive_utc());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO settings (key, value, kind, updated_at, updated_by)
           VALUES (?1, ?2, ?3, ?4, 'system')",
          rusqlite::params![key, encoded, kind, at],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
