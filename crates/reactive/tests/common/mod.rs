//! Shared fixtures for the observer integration tests.

#![allow(dead_code)]

use ripple_core::{ConversionError, RawRecord, Row, SortDescriptor, Value};
use ripple_reactive::{native_descriptors, ListChange, SortField, SortValue};
use ripple_storage::{QuerySpec, Store, StoreConfig};
use std::sync::{Arc, Once};
use std::time::{SystemTime, UNIX_EPOCH};

pub const CHANNELS: &str = "channels";

const SECOND: i64 = 1_000;
const HOUR: i64 = 3_600 * SECOND;

/// Routes `tracing` output to the test harness when `RUST_LOG` is set.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

#[derive(Clone, Debug, PartialEq)]
pub struct Channel {
    pub id: u64,
    pub name: String,
    pub created_at: i64,
    pub last_message_at: Option<i64>,
    pub default_sorting_at: i64,
    pub topic: Option<String>,
}

pub fn channel(row: &Arc<Row>) -> Result<Channel, ConversionError> {
    let name = row
        .field("name")
        .and_then(Value::as_str)
        .ok_or_else(|| ConversionError::missing_field(row.id(), "name"))?;
    let created_at = row
        .field("created_at")
        .and_then(Value::as_datetime)
        .ok_or_else(|| ConversionError::missing_field(row.id(), "created_at"))?;
    let last_message_at = row.field("last_message_at").and_then(Value::as_datetime);
    Ok(Channel {
        id: row.id(),
        name: name.to_owned(),
        created_at,
        last_message_at,
        default_sorting_at: last_message_at.unwrap_or(created_at),
        topic: row.field("topic").and_then(Value::as_str).map(str::to_owned),
    })
}

pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// A channel row. `default_sorting_at` is stored so the engine can sort by it.
pub fn channel_row(id: u64, name: &str, created_at: i64, last_message_at: Option<i64>) -> Row {
    let mut row = Row::new(id)
        .with("name", name)
        .with("created_at", Value::DateTime(created_at))
        .with("default_sorting_at", Value::DateTime(last_message_at.unwrap_or(created_at)));
    if let Some(at) = last_message_at {
        row.set("last_message_at", Value::DateTime(at));
    }
    row
}

/// Channels A to E with known creation and last message times.
pub fn fixture_rows() -> Vec<Row> {
    let now = now_millis();
    vec![
        channel_row(1, "A", now - 3 * HOUR, Some(now - 10_000 * SECOND)),
        channel_row(2, "B", now, Some(now)),
        channel_row(3, "C", now - 100 * HOUR, Some(now - SECOND)),
        channel_row(4, "D", now, Some(now - 1_000 * SECOND)),
        channel_row(5, "E", now - 3 * HOUR, Some(now - 60 * SECOND)),
    ]
}

pub fn store() -> Store {
    init_tracing();
    let store = Store::new(StoreConfig::default()).expect("store");
    store.create_table(CHANNELS).expect("table");
    store
}

pub fn insert_all(store: &Store, rows: Vec<Row>) {
    store
        .write(|tx| {
            for row in rows {
                tx.insert(CHANNELS, row)?;
            }
            Ok(())
        })
        .expect("insert");
}

pub fn by_default_sorting_at() -> SortValue<Channel> {
    SortValue::desc(SortField::native("default_sorting_at", |c: &Channel| {
        Some(Value::DateTime(c.default_sorting_at))
    }))
}

pub fn by_created_at() -> SortValue<Channel> {
    SortValue::desc(SortField::native("created_at", |c: &Channel| Some(Value::DateTime(c.created_at))))
}

pub fn by_name_runtime() -> SortValue<Channel> {
    SortValue::desc(SortField::runtime("name", |c: &Channel| Some(Value::from(c.name.as_str()))))
}

/// A query whose native order is the native prefix of `sorting`.
pub fn spec_for(sorting: &[SortValue<Channel>]) -> QuerySpec {
    let mut descriptors = native_descriptors(sorting);
    if descriptors.is_empty() {
        descriptors.push(SortDescriptor::asc("name"));
    }
    QuerySpec::new(CHANNELS).sort_by_all(descriptors)
}

pub fn names(items: &[Arc<Channel>]) -> Vec<String> {
    items.iter().map(|c| c.name.clone()).collect()
}

/// Shorthand for comparing batches by kind, name and indices.
pub fn describe(changes: &[ListChange<Arc<Channel>>]) -> Vec<String> {
    changes
        .iter()
        .map(|change| match change {
            ListChange::Insert { item, index } => format!("+{}@{}", item.name, index),
            ListChange::Remove { item, index } => format!("-{}@{}", item.name, index),
            ListChange::Update { item, index } => format!("~{}@{}", item.name, index),
            ListChange::Move { item, from, to } => format!("{}:{}->{}", item.name, from, to),
        })
        .collect()
}
