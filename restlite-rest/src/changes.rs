//! Row change events
//!
//! Successful row mutations are published here, keyed by table, for whatever
//! broadcast mechanism subscribes to them.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use restlite_engine::{Execution, MutationOutcome, Row};

/// Type of row change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeType {
    Insert,
    Update,
    Delete,
}

/// A row change event
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    pub table: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lookup_field: Option<String>,
    pub data: JsonValue,
    pub commit_timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    /// INSERT event carrying the new row id and the written fields
    pub fn insert(table: &str, execution: &Execution, fields: &[Row]) -> Self {
        let mut data = Map::new();
        data.insert("pk".to_string(), JsonValue::from(execution.last_insert_rowid));
        if let [single] = fields {
            data.extend(single.clone());
        } else {
            data.insert(
                "rows".to_string(),
                JsonValue::Array(fields.iter().cloned().map(JsonValue::Object).collect()),
            );
        }
        Self::new(ChangeType::Insert, table, None, JsonValue::Object(data))
    }

    /// UPDATE event carrying the addressed keys and the new values
    pub fn update(table: &str, outcome: &MutationOutcome, fields: &Row) -> Self {
        let mut data = Map::new();
        data.insert("pks".to_string(), keys(outcome));
        data.extend(fields.clone());
        Self::new(
            ChangeType::Update,
            table,
            Some(outcome.lookup_field.clone()),
            JsonValue::Object(data),
        )
    }

    /// DELETE event carrying the addressed keys
    pub fn delete(table: &str, outcome: &MutationOutcome) -> Self {
        let mut data = Map::new();
        data.insert("pks".to_string(), keys(outcome));
        Self::new(
            ChangeType::Delete,
            table,
            Some(outcome.lookup_field.clone()),
            JsonValue::Object(data),
        )
    }

    fn new(
        change_type: ChangeType,
        table: &str,
        lookup_field: Option<String>,
        data: JsonValue,
    ) -> Self {
        Self {
            change_type,
            table: table.to_string(),
            lookup_field,
            data,
            commit_timestamp: Utc::now(),
        }
    }
}

fn keys(outcome: &MutationOutcome) -> JsonValue {
    JsonValue::Array(
        outcome
            .keys
            .iter()
            .map(|k| JsonValue::String(k.clone()))
            .collect(),
    )
}

/// Callback type for change subscribers
pub type ChangeCallback = Box<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Fan-out point for row change events
#[derive(Default)]
pub struct ChangeListener {
    /// Callbacks by table name
    callbacks: RwLock<HashMap<String, Vec<Arc<ChangeCallback>>>>,
    /// Callbacks for every table
    global_callbacks: RwLock<Vec<Arc<ChangeCallback>>>,
}

impl ChangeListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for one table
    pub fn on_table<F>(&self, table: &str, callback: F)
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.callbacks
            .write()
            .entry(table.to_string())
            .or_default()
            .push(Arc::new(Box::new(callback)));
    }

    /// Register a callback for all tables
    pub fn on_all<F>(&self, callback: F)
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.global_callbacks
            .write()
            .push(Arc::new(Box::new(callback)));
    }

    pub fn emit(&self, event: &ChangeEvent) {
        // Snapshot so callbacks may register further callbacks
        let table_callbacks = self
            .callbacks
            .read()
            .get(&event.table)
            .cloned()
            .unwrap_or_default();
        let global_callbacks = self.global_callbacks.read().clone();

        for callback in table_callbacks.iter().chain(global_callbacks.iter()) {
            callback(event);
        }
    }
}
