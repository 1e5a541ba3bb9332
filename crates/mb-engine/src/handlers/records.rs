//! Record-store handlers
//!
//! These read and write flat tables through the [`RecordStore`] port and
//! exchange values with the run through shared variables.
//!
//! [`RecordStore`]: crate::ports::RecordStore

use async_trait::async_trait;
use mb_core::{value_to_text, Action, ActionResult};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::{substitute_variables, ActionHandler, HandlerError, HandlerResult};
use crate::context::ExecutionContext;
use crate::ports::{Ports, RecordStore, RecordTable};

/// Maximum number of records DB_ITERATE visits
pub const ITERATE_LIMIT: usize = 100;

fn store(ports: &Ports) -> HandlerResult<&Arc<dyn RecordStore>> {
    ports.records.as_ref().ok_or(HandlerError::PortMissing("record store"))
}

fn table(ports: &Ports, name: &str) -> HandlerResult<RecordTable> {
    store(ports)?
        .table(name)?
        .ok_or_else(|| HandlerError::StoreNotFound(name.to_string()))
}

/// DB_SEARCH: find the first matching record and store it (or one column)
pub struct DbSearchHandler {
    ports: Ports,
}

impl DbSearchHandler {
    pub fn new(ports: Ports) -> Self {
        Self { ports }
    }
}

#[async_trait]
impl ActionHandler for DbSearchHandler {
    async fn execute(
        &self,
        action: &Action,
        ctx: &mut ExecutionContext,
    ) -> HandlerResult<ActionResult> {
        let records = store(&self.ports)?;
        let database = action.meta_str_or("database", "");
        let column = action.meta_str_or("search_column", "");
        let value = action.meta_str("search_value").unwrap_or_default();
        let result_column = action.meta_str_or("result_column", "");
        let result_variable = action.meta_str_or("result_variable", "db_result");

        match records.search(&database, &column, &value)? {
            Some(record) => {
                let cell = if result_column.is_empty() {
                    None
                } else {
                    record.get(&result_column).cloned()
                };
                let found = cell.unwrap_or(Value::Object(record));
                let text = value_to_text(&found);
                ctx.set_var(result_variable.clone(), found);
                Ok(ActionResult::ok(
                    action,
                    format!("found in {}: {}={}", database, result_variable, text),
                ))
            }
            None => {
                ctx.set_var(result_variable, Value::Null);
                Ok(ActionResult::unmet(action, "not found"))
            }
        }
    }
}

/// DB_GET_VALUE: read one column of a record held in a variable
pub struct DbGetValueHandler;

impl DbGetValueHandler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DbGetValueHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActionHandler for DbGetValueHandler {
    async fn execute(
        &self,
        action: &Action,
        ctx: &mut ExecutionContext,
    ) -> HandlerResult<ActionResult> {
        let variable = action.meta_str_or("variable", "");
        let column = action.meta_str_or("column", "");
        let result_variable = action.meta_str_or("result_variable", "db_value");

        let cell = ctx
            .get_var(&variable)
            .and_then(Value::as_object)
            .and_then(|record| record.get(&column))
            .cloned();

        match cell {
            Some(value) => {
                let text = value_to_text(&value);
                ctx.set_var(result_variable, value);
                Ok(ActionResult::ok(action, format!("got {}={}", column, text)))
            }
            None => Ok(ActionResult::err(
                action,
                format!("variable {} not found or has no column {}", variable, column),
            )),
        }
    }
}

/// DB_ITERATE: walk the first records of a table, publishing each one's
/// position and value column
///
/// Stops early once the run is no longer active.
pub struct DbIterateHandler {
    ports: Ports,
}

impl DbIterateHandler {
    pub fn new(ports: Ports) -> Self {
        Self { ports }
    }
}

#[async_trait]
impl ActionHandler for DbIterateHandler {
    async fn execute(
        &self,
        action: &Action,
        ctx: &mut ExecutionContext,
    ) -> HandlerResult<ActionResult> {
        let database = action.meta_str_or("database", "");
        let value_column = action.meta_str_or("value_column", "");
        let row_variable = action.meta_str_or("row_variable", "current_row");
        let value_variable = action.meta_str_or("value_variable", "current_value");

        let table = table(&self.ports, &database)?;

        let mut count = 0usize;
        for (i, record) in table.data.iter().take(ITERATE_LIMIT).enumerate() {
            if !ctx.is_running() {
                debug!(database = %database, row = i, "Iteration stopped");
                break;
            }
            ctx.set_var(row_variable.clone(), Value::from(i + 1));
            if let Some(value) = record.get(&value_column) {
                ctx.set_var(value_variable.clone(), value.clone());
                count += 1;
            }
        }

        Ok(ActionResult::ok(
            action,
            format!("processed {} rows from {}", count, database),
        ))
    }
}

/// DB_SAVE: update a column of the first matching record
///
/// `search_value` and `save_value` may reference variables as `{name}`.
pub struct DbSaveHandler {
    ports: Ports,
}

impl DbSaveHandler {
    pub fn new(ports: Ports) -> Self {
        Self { ports }
    }
}

#[async_trait]
impl ActionHandler for DbSaveHandler {
    async fn execute(
        &self,
        action: &Action,
        ctx: &mut ExecutionContext,
    ) -> HandlerResult<ActionResult> {
        let records = store(&self.ports)?;
        let database = action.meta_str_or("database", "");
        let search_column = action.meta_str_or("search_column", "");
        let update_column = action.meta_str_or("update_column", "");
        let search_value = substitute_variables(
            &action.meta_str("search_value").unwrap_or_default(),
            &ctx.variables,
        );
        let save_value = substitute_variables(
            &action.meta_str("save_value").unwrap_or_default(),
            &ctx.variables,
        );

        if records.table(&database)?.is_none() {
            return Err(HandlerError::StoreNotFound(database));
        }

        let updated = records.update_first(
            &database,
            &search_column,
            &search_value,
            &update_column,
            Value::String(save_value.clone()),
        )?;
        if !updated {
            return Ok(ActionResult::unmet(action, "no record to update"));
        }

        ctx.set_var("db_last_saved_value", Value::String(save_value.clone()));
        Ok(ActionResult::ok(
            action,
            format!("updated {}={}", update_column, save_value),
        ))
    }
}

/// CHECK_VALUE: map a variable through a from/to lookup table
///
/// Without a match the variable's own value is passed through unchanged.
pub struct CheckValueHandler {
    ports: Ports,
}

impl CheckValueHandler {
    pub fn new(ports: Ports) -> Self {
        Self { ports }
    }
}

#[async_trait]
impl ActionHandler for CheckValueHandler {
    async fn execute(
        &self,
        action: &Action,
        ctx: &mut ExecutionContext,
    ) -> HandlerResult<ActionResult> {
        let database = action.meta_str_or("database", "");
        let from_column = action.meta_str_or("from_column", "");
        let to_column = action.meta_str_or("to_column", "");
        let check_variable = action.meta_str_or("check_variable", "");
        let result_variable = action.meta_str_or("result_variable", "new_value");

        let table = table(&self.ports, &database)?;
        let current = ctx
            .get_var(&check_variable)
            .cloned()
            .unwrap_or_else(|| Value::String(String::new()));
        let current_text = value_to_text(&current);

        let replacement = table.data.iter().find(|record| {
            record
                .get(&from_column)
                .is_some_and(|cell| value_to_text(cell) == current_text)
        });

        match replacement {
            Some(record) => {
                let new_value = record
                    .get(&to_column)
                    .cloned()
                    .unwrap_or_else(|| Value::String(String::new()));
                let message = format!("replaced {} -> {}", current_text, value_to_text(&new_value));
                ctx.set_var(result_variable, new_value);
                Ok(ActionResult::ok(action, message))
            }
            None => {
                ctx.set_var(result_variable, current);
                Ok(ActionResult::unmet(
                    action,
                    format!("no replacement for {}", current_text),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RUNNING;
    use crate::memory_store::InMemoryRecordStore;
    use mb_core::ActionKind;
    use serde_json::json;

    fn ports() -> (Ports, Arc<InMemoryRecordStore>) {
        let store = Arc::new(InMemoryRecordStore::new());
        let table: RecordTable = serde_json::from_value(json!({
            "columns": ["sku", "price", "alias"],
            "data": [
                {"sku": "A1", "price": "10", "alias": "apple"},
                {"sku": "B2", "price": "20", "alias": "banana"}
            ]
        }))
        .unwrap();
        store.insert_table("catalog", table);
        (Ports::none().with_records(store.clone()), store)
    }

    #[tokio::test]
    async fn test_search_stores_column_or_record() {
        let (ports, _) = ports();
        let handler = DbSearchHandler::new(ports);
        let mut ctx = ExecutionContext::new();

        let action = Action::new(ActionKind::DbSearch, "find")
            .with_meta("database", "catalog")
            .with_meta("search_column", "sku")
            .with_meta("search_value", "B2")
            .with_meta("result_column", "price");
        assert!(handler.execute(&action, &mut ctx).await.unwrap().success);
        assert_eq!(ctx.get_var("db_result"), Some(&json!("20")));

        let action = Action::new(ActionKind::DbSearch, "find")
            .with_meta("database", "catalog")
            .with_meta("search_column", "sku")
            .with_meta("search_value", "A1")
            .with_meta("result_variable", "row");
        handler.execute(&action, &mut ctx).await.unwrap();
        assert_eq!(ctx.get_var("row").unwrap()["alias"], json!("apple"));
    }

    #[tokio::test]
    async fn test_search_miss_clears_variable() {
        let (ports, _) = ports();
        let handler = DbSearchHandler::new(ports);
        let mut ctx = ExecutionContext::new().with_var("db_result", json!("stale"));

        let action = Action::new(ActionKind::DbSearch, "find")
            .with_meta("database", "catalog")
            .with_meta("search_column", "sku")
            .with_meta("search_value", "Z9");
        let result = handler.execute(&action, &mut ctx).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.message, "not found");
        assert_eq!(ctx.get_var("db_result"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn test_get_value_from_record_variable() {
        let handler = DbGetValueHandler::new();
        let mut ctx = ExecutionContext::new().with_var("row", json!({"price": "10"}));

        let action = Action::new(ActionKind::DbGetValue, "get")
            .with_meta("variable", "row")
            .with_meta("column", "price");
        assert!(handler.execute(&action, &mut ctx).await.unwrap().success);
        assert_eq!(ctx.get_var("db_value"), Some(&json!("10")));

        let action = Action::new(ActionKind::DbGetValue, "get")
            .with_meta("variable", "row")
            .with_meta("column", "weight");
        let result = handler.execute(&action, &mut ctx).await.unwrap();
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn test_iterate_publishes_last_row() {
        let (ports, _) = ports();
        let handler = DbIterateHandler::new(ports);
        let mut ctx = ExecutionContext::new();

        let action = Action::new(ActionKind::DbIterate, "walk")
            .with_meta("database", "catalog")
            .with_meta("value_column", "alias");
        let result = handler.execute(&action, &mut ctx).await.unwrap();
        assert_eq!(result.message, "processed 2 rows from catalog");
        assert_eq!(ctx.get_var("current_row"), Some(&json!(2)));
        assert_eq!(ctx.get_var("current_value"), Some(&json!("banana")));
    }

    #[tokio::test]
    async fn test_iterate_stops_at_limit() {
        let store = Arc::new(InMemoryRecordStore::new());
        let data: Vec<Value> = (1..=150).map(|n| json!({"n": n})).collect();
        let table: RecordTable =
            serde_json::from_value(json!({"columns": ["n"], "data": data})).unwrap();
        store.insert_table("big", table);
        let handler = DbIterateHandler::new(Ports::none().with_records(store));
        let mut ctx = ExecutionContext::new();

        let action = Action::new(ActionKind::DbIterate, "walk")
            .with_meta("database", "big")
            .with_meta("value_column", "n");
        let result = handler.execute(&action, &mut ctx).await.unwrap();
        assert_eq!(result.message, format!("processed {} rows from big", ITERATE_LIMIT));
        assert_eq!(ctx.get_var("current_row"), Some(&json!(100)));
        assert_eq!(ctx.get_var("current_value"), Some(&json!(100)));
    }

    #[tokio::test]
    async fn test_iterate_stops_when_run_ends() {
        let (ports, _) = ports();
        let handler = DbIterateHandler::new(ports);
        let mut ctx = ExecutionContext::new().with_var(RUNNING, json!(false));

        let action = Action::new(ActionKind::DbIterate, "walk")
            .with_meta("database", "catalog")
            .with_meta("value_column", "alias");
        let result = handler.execute(&action, &mut ctx).await.unwrap();
        assert!(result.success);
        assert_eq!(result.message, "processed 0 rows from catalog");
        assert_eq!(ctx.get_var("current_row"), None);
    }

    #[tokio::test]
    async fn test_iterate_unknown_store() {
        let (ports, _) = ports();
        let handler = DbIterateHandler::new(ports);
        let action = Action::new(ActionKind::DbIterate, "walk").with_meta("database", "nope");
        let err = handler.execute(&action, &mut ExecutionContext::new()).await.unwrap_err();
        assert!(matches!(err, HandlerError::StoreNotFound(name) if name == "nope"));
    }

    #[tokio::test]
    async fn test_save_substitutes_variables() {
        let (ports, store) = ports();
        let handler = DbSaveHandler::new(ports);
        let mut ctx = ExecutionContext::new()
            .with_var("sku", json!("A1"))
            .with_var("qty", json!(3));

        let action = Action::new(ActionKind::DbSave, "save")
            .with_meta("database", "catalog")
            .with_meta("search_column", "sku")
            .with_meta("search_value", "{sku}")
            .with_meta("update_column", "price")
            .with_meta("save_value", "{qty}0");
        assert!(handler.execute(&action, &mut ctx).await.unwrap().success);
        assert_eq!(ctx.get_var("db_last_saved_value"), Some(&json!("30")));

        let table = store.table("catalog").unwrap().unwrap();
        assert_eq!(table.data[0]["price"], json!("30"));
    }

    #[tokio::test]
    async fn test_check_value_passes_through_on_miss() {
        let (ports, _) = ports();
        let handler = CheckValueHandler::new(ports);

        let action = Action::new(ActionKind::CheckValue, "map")
            .with_meta("database", "catalog")
            .with_meta("from_column", "alias")
            .with_meta("to_column", "sku")
            .with_meta("check_variable", "fruit");

        let mut ctx = ExecutionContext::new().with_var("fruit", json!("banana"));
        assert!(handler.execute(&action, &mut ctx).await.unwrap().success);
        assert_eq!(ctx.get_var("new_value"), Some(&json!("B2")));

        let mut ctx = ExecutionContext::new().with_var("fruit", json!("cherry"));
        let result = handler.execute(&action, &mut ctx).await.unwrap();
        assert!(!result.success);
        assert_eq!(ctx.get_var("new_value"), Some(&json!("cherry")));
    }
}
