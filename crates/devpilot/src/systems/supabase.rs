use async_trait::async_trait;
use serde_json::Value;

use crate::diagnostics;
use crate::errors::{AgentError, AgentResult};
use crate::models::tool::{ParamKind, Tool, ToolArgs, ToolCall, ToolParam};
use crate::supabase::{EqFilter, Record, SupabaseClient, SupabaseError};
use crate::systems::System;

const NOT_INITIALIZED: &str = "Supabase client not initialized.";

/// Row-level access to a Supabase project plus the slow-query probe
pub struct SupabaseSystem {
    client: Option<SupabaseClient>,
    tools: Vec<Tool>,
}

fn pretty(rows: &[Value]) -> String {
    serde_json::to_string_pretty(rows).unwrap_or_else(|_| "[]".to_string())
}

fn remote_fault(action: &str, error: SupabaseError) -> String {
    tracing::debug!("supabase call failed: {}", error);
    format!("❌ Error {}: {}", action, error)
}

fn parse_record(table: &str, text: &str) -> Result<Record, String> {
    Record::parse(text).map_err(|e| match e {
        SupabaseError::InvalidJson(detail) => format!("❌ Invalid JSON for '{}': {}", table, detail),
        other => remote_fault(&format!("parsing data for '{}'", table), other),
    })
}

impl SupabaseSystem {
    pub fn new(client: Option<SupabaseClient>) -> Self {
        let table = || ToolParam::required("table_name", ParamKind::String, "The name of the table.");
        let filter_column = |description: &str| {
            ToolParam::required("filter_column", ParamKind::String, description)
        };
        let filter_value = |description: &str| {
            ToolParam::required("filter_value", ParamKind::String, description)
        };

        let tools = vec![
            Tool::new(
                "query_supabase_table",
                "Queries a specified table in Supabase.",
                vec![
                    table(),
                    ToolParam::required(
                        "select_query",
                        ParamKind::String,
                        "The columns to select (e.g., 'id, name'). Defaults to '*'.",
                    )
                    .with_default("*"),
                    ToolParam::required("limit", ParamKind::Integer, "Max number of rows to return.")
                        .with_default(10),
                ],
            ),
            Tool::new(
                "insert_into_supabase",
                "Inserts a new record into a Supabase table.",
                vec![
                    table(),
                    ToolParam::required(
                        "data_json",
                        ParamKind::String,
                        r#"A JSON string representing the data to insert (e.g., '{"name": "Bob", "email": "bob@example.com"}')."#,
                    ),
                ],
            ),
            Tool::new(
                "update_supabase_record",
                "Updates an existing record in a Supabase table based on a filter.",
                vec![
                    table(),
                    filter_column("The column to filter by (e.g., 'id')."),
                    filter_value("The value to match in the filter column (e.g., '5')."),
                    ToolParam::required(
                        "update_data_json",
                        ParamKind::String,
                        r#"A JSON string with the data to update (e.g., '{"status": "inactive"}')."#,
                    ),
                ],
            ),
            Tool::new(
                "delete_supabase_record",
                "Deletes a record from a Supabase table based on a filter.",
                vec![
                    table(),
                    filter_column("The column to filter by (e.g., 'id')."),
                    filter_value("The value to match for deletion (e.g., '10')."),
                ],
            ),
            Tool::new(
                "search_supabase_table",
                "Searches for records in a Supabase table where a column matches a specific value.",
                vec![
                    table(),
                    filter_column("The column to search in (e.g., 'email')."),
                    filter_value("The value to search for (e.g., 'alice@example.com')."),
                ],
            ),
            Tool::new(
                "count_supabase_records",
                "Counts records in a Supabase table, optionally with a filter.",
                vec![
                    table(),
                    ToolParam::optional(
                        "filter_column",
                        ParamKind::String,
                        "Optional column to filter by.",
                    ),
                    ToolParam::optional(
                        "filter_value",
                        ParamKind::String,
                        "Optional value to match in the filter column.",
                    ),
                ],
            ),
            Tool::new(
                "get_supabase_performance_warnings",
                "Checks the Supabase database for performance issues such as slow queries \
                 that might be missing an index. Returns a list of potential problems or a \
                 message saying everything looks okay.",
                vec![],
            ),
        ];

        Self { client, tools }
    }

    async fn query(client: &SupabaseClient, table: &str, columns: &str, limit: i64) -> String {
        match client.select(table, columns, limit).await {
            Ok(rows) => format!("📊 Query results from '{}':\n{}", table, pretty(&rows)),
            Err(e) => remote_fault(&format!("querying '{}'", table), e),
        }
    }

    async fn insert(client: &SupabaseClient, table: &str, data_json: &str) -> String {
        let record = match parse_record(table, data_json) {
            Ok(record) => record,
            Err(message) => return message,
        };
        match client.insert(table, &record).await {
            Ok(rows) => format!("✅ Successfully inserted into '{}':\n{}", table, pretty(&rows)),
            Err(e) => remote_fault(&format!("inserting into '{}'", table), e),
        }
    }

    async fn update(client: &SupabaseClient, table: &str, filter: EqFilter, data_json: &str) -> String {
        let changes = match parse_record(table, data_json) {
            Ok(record) => record,
            Err(message) => return message,
        };
        match client.update(table, &filter, &changes).await {
            Ok(rows) => format!(
                "✅ Successfully updated record(s) in '{}':\n{}",
                table,
                pretty(&rows)
            ),
            Err(e) => remote_fault(&format!("updating '{}'", table), e),
        }
    }

    async fn delete(client: &SupabaseClient, table: &str, filter: EqFilter) -> String {
        match client.delete(table, &filter).await {
            Ok(rows) => format!(
                "🗑️ Successfully deleted {} record(s) from '{}'.",
                rows.len(),
                table
            ),
            Err(e) => remote_fault(&format!("deleting from '{}'", table), e),
        }
    }

    async fn search(client: &SupabaseClient, table: &str, filter: EqFilter) -> String {
        match client.select_eq(table, &filter).await {
            Ok(rows) => format!(
                "🔍 Found {} record(s) in '{}':\n{}",
                rows.len(),
                table,
                pretty(&rows)
            ),
            Err(e) => remote_fault(&format!("searching '{}'", table), e),
        }
    }

    async fn count(client: &SupabaseClient, table: &str, filter: Option<EqFilter>) -> String {
        match client.count(table, filter.as_ref()).await {
            Ok(n) => format!("🔢 '{}' has {} record(s).", table, n),
            Err(e) => remote_fault(&format!("counting records in '{}'", table), e),
        }
    }
}

fn eq_filter(args: &ToolArgs) -> AgentResult<EqFilter> {
    Ok(EqFilter::new(
        args.str("filter_column")?,
        args.str("filter_value")?,
    ))
}

/// Both halves must be present and non-empty for the count filter to apply
fn optional_filter(args: &ToolArgs) -> Option<EqFilter> {
    match (args.opt_str("filter_column"), args.opt_str("filter_value")) {
        (Some(column), Some(value)) if !column.is_empty() && !value.is_empty() => {
            Some(EqFilter::new(column, value))
        }
        _ => None,
    }
}

#[async_trait]
impl System for SupabaseSystem {
    fn name(&self) -> &str {
        "supabase"
    }

    fn description(&self) -> &str {
        "Query and modify rows in the project's Supabase tables and check for slow queries."
    }

    fn instructions(&self) -> &str {
        "Data arguments are JSON objects passed as strings. Filters always match on equality."
    }

    fn tools(&self) -> &[Tool] {
        &self.tools
    }

    async fn call(&self, tool_call: ToolCall) -> AgentResult<String> {
        let args = self.tool(&tool_call.name)?.resolve(&tool_call.arguments)?;
        let Some(client) = &self.client else {
            return Ok(NOT_INITIALIZED.to_string());
        };

        let output = match tool_call.name.as_str() {
            "query_supabase_table" => {
                Self::query(
                    client,
                    args.str("table_name")?,
                    args.str("select_query")?,
                    args.integer("limit")?,
                )
                .await
            }
            "insert_into_supabase" => {
                Self::insert(client, args.str("table_name")?, args.str("data_json")?).await
            }
            "update_supabase_record" => {
                Self::update(
                    client,
                    args.str("table_name")?,
                    eq_filter(&args)?,
                    args.str("update_data_json")?,
                )
                .await
            }
            "delete_supabase_record" => {
                Self::delete(client, args.str("table_name")?, eq_filter(&args)?).await
            }
            "search_supabase_table" => {
                Self::search(client, args.str("table_name")?, eq_filter(&args)?).await
            }
            "count_supabase_records" => {
                Self::count(client, args.str("table_name")?, optional_filter(&args)).await
            }
            "get_supabase_performance_warnings" => diagnostics::performance_report(client).await,
            other => return Err(AgentError::ToolNotFound(other.to_string())),
        };
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    fn system_for(server: &MockServer) -> SupabaseSystem {
        SupabaseSystem::new(Some(SupabaseClient::new(&server.uri(), "key").unwrap()))
    }

    async fn call(system: &SupabaseSystem, name: &str, args: Value) -> String {
        system.call(ToolCall::new(name, args)).await.unwrap()
    }

    /// An in-memory table answering the PostgREST verbs the system uses
    #[derive(Clone, Default)]
    struct TableResponder {
        rows: Arc<Mutex<Vec<Value>>>,
    }

    fn eq_pairs(request: &Request) -> Vec<(String, String)> {
        request
            .url
            .query_pairs()
            .filter_map(|(k, v)| v.strip_prefix("eq.").map(|v| (k.to_string(), v.to_string())))
            .collect()
    }

    fn matches(row: &Value, filters: &[(String, String)]) -> bool {
        filters.iter().all(|(column, value)| match &row[column] {
            Value::String(s) => s == value,
            other => other.to_string() == *value,
        })
    }

    impl Respond for TableResponder {
        fn respond(&self, request: &Request) -> ResponseTemplate {
            let mut rows = self.rows.lock().unwrap();
            let filters = eq_pairs(request);
            match request.method.as_str() {
                "HEAD" => {
                    let n = rows.iter().filter(|r| matches(r, &filters)).count();
                    ResponseTemplate::new(200).insert_header("content-range", format!("*/{}", n))
                }
                "POST" => {
                    let row: Value = serde_json::from_slice(&request.body).unwrap();
                    rows.push(row.clone());
                    ResponseTemplate::new(201).set_body_json(json!([row]))
                }
                "DELETE" => {
                    let (removed, kept): (Vec<Value>, Vec<Value>) =
                        rows.drain(..).partition(|r| matches(r, &filters));
                    *rows = kept;
                    ResponseTemplate::new(200).set_body_json(removed)
                }
                _ => {
                    let found: Vec<Value> =
                        rows.iter().filter(|r| matches(r, &filters)).cloned().collect();
                    ResponseTemplate::new(200).set_body_json(found)
                }
            }
        }
    }

    #[tokio::test]
    async fn test_tool_order() {
        let system = SupabaseSystem::new(None);
        let names: Vec<_> = system.tools().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "query_supabase_table",
                "insert_into_supabase",
                "update_supabase_record",
                "delete_supabase_record",
                "search_supabase_table",
                "count_supabase_records",
                "get_supabase_performance_warnings"
            ]
        );
    }

    #[tokio::test]
    async fn test_disabled_client() {
        let system = SupabaseSystem::new(None);
        let output = call(&system, "count_supabase_records", json!({"table_name": "users"})).await;
        assert_eq!(output, NOT_INITIALIZED);
    }

    #[tokio::test]
    async fn test_insert_invalid_json_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
            .expect(0)
            .mount(&server)
            .await;
        let system = system_for(&server);

        let output = call(
            &system,
            "insert_into_supabase",
            json!({"table_name": "users", "data_json": "{name: Bob"}),
        )
        .await;
        assert!(output.starts_with("❌ Invalid JSON for 'users': "));

        let output = call(
            &system,
            "update_supabase_record",
            json!({
                "table_name": "users",
                "filter_column": "id",
                "filter_value": "1",
                "update_data_json": "[1, 2]"
            }),
        )
        .await;
        assert!(output.starts_with("❌ Invalid JSON for 'users': "));
    }

    #[tokio::test]
    async fn test_query_formats_rows() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/users"))
            .and(query_param("select", "id, name"))
            .and(query_param("limit", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1, "name": "Ann"}])))
            .mount(&server)
            .await;
        let system = system_for(&server);

        let output = call(
            &system,
            "query_supabase_table",
            json!({"table_name": "users", "select_query": "id, name", "limit": 2}),
        )
        .await;
        assert_eq!(
            output,
            "📊 Query results from 'users':\n[\n  {\n    \"id\": 1,\n    \"name\": \"Ann\"\n  }\n]"
        );
    }

    #[tokio::test]
    async fn test_remote_fault_wording() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Invalid API key"})))
            .mount(&server)
            .await;
        let system = system_for(&server);

        let output = call(
            &system,
            "search_supabase_table",
            json!({"table_name": "users", "filter_column": "email", "filter_value": "a@b.c"}),
        )
        .await;
        assert_eq!(output, "❌ Error searching 'users': 401 Unauthorized: Invalid API key");
    }

    #[tokio::test]
    async fn test_count_insert_delete_round_trip() {
        let server = MockServer::start().await;
        let table = TableResponder::default();
        table
            .rows
            .lock()
            .unwrap()
            .extend([json!({"id": 1, "name": "Ann"}), json!({"id": 2, "name": "Ben"})]);
        Mock::given(path("/rest/v1/users"))
            .respond_with(table.clone())
            .mount(&server)
            .await;
        let system = system_for(&server);

        let before = call(&system, "count_supabase_records", json!({"table_name": "users"})).await;
        assert_eq!(before, "🔢 'users' has 2 record(s).");

        let inserted = call(
            &system,
            "insert_into_supabase",
            json!({"table_name": "users", "data_json": r#"{"id": 3, "name": "Cat"}"#}),
        )
        .await;
        assert!(inserted.starts_with("✅ Successfully inserted into 'users':\n"));

        let filtered = call(
            &system,
            "count_supabase_records",
            json!({"table_name": "users", "filter_column": "name", "filter_value": "Cat"}),
        )
        .await;
        assert_eq!(filtered, "🔢 'users' has 1 record(s).");

        let deleted = call(
            &system,
            "delete_supabase_record",
            json!({"table_name": "users", "filter_column": "id", "filter_value": 3}),
        )
        .await;
        assert_eq!(deleted, "🗑️ Successfully deleted 1 record(s) from 'users'.");

        let after = call(&system, "count_supabase_records", json!({"table_name": "users"})).await;
        assert_eq!(after, before);
    }

    #[tokio::test]
    async fn test_count_ignores_half_filter() {
        let server = MockServer::start().await;
        let table = TableResponder::default();
        table.rows.lock().unwrap().push(json!({"id": 1}));
        Mock::given(path("/rest/v1/users"))
            .respond_with(table)
            .mount(&server)
            .await;
        let system = system_for(&server);

        let output = call(
            &system,
            "count_supabase_records",
            json!({"table_name": "users", "filter_column": "id"}),
        )
        .await;
        assert_eq!(output, "🔢 'users' has 1 record(s).");
    }
}
