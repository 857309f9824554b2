//! Slow-query probe built on `pg_stat_statements`.
//!
//! The query runs through a server-side `eval(query_text text)` function
//! reachable over PostgREST RPC; that function has to be created in the
//! database separately.

use serde::Deserialize;
use serde_json::json;
use std::fmt::Write;

use crate::supabase::{SupabaseClient, SupabaseResult};

pub const SLOW_QUERY_SQL: &str = "
SELECT
    (total_exec_time / 1000 / 60) as total_minutes,
    (total_exec_time/calls) as avg_ms,
    calls,
    query
FROM pg_stat_statements
WHERE total_exec_time > 60000
ORDER BY total_exec_time DESC
LIMIT 5;
";

pub const NO_ISSUES: &str = "✅ No significant performance issues found in the top queries.";
pub const ISSUES_HEADER: &str = "Found potential performance issues:";

const MAX_WARNINGS: usize = 5;
const SNIPPET_CHARS: usize = 100;

/// One row of the probe result; field names match the selected columns
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PerformanceWarning {
    pub query: String,
    pub avg_ms: f64,
    pub total_minutes: f64,
    pub calls: i64,
}

/// Run the probe and return the raw rows. A `null` result (an aggregate over
/// zero rows) counts as no rows.
pub async fn fetch_warnings(client: &SupabaseClient) -> SupabaseResult<Vec<PerformanceWarning>> {
    let rows: Option<Vec<PerformanceWarning>> = client
        .rpc("eval", &json!({ "query_text": SLOW_QUERY_SQL }))
        .await?;
    Ok(rows.unwrap_or_default())
}

/// Render rows into the user-facing report
pub fn format_report(warnings: &[PerformanceWarning]) -> String {
    if warnings.is_empty() {
        return NO_ISSUES.to_string();
    }

    let mut report = format!("{}\n\n", ISSUES_HEADER);
    for (i, warning) in warnings.iter().take(MAX_WARNINGS).enumerate() {
        let snippet: String = warning.query.chars().take(SNIPPET_CHARS).collect();
        // Writing to a String cannot fail
        let _ = write!(
            report,
            "{}. Query Snippet: `{}...`\n   \
             - Average Time: {:.2} ms\n   \
             - Total Time Consumed: {:.2} minutes\n   \
             - Total Calls: {}\n   \
             - Suggestion: Consider adding a database index.\n\n",
            i + 1,
            snippet,
            warning.avg_ms,
            warning.total_minutes,
            warning.calls
        );
    }
    report
}

/// Probe the database and always produce a displayable report
pub async fn performance_report(client: &SupabaseClient) -> String {
    match fetch_warnings(client).await {
        Ok(warnings) => format_report(&warnings),
        Err(e) => {
            tracing::warn!("performance probe failed: {}", e);
            format!(
                "❌ An error occurred while checking database performance: {}",
                e
            )
        }
    }
}

/// Whether a report describes something worth alerting on
pub fn needs_attention(report: &str) -> bool {
    report.contains('❌') || report.contains(ISSUES_HEADER)
}
