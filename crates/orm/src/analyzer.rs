//! N+1 query advisory detection
//!
//! Counts repeats of identical-shape single-row lookups and emits a
//! warning with the batching suggestion once a shape crosses the
//! threshold. Purely observational; execution is never blocked.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::warn;

const DEFAULT_THRESHOLD: u32 = 10;

/// Windowed repeat counter for executed statement shapes
pub struct QueryAnalyzer {
    counts: Mutex<HashMap<String, u32>>,
    threshold: u32,
}

impl Default for QueryAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryAnalyzer {
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_THRESHOLD)
    }

    pub fn with_threshold(threshold: u32) -> Self {
        Self {
            counts: Mutex::new(HashMap::new()),
            threshold: threshold.max(2),
        }
    }

    /// Record one executed statement. Statements are already parameterized,
    /// so the text itself is the shape: an N+1 loop issues the same text
    /// with different parameters.
    pub fn record(&self, sql: &str) {
        if !is_single_row_lookup(sql) {
            return;
        }
        let mut counts = self.counts.lock();
        let count = counts.entry(sql.to_string()).or_insert(0);
        *count += 1;
        if *count == self.threshold {
            warn!(
                sql,
                repeats = *count,
                "repeated single-row lookup; consider batch-loading the relation instead"
            );
        }
    }

    /// Repeat count currently recorded for a statement shape
    pub fn repeats(&self, sql: &str) -> u32 {
        self.counts.lock().get(sql).copied().unwrap_or(0)
    }

    /// Clear the window. Called between logical request scopes.
    pub fn reset(&self) {
        self.counts.lock().clear();
    }
}

/// Heuristic for the N+1 shape: a SELECT filtered by a single equality
/// parameter, no joins, no membership test.
fn is_single_row_lookup(sql: &str) -> bool {
    let upper = sql.to_ascii_uppercase();
    upper.starts_with("SELECT")
        && upper.contains(" WHERE ")
        && (sql.contains("= $") || sql.contains("= ?"))
        && !upper.contains(" IN (")
        && !upper.contains(" JOIN ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_lookup_shape_is_counted() {
        let analyzer = QueryAnalyzer::with_threshold(3);
        let sql = "SELECT * FROM posts WHERE user_id = $1";
        for _ in 0..5 {
            analyzer.record(sql);
        }
        assert_eq!(analyzer.repeats(sql), 5);
    }

    #[test]
    fn batched_and_join_queries_are_ignored() {
        let analyzer = QueryAnalyzer::new();
        analyzer.record("SELECT * FROM posts WHERE user_id IN ($1, $2, $3)");
        analyzer.record("SELECT * FROM users INNER JOIN posts ON users.id = posts.user_id WHERE users.id = $1");
        analyzer.record("INSERT INTO posts (title) VALUES ($1)");
        assert_eq!(
            analyzer.repeats("SELECT * FROM posts WHERE user_id IN ($1, $2, $3)"),
            0
        );
    }

    #[test]
    fn reset_clears_the_window() {
        let analyzer = QueryAnalyzer::new();
        let sql = "SELECT * FROM posts WHERE id = $1";
        analyzer.record(sql);
        assert_eq!(analyzer.repeats(sql), 1);
        analyzer.reset();
        assert_eq!(analyzer.repeats(sql), 0);
    }
}
