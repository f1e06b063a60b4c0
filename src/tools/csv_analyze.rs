//! CSV Analysis Tool
//!
//! Profiles a CSV file into a markdown report: shape, per-column type
//! inference, numeric summaries, and top value counts for categorical
//! columns. Reads at most the first 10,000 data rows.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;

use drafthorse_tools::{names, ResearchTool};

/// Maximum data rows analyzed
const MAX_ROWS: usize = 10_000;

/// Fraction of parseable values required to call a column numeric
const NUMERIC_THRESHOLD: f64 = 0.8;

/// Top values reported per categorical column
const TOP_K_VALUES: usize = 5;

/// The `analyze_csv` tool.
pub struct AnalyzeCsvTool;

#[async_trait]
impl ResearchTool for AnalyzeCsvTool {
    fn name(&self) -> &str {
        names::ANALYZE_CSV
    }

    fn description(&self) -> &str {
        "Profile a local CSV file: shape, column types, numeric summaries, top values. Arguments: {\"path\": \"/abs/path/data.csv\"}"
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let path_str = args
            .get("path")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "Missing 'path' argument".to_string())?;

        let content = std::fs::read_to_string(Path::new(path_str))
            .map_err(|e| format!("Failed to read CSV: {}", e))?;

        analyze_csv(path_str, &content)
    }
}

/// Build the analysis report for CSV content.
pub fn analyze_csv(path: &str, content: &str) -> Result<String, String> {
    let mut lines = content.lines();
    let header_line = lines.next().ok_or_else(|| "CSV file is empty".to_string())?;
    let headers = split_csv_line(header_line);
    if headers.is_empty() {
        return Err("CSV header row is empty".to_string());
    }

    let mut rows: Vec<Vec<String>> = Vec::new();
    for line in lines {
        if rows.len() >= MAX_ROWS {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }
        rows.push(split_csv_line(line));
    }

    let mut output = format!(
        "CSV Analysis: {}\n\nShape: {} rows x {} columns\n\n",
        path,
        rows.len(),
        headers.len()
    );

    for (col_idx, header) in headers.iter().enumerate() {
        let values: Vec<&str> = rows
            .iter()
            .map(|row| row.get(col_idx).map(|s| s.as_str()).unwrap_or(""))
            .filter(|s| !s.trim().is_empty())
            .collect();

        let numeric: Vec<f64> = values.iter().filter_map(|v| v.trim().parse().ok()).collect();

        let is_numeric = !values.is_empty()
            && (numeric.len() as f64 / values.len() as f64) > NUMERIC_THRESHOLD;

        if is_numeric {
            output.push_str(&format!("## Column: {} (numeric)\n", header));
            output.push_str(&numeric_summary(&numeric));
        } else {
            output.push_str(&format!("## Column: {} (categorical)\n", header));
            output.push_str(&top_value_counts(&values));
        }
        output.push('\n');
    }

    Ok(output.trim_end().to_string())
}

/// Split one CSV line into fields, honoring double-quoted fields with `""`
/// escapes.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                fields.push(field.trim().to_string());
                field = String::new();
            }
            _ => field.push(ch),
        }
    }
    fields.push(field.trim().to_string());
    fields
}

/// Render count/mean/std/min/q25/median/q75/max for a numeric column.
fn numeric_summary(values: &[f64]) -> String {
    if values.is_empty() {
        return "(no numeric values)\n".to_string();
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let count = sorted.len();
    let mean = sorted.iter().sum::<f64>() / count as f64;
    let std = if count > 1 {
        let variance =
            sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count as f64 - 1.0);
        variance.sqrt()
    } else {
        0.0
    };

    format!(
        "- count: {}\n- mean: {:.4}\n- std: {:.4}\n- min: {:.4}\n- 25%: {:.4}\n- 50%: {:.4}\n- 75%: {:.4}\n- max: {:.4}\n",
        count,
        mean,
        std,
        sorted[0],
        quantile(&sorted, 0.25),
        quantile(&sorted, 0.5),
        quantile(&sorted, 0.75),
        sorted[count - 1],
    )
}

/// Linear-interpolated quantile over a sorted slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let frac = pos - lower as f64;
        sorted[lower] * (1.0 - frac) + sorted[upper] * frac
    }
}

/// Render top-K value counts for a categorical column.
fn top_value_counts(values: &[&str]) -> String {
    if values.is_empty() {
        return "(no values)\n".to_string();
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in values {
        *counts.entry(value.trim()).or_insert(0) += 1;
    }

    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let mut output = format!("Top values ({} unique):\n", ranked.len());
    for (value, count) in ranked.iter().take(TOP_K_VALUES) {
        output.push_str(&format!("- {}: {}\n", value, count));
    }
    output
}
