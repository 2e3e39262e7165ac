/// Plain-text rendering of the dataset for `flmetrics inspect`.
use crate::dataset::{Dataset, BLEU, WER};
use chrono::{DateTime, Local};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::SystemTime;

/// Metric columns in display order: wer, bleu, then pass-through metrics sorted by name.
pub fn metric_columns(dataset: &Dataset) -> Vec<String> {
    let names: BTreeSet<&str> = dataset
        .iter()
        .flat_map(|r| r.metrics.keys().map(String::as_str))
        .collect();

    let mut columns = Vec::with_capacity(names.len());
    for fixed in [WER, BLEU] {
        if names.contains(fixed) {
            columns.push(fixed.to_string());
        }
    }
    columns.extend(
        names
            .into_iter()
            .filter(|n| *n != WER && *n != BLEU)
            .map(str::to_string),
    );
    columns
}

/// Fixed-width table, one row per record. Missing metrics print as `-`.
pub fn render_table(dataset: &Dataset) -> String {
    let columns = metric_columns(dataset);
    let rows: Vec<Vec<String>> = dataset
        .iter()
        .map(|r| {
            let mut row = vec![r.run_id.to_string()];
            row.extend(columns.iter().map(|c| match r.metric(c) {
                Some(v) => format_value(c, v),
                None => "-".to_string(),
            }));
            row
        })
        .collect();

    let mut header = vec!["run_id".to_string()];
    header.extend(columns.iter().cloned());

    let widths: Vec<usize> = (0..header.len())
        .map(|i| {
            rows.iter()
                .map(|row| row[i].len())
                .chain(std::iter::once(header[i].len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    for row in std::iter::once(&header).chain(rows.iter()) {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .enumerate()
            .map(|(i, (cell, &w))| {
                if i == 0 {
                    format!("{cell:<w$}")
                } else {
                    format!("{cell:>w$}")
                }
            })
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
    }
    out
}

fn format_value(metric: &str, value: f64) -> String {
    match metric {
        WER => format!("{value:.4}"),
        BLEU => format!("{value:.2}"),
        _ => value.to_string(),
    }
}

/// One-line summary: path, record count, last-modified time.
pub fn summary_line(path: &Path, dataset: &Dataset, modified: Option<SystemTime>) -> String {
    let modified = modified
        .map(|t| {
            DateTime::<Local>::from(t)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| "unknown".to_string());
    format!(
        "{}: {} record(s), modified {modified}",
        path.display(),
        dataset.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::record;

    #[test]
    fn columns_put_wer_and_bleu_first() {
        let mut r = record("a_1", 0.2, 30.0);
        r.metrics.insert("accuracy".to_string(), 0.9);
        r.metrics.insert("cer".to_string(), 0.1);
        assert_eq!(
            metric_columns(&Dataset::new(vec![r])),
            vec!["wer", "bleu", "accuracy", "cer"]
        );
    }

    #[test]
    fn table_aligns_and_marks_missing() {
        let mut extra = record("smart-smoke_32849d", 0.18, 29.0);
        extra.metrics.insert("rounds".to_string(), 40.0);
        let ds = Dataset::new(vec![record("eager-haze_8f60d6", 0.21, 31.5), extra]);
        let table = render_table(&ds);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "run_id                 wer   bleu  rounds");
        assert_eq!(lines[1], "eager-haze_8f60d6   0.2100  31.50       -");
        assert_eq!(lines[2], "smart-smoke_32849d  0.1800  29.00      40");
    }

    #[test]
    fn empty_dataset_prints_header_only() {
        assert_eq!(render_table(&Dataset::default()), "run_id\n");
    }

    #[test]
    fn summary_without_mtime() {
        let line = summary_line(Path::new("m.json"), &Dataset::default(), None);
        assert_eq!(line, "m.json: 0 record(s), modified unknown");
    }
}
