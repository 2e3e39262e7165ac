//! Fixed-keyword query answering over a (possibly filtered) dataset.
//!
//! Matching is case-insensitive substring containment, checked in priority
//! order. There is no language understanding; a new question type needs a new
//! [`QueryKind`] variant and keyword.

use crate::dataset::{Dataset, Record};

/// Answer for data-derived questions when there is nothing to compare.
pub const NOT_AVAILABLE: &str = "N/A";

pub const HELP: &str =
    "I can help you by telling you about the 'best model', 'worst model', or the 'WER-BLEU tradeoff'.";

pub const TRADEOFF_EXPLANATION: &str = "In speech recognition, WER (Word Error Rate) and BLEU (Bilingual Evaluation Understudy) \
often have an inverse relationship. Generally, models with lower WER are better as they \
indicate fewer errors. Higher BLEU scores are also better, indicating higher quality \
transcriptions. \n\nHowever, improving one metric might sometimes lead to a slight decrease \
in the other, indicating a trade-off. It's important to consider both when evaluating models.";

/// The supported question types, in matching priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    BestModel,
    WorstModel,
    Tradeoff,
    Help,
}

impl QueryKind {
    /// Classify free text. Earlier kinds win when several keywords appear.
    pub fn classify(text: &str) -> Self {
        let text = text.to_lowercase();
        if text.contains("best model") {
            QueryKind::BestModel
        } else if text.contains("worst model") {
            QueryKind::WorstModel
        } else if text.contains("wer-bleu tradeoff") || text.contains("tradeoff") {
            QueryKind::Tradeoff
        } else {
            QueryKind::Help
        }
    }
}

/// Answer `text` against `dataset`.
pub fn respond(text: &str, dataset: &Dataset) -> String {
    let kind = QueryKind::classify(text);
    tracing::debug!(?kind, records = dataset.len(), "answering query");
    match kind {
        QueryKind::BestModel => best_model(dataset),
        QueryKind::WorstModel => worst_model(dataset),
        QueryKind::Tradeoff => explain_tradeoff(dataset),
        QueryKind::Help => HELP.to_string(),
    }
}

/// Lowest WER and highest BLEU.
pub fn best_model(dataset: &Dataset) -> String {
    let wer = min_by_metric(dataset, Record::wer);
    let bleu = max_by_metric(dataset, Record::bleu);
    describe_extremes("best", "Best", wer, bleu)
}

/// Highest WER and lowest BLEU.
pub fn worst_model(dataset: &Dataset) -> String {
    let wer = max_by_metric(dataset, Record::wer);
    let bleu = min_by_metric(dataset, Record::bleu);
    describe_extremes("worst", "Worst", wer, bleu)
}

/// Static explanation; only the empty check depends on the data.
pub fn explain_tradeoff(dataset: &Dataset) -> String {
    if dataset.is_empty() {
        return NOT_AVAILABLE.to_string();
    }
    TRADEOFF_EXPLANATION.to_string()
}

fn describe_extremes(
    word: &str,
    title: &str,
    wer: Option<(&Record, f64)>,
    bleu: Option<(&Record, f64)>,
) -> String {
    let (Some((wer_rec, wer)), Some((bleu_rec, bleu))) = (wer, bleu) else {
        return NOT_AVAILABLE.to_string();
    };
    if wer_rec.run_id == bleu_rec.run_id {
        format!(
            "The {word} overall model is {} with WER: {wer:.4} and BLEU: {bleu:.2}.",
            wer_rec.run_id
        )
    } else {
        format!(
            "{title} WER: {} ({wer:.4}). {title} BLEU: {} ({bleu:.2}).",
            wer_rec.run_id, bleu_rec.run_id
        )
    }
}

// Ties resolve to the first record in dataset order.
fn min_by_metric<'a>(
    dataset: &'a Dataset,
    metric: fn(&Record) -> Option<f64>,
) -> Option<(&'a Record, f64)> {
    extreme_by(dataset, metric, |candidate, current| candidate < current)
}

fn max_by_metric<'a>(
    dataset: &'a Dataset,
    metric: fn(&Record) -> Option<f64>,
) -> Option<(&'a Record, f64)> {
    extreme_by(dataset, metric, |candidate, current| candidate > current)
}

fn extreme_by<'a>(
    dataset: &'a Dataset,
    metric: fn(&Record) -> Option<f64>,
    better: fn(f64, f64) -> bool,
) -> Option<(&'a Record, f64)> {
    let mut best: Option<(&'a Record, f64)> = None;
    for record in dataset {
        let Some(value) = metric(record) else {
            continue;
        };
        match best {
            Some((_, current)) if !better(value, current) => {}
            _ => best = Some((record, value)),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{record, RunId};
    use std::collections::BTreeMap;

    fn scenario() -> Dataset {
        Dataset::new(vec![
            record("eager-haze_8f60d6", 0.21, 31.5),
            record("smart-smoke_32849d", 0.18, 29.0),
        ])
    }

    #[test]
    fn classify_priority_and_case() {
        assert_eq!(QueryKind::classify("Who is the BEST MODEL?"), QueryKind::BestModel);
        assert_eq!(QueryKind::classify("worst model please"), QueryKind::WorstModel);
        assert_eq!(
            QueryKind::classify("best model vs worst model"),
            QueryKind::BestModel
        );
        assert_eq!(
            QueryKind::classify("explain the WER-BLEU Tradeoff"),
            QueryKind::Tradeoff
        );
        assert_eq!(QueryKind::classify("any tradeoff?"), QueryKind::Tradeoff);
        assert_eq!(QueryKind::classify("trade-off"), QueryKind::Help);
        assert_eq!(QueryKind::classify("bestmodel"), QueryKind::Help);
        assert_eq!(QueryKind::classify(""), QueryKind::Help);
    }

    #[test]
    fn best_model_split_winners() {
        assert_eq!(
            respond("best model", &scenario()),
            "Best WER: smart-smoke_32849d (0.1800). Best BLEU: eager-haze_8f60d6 (31.50)."
        );
    }

    #[test]
    fn worst_model_split_winners() {
        assert_eq!(
            respond("worst model", &scenario()),
            "Worst WER: eager-haze_8f60d6 (0.2100). Worst BLEU: smart-smoke_32849d (29.00)."
        );
    }

    #[test]
    fn single_record_gets_combined_sentence() {
        let ds = Dataset::new(vec![record("solo_abcdef", 0.123456, 42.0)]);
        assert_eq!(
            respond("best model", &ds),
            "The best overall model is solo_abcdef with WER: 0.1235 and BLEU: 42.00."
        );
        assert_eq!(
            respond("worst model", &ds),
            "The worst overall model is solo_abcdef with WER: 0.1235 and BLEU: 42.00."
        );
    }

    #[test]
    fn same_winner_across_several_records_is_combined() {
        let ds = Dataset::new(vec![
            record("a_1", 0.30, 20.0),
            record("b_2", 0.10, 40.0),
            record("c_3", 0.20, 30.0),
        ]);
        assert_eq!(
            best_model(&ds),
            "The best overall model is b_2 with WER: 0.1000 and BLEU: 40.00."
        );
        assert_eq!(
            worst_model(&ds),
            "The worst overall model is a_1 with WER: 0.3000 and BLEU: 20.00."
        );
    }

    #[test]
    fn ties_go_to_first_record() {
        let ds = Dataset::new(vec![record("a_1", 0.2, 30.0), record("b_2", 0.2, 30.0)]);
        assert!(best_model(&ds).contains("a_1"));
        assert!(worst_model(&ds).contains("a_1"));
    }

    #[test]
    fn empty_dataset_returns_sentinel() {
        let empty = Dataset::default();
        assert_eq!(respond("best model", &empty), NOT_AVAILABLE);
        assert_eq!(respond("worst model", &empty), NOT_AVAILABLE);
        assert_eq!(respond("tradeoff", &empty), NOT_AVAILABLE);
        assert_eq!(respond("hello", &empty), HELP);
    }

    #[test]
    fn tradeoff_is_static() {
        assert_eq!(respond("wer-bleu tradeoff", &scenario()), TRADEOFF_EXPLANATION);
        let other = Dataset::new(vec![record("x_1", 0.9, 1.0)]);
        assert_eq!(explain_tradeoff(&other), explain_tradeoff(&scenario()));
    }

    #[test]
    fn unrecognized_query_returns_help() {
        assert_eq!(respond("how many runs?", &scenario()), HELP);
    }

    #[test]
    fn missing_metric_yields_sentinel() {
        let mut metrics = BTreeMap::new();
        metrics.insert("wer".to_string(), 0.2);
        let ds = Dataset::new(vec![Record::new(RunId::from("only-wer_1"), metrics)]);
        assert_eq!(best_model(&ds), NOT_AVAILABLE);
    }

    #[test]
    fn records_without_a_metric_are_skipped() {
        let mut metrics = BTreeMap::new();
        metrics.insert("wer".to_string(), 0.01);
        let ds = Dataset::new(vec![
            Record::new(RunId::from("wer-only_1"), metrics),
            record("full_2", 0.2, 30.0),
        ]);
        assert_eq!(
            best_model(&ds),
            "Best WER: wer-only_1 (0.0100). Best BLEU: full_2 (30.00)."
        );
    }
}
