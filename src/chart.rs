//! Chart-ready projections of the dataset.
//!
//! The dashboard draws; this module only decides which points go on which axis.
//! Each chart kind is a variant of [`Chart`] and every variant renders to the
//! same [`ChartData`] shape.

use crate::config::ValidationError;
use crate::dataset::{Dataset, BLEU, WER};
use serde::Serialize;

/// Metrics a bar chart can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Wer,
    Bleu,
}

impl Metric {
    pub fn key(self) -> &'static str {
        match self {
            Metric::Wer => WER,
            Metric::Bleu => BLEU,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Metric::Wer => "WER",
            Metric::Bleu => "BLEU",
        }
    }
}

impl std::str::FromStr for Metric {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wer" => Ok(Metric::Wer),
            "bleu" => Ok(Metric::Bleu),
            _ => Err(ValidationError::new("metric", s, "'wer' or 'bleu'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chart {
    /// WER on x, BLEU on y, one point per run.
    Scatter,
    /// One bar per run for a single metric.
    Bar { metric: Metric },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Scatter,
    Bar,
}

/// A labelled point. For bar charts `x` is unused and the label is the category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub run_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub kind: ChartKind,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub points: Vec<ChartPoint>,
}

impl Chart {
    pub fn kind(&self) -> ChartKind {
        match self {
            Chart::Scatter => ChartKind::Scatter,
            Chart::Bar { .. } => ChartKind::Bar,
        }
    }

    pub fn title(&self) -> String {
        match self {
            Chart::Scatter => "WER vs BLEU per Run ID".to_string(),
            Chart::Bar { metric } => format!("{} per Run ID", metric.label()),
        }
    }

    /// Project `dataset` onto this chart. Records lacking a needed metric are left out.
    pub fn render(&self, dataset: &Dataset) -> ChartData {
        let (x_label, y_label, points) = match self {
            Chart::Scatter => {
                let points = dataset
                    .iter()
                    .filter_map(|r| {
                        Some(ChartPoint {
                            run_id: r.run_id.to_string(),
                            x: Some(r.wer()?),
                            y: r.bleu()?,
                        })
                    })
                    .collect();
                (Metric::Wer.label(), Metric::Bleu.label(), points)
            }
            Chart::Bar { metric } => {
                let points = dataset
                    .iter()
                    .filter_map(|r| {
                        Some(ChartPoint {
                            run_id: r.run_id.to_string(),
                            x: None,
                            y: r.metric(metric.key())?,
                        })
                    })
                    .collect();
                ("Run ID", metric.label(), points)
            }
        };

        ChartData {
            kind: self.kind(),
            title: self.title(),
            x_label: x_label.to_string(),
            y_label: y_label.to_string(),
            points,
        }
    }
}
