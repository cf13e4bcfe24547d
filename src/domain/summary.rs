// ============================================================
// Layer 3 — Gate Summary
// ============================================================
// Plain-number view of one forward pass, detached from any
// tensor backend. Computed from the returned decisions:
//
//   execution_rate[i]    fraction of the batch whose mask i is 1
//   mean_probability[i]  batch mean of probability i
//   downsampled[j]       whether block j projected `prev`
//
// Used by the CLI report and the CSV gate-usage log.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateSummary {
    pub batch_size:       usize,
    pub execution_rate:   Vec<f32>,
    pub mean_probability: Vec<f32>,
    pub downsampled:      Vec<bool>,
}

impl GateSummary {
    /// Build a summary from per-decision value lists, each of length `batch_size`.
    pub fn from_decisions(
        batch_size:  usize,
        masks:       &[Vec<f32>],
        probs:       &[Vec<f32>],
        downsampled: Vec<bool>,
    ) -> Self {
        Self {
            batch_size,
            execution_rate:   masks.iter().map(|m| mean(m)).collect(),
            mean_probability: probs.iter().map(|p| mean(p)).collect(),
            downsampled,
        }
    }

    pub fn decisions(&self) -> usize {
        self.execution_rate.len()
    }

    /// Mean execution rate over all reported decisions.
    /// A pass without reported decisions executed everything.
    pub fn overall_execution_rate(&self) -> f32 {
        if self.execution_rate.is_empty() {
            1.0
        } else {
            mean(&self.execution_rate)
        }
    }

    pub fn overall_mean_probability(&self) -> f32 {
        if self.mean_probability.is_empty() {
            1.0
        } else {
            mean(&self.mean_probability)
        }
    }

    /// Expected number of (sample, block) evaluations that were bypassed.
    pub fn skipped_evaluations(&self) -> f32 {
        self.execution_rate
            .iter()
            .map(|rate| (1.0 - rate) * self.batch_size as f32)
            .sum()
    }

    pub fn downsample_count(&self) -> usize {
        self.downsampled.iter().filter(|&&d| d).count()
    }
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f32>() / values.len() as f32
}
