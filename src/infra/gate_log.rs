// ============================================================
// Layer 6 — Gate Usage Logger
// ============================================================
// Appends one CSV row per forward pass so gate behaviour can be
// compared across runs and precision settings.
//
// Output file: <dir>/gate_usage.csv
//
//   pass,batch_size,decisions,execution_rate,mean_probability,downsamples
//   1,4,4,0.625000,0.512345,2
//   2,4,4,0.750000,0.530112,2
//
// execution_rate and mean_probability are averaged over every
// reported decision of the pass.
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::domain::summary::GateSummary;

const HEADER: &str = "pass,batch_size,decisions,execution_rate,mean_probability,downsamples";

pub struct GateUsageLogger {
    csv_path: PathBuf,
}

impl GateUsageLogger {
    /// Writes the header only when the file is new, so runs accumulate.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create stats directory '{}'", dir.display()))?;

        let csv_path = dir.join("gate_usage.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!(path = %csv_path.display(), "Created gate usage CSV");
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, pass: usize, summary: &GateSummary) -> Result<()> {
        let mut f = OpenOptions::new().append(true).open(&self.csv_path)?;
        writeln!(
            f,
            "{},{},{},{:.6},{:.6},{}",
            pass,
            summary.batch_size,
            summary.decisions(),
            summary.overall_execution_rate(),
            summary.overall_mean_probability(),
            summary.downsample_count(),
        )?;

        tracing::debug!(
            pass,
            execution_rate = summary.overall_execution_rate(),
            "Logged gate usage"
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> GateSummary {
        GateSummary::from_decisions(
            4,
            &[vec![1.0, 1.0, 0.0, 1.0], vec![0.0, 0.0, 1.0, 1.0]],
            &[vec![0.5; 4], vec![0.25; 4]],
            vec![false, false, true],
        )
    }

    #[test]
    fn test_rows_append_below_single_header() {
        let dir = tempfile::tempdir().unwrap();

        let logger = GateUsageLogger::new(dir.path()).unwrap();
        logger.log(1, &summary()).unwrap();
        // reopening must not repeat the header
        let logger = GateUsageLogger::new(dir.path()).unwrap();
        logger.log(2, &summary()).unwrap();

        let text  = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec![
            HEADER,
            "1,4,2,0.625000,0.375000,1",
            "2,4,2,0.625000,0.375000,1",
        ]);
    }
}
