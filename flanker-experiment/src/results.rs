use crate::error::ResultsError;
use flanker_core::TrialOutcome;
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};

/// Which part of the session a trial belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockLabel {
    Training,
    Block(usize),
}

impl fmt::Display for BlockLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockLabel::Training => f.write_str("training"),
            BlockLabel::Block(n) => write!(f, "{n}"),
        }
    }
}

impl Serialize for BlockLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            BlockLabel::Training => serializer.serialize_str("training"),
            BlockLabel::Block(n) => serializer.serialize_u64(*n as u64),
        }
    }
}

/// One row of the results table: identifier triple, then the outcome.
///
/// Serialized keys are exactly [`ResultRow::HEADER`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    #[serde(rename = "PART_ID")]
    pub participant: String,
    #[serde(rename = "block no")]
    pub block: BlockLabel,
    #[serde(rename = "trial no")]
    pub trial_no: usize,
    #[serde(flatten)]
    pub outcome: TrialOutcome,
}

impl ResultRow {
    pub const HEADER: [&'static str; 10] = [
        "PART_ID",
        "block no",
        "trial no",
        TrialOutcome::FIELD_NAMES[0],
        TrialOutcome::FIELD_NAMES[1],
        TrialOutcome::FIELD_NAMES[2],
        TrialOutcome::FIELD_NAMES[3],
        TrialOutcome::FIELD_NAMES[4],
        TrialOutcome::FIELD_NAMES[5],
        TrialOutcome::FIELD_NAMES[6],
    ];
}

#[derive(Serialize)]
struct ResultsFile<'a> {
    header: [&'static str; 10],
    rows: &'a [ResultRow],
}

/// Reaction-time summary over answered trials.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultsSummary {
    pub trials: usize,
    pub answered: usize,
    pub mean_rt: f64,
    pub min_rt: f64,
    pub max_rt: f64,
}

impl ResultsSummary {
    pub fn response_rate(&self) -> f64 {
        self.answered as f64 / self.trials as f64 * 100.0
    }
}

/// Session-long, append-only results table.
///
/// Written out by [`ResultsLog::flush`]. If the log is dropped without a
/// successful flush (for example while unwinding), it flushes itself.
#[derive(Debug)]
pub struct ResultsLog {
    participant: String,
    dir: PathBuf,
    rows: Vec<ResultRow>,
    written_to: Option<PathBuf>,
    dirty: bool,
}

impl ResultsLog {
    pub fn new(participant: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            participant: participant.into(),
            dir: dir.into(),
            rows: Vec::new(),
            written_to: None,
            dirty: false,
        }
    }

    pub fn participant(&self) -> &str {
        &self.participant
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn push(&mut self, block: BlockLabel, trial_no: usize, outcome: TrialOutcome) {
        self.rows.push(ResultRow {
            participant: self.participant.clone(),
            block,
            trial_no,
            outcome,
        });
        self.dirty = true;
    }

    /// Where the log was last written, if anywhere.
    pub fn path(&self) -> Option<&Path> {
        self.written_to.as_deref()
    }

    /// Write every row collected so far. Repeated flushes rewrite the same file.
    pub fn flush(&mut self) -> Result<PathBuf, ResultsError> {
        let path = match self.written_to.take() {
            Some(path) => path,
            None => self.dir.join(format!(
                "{}_{}_beh.json",
                self.participant,
                rand::random_range(100..1000)
            )),
        };
        let result = self.write_to(&path);
        self.written_to = Some(path.clone());
        result?;
        self.dirty = false;
        tracing::info!(path = %path.display(), rows = self.rows.len(), "results saved");
        Ok(path)
    }

    fn write_to(&self, path: &Path) -> Result<(), ResultsError> {
        let create_err = |source: std::io::Error| ResultsError::Create {
            path: path.to_path_buf(),
            source,
        };
        std::fs::create_dir_all(&self.dir).map_err(create_err)?;
        let file = std::fs::File::create(path).map_err(create_err)?;
        let doc = ResultsFile {
            header: ResultRow::HEADER,
            rows: &self.rows,
        };
        let mut writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &doc).map_err(|source| ResultsError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        let file = writer.into_inner().map_err(|e| ResultsError::Flush {
            path: path.to_path_buf(),
            source: e.into_error(),
        })?;
        file.sync_data().map_err(|source| ResultsError::Flush {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn summary(&self) -> Option<ResultsSummary> {
        if self.rows.is_empty() {
            return None;
        }
        let times: Vec<f64> = self
            .rows
            .iter()
            .filter(|r| !r.outcome.is_timeout())
            .map(|r| r.outcome.reaction_time)
            .collect();
        let mean = if times.is_empty() {
            0.0
        } else {
            times.iter().sum::<f64>() / times.len() as f64
        };
        Some(ResultsSummary {
            trials: self.rows.len(),
            answered: times.len(),
            mean_rt: mean,
            min_rt: times.iter().copied().fold(f64::INFINITY, f64::min),
            max_rt: times.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
    }
}

impl Drop for ResultsLog {
    fn drop(&mut self) {
        if self.dirty {
            if let Err(e) = self.flush() {
                tracing::error!(error = %e, "failed to save results on shutdown");
            }
        }
    }
}
