//! Relation classifier subprocess interface.
//!
//! The trained classifiers are external batch predictors: they read a file
//! of tab-separated feature records and write one numeric label per input
//! line. This module owns the record codec and the subprocess invocation;
//! the models themselves are opaque.
//!
//! Record line format:
//! `label\trecord_id\t{index}&&{word}&&{lemma}&&{pos}&&{ner}&&{role} ...`
//! with one `&&`-joined group per sentence token (trailing space included),
//! token indices 0-based, and the role marker `A` on the target side, `T`
//! on the component side, `O` elsewhere.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use lithos_core::{ClassifierConfig, ConfigError, LithosError, Result, Sentence, TokenSpan};

/// Batch label prediction over pre-encoded feature records.
pub trait ContainsClassifier: Send + Sync {
    /// Predict one numeric label per record line.
    ///
    /// Labels: `0.0` no relation, `1.0` the A-side contains the T-side,
    /// `2.0` the reverse direction.
    fn predict(&self, records: &[String]) -> Result<Vec<f32>>;
}

/// Encode one record for a (target token, component token) pair.
pub fn encode_pair_record(
    record_id: &str,
    label: i32,
    sentence: &Sentence,
    target_index: usize,
    component_index: usize,
) -> String {
    encode_record(record_id, label, sentence, |index| {
        if index == target_index {
            'A'
        } else if index == component_index {
            'T'
        } else {
            'O'
        }
    })
}

/// Encode one record for a single entity span, marked with `T`.
pub fn encode_span_record(
    record_id: &str,
    label: i32,
    sentence: &Sentence,
    span: TokenSpan,
) -> String {
    encode_record(record_id, label, sentence, |index| {
        if index >= span.begin && index < span.end {
            'T'
        } else {
            'O'
        }
    })
}

fn encode_record(
    record_id: &str,
    label: i32,
    sentence: &Sentence,
    role: impl Fn(usize) -> char,
) -> String {
    let mut body = String::new();
    for token in &sentence.tokens {
        let ner = token.ner.map(|l| l.as_str()).unwrap_or("O");
        let _ = write!(
            body,
            "{}&&{}&&{}&&{}&&{}&&{} ",
            token.index,
            token.word,
            token.lemma,
            token.pos,
            ner,
            role(token.index)
        );
    }
    format!("{label}\t{record_id}\t{body}\n")
}

/// Classifier backed by an external process.
pub struct SubprocessClassifier {
    command: String,
    args: Vec<String>,
    model: PathBuf,
    tmp_dir: PathBuf,
}

impl SubprocessClassifier {
    /// Build a classifier around the configured command and a model file.
    /// A missing model file is a fatal configuration error.
    pub fn new(config: &ClassifierConfig, model: &Path) -> Result<Self> {
        if !model.exists() {
            return Err(ConfigError::ModelNotFound(model.to_path_buf()).into());
        }
        Ok(Self {
            command: config.command.clone(),
            args: config.args.clone(),
            model: model.to_path_buf(),
            tmp_dir: config.tmp_dir.clone(),
        })
    }

    fn io_paths(&self) -> (PathBuf, PathBuf) {
        let pid = std::process::id();
        (
            self.tmp_dir.join(format!("classifier-input-{pid}.txt")),
            self.tmp_dir.join(format!("classifier-output-{pid}.txt")),
        )
    }
}

impl ContainsClassifier for SubprocessClassifier {
    fn predict(&self, records: &[String]) -> Result<Vec<f32>> {
        let (in_path, out_path) = self.io_paths();
        std::fs::write(&in_path, records.concat())
            .map_err(|e| LithosError::service("classifier", format!("write input: {e}")))?;

        let status = Command::new(&self.command)
            .args(&self.args)
            .arg(&in_path)
            .arg(&self.model)
            .arg(&out_path)
            .stdout(Stdio::null())
            .status()
            .map_err(|e| {
                LithosError::service("classifier", format!("failed to run {}: {e}", self.command))
            })?;

        if !status.success() {
            tracing::warn!(%status, command = %self.command, "classifier exited abnormally");
        }

        // The predictor signals failure by not producing its output file.
        let output = std::fs::read_to_string(&out_path).map_err(|_| {
            LithosError::service(
                "classifier",
                format!("no output at {}; the run likely failed", out_path.display()),
            )
        })?;

        let labels = output
            .lines()
            .map(|line| {
                line.trim().parse::<f32>().map_err(|_| {
                    LithosError::service("classifier", format!("unparseable label {line:?}"))
                })
            })
            .collect::<Result<Vec<f32>>>()?;

        let _ = std::fs::remove_file(&in_path);
        let _ = std::fs::remove_file(&out_path);

        if labels.len() != records.len() {
            return Err(LithosError::service(
                "classifier",
                format!("{} labels for {} records", labels.len(), records.len()),
            ));
        }
        Ok(labels)
    }
}
