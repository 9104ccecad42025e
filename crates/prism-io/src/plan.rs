//! Plan loading: a stream of JSON records, one per image.
//!
//! ```text
//! {"inPath": "IMG_2029.png", "outPath": "IMG_2029_Out.png", "effects": ["S", "B"]}
//! {"inPath": "IMG_2030.png", "outPath": "IMG_2030_Out.png", "effects": []}
//! ```
//!
//! Records are usually one per line, but any whitespace between them is
//! accepted, blank lines included.

use std::path::{Path, PathBuf};

use prism_pipeline::PlanRecord;

/// Errors that can occur while loading a plan.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// The plan file could not be read.
    #[error("failed to read plan {}: {source}", path.display())]
    Io {
        /// Path of the plan file.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A record is not valid JSON or does not match the record shape
    /// (including unknown effect codes).
    #[error("invalid plan record at line {line}: {source}")]
    Parse {
        /// 1-based line on which the bad record was detected.
        line: usize,
        /// Underlying JSON failure.
        #[source]
        source: serde_json::Error,
    },
}

/// Parse every record in `text`, in order.
///
/// # Errors
///
/// Returns [`PlanError::Parse`] at the first malformed record.
pub fn parse_plan(text: &str) -> Result<Vec<PlanRecord>, PlanError> {
    serde_json::Deserializer::from_str(text)
        .into_iter::<PlanRecord>()
        .map(|record| {
            record.map_err(|source| PlanError::Parse {
                line: source.line(),
                source,
            })
        })
        .collect()
}

/// Read and parse the plan file at `path`.
///
/// # Errors
///
/// Returns [`PlanError::Io`] if the file cannot be read and
/// [`PlanError::Parse`] if a record is malformed.
pub fn load_plan(path: &Path) -> Result<Vec<PlanRecord>, PlanError> {
    let text = std::fs::read_to_string(path).map_err(|source| PlanError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let records = parse_plan(&text)?;
    log::debug!("loaded {} plan records from {}", records.len(), path.display());
    Ok(records)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use prism_pipeline::Effect;

    use super::*;

    #[test]
    fn parses_records_in_order_and_skips_blank_lines() {
        let text = concat!(
            "{\"inPath\": \"a.png\", \"outPath\": \"a_Out.png\", \"effects\": [\"G\", \"B\"]}\n",
            "\n",
            "{\"inPath\": \"b.png\", \"outPath\": \"b_Out.png\", \"effects\": []}\n",
            "   \n",
        );
        let records = parse_plan(text).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].in_path, "a.png");
        assert_eq!(records[0].effects, vec![Effect::Grayscale, Effect::Blur]);
        assert_eq!(records[1].in_path, "b.png");
        assert!(records[1].effects.is_empty());
    }

    #[test]
    fn empty_plan_has_no_records() {
        assert!(parse_plan("").unwrap().is_empty());
        assert!(parse_plan("\n\n").unwrap().is_empty());
    }

    #[test]
    fn unknown_effect_reports_its_line() {
        let text = concat!(
            "{\"inPath\": \"a.png\", \"effects\": [\"S\"]}\n",
            "{\"inPath\": \"b.png\", \"effects\": [\"Q\"]}\n",
        );
        let err = parse_plan(text).unwrap_err();
        assert!(matches!(err, PlanError::Parse { line: 2, .. }), "{err}");
    }

    #[test]
    fn load_reads_plan_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("effects.txt");
        std::fs::write(&path, "{\"inPath\": \"x.png\", \"effects\": [\"E\"]}\n").unwrap();
        let records = load_plan(&path).unwrap();
        assert_eq!(records[0].effects, vec![Effect::EdgeDetect]);

        let missing = load_plan(&dir.path().join("nope.txt")).unwrap_err();
        assert!(matches!(missing, PlanError::Io { .. }));
    }
}
