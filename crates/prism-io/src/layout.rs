//! On-disk layout of a data root.
//!
//! ```text
//! <root>/effects.txt          plan shared by every tag
//! <root>/in/<tag>/<file>      sources
//! <root>/out/<tag>_<file>     results
//! ```

use std::path::{Path, PathBuf};

use prism_pipeline::{Batch, Job, PlanRecord};

/// Paths of one data root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    root: PathBuf,
    plan: Option<PathBuf>,
}

impl DataLayout {
    /// Default data root, relative to the working directory.
    pub const DEFAULT_ROOT: &'static str = "../data";

    /// File name of the plan inside the root.
    pub const PLAN_FILE: &'static str = "effects.txt";

    /// Layout rooted at `root`, reading the plan from `<root>/effects.txt`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            plan: None,
        }
    }

    /// Read the plan from `plan` instead of the root's plan file.
    #[must_use]
    pub fn with_plan(mut self, plan: impl Into<PathBuf>) -> Self {
        self.plan = Some(plan.into());
        self
    }

    /// The data root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the plan is read from.
    #[must_use]
    pub fn plan_path(&self) -> PathBuf {
        self.plan
            .clone()
            .unwrap_or_else(|| self.root.join(Self::PLAN_FILE))
    }

    /// Source path of `file` under `tag`.
    #[must_use]
    pub fn input_path(&self, tag: &str, file: &str) -> PathBuf {
        self.root.join("in").join(tag).join(file)
    }

    /// Directory all results are written to.
    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        self.root.join("out")
    }

    /// Result path of `file` under `tag`.
    #[must_use]
    pub fn output_path(&self, tag: &str, file: &str) -> PathBuf {
        self.output_dir().join(format!("{tag}_{file}"))
    }

    /// Create the output directory if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the directory cannot be created.
    pub fn prepare_output(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.output_dir())
    }

    /// Turn the plan into the batch for `tag`, one job per record, in plan
    /// order.
    ///
    /// Output names derive from the record's input name; its `outPath` is
    /// not used.
    #[must_use]
    pub fn batch(&self, tag: &str, records: &[PlanRecord]) -> Batch {
        let jobs = records
            .iter()
            .map(|record| Job {
                name: record.in_path.clone(),
                input: self.input_path(tag, &record.in_path),
                output: self.output_path(tag, &record.in_path),
                effects: record.effects.clone(),
            })
            .collect();
        Batch {
            tag: tag.to_owned(),
            jobs,
        }
    }
}

impl Default for DataLayout {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ROOT)
    }
}

/// Split a `+`-separated list of data-directory tags, dropping empty
/// entries.
#[must_use]
pub fn split_tags(arg: &str) -> Vec<String> {
    arg.split('+')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_owned)
        .collect()
}
