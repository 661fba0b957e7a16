//! On-disk layout of a batch: one directory per problem under a common base directory.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::batch::ProblemRecord;
use crate::error::LayoutError;
use crate::store::JsonFileStore;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProblemLayout {
    /// Only directories whose name starts with this prefix are problems.
    pub prefix: String,
    pub generated: String,
    pub reference: String,
    pub metadata: String,
}

impl Default for ProblemLayout {
    fn default() -> Self {
        ProblemLayout {
            prefix: String::from("problem_"),
            generated: String::from("sample_0_generated.s"),
            reference: String::from("unoptimized.s"),
            metadata: String::from("samples.json"),
        }
    }
}

/// Reads a blob that may be absent. A blob that exists but cannot be read is treated as absent and the
/// reason is recorded in `read_errors`.
fn read_optional(path: &Path, read_errors: &mut Vec<String>) -> Option<String> {
    match fs::read(path) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("Missing {path:?}");
            None
        },
        Err(e) => {
            debug!("Unable to read {path:?}: {e}");
            read_errors.push(format!("{path:?}: {e}"));
            None
        },
    }
}

impl ProblemLayout {
    /// Lists the problem directories in `base`, sorted by name.
    pub fn discover(&self, base: &Path) -> Result<Vec<PathBuf>, LayoutError> {
        if !base.is_dir() {
            return Err(LayoutError::MissingBaseDir(base.to_path_buf()));
        }

        let io_error = |source| LayoutError::Io {
            path: base.to_path_buf(),
            source,
        };

        let mut dirs = Vec::new();
        for entry in fs::read_dir(base).map_err(io_error)? {
            let entry = entry.map_err(io_error)?;
            let is_problem = entry.file_name().to_string_lossy().starts_with(&self.prefix);
            if is_problem && entry.path().is_dir() {
                dirs.push(entry.path());
            }
        }

        if dirs.is_empty() {
            return Err(LayoutError::NoProblemDirs {
                base: base.to_path_buf(),
                prefix: self.prefix.clone(),
            });
        }

        dirs.sort();
        info!("Found {} problem directories in {base:?}", dirs.len());
        Ok(dirs)
    }

    pub fn load_record(&self, dir: &Path) -> ProblemRecord {
        let id = dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut read_errors = Vec::new();
        let generated = read_optional(&dir.join(&self.generated), &mut read_errors);
        let reference = read_optional(&dir.join(&self.reference), &mut read_errors);

        ProblemRecord {
            read_errors,
            ..ProblemRecord::new(id, generated, reference)
        }
    }

    /// Loads every problem in `base`. Only a missing base directory or one without problems is an error;
    /// unreadable blobs end up in [`ProblemRecord::read_errors`].
    pub fn load_records(&self, base: &Path) -> Result<Vec<ProblemRecord>, LayoutError> {
        Ok(self.discover(base)?.iter().map(|dir| self.load_record(dir)).collect())
    }

    /// The metadata store of the problems in `base`.
    pub fn store(&self, base: &Path) -> JsonFileStore {
        JsonFileStore::new(base, self.metadata.clone())
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::batch::{run, BatchConfig};
    use crate::error::{Missing, ProblemWarning};

    fn problem(base: &Path, name: &str, generated: Option<&str>, reference: Option<&str>) {
        let dir = base.join(name);
        fs::create_dir(&dir).unwrap();
        if let Some(generated) = generated {
            fs::write(dir.join("sample_0_generated.s"), generated).unwrap();
        }

        if let Some(reference) = reference {
            fs::write(dir.join("unoptimized.s"), reference).unwrap();
        }
    }

    #[test]
    fn missing_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProblemLayout::default();
        assert!(matches!(
            layout.discover(&dir.path().join("nope")),
            Err(LayoutError::MissingBaseDir(_))
        ));
    }

    #[test]
    fn no_problem_dirs() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("other")).unwrap();
        fs::write(dir.path().join("problem_file"), "not a dir").unwrap();

        let layout = ProblemLayout::default();
        assert!(matches!(layout.discover(dir.path()), Err(LayoutError::NoProblemDirs { .. })));
    }

    #[test]
    fn loads_records_sorted() {
        let dir = tempfile::tempdir().unwrap();
        problem(dir.path(), "problem_2", None, Some("ret"));
        problem(dir.path(), "problem_1", Some("nop\nret"), Some("ret"));
        problem(dir.path(), "task_3", Some("ret"), Some("ret"));

        let records = ProblemLayout::default().load_records(dir.path()).unwrap();
        assert_eq!(
            records,
            vec![
                ProblemRecord::new("problem_1", Some(String::from("nop\nret")), Some(String::from("ret"))),
                ProblemRecord::new("problem_2", None, Some(String::from("ret"))),
            ]
        );
    }

    #[test]
    fn unreadable_blob_does_not_stop_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        problem(dir.path(), "problem_1", Some("ret"), Some("ret"));
        problem(dir.path(), "problem_2", None, Some("ret"));
        fs::create_dir(dir.path().join("problem_2/sample_0_generated.s")).unwrap();

        let records = ProblemLayout::default().load_records(dir.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].read_errors.is_empty());
        assert_eq!(records[1].generated, None);
        assert_eq!(records[1].reference.as_deref(), Some("ret"));
        assert_eq!(records[1].read_errors.len(), 1);
        assert!(records[1].read_errors[0].contains("sample_0_generated.s"));

        let report = run(&records, &BatchConfig::default()).unwrap();
        assert_eq!(report.scored(), 1);
        assert_eq!(report.skipped, 1);
        assert!(report.get("problem_1").is_some());
        assert!(matches!(
            &report.warnings[0],
            ProblemWarning::Unreadable { id, .. } if id == "problem_2"
        ));
        assert!(matches!(
            &report.warnings[1],
            ProblemWarning::MissingInput { id, missing: Missing::Generated } if id == "problem_2"
        ));
    }

    #[test]
    fn custom_prefix_and_names() {
        let dir = tempfile::tempdir().unwrap();
        let task = dir.path().join("task_1");
        fs::create_dir(&task).unwrap();
        fs::write(task.join("opt.s"), "ret").unwrap();
        fs::write(task.join("orig.s"), "nop\nret").unwrap();

        let layout = ProblemLayout {
            prefix: String::from("task_"),
            generated: String::from("opt.s"),
            reference: String::from("orig.s"),
            ..ProblemLayout::default()
        };

        let records = layout.load_records(dir.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "task_1");
        assert_eq!(records[0].generated.as_deref(), Some("ret"));
        assert_eq!(records[0].reference.as_deref(), Some("nop\nret"));
        assert_eq!(layout.store(dir.path()).path_of("task_1"), task.join("samples.json"));
    }
}
