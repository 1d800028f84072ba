//! Problem definition loading.

use std::path::Path;

use crate::error::ProblemLoadError;

/// Reads the problem definition file and returns its trimmed contents.
///
/// The text is shared read-only context for every generation call; it is
/// never transformed beyond trimming.
///
/// # Errors
///
/// Returns `ProblemLoadError` if the file is missing, unreadable, or its
/// trimmed content is empty. Fatal to the run.
pub fn load_problem(path: &Path) -> Result<String, ProblemLoadError> {
    let content = std::fs::read_to_string(path).map_err(|source| ProblemLoadError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ProblemLoadError::Empty);
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_problem_trims_content() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "\n  simulate pipe flow  \n").expect("write");

        let problem = load_problem(file.path()).expect("should load");
        assert_eq!(problem, "simulate pipe flow");
    }

    #[test]
    fn test_load_problem_empty_fails() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "   \n\t\n").expect("write");

        assert!(matches!(
            load_problem(file.path()),
            Err(ProblemLoadError::Empty)
        ));
    }

    #[test]
    fn test_load_problem_missing_file_fails() {
        let dir = tempfile::tempdir().expect("temp dir");
        let missing = dir.path().join("nope.txt");

        assert!(matches!(
            load_problem(&missing),
            Err(ProblemLoadError::Io { .. })
        ));
    }
}
