//! Lazy, atomic output writing.
//!
//! Generated text is normalized before it is compared with what is already on
//! disk. Files whose content would not change are left alone so their
//! modification time stays put and dependent objects are not rebuilt.

use crate::error::{CodegenError, Result};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Mode given to generated files.
pub const OUTPUT_FILE_PERMISSIONS: u32 = 0o444;

/// What happened to an output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteOutcome {
    /// File did not exist and was written.
    Created,
    /// File existed with different content and was replaced.
    Rewritten,
    /// File already held exactly this content.
    UpToDate,
}

impl WriteOutcome {
    /// Returns true if the file on disk changed.
    #[must_use]
    pub const fn changed(self) -> bool {
        !matches!(self, Self::UpToDate)
    }
}

/// Writes normalized generated text.
#[derive(Debug, Clone, Copy)]
pub struct OutputWriter {
    read_only: bool,
}

impl Default for OutputWriter {
    fn default() -> Self {
        Self { read_only: true }
    }
}

impl OutputWriter {
    /// Creates a writer that marks output files read-only.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether written files are made read-only.
    #[must_use]
    pub const fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Normalizes `content` and writes it to `path` unless the file already
    /// holds the same bytes.
    ///
    /// # Arguments
    /// * `path` - Output file path; missing parent directories are created
    /// * `content` - Expanded template text
    ///
    /// # Returns
    /// Whether the file was created, rewritten or left untouched.
    ///
    /// # Errors
    /// Returns [`CodegenError::Write`] if the directory cannot be created or
    /// the file cannot be read or replaced.
    pub fn write(&self, path: &Path, content: &str) -> Result<WriteOutcome> {
        let data = normalize(content);
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        create_dirs(dir).map_err(|e| CodegenError::write(dir, e))?;

        let existed = match fs::read(path) {
            Ok(existing) if existing == data.as_bytes() => {
                tracing::debug!("Up to date [{}]", path.display());
                return Ok(WriteOutcome::UpToDate);
            }
            Ok(_) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => return Err(CodegenError::write(path, e)),
        };

        if existed {
            tracing::info!("Rewriting [{}]", path.display());
        } else {
            tracing::info!("Creating [{}]", path.display());
        }

        replace(dir, path, data.as_bytes(), existed).map_err(|e| CodegenError::write(path, e))?;

        if self.read_only {
            if let Err(e) = restrict_permissions(path) {
                tracing::warn!("Failed to set permissions for {}: {}", path.display(), e);
            }
        }

        Ok(if existed {
            WriteOutcome::Rewritten
        } else {
            WriteOutcome::Created
        })
    }
}

/// Cleans up expanded template text.
///
/// Trailing whitespace is stripped from every line, runs of blank lines
/// collapse to a single one, a blank line directly after an opening brace is
/// dropped when the next line is indented, and the text ends with exactly one
/// line break.
#[must_use]
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 1);
    let mut blank_run = 0usize;

    for line in text.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }

    let out = out.replace("{\n\n ", "{\n ");
    let mut out = out.trim_end_matches('\n').to_string();
    out.push('\n');
    out
}

fn create_dirs(dir: &Path) -> io::Result<()> {
    match fs::create_dir_all(dir) {
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && dir.is_dir() => Ok(()),
        other => other,
    }
}

fn replace(dir: &Path, path: &Path, data: &[u8], existed: bool) -> io::Result<()> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;

    if existed {
        make_replaceable(path)?;
    }
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(unix)]
fn make_replaceable(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(not(unix))]
fn make_replaceable(path: &Path) -> io::Result<()> {
    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_readonly(false);
    fs::set_permissions(path, permissions)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(OUTPUT_FILE_PERMISSIONS))
}

#[cfg(not(unix))]
fn restrict_permissions(path: &Path) -> io::Result<()> {
    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_readonly(true);
    fs::set_permissions(path, permissions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_trailing_whitespace_and_newline() {
        assert_eq!(normalize("a  \nb\t\n\n\n"), "a\nb\n");
        assert_eq!(normalize("x"), "x\n");
        assert_eq!(normalize(""), "\n");
    }

    #[test]
    fn test_normalize_collapses_blank_runs() {
        assert_eq!(normalize("a\n\nb"), "a\n\nb\n");
        assert_eq!(normalize("a\n\n\nb"), "a\n\nb\n");
        assert_eq!(normalize("a\n  \n\t\n\n\n\nb"), "a\n\nb\n");
    }

    #[test]
    fn test_normalize_brace_followed_by_blank() {
        assert_eq!(normalize("struct S\n{\n\n    int x;\n};"), "struct S\n{\n    int x;\n};\n");
        assert_eq!(normalize("{\n\nx"), "{\n\nx\n");
    }

    #[test]
    fn test_normalize_crlf() {
        assert_eq!(normalize("a\r\nb\r\n"), "a\nb\n");
    }

    #[test]
    fn test_lazy_write_outcomes() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("ns").join("sub").join("Type.hpp");
        let writer = OutputWriter::new();

        let first = writer.write(&path, "X  \n\n\n").expect("Failed to write");
        assert_eq!(first, WriteOutcome::Created);
        assert!(first.changed());
        assert_eq!(fs::read_to_string(&path).expect("Failed to read"), "X\n");

        let second = writer.write(&path, "X").expect("Failed to write");
        assert_eq!(second, WriteOutcome::UpToDate);
        assert!(!second.changed());

        let third = writer.write(&path, "Y\n\n\n\nZ").expect("Failed to write");
        assert_eq!(third, WriteOutcome::Rewritten);
        assert_eq!(fs::read_to_string(&path).expect("Failed to read"), "Y\n\nZ\n");
    }

    #[test]
    fn test_up_to_date_leaves_file_untouched() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("Type.hpp");
        let writer = OutputWriter::new().read_only(false);

        writer.write(&path, "same").expect("Failed to write");
        let before = fs::metadata(&path)
            .and_then(|m| m.modified())
            .expect("Failed to stat");
        std::thread::sleep(std::time::Duration::from_millis(20));
        writer.write(&path, "same\n").expect("Failed to write");
        let after = fs::metadata(&path)
            .and_then(|m| m.modified())
            .expect("Failed to stat");
        assert_eq!(before, after);
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("Type.hpp");
        let writer = OutputWriter::new();
        writer.write(&path, "a").expect("Failed to write");
        writer.write(&path, "b").expect("Failed to write");

        let entries: Vec<_> = fs::read_dir(dir.path())
            .expect("Failed to list dir")
            .filter_map(std::result::Result::ok)
            .map(|e| e.file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("Type.hpp")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_output_is_read_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("Type.hpp");
        OutputWriter::new().write(&path, "a").expect("Failed to write");

        let mode = fs::metadata(&path).expect("Failed to stat").permissions().mode();
        assert_eq!(mode & 0o777, OUTPUT_FILE_PERMISSIONS);
    }

    #[test]
    fn test_write_into_file_path_fails() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "not a dir").expect("Failed to create file");

        let err = OutputWriter::new()
            .write(&blocker.join("Type.hpp"), "a")
            .expect_err("writing below a file should fail");
        assert!(matches!(err, CodegenError::Write { .. }));
    }
}
