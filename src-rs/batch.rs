//! Document selection and sequential batch processing.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use log::{debug, info, warn};
use serde::Serialize;

use crate::annotate::{annotate_document, PassReport};
use crate::config::AnnotateConfig;
use crate::document::JsonDocument;
use crate::error::AnnotateError;
use crate::render::{render_document, save_preview};

/// Names the active document when `current` gets no path.
pub const DOCUMENT_ENV: &str = "ANNOTATE_FONTS_DOCUMENT";

pub const DEFAULT_EXTENSION: &str = "psd";

/// Picks the document to annotate: the explicit path, else the environment.
pub fn active_document(explicit: Option<PathBuf>) -> std::result::Result<PathBuf, AnnotateError> {
    explicit
        .or_else(|| {
            env::var(DOCUMENT_ENV)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
        })
        .ok_or(AnnotateError::NoDocumentOpen)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

/// Every file under `root` with the given extension, any case.
///
/// A folder's own files come first, in enumeration order, followed by the
/// contents of each sub-folder. Symlinks are not followed, so every document
/// is listed once. Only an unreadable `root` is an error; an unreadable
/// sub-folder is logged and left out.
pub fn discover_documents(root: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let extension = extension.trim_start_matches('.');
    let entries = fs::read_dir(root)
        .with_context(|| format!("failed to read directory: {}", root.display()))?;
    let mut files = Vec::new();
    collect_documents(root, entries, extension, &mut files);
    Ok(files)
}

fn collect_documents(
    folder: &Path,
    entries: fs::ReadDir,
    extension: &str,
    files: &mut Vec<PathBuf>,
) {
    let mut folders = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("skipping unreadable entry in {}: {err}", folder.display());
                continue;
            }
        };
        let path = entry.path();
        let file_type = match entry.file_type() {
            Ok(file_type) => file_type,
            Err(err) => {
                warn!("skipping {}: {err}", path.display());
                continue;
            }
        };
        if file_type.is_symlink() {
            debug!("not following symlink {}", path.display());
        } else if file_type.is_dir() {
            folders.push(path);
        } else if has_extension(&path, extension) {
            files.push(path);
        }
    }
    for folder in folders {
        visit_folder(&folder, extension, files);
    }
}

fn visit_folder(folder: &Path, extension: &str, files: &mut Vec<PathBuf>) {
    match fs::read_dir(folder) {
        Ok(entries) => collect_documents(folder, entries, extension, files),
        Err(err) => warn!("skipping unreadable folder {}: {err}", folder.display()),
    }
}

/// Opens, annotates and saves one document; optionally writes a preview.
pub fn annotate_file(
    path: &Path,
    output: Option<&Path>,
    preview: Option<&Path>,
    config: &AnnotateConfig,
) -> Result<(PassReport, PathBuf)> {
    let mut document = JsonDocument::open(path)?;
    let report = annotate_document(&mut document, config)
        .with_context(|| format!("failed to annotate {}", path.display()))?;
    // Render before saving so a preview failure leaves the file untouched.
    let image = preview
        .map(|_| render_document(document.document()))
        .transpose()?;
    let saved = document.save(output)?;
    if let (Some(image), Some(preview)) = (image, preview) {
        save_preview(image, preview)?;
    }
    Ok((report, saved))
}

#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<PassReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub root: PathBuf,
    pub generated_at: String,
    pub succeeded: usize,
    pub failed: usize,
    pub files: Vec<FileOutcome>,
}

impl BatchReport {
    pub fn failures(&self) -> impl Iterator<Item = &FileOutcome> {
        self.files.iter().filter(|f| !f.ok)
    }
}

fn preview_path(root: &Path, file: &Path, preview_dir: &Path) -> PathBuf {
    let relative = file.strip_prefix(root).unwrap_or(file);
    preview_dir.join(relative).with_extension("png")
}

/// Annotates every matching document under `root`, one after another.
///
/// A document that fails is recorded and the batch moves on.
pub fn annotate_directory(
    root: &Path,
    extension: &str,
    preview_dir: Option<&Path>,
    config: &AnnotateConfig,
) -> Result<BatchReport> {
    let documents = discover_documents(root, extension)?;
    info!(
        "found {} .{} documents under {}",
        documents.len(),
        extension.trim_start_matches('.'),
        root.display()
    );

    let mut files = Vec::with_capacity(documents.len());
    for path in documents {
        let preview = preview_dir.map(|dir| preview_path(root, &path, dir));
        match annotate_file(&path, None, preview.as_deref(), config) {
            Ok((report, _)) => files.push(FileOutcome {
                path,
                ok: true,
                report: Some(report),
                preview,
                error: None,
            }),
            Err(err) => {
                let failure = AnnotateError::BatchFile {
                    path: path.clone(),
                    message: format!("{err:#}"),
                };
                warn!("{failure}");
                files.push(FileOutcome {
                    path,
                    ok: false,
                    report: None,
                    preview: None,
                    error: Some(failure.to_string()),
                });
            }
        }
    }

    let succeeded = files.iter().filter(|f| f.ok).count();
    Ok(BatchReport {
        root: root.to_path_buf(),
        generated_at: timestamp_iso(),
        succeeded,
        failed: files.len() - succeeded,
        files,
    })
}

pub fn timestamp_iso() -> String {
    Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Scale;
    use serde_json::json;
    use tempfile::tempdir;

    fn write_doc(path: &Path) {
        let doc = json!({
            "width": 400, "height": 200,
            "layers": [
                {"name": "Title", "kind": "text",
                 "bounds": {"left": 10, "top": 10, "right": 200, "bottom": 40},
                 "text": {"font": "Helvetica", "size": 24, "color": "111111"}}
            ]
        });
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, serde_json::to_string(&doc).unwrap()).unwrap();
    }

    fn config() -> AnnotateConfig {
        AnnotateConfig {
            scale: Scale::Standard,
            ..AnnotateConfig::default()
        }
    }

    #[test]
    fn discovery_is_recursive_and_case_insensitive() {
        let dir = tempdir().unwrap();
        write_doc(&dir.path().join("a.psd"));
        write_doc(&dir.path().join("B.PSD"));
        write_doc(&dir.path().join("nested").join("deeper").join("c.Psd"));
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        fs::write(dir.path().join("psd"), "x").unwrap();

        let found = discover_documents(dir.path(), "psd").unwrap();
        let mut names: Vec<String> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.last().map(String::as_str), Some("c.Psd"));
        names.sort();
        assert_eq!(names, vec!["B.PSD", "a.psd", "c.Psd"]);
    }

    #[test]
    fn batch_continues_past_a_broken_document() {
        let dir = tempdir().unwrap();
        write_doc(&dir.path().join("good.psd"));
        fs::write(dir.path().join("broken.psd"), "not json").unwrap();
        write_doc(&dir.path().join("sub").join("also-good.psd"));
        let previews = dir.path().join("previews");

        let report = annotate_directory(dir.path(), "psd", Some(&previews), &config()).unwrap();
        assert_eq!(report.files.len(), 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        let failure = report.failures().next().unwrap();
        assert!(failure.path.ends_with("broken.psd"));
        assert!(failure.error.as_deref().unwrap().contains("invalid document JSON"));
        assert!(previews.join("sub").join("also-good.png").exists());

        let saved = JsonDocument::open(&dir.path().join("good.psd")).unwrap();
        assert_eq!(saved.document().layers[0].name, "Font Annotations");
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_folders_are_not_followed() {
        let dir = tempdir().unwrap();
        let real = dir.path().join("real");
        write_doc(&real.join("a.psd"));
        std::os::unix::fs::symlink(&real, dir.path().join("alias")).unwrap();
        std::os::unix::fs::symlink(dir.path(), real.join("up")).unwrap();
        std::os::unix::fs::symlink(real.join("a.psd"), dir.path().join("b.psd")).unwrap();

        let found = discover_documents(dir.path(), "psd").unwrap();
        assert_eq!(found, vec![real.join("a.psd")]);

        let report = annotate_directory(dir.path(), "psd", None, &config()).unwrap();
        assert_eq!(report.succeeded, 1);
        let saved = JsonDocument::open(&real.join("a.psd")).unwrap();
        // one badge plus the legend
        assert_eq!(saved.document().layers[0].layers.len(), 2);
    }

    #[test]
    fn unreadable_folder_is_skipped() {
        let dir = tempdir().unwrap();
        write_doc(&dir.path().join("a.psd"));
        let mut files = Vec::new();
        visit_folder(&dir.path().join("missing"), "psd", &mut files);
        assert!(files.is_empty());
        visit_folder(dir.path(), "psd", &mut files);
        assert_eq!(files, vec![dir.path().join("a.psd")]);

        assert!(discover_documents(&dir.path().join("missing"), "psd").is_err());
    }

    #[test]
    fn oversized_preview_fails_only_that_document() {
        let dir = tempdir().unwrap();
        write_doc(&dir.path().join("a.psd"));
        let huge = json!({
            "width": 1e10, "height": 1e10,
            "layers": [
                {"name": "Title", "kind": "text",
                 "bounds": {"left": 10, "top": 10, "right": 200, "bottom": 40},
                 "text": {"font": "Helvetica", "size": 24, "color": "111111"}}
            ]
        });
        let huge_path = dir.path().join("z.psd");
        let before = serde_json::to_string(&huge).unwrap();
        fs::write(&huge_path, &before).unwrap();
        let previews = dir.path().join("previews");

        let report = annotate_directory(dir.path(), "psd", Some(&previews), &config()).unwrap();
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);
        let failure = report.failures().next().unwrap();
        assert!(failure.path.ends_with("z.psd"));
        assert!(failure.error.as_deref().unwrap().contains("too large to preview"));
        assert_eq!(fs::read_to_string(&huge_path).unwrap(), before);
        assert!(previews.join("a.png").exists());
    }

    #[test]
    fn explicit_document_wins() {
        let path = active_document(Some(PathBuf::from("x.psd"))).unwrap();
        assert_eq!(path, PathBuf::from("x.psd"));
    }

    #[test]
    fn annotate_file_can_write_elsewhere() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("in.psd");
        write_doc(&source);
        let before = fs::read_to_string(&source).unwrap();
        let target = dir.path().join("out").join("annotated.psd");

        let (report, saved) = annotate_file(&source, Some(&target), None, &config()).unwrap();
        assert_eq!(saved, target);
        assert_eq!(report.legend, vec!["1: Helvetica, 24pt, #111111"]);
        assert_eq!(fs::read_to_string(&source).unwrap(), before);
    }
}
