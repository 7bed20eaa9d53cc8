//! Reading inputs and writing outputs.
//!
//! Outputs are written to a temporary sibling and renamed into place, so an
//! interrupted write never leaves a half-written file under the final name.

use crate::error::{ConfigError, Result, StoryError};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::warn;

/// Read a whole input file, reporting a missing file as a configuration error.
pub async fn read_input(role: &'static str, path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    match fs::read_to_string(path).await {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(ConfigError::MissingInput {
            role,
            path: path.to_path_buf(),
        }
        .into()),
        Err(e) => Err(StoryError::io(path, e)),
    }
}

/// The first path in the sequence `summary.txt`, `summary1.txt`,
/// `summary2.txt`, ... that does not exist yet.
///
/// A stem that already ends in digits is continued from that number, so
/// `draft7.txt` is followed by `draft8.txt`.
pub async fn next_available_path(path: impl AsRef<Path>) -> Result<PathBuf> {
    let mut candidate = path.as_ref().to_path_buf();
    while exists(&candidate).await? {
        candidate = increment(&candidate);
    }
    Ok(candidate)
}

/// Write `contents` to `path`, replacing any existing file.
pub async fn write_output(path: impl AsRef<Path>, contents: &str) -> Result<()> {
    stage_output(path.as_ref(), contents).await?.commit().await
}

/// Write several outputs so that either all of them land under their final
/// names or none do.
///
/// Every file is first written to its temporary sibling. Only when all of
/// those writes succeed are they renamed into place; if a rename fails, the
/// files already renamed are removed when `fresh` marks them as new names.
/// A replaced file cannot be restored, so list fresh names first.
pub async fn write_outputs(outputs: &[Output<'_>]) -> Result<()> {
    let mut staged = Vec::with_capacity(outputs.len());
    for output in outputs {
        match stage_output(output.path, output.contents).await {
            Ok(file) => staged.push(file),
            Err(e) => {
                discard_all(staged).await;
                return Err(e);
            }
        }
    }

    let mut staged = staged.into_iter();
    let mut committed: Vec<&Output<'_>> = Vec::with_capacity(outputs.len());
    for output in outputs {
        let Some(file) = staged.next() else { break };
        if let Err(e) = file.commit().await {
            discard_all(staged.by_ref().collect()).await;
            for done in committed.iter().filter(|o| o.fresh) {
                if let Err(remove) = fs::remove_file(done.path).await {
                    warn!(
                        path = %done.path.display(),
                        error = %remove,
                        "Failed to roll back output"
                    );
                }
            }
            return Err(e);
        }
        committed.push(output);
    }
    Ok(())
}

/// One file for [`write_outputs`].
#[derive(Debug, Clone, Copy)]
pub struct Output<'a> {
    pub path: &'a Path,
    pub contents: &'a str,
    /// The path did not exist before this run and may be removed on rollback.
    pub fresh: bool,
}

/// Contents already written to a temporary sibling of `path`.
struct StagedOutput {
    tmp: PathBuf,
    path: PathBuf,
}

impl StagedOutput {
    async fn commit(self) -> Result<()> {
        if let Err(e) = fs::rename(&self.tmp, &self.path).await {
            let err = StoryError::io(&self.path, e);
            self.discard().await;
            return Err(err);
        }
        Ok(())
    }

    async fn discard(self) {
        if let Err(e) = fs::remove_file(&self.tmp).await {
            warn!(path = %self.tmp.display(), error = %e, "Failed to remove temporary file");
        }
    }
}

async fn stage_output(path: &Path, contents: &str) -> Result<StagedOutput> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StoryError::io(parent, e))?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, contents)
        .await
        .map_err(|e| StoryError::io(&tmp, e))?;
    Ok(StagedOutput {
        tmp,
        path: path.to_path_buf(),
    })
}

async fn discard_all(staged: Vec<StagedOutput>) {
    for file in staged {
        file.discard().await;
    }
}

/// Write `contents` to the next free name derived from `path`. Returns the
/// path actually written.
pub async fn write_new_output(path: impl AsRef<Path>, contents: &str) -> Result<PathBuf> {
    let path = next_available_path(path).await?;
    write_output(&path, contents).await?;
    Ok(path)
}

async fn exists(path: &Path) -> Result<bool> {
    fs::try_exists(path)
        .await
        .map_err(|e| StoryError::io(path, e))
}

fn increment(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let base = stem.trim_end_matches(|c: char| c.is_ascii_digit());
    let next = stem[base.len()..]
        .parse::<u64>()
        .map(|n| n.saturating_add(1))
        .unwrap_or(1);

    let mut name = format!("{base}{next}");
    if let Some(ext) = path.extension() {
        name.push('.');
        name.push_str(&ext.to_string_lossy());
    }
    path.with_file_name(name)
}
