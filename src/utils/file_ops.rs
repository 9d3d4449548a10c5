use std::path::{Path, PathBuf};
use std::fs;
use crate::Result;

pub struct FileManager {
    output_dir: PathBuf,
}

impl FileManager {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn ensure_output_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.output_dir)?;
        Ok(())
    }

    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(file_name)
    }
}

/// Regular files directly inside `dir`, sorted by name. Subdirectories are
/// not descended into.
pub fn collect_input_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("input directory not found: {}", dir.display()),
        )
        .into());
    }

    let files = walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(err) => {
                log::warn!("Error accessing entry: {}", err);
                None
            }
        })
        .filter(|e| {
            let is_file = e.file_type().is_file();
            if !is_file {
                log::debug!("Skipping non-file entry: {}", e.path().display());
            }
            is_file
        })
        .map(|e| e.into_path())
        .collect();

    Ok(files)
}
