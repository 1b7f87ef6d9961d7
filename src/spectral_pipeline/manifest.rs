//! Sample manifest
//!
//! The manifest is a plain-text list of folder names, one per line. The first
//! three name the reflectance-standard, dark-current and flat-field captures;
//! every following line names an object folder.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::spectral_pipeline::common::error::{PipelineError, Result};
use crate::spectral_pipeline::cube::SPECTRAL_CUBE_DIR;

/// Default manifest file name
pub const MANIFEST_FILE: &str = "folder_list.txt";

/// Prefix of folders written by the radiometric corrector
pub const CORRECTED_PREFIX: &str = "Corrected_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleManifest {
    pub standard: String,
    pub dark: String,
    pub flat: String,
    pub objects: Vec<String>,
}

impl SampleManifest {
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.lines().map(str::trim).filter(|line| !line.is_empty());

        let mut role = |name: &str| {
            lines
                .next()
                .map(str::to_owned)
                .ok_or_else(|| PipelineError::Manifest(format!("missing {name} folder")))
        };
        let standard = role("reflectance-standard")?;
        let dark = role("dark-current")?;
        let flat = role("flat-field")?;

        let objects: Vec<String> = lines.map(str::to_owned).collect();
        if objects.is_empty() {
            return Err(PipelineError::Manifest(
                "at least one object folder must follow the three calibration folders".into(),
            ));
        }

        Ok(Self {
            standard,
            dark,
            flat,
            objects,
        })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Manifest(format!("{}: {}", path.display(), e))
        })?;
        let manifest = Self::parse(&text)?;
        debug!(
            manifest = %path.display(),
            objects = manifest.objects.len(),
            "Manifest parsed"
        );
        Ok(manifest)
    }

    /// Every listed folder in manifest order, calibration folders first.
    pub fn all_folders(&self) -> impl Iterator<Item = &str> {
        [self.standard.as_str(), self.dark.as_str(), self.flat.as_str()]
            .into_iter()
            .chain(self.objects.iter().map(String::as_str))
    }
}

pub fn corrected_name(name: &str) -> String {
    format!("{CORRECTED_PREFIX}{name}")
}

/// Resolves a sample folder under `root`, preferring its corrected form.
pub fn resolve_folder(root: &Path, name: &str) -> Option<PathBuf> {
    let corrected = root.join(corrected_name(name));
    if corrected.is_dir() {
        return Some(corrected);
    }
    let raw = root.join(name);
    raw.is_dir().then_some(raw)
}

pub fn spectral_cube_dir(folder: &Path) -> PathBuf {
    folder.join(SPECTRAL_CUBE_DIR)
}
