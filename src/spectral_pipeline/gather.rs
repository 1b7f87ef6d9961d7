//! Collection of index images across samples
//!
//! Every sample's `Indexes_out` (and `Indexes_out_fluorescence`) images are
//! copied into one folder per index, named after the sample.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use crate::spectral_pipeline::common::error::{PipelineError, Result};
use crate::spectral_pipeline::conversions::INDEX_OUTPUT_DIR;
use crate::spectral_pipeline::manifest::{SampleManifest, resolve_folder};

/// Default destination folder, relative to the working root
pub const GATHER_DIR: &str = "Indexes";

const FLUORESCENCE_OUTPUT_DIR: &str = "Indexes_out_fluorescence";
const IMAGE_PREFIX: &str = "Image_";
const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "tif", "tiff", "bmp"];

#[derive(Debug, Default)]
pub struct GatherReport {
    /// `(source, destination)` of every copied file
    pub copied: Vec<(PathBuf, PathBuf)>,
    /// Samples without a folder on disk
    pub skipped: Vec<String>,
}

/// Index name of an index image: the stem after `Image_`, or the whole stem.
pub fn index_name(file_name: &str) -> Option<&str> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    let accepted = IMAGE_EXTENSIONS
        .iter()
        .any(|accepted| ext.eq_ignore_ascii_case(accepted));
    if !accepted || stem.is_empty() {
        return None;
    }
    Some(stem.strip_prefix(IMAGE_PREFIX).unwrap_or(stem))
}

/// First free `<base><ext>`, `<base>_1<ext>`, `<base>_2<ext>`, ... in `dir`.
pub fn unique_destination(dir: &Path, base: &str, ext: &str) -> PathBuf {
    let candidate = dir.join(format!("{base}{ext}"));
    if !candidate.exists() {
        return candidate;
    }
    (1..)
        .map(|n| dir.join(format!("{base}_{n}{ext}")))
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

fn copy_into(source: &Path, dir: &Path, base: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .map_err(|e| PipelineError::OutputWriteError(format!("{}: {}", dir.display(), e)))?;
    let ext = source
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    let destination = unique_destination(dir, base, &ext);
    std::fs::copy(source, &destination).map_err(|e| {
        PipelineError::OutputWriteError(format!(
            "{} -> {}: {}",
            source.display(),
            destination.display(),
            e
        ))
    })?;
    Ok(destination)
}

/// Copies the index images of every manifest folder into `<dest>/<index>/`.
///
/// Files are visited in sorted order so collision suffixes are reproducible.
#[instrument(skip(root, manifest, dest), fields(root = %root.display(), dest = %dest.display()))]
pub fn gather_indexes(root: &Path, manifest: &SampleManifest, dest: &Path) -> Result<GatherReport> {
    let mut report = GatherReport::default();

    for sample in manifest.all_folders() {
        let Some(folder) = resolve_folder(root, sample) else {
            warn!(sample, "Folder not found, skipping");
            report.skipped.push(sample.to_string());
            continue;
        };

        let mut found_any = false;
        for sub in [INDEX_OUTPUT_DIR, FLUORESCENCE_OUTPUT_DIR] {
            let index_dir = folder.join(sub);
            if !index_dir.is_dir() {
                continue;
            }
            found_any = true;
            debug!(dir = %index_dir.display(), "Index folder found");

            let mut entries: Vec<PathBuf> = std::fs::read_dir(&index_dir)?
                .map(|entry| entry.map(|e| e.path()))
                .collect::<std::io::Result<_>>()?;
            entries.sort();

            for source in entries.iter().filter(|path| path.is_file()) {
                let file_name = source.file_name().map(|n| n.to_string_lossy().into_owned());
                let Some(index) = file_name.as_deref().and_then(index_name) else {
                    continue;
                };
                let destination = copy_into(source, &dest.join(index), sample)?;
                debug!(
                    source = %source.display(),
                    destination = %destination.display(),
                    "Copied"
                );
                report.copied.push((source.clone(), destination));
            }
        }

        if !found_any {
            debug!(folder = %folder.display(), "No index output folder");
        }
    }

    info!(copied = report.copied.len(), "Index images gathered");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path, contents: &[u8]) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    fn manifest(objects: &[&str]) -> SampleManifest {
        SampleManifest {
            standard: "Spectralon".into(),
            dark: "Dark".into(),
            flat: "White".into(),
            objects: objects.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_index_name() {
        assert_eq!(index_name("Image_NDVI.jpg"), Some("NDVI"));
        assert_eq!(index_name("Image_CI_rededge.PNG"), Some("CI_rededge"));
        assert_eq!(index_name("overview.tiff"), Some("overview"));
        assert_eq!(index_name("notes.txt"), None);
        assert_eq!(index_name("README"), None);
    }

    #[test]
    fn test_two_samples_land_under_index_folder() {
        let root = TempDir::new().unwrap();
        touch(&root.path().join("Corrected_Ficus/Indexes_out/Image_NDVI.jpg"), b"ficus");
        touch(&root.path().join("Banana/Indexes_out/Image_NDVI.jpg"), b"banana");
        let dest = root.path().join("Indexes");

        let report = gather_indexes(root.path(), &manifest(&["Ficus", "Banana"]), &dest).unwrap();

        assert_eq!(report.copied.len(), 2);
        assert_eq!(std::fs::read(dest.join("NDVI/Ficus.jpg")).unwrap(), b"ficus");
        assert_eq!(std::fs::read(dest.join("NDVI/Banana.jpg")).unwrap(), b"banana");
        assert_eq!(
            report.skipped,
            vec!["Spectralon".to_string(), "Dark".into(), "White".into()]
        );
    }

    #[test]
    fn test_collisions_get_numeric_suffix() {
        let root = TempDir::new().unwrap();
        touch(&root.path().join("Leaf/Indexes_out/Image_PRI.png"), b"visible");
        touch(
            &root.path().join("Leaf/Indexes_out_fluorescence/Image_PRI.png"),
            b"fluorescence",
        );
        let dest = root.path().join("Indexes");
        touch(&dest.join("PRI/Leaf.png"), b"earlier run");

        gather_indexes(root.path(), &manifest(&["Leaf"]), &dest).unwrap();

        assert_eq!(std::fs::read(dest.join("PRI/Leaf.png")).unwrap(), b"earlier run");
        assert_eq!(std::fs::read(dest.join("PRI/Leaf_1.png")).unwrap(), b"visible");
        assert_eq!(std::fs::read(dest.join("PRI/Leaf_2.png")).unwrap(), b"fluorescence");
    }

    #[test]
    fn test_non_image_files_are_ignored() {
        let root = TempDir::new().unwrap();
        touch(&root.path().join("Leaf/Indexes_out/log.txt"), b"");
        touch(&root.path().join("Leaf/Indexes_out/Image_WBI.bmp"), b"bmp");
        let dest = root.path().join("Indexes");

        let report = gather_indexes(root.path(), &manifest(&["Leaf"]), &dest).unwrap();

        assert_eq!(report.copied.len(), 1);
        assert!(dest.join("WBI/Leaf.bmp").is_file());
        assert!(!dest.join("log").exists());
    }
}
