//! Session manifests: the file inventory of one pre-extracted session.

use crate::error::Result;
use sessionfuse_core::source::ImagingMetadata;
use sessionfuse_core::PlaneGrouping;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Paths and acquisition facts for one file-backed session.
///
/// Relative paths are resolved against the manifest's own directory at
/// load time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionManifest {
    pub sync_file: PathBuf,
    pub dff_file: PathBuf,
    pub demix_file: PathBuf,
    pub events_file: PathBuf,
    pub segmentation_file: PathBuf,
    pub stimulus_log_file: PathBuf,
    pub max_projection_file: PathBuf,
    pub average_projection_file: PathBuf,
    /// Absent when the session recorded no eye-tracking camera.
    pub eye_tracking_file: Option<PathBuf>,
    pub plane_grouping: PlaneGrouping,
    pub imaging_metadata: ImagingMetadata,
}

impl SessionManifest {
    /// Load a manifest and resolve its relative paths.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut manifest: Self = serde_json::from_str(&fs::read_to_string(path)?)?;
        if let Some(base) = path.parent() {
            manifest.resolve_against(base);
        }
        Ok(manifest)
    }

    fn resolve_against(&mut self, base: &Path) {
        for path in [
            &mut self.sync_file,
            &mut self.dff_file,
            &mut self.demix_file,
            &mut self.events_file,
            &mut self.segmentation_file,
            &mut self.stimulus_log_file,
            &mut self.max_projection_file,
            &mut self.average_projection_file,
        ] {
            if path.is_relative() {
                *path = base.join(path.as_path());
            }
        }
        if let Some(path) = &mut self.eye_tracking_file {
            if path.is_relative() {
                *path = base.join(path.as_path());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    const MANIFEST_JSON: &str = r#"{
        "sync_file": "sync.h5",
        "dff_file": "dff.h5",
        "demix_file": "demix.h5",
        "events_file": "events.h5",
        "segmentation_file": "segmentation.json",
        "stimulus_log_file": "stimulus.json",
        "max_projection_file": "max_projection.h5",
        "average_projection_file": "/data/avg_projection.h5",
        "eye_tracking_file": null,
        "plane_grouping": {"plane_group": 1, "group_count": 4},
        "imaging_metadata": {
            "ophys_experiment_id": 12345,
            "experiment_container_id": null,
            "targeted_structure": "VISl",
            "imaging_depth_um": 275,
            "session_type": "OPHYS_3_images_A",
            "equipment_name": "MESO.1",
            "full_genotype": "Vip-IRES-Cre/wt",
            "reporter_line": "Ai148",
            "driver_line": ["Vip-IRES-Cre"],
            "sex": "M",
            "age": "P90"
        }
    }"#;

    #[test]
    fn test_load_resolves_relative_paths() {
        let dir = TempDir::new().unwrap();
        let manifest_path = dir.path().join("session.json");
        let mut file = std::fs::File::create(&manifest_path).unwrap();
        file.write_all(MANIFEST_JSON.as_bytes()).unwrap();

        let manifest = SessionManifest::load(&manifest_path).unwrap();
        assert_eq!(manifest.sync_file, dir.path().join("sync.h5"));
        // Absolute paths are left alone.
        assert_eq!(
            manifest.average_projection_file,
            PathBuf::from("/data/avg_projection.h5")
        );
        assert!(manifest.eye_tracking_file.is_none());
        assert_eq!(manifest.plane_grouping.plane_group, Some(1));
        assert_eq!(manifest.imaging_metadata.ophys_experiment_id, 12345);
    }
}
