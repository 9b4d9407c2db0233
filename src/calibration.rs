//! Intrinsic calibration persistence.
//!
//! Writes the calibration record downstream consumers expect, as YAML, to a
//! path derived from the configured directory and the request's target
//! identifier. Failures are reported in the response and never escalate into
//! the capture pipeline.
//!
//! Persisted records can be read back with [`CalibrationPersister::load`],
//! which exists for operators checking what actually landed on disk.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// Intrinsic calibration as received from the control channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationParameters {
    pub image_width: u32,
    pub image_height: u32,
    pub distortion_model: String,
    /// 5 coefficients
    pub distortion_coefficients: Vec<f64>,
    /// 3x3, row-major
    pub camera_matrix: Vec<f64>,
    /// 3x3, row-major
    pub rectification_matrix: Vec<f64>,
    /// 3x4, row-major
    pub projection_matrix: Vec<f64>,
}

/// Matrix block in the persisted file: row-major data plus its fixed shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixRecord {
    pub data: Vec<f64>,
    pub rows: u32,
    pub cols: u32,
}

/// On-disk record layout. Field names and shapes are a compatibility
/// contract with downstream calibration consumers; do not change them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    pub image_width: u32,
    pub image_height: u32,
    pub camera_name: String,
    pub distortion_model: String,
    pub distortion_coefficients: MatrixRecord,
    pub camera_matrix: MatrixRecord,
    pub rectification_matrix: MatrixRecord,
    pub projection_matrix: MatrixRecord,
}

/// Outcome returned to the requester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalibrationResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Error)]
enum PersistError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

/// Serializes calibration records to durable storage.
pub struct CalibrationPersister {
    dir: PathBuf,
    camera_name: String,
}

impl CalibrationPersister {
    pub fn new(dir: impl Into<PathBuf>, camera_name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            camera_name: camera_name.into(),
        }
    }

    /// Deterministic destination for a target identifier.
    pub fn file_path(&self, target: &str) -> PathBuf {
        self.dir.join(format!("{}.yaml", target.trim_matches('/')))
    }

    /// Persist `params` for `target`. Write failures come back in the
    /// response; they must not take the capture pipeline down.
    pub fn save(&self, params: &CalibrationParameters, target: &str) -> CalibrationResponse {
        let path = self.file_path(target);
        match self.write(params, &path) {
            Ok(()) => {
                info!(path = %path.display(), "calibration saved");
                CalibrationResponse {
                    success: true,
                    message: format!("wrote {}", path.display()),
                }
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "calibration save failed");
                CalibrationResponse {
                    success: false,
                    message: format!("failed to write {}: {}", path.display(), e),
                }
            }
        }
    }

    /// Read back a persisted record. Used by operators and tests to verify
    /// what actually landed on disk.
    pub fn load(&self, target: &str) -> io::Result<CalibrationRecord> {
        let file = fs::File::open(self.file_path(target))?;
        serde_yaml::from_reader(file).map_err(io::Error::other)
    }

    fn write(&self, params: &CalibrationParameters, path: &Path) -> Result<(), PersistError> {
        let record = self.record_for(params);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = fs::File::create(path)?;
        serde_yaml::to_writer(file, &record)?;
        Ok(())
    }

    fn record_for(&self, params: &CalibrationParameters) -> CalibrationRecord {
        let matrix = |data: &[f64], rows, cols| MatrixRecord {
            data: data.to_vec(),
            rows,
            cols,
        };
        CalibrationRecord {
            image_width: params.image_width,
            image_height: params.image_height,
            camera_name: self.camera_name.clone(),
            distortion_model: params.distortion_model.clone(),
            distortion_coefficients: matrix(&params.distortion_coefficients, 1, 5),
            camera_matrix: matrix(&params.camera_matrix, 3, 3),
            rectification_matrix: matrix(&params.rectification_matrix, 3, 3),
            projection_matrix: matrix(&params.projection_matrix, 3, 4),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_params() -> CalibrationParameters {
        CalibrationParameters {
            image_width: 640,
            image_height: 480,
            distortion_model: "plumb_bob".into(),
            distortion_coefficients: vec![0.1, -0.2, 0.001, 0.002, 0.0],
            camera_matrix: vec![300.0, 0.0, 320.0, 0.0, 300.0, 240.0, 0.0, 0.0, 1.0],
            rectification_matrix: vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
            projection_matrix: vec![
                300.0, 0.0, 320.0, 0.0, 0.0, 300.0, 240.0, 0.0, 0.0, 0.0, 1.0, 0.0,
            ],
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let persister = CalibrationPersister::new(dir.path(), "camera_node");
        let params = sample_params();

        let response = persister.save(&params, "front");
        assert!(response.success, "{}", response.message);

        let record = persister.load("front").unwrap();
        assert_eq!(record.image_width, params.image_width);
        assert_eq!(record.image_height, params.image_height);
        assert_eq!(record.camera_name, "camera_node");
        assert_eq!(record.distortion_model, params.distortion_model);
        assert_eq!(
            record.distortion_coefficients.data,
            params.distortion_coefficients
        );
        assert_eq!(record.camera_matrix.data, params.camera_matrix);
        assert_eq!(record.rectification_matrix.data, params.rectification_matrix);
        assert_eq!(record.projection_matrix.data, params.projection_matrix);
    }

    #[test]
    fn record_shapes_are_fixed() {
        let persister = CalibrationPersister::new("/nonexistent", "camera_node");
        let record = persister.record_for(&sample_params());
        assert_eq!(
            (
                record.distortion_coefficients.rows,
                record.distortion_coefficients.cols
            ),
            (1, 5)
        );
        assert_eq!((record.camera_matrix.rows, record.camera_matrix.cols), (3, 3));
        assert_eq!(
            (
                record.rectification_matrix.rows,
                record.rectification_matrix.cols
            ),
            (3, 3)
        );
        assert_eq!(
            (record.projection_matrix.rows, record.projection_matrix.cols),
            (3, 4)
        );
    }

    #[test]
    fn target_identifier_derives_the_path() {
        let persister = CalibrationPersister::new("/data/calibrations", "camera_node");
        assert_eq!(
            persister.file_path("/front/"),
            PathBuf::from("/data/calibrations/front.yaml")
        );
    }

    #[test]
    fn write_failure_is_reported_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        // A file where a directory is expected makes the write fail.
        let blocker = dir.path().join("blocked");
        fs::write(&blocker, b"x").unwrap();

        let persister = CalibrationPersister::new(blocker.join("deeper"), "camera_node");
        let response = persister.save(&sample_params(), "front");
        assert!(!response.success);
        assert!(response.message.contains("failed to write"));
    }
}
