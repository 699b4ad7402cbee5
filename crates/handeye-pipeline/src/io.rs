//! JSON persistence of pose pairs and calibration results.
//!
//! Pose-pair files hold `frameCount` and, for each pair index `i`, the keys
//! `T1_i` (chain A) and `T2_i` (chain B) as row-major 4x4 matrices.

use crate::error::IoError;
use crate::report::{matrix_rows, CalibrationRecord};
use handeye_core::{iso3_from_matrix, Iso3, Mat4, PosePair, Real};
use log::{debug, info};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

type RowMajor4 = [[Real; 4]; 4];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosePairFile {
    #[serde(rename = "frameCount")]
    pub frame_count: usize,
    #[serde(flatten)]
    pub transforms: BTreeMap<String, RowMajor4>,
}

impl PosePairFile {
    pub fn from_pairs(pairs: &[PosePair]) -> Self {
        let mut transforms = BTreeMap::new();
        for (i, pair) in pairs.iter().enumerate() {
            transforms.insert(format!("T1_{i}"), matrix_rows(&pair.pose_a));
            transforms.insert(format!("T2_{i}"), matrix_rows(&pair.pose_b));
        }
        Self {
            frame_count: pairs.len(),
            transforms,
        }
    }

    /// Decode and validate all pairs, in index order.
    pub fn to_pairs(&self) -> Result<Vec<PosePair>, IoError> {
        if self.transforms.len() != 2 * self.frame_count {
            return Err(IoError::Malformed(format!(
                "frameCount is {} but {} transforms are present",
                self.frame_count,
                self.transforms.len()
            )));
        }

        (0..self.frame_count)
            .map(|i| {
                let pose_a = self.pose(&format!("T1_{i}"))?;
                let pose_b = self.pose(&format!("T2_{i}"))?;
                PosePair::new(pose_a, pose_b).map_err(|e| IoError::bad_pose(&format!("pair {i}"), e))
            })
            .collect()
    }

    fn pose(&self, key: &str) -> Result<Iso3, IoError> {
        let rows = self
            .transforms
            .get(key)
            .ok_or_else(|| IoError::Malformed(format!("missing key {key}")))?;
        let m = Mat4::from_fn(|r, c| rows[r][c]);
        iso3_from_matrix(&m).map_err(|e| IoError::bad_pose(key, e))
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), IoError> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).map_err(|e| IoError::io(path, e))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, IoError> {
    let data = fs::read_to_string(path).map_err(|e| IoError::io(path, e))?;
    Ok(serde_json::from_str(&data)?)
}

/// Parse pose pairs from a JSON string.
pub fn parse_pose_pairs(json: &str) -> Result<Vec<PosePair>, IoError> {
    let file: PosePairFile = serde_json::from_str(json)?;
    file.to_pairs()
}

pub fn write_pose_pairs(path: &Path, pairs: &[PosePair]) -> Result<(), IoError> {
    write_json(path, &PosePairFile::from_pairs(pairs))?;
    debug!("wrote {} pose pairs to {}", pairs.len(), path.display());
    Ok(())
}

pub fn read_pose_pairs(path: &Path) -> Result<Vec<PosePair>, IoError> {
    let file: PosePairFile = read_json(path)?;
    let pairs = file.to_pairs()?;
    info!("loaded {} pose pairs from {}", pairs.len(), path.display());
    Ok(pairs)
}

pub fn write_calibration(path: &Path, record: &CalibrationRecord) -> Result<(), IoError> {
    write_json(path, record)?;
    info!("wrote calibration to {}", path.display());
    Ok(())
}

pub fn read_calibration(path: &Path) -> Result<CalibrationRecord, IoError> {
    read_json(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use handeye_core::pose_error;
    use nalgebra::{Translation3, UnitQuaternion};

    fn max_entry_diff(a: &Iso3, b: &Iso3) -> Real {
        (a.to_homogeneous() - b.to_homogeneous()).amax()
    }

    fn pair(k: Real) -> PosePair {
        PosePair::new(
            Iso3::from_parts(
                Translation3::new(k, 0.5 * k, -k),
                UnitQuaternion::from_euler_angles(0.1 * k, 0.2, -0.3 * k),
            ),
            Iso3::from_parts(
                Translation3::new(-k, 0.1, 2.0 * k),
                UnitQuaternion::from_euler_angles(0.3, -0.1 * k, 0.05),
            ),
        )
        .unwrap()
    }

    #[test]
    fn file_layout_uses_indexed_keys() {
        let file = PosePairFile::from_pairs(&[pair(1.0), pair(2.0)]);
        let value = serde_json::to_value(&file).unwrap();
        assert_eq!(value["frameCount"], 2);
        assert!(value.get("T1_0").is_some() && value.get("T2_1").is_some());
        assert_eq!(value["T1_1"][3], serde_json::json!([0.0, 0.0, 0.0, 1.0]));
    }

    #[test]
    fn parse_restores_pairs() {
        let pairs = vec![pair(0.5), pair(1.5), pair(-1.0)];
        let json = serde_json::to_string(&PosePairFile::from_pairs(&pairs)).unwrap();
        let parsed = parse_pose_pairs(&json).unwrap();
        assert_eq!(parsed.len(), 3);
        for (a, b) in pairs.iter().zip(&parsed) {
            assert!(max_entry_diff(&a.pose_a, &b.pose_a) < 1e-9);
            assert!(max_entry_diff(&a.pose_b, &b.pose_b) < 1e-9);
        }
    }

    #[test]
    fn parse_accepts_matrices_with_six_decimals() {
        let pairs = vec![pair(0.3), pair(1.1), pair(-0.7)];
        let rows = |pose: &Iso3| {
            let m = matrix_rows(pose);
            let fmt_row = |row: &[Real; 4]| {
                let cells: Vec<String> = row.iter().map(|v| format!("{v:.6}")).collect();
                format!("[{}]", cells.join(", "))
            };
            let body: Vec<String> = m.iter().map(fmt_row).collect();
            format!("[{}]", body.join(", "))
        };
        let mut entries = vec![format!("\"frameCount\": {}", pairs.len())];
        for (i, p) in pairs.iter().enumerate() {
            entries.push(format!("\"T1_{i}\": {}", rows(&p.pose_a)));
            entries.push(format!("\"T2_{i}\": {}", rows(&p.pose_b)));
        }
        let json = format!("{{{}}}", entries.join(", "));

        let parsed = parse_pose_pairs(&json).unwrap();
        assert_eq!(parsed.len(), 3);
        for (a, b) in pairs.iter().zip(&parsed) {
            let (dt, dr) = pose_error(&a.pose_a, &b.pose_a);
            assert!(dt < 1e-6 && dr < 1e-5, "dt={dt}, dr={dr}");
            let (dt, dr) = pose_error(&a.pose_b, &b.pose_b);
            assert!(dt < 1e-6 && dr < 1e-5, "dt={dt}, dr={dr}");
        }
    }

    #[test]
    fn count_mismatch_is_malformed() {
        let mut file = PosePairFile::from_pairs(&[pair(1.0), pair(2.0)]);
        file.frame_count = 3;
        let json = serde_json::to_string(&file).unwrap();
        assert!(matches!(parse_pose_pairs(&json), Err(IoError::Malformed(_))));
    }

    #[test]
    fn missing_key_is_malformed() {
        let mut file = PosePairFile::from_pairs(&[pair(1.0), pair(2.0)]);
        let t = file.transforms.remove("T2_1").unwrap();
        file.transforms.insert("T3_1".to_string(), t);
        let json = serde_json::to_string(&file).unwrap();
        let err = parse_pose_pairs(&json).unwrap_err();
        assert!(err.to_string().contains("T2_1"), "{err}");
    }

    #[test]
    fn non_rigid_matrix_is_malformed() {
        let mut file = PosePairFile::from_pairs(&[pair(1.0)]);
        file.transforms.get_mut("T1_0").unwrap()[0][0] = 2.0;
        let json = serde_json::to_string(&file).unwrap();
        assert!(matches!(parse_pose_pairs(&json), Err(IoError::Malformed(_))));
    }

    #[test]
    fn missing_frame_count_is_a_json_error() {
        assert!(matches!(parse_pose_pairs("{}"), Err(IoError::Json(_))));
        assert!(matches!(parse_pose_pairs("not json"), Err(IoError::Json(_))));
    }
}
