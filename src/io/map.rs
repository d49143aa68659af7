//! T1 map JSON output. Missing voxels serialize as `null`.

use std::fs::File;
use std::path::Path;

use crate::error::AppError;
use crate::fit::T1Map;

pub fn write_map_json(path: &Path, map: &T1Map) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(3, format!("Failed to create T1 map '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, map).map_err(|e| AppError::new(3, format!("Failed to write T1 map: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_voxels_are_null() {
        let map = T1Map {
            dims: [2, 1, 1],
            t1_ms: vec![Some(812.5), None],
            fitted: 1,
            failed: 1,
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.json");
        write_map_json(&path, &map).unwrap();

        let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["t1_ms"][0], 812.5);
        assert!(value["t1_ms"][1].is_null());
        assert_eq!(value["failed"], 1);
    }
}
