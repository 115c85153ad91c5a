use serde::{Deserialize, Serialize};

/// A single entry in a directory listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    pub size: u64,
    pub is_directory: bool,
    pub modified_time: f64,
    #[serde(default)]
    pub mime_type: Option<String>,
}

/// Directory listing for a path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileListing {
    pub files: Vec<FileEntry>,
    pub current_path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_parses_and_compares_equal() {
        let json = r#"{
            "files": [
                {"name": "a.bin", "path": "a.bin", "size": 1024,
                 "is_directory": false, "modified_time": 1700000000.0,
                 "mime_type": "application/octet-stream"},
                {"name": "sub", "path": "sub", "size": 0,
                 "is_directory": true, "modified_time": 1700000001.0,
                 "mime_type": null}
            ],
            "current_path": ""
        }"#;
        let a: FileListing = serde_json::from_str(json).unwrap();
        let b: FileListing = serde_json::from_str(json).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.files.len(), 2);
        assert!(a.files[1].is_directory);
    }
}
