//! Built-in defaults (layer 1)

use serde::{Deserialize, Serialize};

/// Values used when neither the config file nor the command line sets them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// SDK passed to xcodebuild and xcrun (default: "iphoneos")
    pub sdk: String,

    /// Output directory (default: ".")
    pub destination: String,

    /// Run `clean` before building (default: true)
    pub clean: bool,

    /// Run `archive` after building (default: true)
    pub archive: bool,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            sdk: "iphoneos".to_string(),
            destination: ".".to_string(),
            clean: true,
            archive: true,
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "sdk": self.sdk,
            "destination": self.destination,
            "clean": self.clean,
            "archive": self.archive,
        })
    }
}
