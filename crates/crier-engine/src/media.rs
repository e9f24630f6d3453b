//! Media library: location → playable audio bulletin URL.

use std::collections::HashMap;
use std::path::Path;

use crate::error::EngineError;

/// Static mapping from a recipient's location to the audio bulletin the
/// provider should play to them.
///
/// Loaded once at startup from a JSON object file:
///
/// ```json
/// { "North": "https://cdn.example.com/north.wav" }
/// ```
///
/// A location with no entry is a configuration gap, surfaced by the driver
/// as a warning each pass until the file is fixed.
#[derive(Debug, Clone, Default)]
pub struct MediaLibrary {
    map: HashMap<String, String>,
}

impl MediaLibrary {
    /// Load the library from a JSON object file.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let text = std::fs::read_to_string(path).map_err(|e| EngineError::MediaLibraryIo {
            path: path.display().to_string(),
            source: e,
        })?;

        let map = serde_json::from_str(&text).map_err(|e| EngineError::MediaLibraryParse {
            path: path.display().to_string(),
            source: e,
        })?;

        Ok(Self { map })
    }

    /// The audio URL for a location, if one is configured.
    pub fn resolve(&self, location: &str) -> Option<&str> {
        self.map.get(location).map(String::as_str)
    }

    /// Number of configured locations.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether no locations are configured.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl FromIterator<(String, String)> for MediaLibrary {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            map: iter.into_iter().collect(),
        }
    }
}
