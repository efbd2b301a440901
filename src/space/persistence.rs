use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{ParamSetting, ParamValue, Parameters};
use crate::space::model::ParamSpec;

/// The persisted tuning configuration.
///
/// ```json
/// {"space": {"-search": [["bfs", "dfs"], 1]}, "defaults": {"-watchdog": null}}
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpaceDocument {
    pub space: BTreeMap<String, ParamSpec>,

    /// Always-applied options; `null` marks a bare flag.
    #[serde(default)]
    pub defaults: BTreeMap<String, Option<ParamValue>>,
}

impl SpaceDocument {
    /// Defaults in the form handed to a search procedure.
    pub fn default_parameters(&self) -> Parameters {
        self.defaults
            .iter()
            .map(|(name, value)| (name.clone(), ParamSetting::from(value.clone())))
            .collect()
    }
}

/// Load a space document from a JSON file.
pub fn load_space<P: AsRef<Path>>(path: P) -> Result<SpaceDocument> {
    let content = fs::read_to_string(path)?;
    let document = serde_json::from_str(&content)?;
    Ok(document)
}

/// Save a space document as pretty-printed JSON.
pub fn save_space<P: AsRef<Path>>(path: P, document: &SpaceDocument) -> Result<()> {
    let json = serde_json::to_string_pretty(document)?;
    fs::write(path, json)?;
    Ok(())
}
