//! Endpoint presets loaded from JSON.
//!
//! ```json
//! [
//!   { "name": "strut-source", "role": "Source", "link_type": "strut",
//!     "source": { "joint": "Rigid", "renderer": { "Pipe": { "diameter": 0.15 } },
//!                 "limits": { "min_length": 0.1, "max_length": 2.0 } } },
//!   { "name": "strut-target", "role": "Target", "link_type": "strut" }
//! ]
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strutlink_logic::link_state::EndpointRole;
use strutlink_logic::math::Pose;

use crate::components::{EndpointSpec, SourceConfig};
use crate::error::ConfigError;

/// One named endpoint template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkPreset {
    pub name: String,
    pub role: EndpointRole,
    pub link_type: String,
    /// Node name on the body; defaults to the preset name.
    #[serde(default)]
    pub node_name: Option<String>,
    #[serde(default)]
    pub node: Pose,
    #[serde(default)]
    pub source: Option<SourceConfig>,
}

impl LinkPreset {
    pub fn to_spec(&self) -> Result<EndpointSpec, ConfigError> {
        let node_name = self.node_name.clone().unwrap_or_else(|| self.name.clone());
        let spec = match self.role {
            EndpointRole::Source => {
                let config = self
                    .source
                    .clone()
                    .ok_or_else(|| ConfigError::MissingSourceConfig(self.name.clone()))?;
                EndpointSpec::source(self.link_type.clone(), config)
            }
            EndpointRole::Target => EndpointSpec::target(self.link_type.clone()),
        };
        Ok(spec.named(node_name).at(self.node))
    }
}

/// Presets by name.
#[derive(Debug, Clone, Default)]
pub struct PresetCatalog {
    presets: BTreeMap<String, LinkPreset>,
}

impl PresetCatalog {
    pub fn get(&self, name: &str) -> Option<&LinkPreset> {
        self.presets.get(name)
    }

    /// Endpoint spec for preset `name`.
    pub fn spec(&self, name: &str) -> Result<EndpointSpec, ConfigError> {
        self.get(name)
            .ok_or_else(|| ConfigError::UnknownPreset(name.to_string()))?
            .to_spec()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.presets.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}

/// Parse a JSON array of presets. Names must be unique.
pub fn load_presets(json: &str) -> Result<PresetCatalog, ConfigError> {
    let list: Vec<LinkPreset> = serde_json::from_str(json)?;
    let mut presets = BTreeMap::new();
    for preset in list {
        if presets.contains_key(&preset.name) {
            return Err(ConfigError::DuplicatePreset(preset.name));
        }
        presets.insert(preset.name.clone(), preset);
    }
    log::debug!("Loaded {} link presets", presets.len());
    Ok(PresetCatalog { presets })
}
