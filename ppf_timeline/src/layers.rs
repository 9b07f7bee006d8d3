//! Render layers and culling masks.

use crate::config::LayerConfig;
use crate::error::TimelineError;
use serde::{Deserialize, Serialize};

/// Number of addressable layers (one bit each in a [`LayerMask`]).
pub const MAX_LAYERS: usize = 32;

/// Index of a named layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerId(u8);

impl LayerId {
    pub fn index(&self) -> u8 {
        self.0
    }
}

/// Bit set of layers a camera renders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerMask(u32);

impl LayerMask {
    pub const EMPTY: LayerMask = LayerMask(0);

    pub fn of(layer: LayerId) -> Self {
        Self(1 << layer.0)
    }

    /// Adds `layer` if present.
    pub fn with(self, layer: Option<LayerId>) -> Self {
        match layer {
            Some(layer) => Self(self.0 | (1 << layer.0)),
            None => self,
        }
    }

    pub fn contains(&self, layer: LayerId) -> bool {
        self.0 & (1 << layer.0) != 0
    }

    pub fn bits(&self) -> u32 {
        self.0
    }
}

/// Name → index table, defined by the scene/project settings.
#[derive(Debug, Clone, Default)]
pub struct LayerTable {
    names: Vec<String>,
}

impl LayerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with the three layers `config` refers to.
    pub fn from_config(config: &LayerConfig) -> Result<Self, TimelineError> {
        let mut table = Self::new();
        table.define(&config.direct_layer)?;
        table.define(&config.proxy_layer)?;
        table.define(&config.ui_layer)?;
        Ok(table)
    }

    /// Defines a layer, returning the existing id if already defined.
    pub fn define(&mut self, name: &str) -> Result<LayerId, TimelineError> {
        if let Some(id) = self.index_of(name) {
            return Ok(id);
        }
        if self.names.len() >= MAX_LAYERS {
            return Err(TimelineError::invalid_config(format!(
                "cannot define layer '{name}': all {MAX_LAYERS} layers in use"
            )));
        }
        self.names.push(name.to_string());
        Ok(LayerId((self.names.len() - 1) as u8))
    }

    pub fn index_of(&self, name: &str) -> Option<LayerId> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| LayerId(i as u8))
    }

    pub fn name(&self, id: LayerId) -> Option<&str> {
        self.names.get(id.0 as usize).map(String::as_str)
    }
}
