//! Common shared models.

use serde::{Deserialize, Serialize};

/// Stored button definition, as the admin wrote it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonDef {
    /// Button label
    pub label: String,
    /// Raw target: a URL, a bare host, or `rules`
    pub target: String,
}

impl ButtonDef {
    /// Create a new button definition.
    pub fn new(label: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            target: target.into(),
        }
    }
}
