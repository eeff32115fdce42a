//! Engine configuration loaded from a YAML configuration definition.
//!
//! The file follows the same shape as the other CMS configuration modules:
//!
//! ```yaml
//! id: acl
//! name: Page ACL Engine
//! provider: authz
//! version: 1.0.0
//! values:
//!   dialect: expression
//!   default_policy: allow
//!   implications:
//!     delete: [edit]
//!     edit: [comment]
//!     comment: [view]
//! ```

use crate::error::{AuthzError, Result};
use crate::parser::Dialect;
use crate::permission::{Action, ImplicationTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// What to decide for a page that carries no ACL directive at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultPolicy {
    #[default]
    Allow,
    Deny,
}

impl DefaultPolicy {
    pub fn allows(&self) -> bool {
        matches!(self, DefaultPolicy::Allow)
    }
}

/// The tunable values of the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclSettings {
    #[serde(default)]
    pub dialect: Dialect,
    #[serde(default)]
    pub default_policy: DefaultPolicy,
    /// Direct implications; `None` selects the built-in table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implications: Option<BTreeMap<Action, Vec<Action>>>,
}

/// A configuration definition for the ACL engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclConfig {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub provider: String,
    pub version: String,
    #[serde(default)]
    pub values: AclSettings,
}

impl Default for AclConfig {
    fn default() -> Self {
        Self {
            id: "acl".to_string(),
            name: "Page ACL Engine".to_string(),
            description: None,
            provider: "authz".to_string(),
            version: "1.0.0".to_string(),
            values: AclSettings::default(),
        }
    }
}

impl AclConfig {
    /// Create from YAML content. The result is validated.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: AclConfig = serde_yaml::from_str(content)
            .map_err(|e| AuthzError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from file path
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AuthzError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| AuthzError::Configuration(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(AuthzError::Configuration(
                "Configuration ID cannot be empty".to_string(),
            ));
        }
        if self.provider.is_empty() {
            return Err(AuthzError::Configuration(
                "Configuration provider cannot be empty".to_string(),
            ));
        }
        self.implication_table().map(|_| ())
    }

    /// The implication closure this configuration describes.
    pub fn implication_table(&self) -> Result<ImplicationTable> {
        match &self.values.implications {
            Some(direct) => ImplicationTable::from_direct(direct),
            None => Ok(ImplicationTable::default()),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.values.dialect
    }

    pub fn default_policy(&self) -> DefaultPolicy {
        self.values.default_policy
    }
}
