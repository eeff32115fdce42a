//! Page-level access control for the wiki.
//!
//! ACLs live inside page source as `[{ALLOW <action> <principals>}]`
//! directives. This crate parses them, answers permission checks, and writes
//! them back in canonical form when a page's ACL is changed.
//!
//! # Architecture Overview
//!
//! The authorization flow follows this pattern:
//!
//! 1. **Page text** is handed to the [`AclManager`] together with its version
//! 2. **Parser** extracts the directives into an [`Acl`] (enumeration dialect)
//!    or an [`AdvancedAcl`] of [`RuleNode`] trees (expression dialect)
//! 3. **Cache** keeps the parsed ACL per page and version
//! 4. **Check**: the caller passes the subject's names, already expanded with
//!    its groups, and the requested [`Action`]
//! 5. **Decision** is made: allow or deny, using the [`ImplicationTable`]
//!    (`delete` ⊇ `edit` ⊇ `comment` ⊇ `view`)
//!
//! Group membership is never resolved inside the engine. Directories are
//! slow, remote and mutable; the evaluator only tests set membership.
//!
//! # Example
//!
//! ```rust
//! use authz::{AclConfig, AclManager, Action, NullResolver, PageStore, SaveError, WikiPage};
//! use std::collections::HashSet;
//! use std::sync::Arc;
//!
//! struct Discard;
//!
//! impl PageStore for Discard {
//!     fn save(&self, _page: &str, _text: &str) -> Result<(), SaveError> {
//!         Ok(())
//!     }
//! }
//!
//! let manager = AclManager::new(AclConfig::default(), Arc::new(NullResolver), Arc::new(Discard))
//!     .expect("default configuration is valid");
//! let page = WikiPage::new("Main", 1, "[{ALLOW edit Charlie, Herman}]\nWelcome!");
//! let names: HashSet<String> = ["Herman".to_string()].into();
//!
//! assert!(manager.check_permission(&page, &names, Action::View));
//! assert!(!manager.check_permission(&page, &names, Action::Delete));
//! ```

pub mod acl;
pub mod config;
pub mod error;
pub mod manager;
pub mod parser;
pub mod permission;
pub mod principal;
pub mod printer;
pub mod rule;

pub use acl::{Acl, AclEntry};
pub use config::{AclConfig, AclSettings, DefaultPolicy};
pub use error::{AuthzError, MalformedAcl, Result, SaveError};
pub use manager::{AclManager, CacheStats, PageStore, WikiPage};
pub use parser::{parse, parse_expression, AclRepresentation, Dialect, ParsedAcl};
pub use permission::{implies, Action, ImplicationTable, PageNamePattern, Permission};
pub use principal::{
    expand_principal_names, GroupMembership, NullResolver, PrincipalRef, PrincipalResolver,
    StaticDirectory,
};
pub use printer::{embed_acl, print, print_acl, print_advanced_acl};
pub use rule::{AdvancedAcl, RuleNode};
