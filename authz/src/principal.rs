//! Principals named in ACL directives and the directory seams used to resolve them.
//!
//! The engine never expands group membership on its own. Callers build the set
//! of names a subject answers to (its own name plus every group it belongs to)
//! with [`expand_principal_names`] or their own directory lookup, and pass that
//! set into each check.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

/// A principal named in an ACL.
///
/// `Unresolved` keeps names that parsed fine but were unknown to the directory
/// at parse time, so the ACL round-trips and can be resolved again later.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "lowercase")]
pub enum PrincipalRef {
    User(String),
    Group(String),
    Unresolved(String),
}

impl PrincipalRef {
    pub fn name(&self) -> &str {
        match self {
            PrincipalRef::User(name) | PrincipalRef::Group(name) | PrincipalRef::Unresolved(name) => {
                name
            }
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, PrincipalRef::Unresolved(_))
    }
}

impl fmt::Display for PrincipalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Looks names up in the user/group directory.
pub trait PrincipalResolver: Send + Sync {
    /// Returns `User`, `Group`, or `Unresolved` for the given name. Must not fail.
    fn resolve(&self, name: &str) -> PrincipalRef;
}

/// Answers which groups a principal belongs to.
pub trait GroupMembership: Send + Sync {
    fn groups_of(&self, principal: &str) -> BTreeSet<String>;
}

/// Resolver that knows nobody. Every name stays `Unresolved`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullResolver;

impl PrincipalResolver for NullResolver {
    fn resolve(&self, name: &str) -> PrincipalRef {
        PrincipalRef::Unresolved(name.to_string())
    }
}

/// In-memory user and group directory.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct StaticDirectory {
    #[serde(default)]
    users: BTreeSet<String>,
    /// Group name to member names.
    #[serde(default)]
    groups: BTreeMap<String, BTreeSet<String>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, name: impl Into<String>) -> Self {
        self.users.insert(name.into());
        self
    }

    pub fn with_group<I, S>(mut self, name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups
            .entry(name.into())
            .or_default()
            .extend(members.into_iter().map(Into::into));
        self
    }
}

impl PrincipalResolver for StaticDirectory {
    fn resolve(&self, name: &str) -> PrincipalRef {
        if self.users.contains(name) {
            PrincipalRef::User(name.to_string())
        } else if self.groups.contains_key(name) {
            PrincipalRef::Group(name.to_string())
        } else {
            PrincipalRef::Unresolved(name.to_string())
        }
    }
}

impl GroupMembership for StaticDirectory {
    fn groups_of(&self, principal: &str) -> BTreeSet<String> {
        self.groups
            .iter()
            .filter(|(_, members)| members.contains(principal))
            .map(|(group, _)| group.clone())
            .collect()
    }
}

/// The subject's own name plus the names of all groups it belongs to.
pub fn expand_principal_names(subject: &str, membership: &dyn GroupMembership) -> HashSet<String> {
    let mut names: HashSet<String> = membership.groups_of(subject).into_iter().collect();
    names.insert(subject.to_string());
    names
}
