//! Page permissions and their implication order.
//!
//! A [`Permission`] is an [`Action`] scoped to a [`PageNamePattern`]. Whether
//! one permission implies another is decided by a static [`ImplicationTable`]
//! plus target matching: `edit` on `*` implies `view` on `Main`, but `view`
//! never implies `edit`.

use crate::error::{AuthzError, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// A page action.
///
/// Variants are declared in alphabetical order of their keyword so the derived
/// `Ord` sorts actions by name, which is the order canonical output uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    All,
    Comment,
    Delete,
    Edit,
    Rename,
    Upload,
    View,
}

impl Action {
    /// Every action, in canonical order.
    pub const ALL_ACTIONS: [Action; 7] = [
        Action::All,
        Action::Comment,
        Action::Delete,
        Action::Edit,
        Action::Rename,
        Action::Upload,
        Action::View,
    ];

    /// The lowercase keyword used in page markup.
    pub fn name(&self) -> &'static str {
        match self {
            Action::All => "all",
            Action::Comment => "comment",
            Action::Delete => "delete",
            Action::Edit => "edit",
            Action::Rename => "rename",
            Action::Upload => "upload",
            Action::View => "view",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Action {
    type Err = AuthzError;

    /// Case-insensitive keyword lookup.
    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_ascii_lowercase();
        Action::ALL_ACTIONS
            .iter()
            .copied()
            .find(|action| action.name() == lower)
            .ok_or_else(|| AuthzError::UnknownAction(s.to_string()))
    }
}

/// The page (or pages) a permission applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PageNamePattern {
    /// `*`: every page.
    Any,
    /// `Prefix*`: every page whose name starts with the prefix.
    Prefix(String),
    /// A single page.
    Exact(String),
}

impl PageNamePattern {
    /// True if this pattern selects the given page.
    pub fn matches(&self, page: &str) -> bool {
        match self {
            PageNamePattern::Any => true,
            PageNamePattern::Prefix(prefix) => page.starts_with(prefix.as_str()),
            PageNamePattern::Exact(name) => name == page,
        }
    }

    /// True if every page selected by `other` is also selected by `self`.
    pub fn covers(&self, other: &PageNamePattern) -> bool {
        match (self, other) {
            (PageNamePattern::Any, _) => true,
            (_, PageNamePattern::Any) => false,
            (PageNamePattern::Prefix(mine), PageNamePattern::Prefix(theirs)) => {
                theirs.starts_with(mine.as_str())
            }
            (_, PageNamePattern::Exact(page)) => self.matches(page),
            (PageNamePattern::Exact(_), PageNamePattern::Prefix(_)) => false,
        }
    }
}

impl fmt::Display for PageNamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageNamePattern::Any => f.write_str("*"),
            PageNamePattern::Prefix(prefix) => write!(f, "{}*", prefix),
            PageNamePattern::Exact(name) => f.write_str(name),
        }
    }
}

/// An action on a page target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    pub target: PageNamePattern,
    pub action: Action,
}

impl Permission {
    pub fn new(target: PageNamePattern, action: Action) -> Self {
        Self { target, action }
    }

    /// A permission on one named page.
    pub fn page(page: impl Into<String>, action: Action) -> Self {
        Self::new(PageNamePattern::Exact(page.into()), action)
    }

    /// A permission on every page.
    pub fn any_page(action: Action) -> Self {
        Self::new(PageNamePattern::Any, action)
    }

    /// True if holding `self` grants `requested` under `table`.
    pub fn implies(&self, requested: &Permission, table: &ImplicationTable) -> bool {
        table.implies(self.action, requested.action) && self.target.covers(&requested.target)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.action, self.target)
    }
}

/// Free-function form of [`Permission::implies`] for a single requested page.
pub fn implies(
    table: &ImplicationTable,
    granted: Action,
    requested: Action,
    granted_target: &PageNamePattern,
    requested_target: &str,
) -> bool {
    table.implies(granted, requested) && granted_target.matches(requested_target)
}

/// Direct implications used when the configuration does not supply a table.
pub const DEFAULT_IMPLICATIONS: &[(Action, &[Action])] = &[
    (Action::Comment, &[Action::View]),
    (Action::Delete, &[Action::Edit]),
    (Action::Edit, &[Action::Comment]),
    (Action::Rename, &[Action::Edit]),
    (Action::Upload, &[Action::View]),
];

static DEFAULT_TABLE: Lazy<ImplicationTable> = Lazy::new(|| {
    let direct: BTreeMap<Action, Vec<Action>> = DEFAULT_IMPLICATIONS
        .iter()
        .map(|(action, implied)| (*action, implied.to_vec()))
        .collect();
    ImplicationTable::from_direct(&direct).unwrap_or_else(|_| ImplicationTable::leaves())
});

/// Transitive closure of the action implication order.
///
/// `All` implies every action no matter what the table says. An action with no
/// row implies only itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImplicationTable {
    closure: BTreeMap<Action, BTreeSet<Action>>,
}

impl ImplicationTable {
    /// A table in which every action only implies itself (and `All` implies everything).
    pub fn leaves() -> Self {
        let mut closure = BTreeMap::new();
        for action in Action::ALL_ACTIONS {
            closure.insert(action, BTreeSet::from([action]));
        }
        closure.insert(Action::All, Action::ALL_ACTIONS.into_iter().collect());
        Self { closure }
    }

    /// Builds the closure from direct implications.
    ///
    /// Fails if two distinct actions imply each other, since the order must be
    /// a partial order.
    pub fn from_direct(direct: &BTreeMap<Action, Vec<Action>>) -> Result<Self> {
        let mut table = Self::leaves();

        for action in Action::ALL_ACTIONS {
            if action == Action::All {
                continue;
            }
            let mut reached = BTreeSet::from([action]);
            let mut pending = vec![action];
            while let Some(current) = pending.pop() {
                for next in direct.get(&current).into_iter().flatten() {
                    if reached.insert(*next) {
                        pending.push(*next);
                    }
                }
            }
            table.closure.insert(action, reached);
        }

        for (action, implied) in &table.closure {
            for other in implied {
                if other != action && table.closure[other].contains(action) {
                    return Err(AuthzError::Configuration(format!(
                        "implication cycle between '{}' and '{}'",
                        action, other
                    )));
                }
            }
        }

        Ok(table)
    }

    /// True if `granted` is the same as or broader than `requested`.
    pub fn implies(&self, granted: Action, requested: Action) -> bool {
        self.closure
            .get(&granted)
            .is_some_and(|implied| implied.contains(&requested))
    }
}

impl Default for ImplicationTable {
    fn default() -> Self {
        DEFAULT_TABLE.clone()
    }
}
