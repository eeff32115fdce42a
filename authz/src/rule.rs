//! Boolean rule expressions over principal names.
//!
//! A [`RuleNode`] is evaluated against a set of names the caller has already
//! expanded (subject name plus group names). Evaluation is a pure structural
//! recursion: no directory lookups, no I/O, always terminates.

use crate::permission::{Action, ImplicationTable};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

/// A rule tree.
///
/// `And` and `Or` are n-ary: a chain such as `A OR B OR C` is one node with
/// three children, so tree depth only grows with parentheses and `NOT`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RuleNode {
    Leaf(String),
    And(Vec<RuleNode>),
    Or(Vec<RuleNode>),
    Not(Box<RuleNode>),
}

impl RuleNode {
    pub fn leaf(name: impl Into<String>) -> Self {
        Self::Leaf(name.into())
    }

    /// `lhs AND rhs`. An `And` on the left is extended rather than nested.
    pub fn and(lhs: RuleNode, rhs: RuleNode) -> Self {
        match lhs {
            RuleNode::And(mut children) => {
                children.push(rhs);
                RuleNode::And(children)
            }
            lhs => RuleNode::And(vec![lhs, rhs]),
        }
    }

    /// `lhs OR rhs`. An `Or` on the left is extended rather than nested.
    pub fn or(lhs: RuleNode, rhs: RuleNode) -> Self {
        match lhs {
            RuleNode::Or(mut children) => {
                children.push(rhs);
                RuleNode::Or(children)
            }
            lhs => RuleNode::Or(vec![lhs, rhs]),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(child: RuleNode) -> Self {
        Self::Not(Box::new(child))
    }

    pub fn evaluate(&self, names: &HashSet<String>) -> bool {
        match self {
            RuleNode::Leaf(name) => names.contains(name),
            RuleNode::And(children) => children.iter().all(|child| child.evaluate(names)),
            RuleNode::Or(children) => children.iter().any(|child| child.evaluate(names)),
            RuleNode::Not(child) => !child.evaluate(names),
        }
    }

    /// Every principal name mentioned in the tree.
    pub fn principal_names(&self) -> BTreeSet<&str> {
        let mut names = BTreeSet::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names<'a>(&'a self, names: &mut BTreeSet<&'a str>) {
        match self {
            RuleNode::Leaf(name) => {
                names.insert(name.as_str());
            }
            RuleNode::And(children) | RuleNode::Or(children) => {
                for child in children {
                    child.collect_names(names);
                }
            }
            RuleNode::Not(child) => child.collect_names(names),
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            RuleNode::Or(..) => 1,
            RuleNode::And(..) => 2,
            RuleNode::Not(..) => 3,
            RuleNode::Leaf(_) => 4,
        }
    }

    fn fmt_child(&self, f: &mut fmt::Formatter<'_>, parenthesize: bool) -> fmt::Result {
        if parenthesize {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }

    fn fmt_chain(
        f: &mut fmt::Formatter<'_>,
        op: &str,
        precedence: u8,
        children: &[RuleNode],
    ) -> fmt::Result {
        // A child of equal precedence can only come from explicit parentheses.
        for (index, child) in children.iter().enumerate() {
            if index > 0 {
                write!(f, " {} ", op)?;
            }
            child.fmt_child(f, child.precedence() <= precedence)?;
        }
        Ok(())
    }
}

/// Canonical expression text: upper-case operators, minimal parentheses.
impl fmt::Display for RuleNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleNode::Leaf(name) => f.write_str(name),
            RuleNode::And(children) => Self::fmt_chain(f, "AND", 2, children),
            RuleNode::Or(children) => Self::fmt_chain(f, "OR", 1, children),
            RuleNode::Not(child) => {
                f.write_str("NOT ")?;
                child.fmt_child(f, child.precedence() < 3)
            }
        }
    }
}

/// Rule-expression ACL of one page: at most one tree per action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdvancedAcl {
    page: String,
    rules: BTreeMap<Action, RuleNode>,
}

impl AdvancedAcl {
    pub fn new(page: impl Into<String>) -> Self {
        Self {
            page: page.into(),
            rules: BTreeMap::new(),
        }
    }

    pub fn page(&self) -> &str {
        &self.page
    }

    /// Adds a rule for `action`. A second rule for the same action is OR-ed
    /// with the first.
    pub fn add_rule(&mut self, action: Action, node: RuleNode) {
        let combined = match self.rules.remove(&action) {
            Some(existing) => RuleNode::or(existing, node),
            None => node,
        };
        self.rules.insert(action, combined);
    }

    pub fn remove_rule(&mut self, action: Action) -> Option<RuleNode> {
        self.rules.remove(&action)
    }

    /// The tree written for exactly this action, without implication fallback.
    pub fn rule(&self, action: Action) -> Option<&RuleNode> {
        self.rules.get(&action)
    }

    /// The effective tree for `action`.
    ///
    /// The exact rule comes first; rules of broader actions that imply
    /// `action` are OR-ed in after it, so an `edit` rule also answers `view`.
    /// Broader rules are OR-ed in even when an exact rule exists, so the tree
    /// always agrees with [`AdvancedAcl::is_granted`]: a `view` rule must not
    /// hide an `edit` grant that already covers viewing.
    pub fn get_node(&self, action: Action, table: &ImplicationTable) -> Option<RuleNode> {
        let exact = self.rules.get(&action).into_iter();
        let broader = self
            .rules
            .iter()
            .filter(|(granted, _)| **granted != action && table.implies(**granted, action))
            .map(|(_, node)| node);

        exact
            .chain(broader)
            .cloned()
            .reduce(RuleNode::or)
    }

    /// Deny-by-default evaluation of `action` for the given names.
    pub fn is_granted(&self, names: &HashSet<String>, action: Action, table: &ImplicationTable) -> bool {
        self.rules
            .iter()
            .any(|(granted, node)| table.implies(*granted, action) && node.evaluate(names))
    }

    /// Rules sorted by action name.
    pub fn rules(&self) -> impl Iterator<Item = (Action, &RuleNode)> {
        self.rules.iter().map(|(action, node)| (*action, node))
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
