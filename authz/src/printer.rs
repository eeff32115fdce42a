//! Canonical ACL markup.
//!
//! One directive per action, actions sorted by name, each line terminated by
//! `\n`. Enumeration directives list principal names sorted and comma-joined
//! without spaces; expression directives print the rule tree with upper-case
//! operators.

use crate::acl::Acl;
use crate::parser::{AclRepresentation, ParsedAcl};
use crate::permission::Action;
use crate::rule::AdvancedAcl;
use std::collections::{BTreeMap, BTreeSet};

/// Canonical text of an enumeration ACL.
///
/// Directive syntax has no target field, so only permissions whose target
/// selects the ACL's own page are written; grants for other pages are left
/// out. Directives carry names only: a user and a group sharing a name print
/// once and re-parse as a single principal, which grants the same name set.
pub fn print_acl(acl: &Acl) -> String {
    let mut by_action: BTreeMap<Action, BTreeSet<&str>> = BTreeMap::new();
    for entry in acl.iter() {
        for permission in entry
            .permissions()
            .filter(|permission| permission.target.matches(acl.page()))
        {
            by_action
                .entry(permission.action)
                .or_default()
                .insert(entry.principal().name());
        }
    }

    by_action
        .into_iter()
        .map(|(action, names)| {
            let names: Vec<&str> = names.into_iter().collect();
            format!("[{{ALLOW {} {}}}]\n", action, names.join(","))
        })
        .collect()
}

/// Canonical text of an expression ACL.
pub fn print_advanced_acl(acl: &AdvancedAcl) -> String {
    acl.rules()
        .map(|(action, node)| format!("[{{ALLOW {} {}}}]\n", action, node))
        .collect()
}

pub fn print(representation: &AclRepresentation) -> String {
    match representation {
        AclRepresentation::Enumeration(acl) => print_acl(acl),
        AclRepresentation::Expression(acl) => print_advanced_acl(acl),
    }
}

/// Replaces the ACL directives of `text` with the canonical form of `acl`.
///
/// Only the directives recorded in `parsed.spans` are removed, each together
/// with the line break that follows it. Malformed directives and all other
/// markup stay untouched. The canonical block is placed at the top.
pub fn embed_acl(text: &str, parsed: &ParsedAcl, acl: &AclRepresentation) -> String {
    let mut body = String::with_capacity(text.len());
    let mut cursor = 0;

    for span in &parsed.spans {
        body.push_str(&text[cursor..span.start]);
        let rest = &text[span.end..];
        cursor = span.end
            + if rest.starts_with("\r\n") {
                2
            } else if rest.starts_with('\n') {
                1
            } else {
                0
            };
    }
    body.push_str(&text[cursor..]);

    let mut out = print(acl);
    out.push_str(&body);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::AclEntry;
    use crate::parser::{parse, Dialect};
    use crate::permission::{ImplicationTable, PageNamePattern, Permission};
    use crate::principal::{NullResolver, PrincipalRef};
    use crate::rule::RuleNode;
    use std::collections::HashSet;

    fn user(name: &str) -> PrincipalRef {
        PrincipalRef::User(name.to_string())
    }

    fn reparse(text: &str) -> Acl {
        match parse("Main", text, Dialect::Enumeration, &NullResolver).representation {
            AclRepresentation::Enumeration(acl) => acl,
            other => panic!("expected enumeration ACL, got {:?}", other),
        }
    }

    #[test]
    fn test_print_acl_canonical_form() {
        let mut acl = Acl::new("Main");
        let mut charlie = AclEntry::new(user("Charlie"));
        charlie.add_permission(Permission::page("Main", Action::View));
        charlie.add_permission(Permission::page("Main", Action::Edit));
        let mut devin = AclEntry::new(user("Devin"));
        devin.add_permission(Permission::page("Main", Action::Edit));
        devin.add_permission(Permission::page("Main", Action::Delete));
        acl.add_entry(charlie);
        acl.add_entry(devin);

        assert_eq!(
            print_acl(&acl),
            "[{ALLOW delete Devin}]\n[{ALLOW edit Charlie,Devin}]\n[{ALLOW view Charlie}]\n"
        );
    }

    #[test]
    fn test_print_empty_acl() {
        assert_eq!(print_acl(&Acl::new("Main")), "");
    }

    #[test]
    fn test_round_trip_preserves_effective_grants() {
        let table = ImplicationTable::default();
        let mut acl = Acl::new("Main");
        acl.grant(user("Zoe"), Action::Comment);
        acl.grant(user("Adam"), Action::Upload);
        acl.grant(user("Mia"), Action::Rename);
        acl.grant(user("Adam"), Action::Edit);

        let again = reparse(&print_acl(&acl));
        for action in Action::ALL_ACTIONS {
            let mut before: Vec<String> = acl
                .find_principals(action, &table)
                .iter()
                .map(|p| p.name().to_string())
                .collect();
            let mut after: Vec<String> = again
                .find_principals(action, &table)
                .iter()
                .map(|p| p.name().to_string())
                .collect();
            before.sort();
            after.sort();
            assert_eq!(before, after, "grants differ for {}", action);
        }
    }

    #[test]
    fn test_grants_for_other_pages_are_not_printed() {
        let table = ImplicationTable::default();
        let mut acl = Acl::new("Main");
        let mut charlie = AclEntry::new(user("Charlie"));
        charlie.add_permission(Permission::page("Other", Action::Edit));
        charlie.add_permission(Permission::new(
            PageNamePattern::Prefix("Team".to_string()),
            Action::Delete,
        ));
        let mut devin = AclEntry::new(user("Devin"));
        devin.add_permission(Permission::any_page(Action::Comment));
        devin.add_permission(Permission::new(
            PageNamePattern::Prefix("Ma".to_string()),
            Action::Upload,
        ));
        acl.add_entry(charlie);
        acl.add_entry(devin);

        let printed = print_acl(&acl);
        assert_eq!(printed, "[{ALLOW comment Devin}]\n[{ALLOW upload Devin}]\n");

        let again = reparse(&printed);
        for action in Action::ALL_ACTIONS {
            let before: Vec<String> = acl
                .find_principals(action, &table)
                .iter()
                .map(|p| p.name().to_string())
                .collect();
            let after: Vec<String> = again
                .find_principals(action, &table)
                .iter()
                .map(|p| p.name().to_string())
                .collect();
            assert_eq!(before, after, "grants differ for {}", action);
        }
        assert!(again.find_principals(Action::Edit, &table).is_empty());
    }

    #[test]
    fn test_same_name_principals_collapse_to_one_name() {
        let table = ImplicationTable::default();
        let mut acl = Acl::new("Main");
        acl.grant(user("Ops"), Action::View);
        acl.grant(PrincipalRef::Group("Ops".to_string()), Action::View);
        assert_eq!(acl.find_principals(Action::View, &table).len(), 2);

        let printed = print_acl(&acl);
        assert_eq!(printed, "[{ALLOW view Ops}]\n");

        let again = reparse(&printed);
        assert_eq!(
            again.find_principals(Action::View, &table),
            vec![PrincipalRef::Unresolved("Ops".to_string())]
        );
        let ops: HashSet<String> = ["Ops".to_string()].into();
        for action in Action::ALL_ACTIONS {
            assert_eq!(
                acl.is_granted(&ops, action, &table),
                again.is_granted(&ops, action, &table)
            );
        }
    }

    #[test]
    fn test_canonical_form_is_stable() {
        let first = reparse("[{ALLOW  edit  Bob ,Alice}] prose [{ALLOW view Carol}]");
        let canonical = print_acl(&first);
        let second = reparse(&canonical);
        assert_eq!(print_acl(&second), canonical);
    }

    #[test]
    fn test_print_advanced_acl() {
        let mut acl = AdvancedAcl::new("Main");
        acl.add_rule(
            Action::View,
            RuleNode::not(RuleNode::leaf("Guest")),
        );
        acl.add_rule(
            Action::Edit,
            RuleNode::and(
                RuleNode::or(RuleNode::leaf("Charlie"), RuleNode::leaf("Herman")),
                RuleNode::leaf("Staff"),
            ),
        );

        assert_eq!(
            print_advanced_acl(&acl),
            "[{ALLOW edit (Charlie OR Herman) AND Staff}]\n[{ALLOW view NOT Guest}]\n"
        );

        let reparsed = parse("Main", &print_advanced_acl(&acl), Dialect::Expression, &NullResolver);
        assert_eq!(reparsed.representation, AclRepresentation::Expression(acl));
    }

    #[test]
    fn test_embed_keeps_prose_and_malformed_directives() {
        let text = "Intro\n[{ALLOW edit Bob}]\nBody [{ALLOW fly Eve}] end\n[{ALLOW view Alice}]\n";
        let parsed = parse("Main", text, Dialect::Enumeration, &NullResolver);
        assert_eq!(parsed.malformed.len(), 1);

        let mut acl = Acl::new("Main");
        acl.grant(user("Carol"), Action::Delete);
        let embedded = embed_acl(text, &parsed, &AclRepresentation::Enumeration(acl));

        assert_eq!(
            embedded,
            "[{ALLOW delete Carol}]\nIntro\nBody [{ALLOW fly Eve}] end\n"
        );
    }
}
