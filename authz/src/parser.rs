//! Extraction of `[{ALLOW ...}]` directives from page source.
//!
//! Two dialects share one scanner:
//!
//! - **enumeration**: `[{ALLOW edit Charlie, Herman}]` grants the action to
//!   every listed principal and builds an [`Acl`].
//! - **expression**: `[{ALLOW edit Charlie OR (Editors AND NOT Guest)}]`
//!   builds one [`RuleNode`] per action in an [`AdvancedAcl`].
//!
//! Parsing a page never fails as a whole. A directive with an unknown action
//! or a broken expression is reported as a [`MalformedAcl`] and skipped; the
//! rest of the page is still used.

use crate::acl::{Acl, AclEntry};
use crate::error::{AuthzError, MalformedAcl};
use crate::permission::{Action, ImplicationTable, Permission};
use crate::principal::PrincipalResolver;
use crate::rule::{AdvancedAcl, RuleNode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use tracing::{debug, warn};

const DIRECTIVE_OPEN: &str = "[{";
const DIRECTIVE_CLOSE: &str = "}]";
const ALLOW_KEYWORD: &str = "ALLOW";

/// Which directive language the engine is configured for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Enumeration,
    Expression,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Enumeration => f.write_str("enumeration"),
            Dialect::Expression => f.write_str("expression"),
        }
    }
}

impl FromStr for Dialect {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "enumeration" => Ok(Dialect::Enumeration),
            "expression" => Ok(Dialect::Expression),
            other => Err(AuthzError::Configuration(format!(
                "unknown ACL dialect '{}'",
                other
            ))),
        }
    }
}

/// The in-memory ACL of a page, in whichever dialect it was parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "dialect", rename_all = "lowercase")]
pub enum AclRepresentation {
    Enumeration(Acl),
    Expression(AdvancedAcl),
}

impl AclRepresentation {
    pub fn dialect(&self) -> Dialect {
        match self {
            AclRepresentation::Enumeration(_) => Dialect::Enumeration,
            AclRepresentation::Expression(_) => Dialect::Expression,
        }
    }

    pub fn page(&self) -> &str {
        match self {
            AclRepresentation::Enumeration(acl) => acl.page(),
            AclRepresentation::Expression(acl) => acl.page(),
        }
    }

    /// True if the page carries no grants at all.
    pub fn is_empty(&self) -> bool {
        match self {
            AclRepresentation::Enumeration(acl) => acl.is_empty(),
            AclRepresentation::Expression(acl) => acl.is_empty(),
        }
    }

    /// Deny-by-default decision for a caller-expanded name set.
    pub fn is_granted(&self, names: &HashSet<String>, action: Action, table: &ImplicationTable) -> bool {
        match self {
            AclRepresentation::Enumeration(acl) => acl.is_granted(names, action, table),
            AclRepresentation::Expression(acl) => acl.is_granted(names, action, table),
        }
    }
}

/// Result of parsing one page.
#[derive(Debug, Clone, Serialize)]
pub struct ParsedAcl {
    pub representation: AclRepresentation,
    /// Directives that looked like ACLs but could not be understood.
    pub malformed: Vec<MalformedAcl>,
    /// Byte ranges of the directives that parsed successfully.
    #[serde(skip)]
    pub spans: Vec<Range<usize>>,
}

impl ParsedAcl {
    pub fn acl(&self) -> &AclRepresentation {
        &self.representation
    }

    /// Turns the first diagnostic into an error, for callers that want strictness.
    pub fn into_result(self) -> crate::Result<AclRepresentation> {
        match self.malformed.into_iter().next() {
            Some(malformed) => Err(AuthzError::MalformedAcl(malformed)),
            None => Ok(self.representation),
        }
    }
}

/// A directive located by the scanner, before dialect-specific parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RawDirective<'a> {
    span: Range<usize>,
    action: &'a str,
    body: &'a str,
}

/// Parses every ACL directive in `text`.
pub fn parse(page: &str, text: &str, dialect: Dialect, resolver: &dyn PrincipalResolver) -> ParsedAcl {
    let mut malformed = Vec::new();
    let mut spans = Vec::new();
    let mut enumeration = Acl::new(page);
    let mut expression = AdvancedAcl::new(page);

    for raw in scan_directives(text) {
        let outcome = raw.action.parse::<Action>().and_then(|action| match dialect {
            Dialect::Enumeration => {
                for entry in enumeration_entries(page, action, raw.body, resolver)? {
                    enumeration.add_entry(entry);
                }
                Ok(())
            }
            Dialect::Expression => {
                let node = parse_expression(raw.body)?;
                expression.add_rule(action, node);
                Ok(())
            }
        });

        match outcome {
            Ok(()) => spans.push(raw.span),
            Err(err) => {
                let diagnostic = malformed_at(text, &raw.span, err.to_string());
                warn!(page = page, "{}", diagnostic);
                malformed.push(diagnostic);
            }
        }
    }

    let representation = match dialect {
        Dialect::Enumeration => AclRepresentation::Enumeration(enumeration),
        Dialect::Expression => AclRepresentation::Expression(expression),
    };

    debug!(
        page = page,
        dialect = %dialect,
        directives = spans.len(),
        malformed = malformed.len(),
        "parsed page ACL"
    );

    ParsedAcl {
        representation,
        malformed,
        spans,
    }
}

fn enumeration_entries(
    page: &str,
    action: Action,
    body: &str,
    resolver: &dyn PrincipalResolver,
) -> crate::Result<Vec<AclEntry>> {
    let entries: Vec<AclEntry> = body
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| {
            let mut entry = AclEntry::new(resolver.resolve(name));
            entry.add_permission(Permission::page(page, action));
            entry
        })
        .collect();

    if entries.is_empty() {
        return Err(AuthzError::NoPrincipals);
    }
    Ok(entries)
}

fn malformed_at(text: &str, span: &Range<usize>, reason: String) -> MalformedAcl {
    let before = &text[..span.start];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |index| index + 1);
    let column = text[line_start..span.start].chars().count() + 1;

    MalformedAcl {
        directive: text[span.clone()].to_string(),
        line,
        column,
        reason,
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Finds `[{ ALLOW <action> <body> }]` blocks.
///
/// Whitespace is allowed anywhere inside the braces. The body runs to the
/// first `}`, which must be followed by `]`. `[[{` is escaped markup and
/// plugin blocks that do not start with `ALLOW` are skipped.
fn scan_directives(text: &str) -> Vec<RawDirective<'_>> {
    let mut directives = Vec::new();
    let mut cursor = 0;

    while let Some(offset) = text[cursor..].find(DIRECTIVE_OPEN) {
        let start = cursor + offset;
        cursor = start + DIRECTIVE_OPEN.len();

        if text[..start].ends_with('[') {
            continue;
        }
        if let Some(directive) = match_directive(text, start) {
            cursor = directive.span.end;
            directives.push(directive);
        }
    }

    directives
}

fn match_directive(text: &str, start: usize) -> Option<RawDirective<'_>> {
    let mut pos = start + DIRECTIVE_OPEN.len();

    pos = skip_whitespace(text, pos);
    if !text[pos..].starts_with(ALLOW_KEYWORD) {
        return None;
    }
    pos += ALLOW_KEYWORD.len();

    let after_keyword = skip_whitespace(text, pos);
    if after_keyword == pos {
        return None;
    }
    pos = after_keyword;

    let action_len = text[pos..]
        .find(|c: char| !is_word_char(c))
        .unwrap_or(text.len() - pos);
    if action_len == 0 {
        return None;
    }
    let action = &text[pos..pos + action_len];
    pos += action_len;

    // At least one separating whitespace character, then a body of at least
    // one character. A whitespace-only body still counts as a directive so
    // that it can be reported.
    if !text[pos..].starts_with(char::is_whitespace) {
        return None;
    }
    let separator = text[pos..].chars().next().map_or(0, char::len_utf8);
    let close = pos + text[pos..].find('}')?;
    if close <= pos + separator || !text[close..].starts_with(DIRECTIVE_CLOSE) {
        return None;
    }

    Some(RawDirective {
        span: start..close + DIRECTIVE_CLOSE.len(),
        action,
        body: text[pos + separator..close].trim_start(),
    })
}

fn skip_whitespace(text: &str, pos: usize) -> usize {
    text[pos..]
        .find(|c: char| !c.is_whitespace())
        .map_or(text.len(), |offset| pos + offset)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token<'a> {
    Word(&'a str),
    And,
    Or,
    Not,
    Comma,
    Open,
    Close,
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Word(word) => write!(f, "'{}'", word),
            Token::And => f.write_str("AND"),
            Token::Or => f.write_str("OR"),
            Token::Not => f.write_str("NOT"),
            Token::Comma => f.write_str("','"),
            Token::Open => f.write_str("'('"),
            Token::Close => f.write_str("')'"),
        }
    }
}

fn tokenize(body: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut rest = body;

    loop {
        rest = rest.trim_start();
        let Some(first) = rest.chars().next() else {
            break;
        };
        let token = match first {
            '(' => Token::Open,
            ')' => Token::Close,
            ',' => Token::Comma,
            _ => {
                let len = rest
                    .find(|c: char| c.is_whitespace() || matches!(c, '(' | ')' | ','))
                    .unwrap_or(rest.len());
                let word = &rest[..len];
                rest = &rest[len..];
                tokens.push(match word.to_ascii_uppercase().as_str() {
                    "AND" => Token::And,
                    "OR" => Token::Or,
                    "NOT" => Token::Not,
                    _ => Token::Word(word),
                });
                continue;
            }
        };
        rest = &rest[first.len_utf8()..];
        tokens.push(token);
    }

    tokens
}

/// Parses a rule expression.
///
/// `NOT` binds tighter than `AND`, which binds tighter than `OR`; binary
/// operators are left-associative. A comma acts as `OR`, and consecutive bare
/// words form one name joined by single spaces.
pub fn parse_expression(body: &str) -> crate::Result<RuleNode> {
    let tokens = tokenize(body);
    let mut parser = ExpressionParser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let node = parser.parse_or()?;
    match parser.peek() {
        None => Ok(node),
        Some(token) => Err(expression_error(format!("unexpected {}", token))),
    }
}

fn expression_error(reason: String) -> AuthzError {
    AuthzError::InvalidExpression(reason)
}

/// Parentheses plus `NOT` operators allowed around any one name.
const MAX_NESTING: usize = 64;

struct ExpressionParser<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
    depth: usize,
}

fn chain(mut terms: Vec<RuleNode>, build: fn(Vec<RuleNode>) -> RuleNode) -> RuleNode {
    if terms.len() == 1 {
        terms.remove(0)
    } else {
        build(terms)
    }
}

impl<'a> ExpressionParser<'a> {
    fn peek(&self) -> Option<&Token<'a>> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token<'a>> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse_or(&mut self) -> crate::Result<RuleNode> {
        let mut terms = vec![self.parse_and()?];
        while matches!(self.peek(), Some(Token::Or | Token::Comma)) {
            self.advance();
            terms.push(self.parse_and()?);
        }
        Ok(chain(terms, RuleNode::Or))
    }

    fn parse_and(&mut self) -> crate::Result<RuleNode> {
        let mut terms = vec![self.parse_not()?];
        while matches!(self.peek(), Some(Token::And)) {
            self.advance();
            terms.push(self.parse_not()?);
        }
        Ok(chain(terms, RuleNode::And))
    }

    fn parse_not(&mut self) -> crate::Result<RuleNode> {
        if matches!(self.peek(), Some(Token::Not)) {
            self.advance();
            self.descend()?;
            let child = self.parse_not();
            self.depth -= 1;
            return Ok(RuleNode::not(child?));
        }
        self.parse_primary()
    }

    fn descend(&mut self) -> crate::Result<()> {
        if self.depth >= MAX_NESTING {
            return Err(expression_error(format!(
                "nested deeper than {} levels",
                MAX_NESTING
            )));
        }
        self.depth += 1;
        Ok(())
    }

    fn parse_primary(&mut self) -> crate::Result<RuleNode> {
        match self.advance() {
            Some(Token::Open) => {
                self.descend()?;
                let node = self.parse_or();
                self.depth -= 1;
                let node = node?;
                match self.advance() {
                    Some(Token::Close) => Ok(node),
                    Some(token) => Err(expression_error(format!("expected ')', found {}", token))),
                    None => Err(expression_error("unclosed '('".to_string())),
                }
            }
            Some(Token::Word(first)) => {
                let mut name = first.to_string();
                while let Some(Token::Word(next)) = self.peek() {
                    name.push(' ');
                    name.push_str(next);
                    self.pos += 1;
                }
                Ok(RuleNode::Leaf(name))
            }
            Some(token) => Err(expression_error(format!("expected a principal name, found {}", token))),
            None => Err(expression_error("expression ended early".to_string())),
        }
    }
}
