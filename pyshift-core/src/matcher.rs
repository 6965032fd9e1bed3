//! Structural Pattern Matcher
//!
//! Patterns are plain data: literal node shapes with per-field sub-patterns,
//! wildcards, sequence wildcards over ordered child lists (argument and
//! parameter lists), and reified predicates over such lists. Fields a pattern
//! does not mention are "don't care". Name matching is exact and
//! case-sensitive.
//!
//! Sequence wildcards commit to the shortest expansion that lets the fixed
//! elements after them match; there is no backtracking. When more than one
//! expansion would have worked the match is reported as ambiguous.

use crate::syntax::{Field, SyntaxKind, SyntaxNode};
use std::collections::BTreeSet;

/// A template over node shapes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    /// Matches any single node
    Wildcard,
    /// The field must be missing; only valid as a field pattern
    Absent,
    /// An identifier with exactly this text
    Name(String),
    /// Kind plus constraints on the named fields
    Node(NodePattern),
    /// Ordered match over the child nodes of the candidate
    Sequence(Vec<Pattern>),
    /// Zero or more items; only valid inside a sequence
    ZeroOrMore,
    /// One or more items; only valid inside a sequence
    OneOrMore,
    /// Boolean test over the child nodes of the candidate
    Predicate(Predicate),
    /// First alternative that matches
    AnyOf(Vec<Pattern>),
    /// Matches a single node the inner pattern rejects
    Not(Box<Pattern>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePattern {
    pub kind: SyntaxKind,
    pub fields: Vec<(Field, Pattern)>,
}

impl NodePattern {
    pub fn new(kind: SyntaxKind) -> Self {
        Self {
            kind,
            fields: Vec::new(),
        }
    }

    /// Constrain `field`; later constraints on the same field are all checked
    pub fn with(mut self, field: Field, pattern: impl Into<Pattern>) -> Self {
        self.fields.push((field, pattern.into()));
        self
    }
}

impl From<NodePattern> for Pattern {
    fn from(pattern: NodePattern) -> Self {
        Pattern::Node(pattern)
    }
}

impl From<Predicate> for Pattern {
    fn from(predicate: Predicate) -> Self {
        Pattern::Predicate(predicate)
    }
}

/// Named predicates over a candidate collection (the child nodes of a list)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// At least one keyword argument is named with a member of the set
    AnyKeywordOf(BTreeSet<String>),
    /// No keyword argument is named with a member of the set
    NoKeywordOf(BTreeSet<String>),
    /// At least this many items
    CountAtLeast(usize),
    /// At least one item matches the pattern
    AnyItem(Box<Pattern>),
}

impl Predicate {
    pub fn any_keyword_of<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::AnyKeywordOf(names.into_iter().map(Into::into).collect())
    }

    pub fn test(&self, items: &[SyntaxNode], report: &mut MatchReport) -> bool {
        match self {
            Self::AnyKeywordOf(names) => keyword_names(items).any(|name| names.contains(&name)),
            Self::NoKeywordOf(names) => !keyword_names(items).any(|name| names.contains(&name)),
            Self::CountAtLeast(count) => items.len() >= *count,
            Self::AnyItem(pattern) => items.iter().any(|item| match_node(item, pattern, report)),
        }
    }
}

fn keyword_names(items: &[SyntaxNode]) -> impl Iterator<Item = String> + '_ {
    items
        .iter()
        .filter(|item| item.is(SyntaxKind::KeywordArgument))
        .filter_map(|item| item.field(Field::Name))
        .map(|name| name.significant_text())
}

/// A sequence wildcard that admitted several expansions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ambiguity {
    pub kind: SyntaxKind,
    pub snippet: String,
    pub expansions: Vec<usize>,
    pub chosen: usize,
}

/// Side information collected while matching
#[derive(Debug, Clone, Default)]
pub struct MatchReport {
    pub ambiguities: Vec<Ambiguity>,
}

/// Reason a pattern was rejected at rule registration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct MalformedPattern {
    pub reason: String,
}

impl MalformedPattern {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    Root,
    Field,
    SequenceElement,
}

impl Pattern {
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    pub fn node(kind: SyntaxKind) -> NodePattern {
        NodePattern::new(kind)
    }

    /// `object.attribute`
    pub fn attribute(object: impl Into<Pattern>, attribute: impl Into<Pattern>) -> Self {
        NodePattern::new(SyntaxKind::Attribute)
            .with(Field::Object, object)
            .with(Field::Attribute, attribute)
            .into()
    }

    /// Call of `function`; constrain arguments with [`NodePattern::with`]
    pub fn call(function: impl Into<Pattern>) -> NodePattern {
        NodePattern::new(SyntaxKind::Call).with(Field::Function, function)
    }

    /// Call whose callee is `<anything>.method`
    pub fn method_call(method: &str) -> NodePattern {
        Self::call(Self::attribute(Self::Wildcard, Self::name(method)))
    }

    pub fn keyword_argument(name: &str) -> Self {
        NodePattern::new(SyntaxKind::KeywordArgument)
            .with(Field::Name, Self::name(name))
            .into()
    }

    /// Exactly `count` positional arguments; `*args` counts, keywords and `**kwargs` do not
    pub fn positional(count: usize) -> Self {
        let named = Self::AnyOf(vec![
            NodePattern::new(SyntaxKind::KeywordArgument).into(),
            NodePattern::new(SyntaxKind::DictionarySplat).into(),
        ]);
        Self::Sequence(vec![Self::Not(Box::new(named)); count])
    }

    /// Method definition `def name(receiver, ...)`
    pub fn method_definition(name: &str) -> Self {
        NodePattern::new(SyntaxKind::FunctionDefinition)
            .with(Field::Name, Self::name(name))
            .with(
                Field::Parameters,
                Self::Sequence(vec![
                    NodePattern::new(SyntaxKind::Identifier).into(),
                    Self::ZeroOrMore,
                ]),
            )
            .into()
    }

    fn is_sequence_wildcard(&self) -> bool {
        matches!(self, Self::ZeroOrMore | Self::OneOrMore)
    }

    /// Check the pattern is structurally consistent
    pub fn validate(&self) -> Result<(), MalformedPattern> {
        self.validate_at(Position::Root)
    }

    fn validate_at(&self, position: Position) -> Result<(), MalformedPattern> {
        match self {
            Self::Wildcard => Ok(()),
            Self::Absent if position == Position::Field => Ok(()),
            Self::Absent => Err(MalformedPattern::new("`Absent` is only valid as a field pattern")),
            Self::Name(name) if name.is_empty() => Err(MalformedPattern::new("empty name pattern")),
            Self::Name(_) => Ok(()),
            Self::Node(node) => node
                .fields
                .iter()
                .try_for_each(|(_, pattern)| pattern.validate_at(Position::Field)),
            Self::Sequence(elements) => {
                for pair in elements.windows(2) {
                    if pair[0].is_sequence_wildcard() && pair[1].is_sequence_wildcard() {
                        return Err(MalformedPattern::new(
                            "adjacent sequence wildcards with no fixed separator",
                        ));
                    }
                }
                elements
                    .iter()
                    .try_for_each(|element| element.validate_at(Position::SequenceElement))
            }
            Self::ZeroOrMore | Self::OneOrMore if position == Position::SequenceElement => Ok(()),
            Self::ZeroOrMore | Self::OneOrMore => Err(MalformedPattern::new(
                "sequence wildcard outside of a sequence",
            )),
            Self::Predicate(Predicate::AnyKeywordOf(names) | Predicate::NoKeywordOf(names))
                if names.is_empty() =>
            {
                Err(MalformedPattern::new("keyword predicate over an empty set"))
            }
            Self::Predicate(Predicate::AnyItem(pattern)) => pattern.validate_at(Position::Root),
            Self::Predicate(_) => Ok(()),
            Self::AnyOf(alternatives) if alternatives.is_empty() => {
                Err(MalformedPattern::new("`AnyOf` without alternatives"))
            }
            Self::AnyOf(alternatives) => alternatives
                .iter()
                .try_for_each(|alternative| alternative.validate_at(position)),
            Self::Not(inner) => inner.validate_at(Position::Root),
        }
    }
}

/// Test `node` against `pattern`
pub fn matches(node: &SyntaxNode, pattern: &Pattern) -> bool {
    match_node(node, pattern, &mut MatchReport::default())
}

/// Test `node` against `pattern`, recording ambiguities in `report`
pub fn match_node(node: &SyntaxNode, pattern: &Pattern, report: &mut MatchReport) -> bool {
    match pattern {
        Pattern::Wildcard => true,
        Pattern::Absent | Pattern::ZeroOrMore | Pattern::OneOrMore => false,
        Pattern::Name(name) => {
            node.is(SyntaxKind::Identifier) && node.significant_text() == *name
        }
        Pattern::Node(shape) => {
            node.kind() == shape.kind
                && shape.fields.iter().all(|(field, sub)| match sub {
                    Pattern::Absent => node.field(*field).is_none(),
                    _ => node
                        .field(*field)
                        .is_some_and(|child| match_node(&child, sub, report)),
                })
        }
        Pattern::Sequence(elements) => {
            let items: Vec<SyntaxNode> = node.nodes().collect();
            match_sequence(node, &items, elements, report)
        }
        Pattern::Predicate(predicate) => {
            let items: Vec<SyntaxNode> = node.nodes().collect();
            predicate.test(&items, report)
        }
        Pattern::AnyOf(alternatives) => alternatives
            .iter()
            .any(|alternative| match_node(node, alternative, report)),
        Pattern::Not(inner) => !match_node(node, inner, &mut MatchReport::default()),
    }
}

fn match_run(items: &[SyntaxNode], run: &[Pattern], report: &mut MatchReport) -> bool {
    items.len() == run.len()
        && items
            .iter()
            .zip(run)
            .all(|(item, pattern)| match_node(item, pattern, report))
}

fn match_sequence(
    parent: &SyntaxNode,
    items: &[SyntaxNode],
    elements: &[Pattern],
    report: &mut MatchReport,
) -> bool {
    let mut item = 0;
    let mut element = 0;

    while element < elements.len() {
        let pattern = &elements[element];
        if !pattern.is_sequence_wildcard() {
            if item >= items.len() || !match_node(&items[item], pattern, report) {
                return false;
            }
            item += 1;
            element += 1;
            continue;
        }

        let min = usize::from(matches!(pattern, Pattern::OneOrMore));
        let run_end = elements[element + 1..]
            .iter()
            .position(Pattern::is_sequence_wildcard)
            .map_or(elements.len(), |offset| element + 1 + offset);
        let run = &elements[element + 1..run_end];

        let Some(max) = items.len().checked_sub(item + run.len()) else {
            return false;
        };
        if max < min {
            return false;
        }

        if run_end == elements.len() {
            // Trailing wildcard: the fixed run is anchored at the end
            return match_run(&items[item + max..], run, report);
        }

        let mut scratch = MatchReport::default();
        let expansions: Vec<usize> = (min..=max)
            .filter(|&k| match_run(&items[item + k..item + k + run.len()], run, &mut scratch))
            .collect();
        let Some(&chosen) = expansions.first() else {
            return false;
        };
        if expansions.len() > 1 {
            report.ambiguities.push(Ambiguity {
                kind: parent.kind(),
                snippet: parent.significant_text(),
                expansions: expansions.clone(),
                chosen,
            });
        }
        report.ambiguities.extend(scratch.ambiguities);

        item += chosen + run.len();
        element = run_end;
    }

    item == items.len()
}
