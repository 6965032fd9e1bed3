//! Immutable Concrete Syntax Tree
//!
//! Nodes are `rowan` green nodes: immutable, shared and cheap to clone. A
//! rewrite allocates a new parent that points at a mix of old and new
//! children. Whitespace and comments are kept as trivia tokens, so printing
//! a parsed tree reproduces its source byte for byte.
//!
//! Green nodes carry no field labels. A labelled child sits inside a slot
//! node whose kind encodes the field; slots hold no text of their own.

use rowan::{GreenNode, GreenNodeBuilder, GreenNodeData, GreenToken, GreenTokenData, Language, NodeOrToken};
use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::sync::OnceLock;

type GreenElement = NodeOrToken<GreenNode, GreenToken>;
type GreenElementRef<'a> = NodeOrToken<&'a GreenNodeData, &'a GreenTokenData>;

/// Node kinds, named after the tree-sitter-python grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SyntaxKind {
    Module,
    ImportStatement,
    ImportFromStatement,
    FutureImportStatement,
    AliasedImport,
    DottedName,
    RelativeImport,
    WildcardImport,
    ClassDefinition,
    FunctionDefinition,
    DecoratedDefinition,
    Decorator,
    Parameters,
    LambdaParameters,
    DefaultParameter,
    TypedParameter,
    TypedDefaultParameter,
    ListSplatPattern,
    DictionarySplatPattern,
    Block,
    ExpressionStatement,
    Assignment,
    AugmentedAssignment,
    ForStatement,
    WhileStatement,
    IfStatement,
    ElifClause,
    ElseClause,
    TryStatement,
    ExceptClause,
    FinallyClause,
    WithStatement,
    NamedExpression,
    AsPattern,
    GlobalStatement,
    Lambda,
    ListComprehension,
    SetComprehension,
    DictionaryComprehension,
    GeneratorExpression,
    ForInClause,
    Call,
    ArgumentList,
    KeywordArgument,
    ListSplat,
    DictionarySplat,
    Attribute,
    Subscript,
    Identifier,
    Integer,
    StringLiteral,
    Type,
    /// Any grammar node the engine has no dedicated handling for
    Other(&'static str),
}

impl SyntaxKind {
    /// Map a tree-sitter node kind
    pub fn from_ts(kind: &'static str) -> Self {
        match kind {
            "module" => Self::Module,
            "import_statement" => Self::ImportStatement,
            "import_from_statement" => Self::ImportFromStatement,
            "future_import_statement" => Self::FutureImportStatement,
            "aliased_import" => Self::AliasedImport,
            "dotted_name" => Self::DottedName,
            "relative_import" => Self::RelativeImport,
            "wildcard_import" => Self::WildcardImport,
            "class_definition" => Self::ClassDefinition,
            "function_definition" => Self::FunctionDefinition,
            "decorated_definition" => Self::DecoratedDefinition,
            "decorator" => Self::Decorator,
            "parameters" => Self::Parameters,
            "lambda_parameters" => Self::LambdaParameters,
            "default_parameter" => Self::DefaultParameter,
            "typed_parameter" => Self::TypedParameter,
            "typed_default_parameter" => Self::TypedDefaultParameter,
            "list_splat_pattern" => Self::ListSplatPattern,
            "dictionary_splat_pattern" => Self::DictionarySplatPattern,
            "block" => Self::Block,
            "expression_statement" => Self::ExpressionStatement,
            "assignment" => Self::Assignment,
            "augmented_assignment" => Self::AugmentedAssignment,
            "for_statement" => Self::ForStatement,
            "while_statement" => Self::WhileStatement,
            "if_statement" => Self::IfStatement,
            "elif_clause" => Self::ElifClause,
            "else_clause" => Self::ElseClause,
            "try_statement" => Self::TryStatement,
            "except_clause" => Self::ExceptClause,
            "finally_clause" => Self::FinallyClause,
            "with_statement" => Self::WithStatement,
            "named_expression" => Self::NamedExpression,
            "as_pattern" => Self::AsPattern,
            "global_statement" => Self::GlobalStatement,
            "lambda" => Self::Lambda,
            "list_comprehension" => Self::ListComprehension,
            "set_comprehension" => Self::SetComprehension,
            "dictionary_comprehension" => Self::DictionaryComprehension,
            "generator_expression" => Self::GeneratorExpression,
            "for_in_clause" => Self::ForInClause,
            "call" => Self::Call,
            "argument_list" => Self::ArgumentList,
            "keyword_argument" => Self::KeywordArgument,
            "list_splat" => Self::ListSplat,
            "dictionary_splat" => Self::DictionarySplat,
            "attribute" => Self::Attribute,
            "subscript" => Self::Subscript,
            "identifier" => Self::Identifier,
            "integer" => Self::Integer,
            "string" => Self::StringLiteral,
            "type" => Self::Type,
            other => Self::Other(other),
        }
    }

    /// Grammar name of this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::ImportStatement => "import_statement",
            Self::ImportFromStatement => "import_from_statement",
            Self::FutureImportStatement => "future_import_statement",
            Self::AliasedImport => "aliased_import",
            Self::DottedName => "dotted_name",
            Self::RelativeImport => "relative_import",
            Self::WildcardImport => "wildcard_import",
            Self::ClassDefinition => "class_definition",
            Self::FunctionDefinition => "function_definition",
            Self::DecoratedDefinition => "decorated_definition",
            Self::Decorator => "decorator",
            Self::Parameters => "parameters",
            Self::LambdaParameters => "lambda_parameters",
            Self::DefaultParameter => "default_parameter",
            Self::TypedParameter => "typed_parameter",
            Self::TypedDefaultParameter => "typed_default_parameter",
            Self::ListSplatPattern => "list_splat_pattern",
            Self::DictionarySplatPattern => "dictionary_splat_pattern",
            Self::Block => "block",
            Self::ExpressionStatement => "expression_statement",
            Self::Assignment => "assignment",
            Self::AugmentedAssignment => "augmented_assignment",
            Self::ForStatement => "for_statement",
            Self::WhileStatement => "while_statement",
            Self::IfStatement => "if_statement",
            Self::ElifClause => "elif_clause",
            Self::ElseClause => "else_clause",
            Self::TryStatement => "try_statement",
            Self::ExceptClause => "except_clause",
            Self::FinallyClause => "finally_clause",
            Self::WithStatement => "with_statement",
            Self::NamedExpression => "named_expression",
            Self::AsPattern => "as_pattern",
            Self::GlobalStatement => "global_statement",
            Self::Lambda => "lambda",
            Self::ListComprehension => "list_comprehension",
            Self::SetComprehension => "set_comprehension",
            Self::DictionaryComprehension => "dictionary_comprehension",
            Self::GeneratorExpression => "generator_expression",
            Self::ForInClause => "for_in_clause",
            Self::Call => "call",
            Self::ArgumentList => "argument_list",
            Self::KeywordArgument => "keyword_argument",
            Self::ListSplat => "list_splat",
            Self::DictionarySplat => "dictionary_splat",
            Self::Attribute => "attribute",
            Self::Subscript => "subscript",
            Self::Identifier => "identifier",
            Self::Integer => "integer",
            Self::StringLiteral => "string",
            Self::Type => "type",
            Self::Other(name) => name,
        }
    }

    /// Statements that make up the import section of a module
    pub fn is_import(&self) -> bool {
        matches!(
            self,
            Self::ImportStatement | Self::ImportFromStatement | Self::FutureImportStatement
        )
    }

    pub fn is_comprehension(&self) -> bool {
        matches!(
            self,
            Self::ListComprehension
                | Self::SetComprehension
                | Self::DictionaryComprehension
                | Self::GeneratorExpression
        )
    }

    /// Compound statements whose blocks still belong to the enclosing scope
    pub fn is_compound_statement(&self) -> bool {
        matches!(
            self,
            Self::IfStatement
                | Self::ElifClause
                | Self::ElseClause
                | Self::TryStatement
                | Self::ExceptClause
                | Self::FinallyClause
                | Self::WithStatement
                | Self::ForStatement
                | Self::WhileStatement
                | Self::Block
        )
    }
}

impl fmt::Display for SyntaxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Labels attached to children, named after tree-sitter field names
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Function,
    Arguments,
    Object,
    Attribute,
    Name,
    Value,
    Alias,
    ModuleName,
    Superclasses,
    Body,
    Parameters,
    ReturnType,
    Definition,
    Left,
    Right,
    Type,
    Other(&'static str),
}

impl Field {
    /// Map a tree-sitter field name
    pub fn from_ts(name: &'static str) -> Self {
        match name {
            "function" => Self::Function,
            "arguments" => Self::Arguments,
            "object" => Self::Object,
            "attribute" => Self::Attribute,
            "name" => Self::Name,
            "value" => Self::Value,
            "alias" => Self::Alias,
            "module_name" => Self::ModuleName,
            "superclasses" => Self::Superclasses,
            "body" => Self::Body,
            "parameters" => Self::Parameters,
            "return_type" => Self::ReturnType,
            "definition" => Self::Definition,
            "left" => Self::Left,
            "right" => Self::Right,
            "type" => Self::Type,
            other => Self::Other(other),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Arguments => "arguments",
            Self::Object => "object",
            Self::Attribute => "attribute",
            Self::Name => "name",
            Self::Value => "value",
            Self::Alias => "alias",
            Self::ModuleName => "module_name",
            Self::Superclasses => "superclasses",
            Self::Body => "body",
            Self::Parameters => "parameters",
            Self::ReturnType => "return_type",
            Self::Definition => "definition",
            Self::Left => "left",
            Self::Right => "right",
            Self::Type => "type",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TokenKind {
    /// Text of a named leaf (identifier, number, string piece)
    Text,
    /// Anonymous punctuation such as `(`, `.` or `=`
    Punct,
    /// Anonymous keyword such as `def` or `import`
    Keyword,
    Whitespace,
    Comment,
}

impl TokenKind {
    pub fn is_trivia(&self) -> bool {
        matches!(self, Self::Whitespace | Self::Comment)
    }

    /// Kind for inter-token source text; all-blank runs are whitespace
    pub fn of_gap(text: &str) -> Self {
        if text.chars().all(char::is_whitespace) {
            Self::Whitespace
        } else {
            Self::Text
        }
    }
}

/// What a raw rowan kind stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GreenKind {
    Node(SyntaxKind),
    Token(TokenKind),
    /// Wrapper around a child labelled with this field
    Slot(Field),
}

/// rowan language for Python trees
///
/// Node kinds are stored as tree-sitter-python symbol ids and slot kinds as
/// its field ids, so every grammar kind has a raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PythonLanguage {}

const NODE_BASE: u16 = 0x1000;
const UNKNOWN_NODE: u16 = 0x3fff;
const SLOT_BASE: u16 = 0x4000;

impl Language for PythonLanguage {
    type Kind = GreenKind;

    fn kind_from_raw(raw: rowan::SyntaxKind) -> Self::Kind {
        let language = tree_sitter_python::language();
        match raw.0 {
            id if id >= SLOT_BASE => {
                GreenKind::Slot(Field::from_ts(language.field_name_for_id(id - SLOT_BASE).unwrap_or("")))
            }
            UNKNOWN_NODE => GreenKind::Node(SyntaxKind::Other("ERROR")),
            id if id >= NODE_BASE => GreenKind::Node(SyntaxKind::from_ts(
                language.node_kind_for_id(id - NODE_BASE).unwrap_or("ERROR"),
            )),
            0 => GreenKind::Token(TokenKind::Text),
            1 => GreenKind::Token(TokenKind::Punct),
            2 => GreenKind::Token(TokenKind::Keyword),
            3 => GreenKind::Token(TokenKind::Whitespace),
            _ => GreenKind::Token(TokenKind::Comment),
        }
    }

    fn kind_to_raw(kind: Self::Kind) -> rowan::SyntaxKind {
        let raw = match kind {
            GreenKind::Token(TokenKind::Text) => 0,
            GreenKind::Token(TokenKind::Punct) => 1,
            GreenKind::Token(TokenKind::Keyword) => 2,
            GreenKind::Token(TokenKind::Whitespace) => 3,
            GreenKind::Token(TokenKind::Comment) => 4,
            GreenKind::Node(kind) => symbol_ids()
                .get(kind.as_str())
                .map_or(UNKNOWN_NODE, |id| NODE_BASE + id),
            GreenKind::Slot(field) => {
                SLOT_BASE + tree_sitter_python::language().field_id_for_name(field.as_str()).unwrap_or(0)
            }
        };
        rowan::SyntaxKind(raw)
    }
}

/// Symbol ids of the named grammar kinds
fn symbol_ids() -> &'static HashMap<&'static str, u16> {
    static IDS: OnceLock<HashMap<&'static str, u16>> = OnceLock::new();
    IDS.get_or_init(|| {
        let language = tree_sitter_python::language();
        let mut ids = HashMap::new();
        for id in 0..language.node_kind_count() {
            let Ok(id) = u16::try_from(id) else { break };
            if !language.node_kind_is_named(id) {
                continue;
            }
            if let Some(name) = language.node_kind_for_id(id) {
                ids.entry(name).or_insert(id);
            }
        }
        ids
    })
}

fn raw(kind: GreenKind) -> rowan::SyntaxKind {
    PythonLanguage::kind_to_raw(kind)
}

fn decode(raw: rowan::SyntaxKind) -> GreenKind {
    PythonLanguage::kind_from_raw(raw)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token(GreenToken);

impl Token {
    pub fn new(kind: TokenKind, text: &str) -> Self {
        Self(GreenToken::new(raw(GreenKind::Token(kind)), text))
    }

    pub fn kind(&self) -> TokenKind {
        token_kind(&self.0)
    }

    pub fn text(&self) -> &str {
        self.0.text()
    }
}

fn token_kind(token: &GreenTokenData) -> TokenKind {
    match decode(token.kind()) {
        GreenKind::Token(kind) => kind,
        _ => TokenKind::Text,
    }
}

/// A child slot: either a node or a token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    Node(SyntaxNode),
    Token(Token),
}

impl Element {
    pub fn as_node(&self) -> Option<&SyntaxNode> {
        match self {
            Self::Node(node) => Some(node),
            Self::Token(_) => None,
        }
    }

    pub fn as_token(&self) -> Option<&Token> {
        match self {
            Self::Node(_) => None,
            Self::Token(token) => Some(token),
        }
    }

    pub fn is_trivia(&self) -> bool {
        matches!(self, Self::Token(token) if token.kind().is_trivia())
    }
}

/// An owned view of one child, with its field label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Child {
    pub field: Option<Field>,
    pub element: Element,
}

impl Child {
    pub fn node(field: Option<Field>, node: SyntaxNode) -> Self {
        Self {
            field,
            element: Element::Node(node),
        }
    }

    pub fn token(kind: TokenKind, text: &str) -> Self {
        Self {
            field: None,
            element: Element::Token(Token::new(kind, text)),
        }
    }

    pub fn as_node(&self) -> Option<&SyntaxNode> {
        self.element.as_node()
    }

    pub fn into_node(self) -> Option<SyntaxNode> {
        match self.element {
            Element::Node(node) => Some(node),
            Element::Token(_) => None,
        }
    }

    fn from_green(element: GreenElementRef<'_>) -> Self {
        match element {
            NodeOrToken::Token(token) => Self {
                field: None,
                element: Element::Token(Token(token.to_owned())),
            },
            NodeOrToken::Node(node) => match decode(node.kind()) {
                GreenKind::Slot(field) => match node.children().find_map(NodeOrToken::into_node) {
                    Some(inner) => Self::node(Some(field), SyntaxNode(inner.to_owned())),
                    None => Self::node(None, SyntaxNode(node.to_owned())),
                },
                _ => Self::node(None, SyntaxNode(node.to_owned())),
            },
        }
    }

    fn into_green(self) -> GreenElement {
        match (self.field, self.element) {
            (Some(field), Element::Node(node)) => NodeOrToken::Node(GreenNode::new(
                raw(GreenKind::Slot(field)),
                [NodeOrToken::Node(node.0)],
            )),
            (None, Element::Node(node)) => NodeOrToken::Node(node.0),
            (_, Element::Token(token)) => NodeOrToken::Token(token.0),
        }
    }
}

fn to_owned_element(element: GreenElementRef<'_>) -> GreenElement {
    match element {
        NodeOrToken::Node(node) => NodeOrToken::Node(node.to_owned()),
        NodeOrToken::Token(token) => NodeOrToken::Token(token.to_owned()),
    }
}

/// Immutable, cheaply clonable syntax node
///
/// Equality is structural; [`SyntaxNode::ptr_eq`] tells shared handles apart.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SyntaxNode(GreenNode);

impl fmt::Debug for SyntaxNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", self.kind(), self.text())
    }
}

impl fmt::Display for SyntaxNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_green(&self.0, f)
    }
}

fn write_green(node: &GreenNodeData, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for child in node.children() {
        match child {
            NodeOrToken::Node(inner) => write_green(inner, f)?,
            NodeOrToken::Token(token) => f.write_str(token.text())?,
        }
    }
    Ok(())
}

fn push_significant(node: &GreenNodeData, out: &mut String) {
    for child in node.children() {
        match child {
            NodeOrToken::Node(inner) => push_significant(inner, out),
            NodeOrToken::Token(token) if !token_kind(token).is_trivia() => out.push_str(token.text()),
            NodeOrToken::Token(_) => {}
        }
    }
}

impl SyntaxNode {
    pub fn new(kind: SyntaxKind, children: Vec<Child>) -> Self {
        Self(GreenNode::new(
            raw(GreenKind::Node(kind)),
            children.into_iter().map(Child::into_green),
        ))
    }

    /// Named leaf holding a single text token
    pub fn leaf(kind: SyntaxKind, text: &str) -> Self {
        Self::new(kind, vec![Child::token(TokenKind::Text, text)])
    }

    pub fn green(&self) -> &GreenNode {
        &self.0
    }

    pub fn kind(&self) -> SyntaxKind {
        match decode(self.0.kind()) {
            GreenKind::Node(kind) => kind,
            GreenKind::Slot(_) | GreenKind::Token(_) => SyntaxKind::Other("ERROR"),
        }
    }

    pub fn is(&self, kind: SyntaxKind) -> bool {
        self.kind() == kind
    }

    /// Children in source order, tokens included
    pub fn children(&self) -> impl Iterator<Item = Child> + '_ {
        self.0.children().map(Child::from_green)
    }

    pub fn child_count(&self) -> usize {
        self.0.children().len()
    }

    /// True when both handles share the same allocation
    pub fn ptr_eq(&self, other: &Self) -> bool {
        std::ptr::eq::<GreenNodeData>(&*self.0, &*other.0)
    }

    /// Child nodes in source order, skipping tokens
    pub fn nodes(&self) -> impl Iterator<Item = SyntaxNode> + '_ {
        self.children().filter_map(Child::into_node)
    }

    pub fn field(&self, field: Field) -> Option<SyntaxNode> {
        self.fields(field).next()
    }

    pub fn fields(&self, field: Field) -> impl Iterator<Item = SyntaxNode> + '_ {
        self.children()
            .filter(move |child| child.field == Some(field))
            .filter_map(Child::into_node)
    }

    pub fn field_index(&self, field: Field) -> Option<usize> {
        self.children()
            .position(|child| child.field == Some(field) && child.as_node().is_some())
    }

    /// Full source text including trivia
    pub fn text(&self) -> String {
        let mut out = String::with_capacity(usize::from(self.0.text_len()));
        push_text(&self.0, &mut out);
        out
    }

    /// Source text without whitespace and comments, e.g. `wx . adv` gives `wx.adv`
    pub fn significant_text(&self) -> String {
        let mut out = String::new();
        push_significant(&self.0, &mut out);
        out
    }

    /// Text of an identifier leaf
    pub fn identifier_text(&self) -> Option<String> {
        self.is(SyntaxKind::Identifier).then(|| self.significant_text())
    }

    /// Pre-order iterator over this node and every descendant node
    pub fn descendants(&self) -> Descendants {
        Descendants {
            stack: vec![self.clone()],
        }
    }

    pub fn with_children(&self, children: Vec<Child>) -> Self {
        Self(GreenNode::new(
            self.0.kind(),
            children.into_iter().map(Child::into_green),
        ))
    }

    /// Replace the first child labelled `field`, or append one if there is none
    pub fn with_field(&self, field: Field, node: SyntaxNode) -> Self {
        let slot = Child::node(Some(field), node).into_green();
        match self.field_index(field) {
            Some(index) => Self(self.0.replace_child(index, slot)),
            None => Self(self.0.insert_child(self.child_count(), slot)),
        }
    }

    /// Replace `range` of children with `replacement`
    pub fn splice(&self, range: Range<usize>, replacement: Vec<Child>) -> Self {
        Self(
            self.0
                .splice_children(range, replacement.into_iter().map(Child::into_green)),
        )
    }

    /// Rebuild with every child node passed through `f`
    ///
    /// Returns `self` (same allocation) when `f` hands back every child unchanged.
    pub fn map_children<F>(&self, mut f: F) -> Self
    where
        F: FnMut(Option<Field>, &SyntaxNode) -> SyntaxNode,
    {
        let mut rebuilt: Option<Vec<GreenElement>> = None;
        for (index, child) in self.children().enumerate() {
            let replaced = match &child.element {
                Element::Node(node) => {
                    let replaced = f(child.field, node);
                    if rebuilt.is_none() && !replaced.ptr_eq(node) {
                        rebuilt = Some(self.0.children().take(index).map(to_owned_element).collect());
                    }
                    Child::node(child.field, replaced)
                }
                Element::Token(_) => child,
            };
            if let Some(children) = rebuilt.as_mut() {
                children.push(replaced.into_green());
            }
        }
        match rebuilt {
            Some(children) => Self(GreenNode::new(self.0.kind(), children)),
            None => self.clone(),
        }
    }
}

fn push_text(node: &GreenNodeData, out: &mut String) {
    for child in node.children() {
        match child {
            NodeOrToken::Node(inner) => push_text(inner, out),
            NodeOrToken::Token(token) => out.push_str(token.text()),
        }
    }
}

/// See [`SyntaxNode::descendants`]
pub struct Descendants {
    stack: Vec<SyntaxNode>,
}

impl Iterator for Descendants {
    type Item = SyntaxNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        let children: Vec<SyntaxNode> = node.nodes().collect();
        self.stack.extend(children.into_iter().rev());
        Some(node)
    }
}

/// Builds a tree in source order; used by the parser
pub struct TreeBuilder {
    inner: GreenNodeBuilder<'static>,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self {
            inner: GreenNodeBuilder::new(),
        }
    }

    /// Open a node, labelled with `field` when given
    pub fn start_node(&mut self, field: Option<Field>, kind: SyntaxKind) {
        if let Some(field) = field {
            self.inner.start_node(raw(GreenKind::Slot(field)));
        }
        self.inner.start_node(raw(GreenKind::Node(kind)));
    }

    /// Close the node opened by the matching [`TreeBuilder::start_node`]
    pub fn finish_node(&mut self, field: Option<Field>) {
        self.inner.finish_node();
        if field.is_some() {
            self.inner.finish_node();
        }
    }

    pub fn token(&mut self, kind: TokenKind, text: &str) {
        self.inner.token(raw(GreenKind::Token(kind)), text);
    }

    pub fn finish(self) -> SyntaxNode {
        SyntaxNode(self.inner.finish())
    }
}

/// Constructors producing the same shapes the parser does
pub mod build {
    use super::{Child, Field, SyntaxKind, SyntaxNode, TokenKind};

    pub fn identifier(name: &str) -> SyntaxNode {
        SyntaxNode::leaf(SyntaxKind::Identifier, name)
    }

    pub fn integer(text: &str) -> SyntaxNode {
        SyntaxNode::leaf(SyntaxKind::Integer, text)
    }

    fn punct(text: &str) -> Child {
        Child::token(TokenKind::Punct, text)
    }

    fn keyword(text: &str) -> Child {
        Child::token(TokenKind::Keyword, text)
    }

    fn space() -> Child {
        Child::token(TokenKind::Whitespace, " ")
    }

    /// `object.name`
    pub fn attribute(object: SyntaxNode, name: &str) -> SyntaxNode {
        SyntaxNode::new(
            SyntaxKind::Attribute,
            vec![
                Child::node(Some(Field::Object), object),
                punct("."),
                Child::node(Some(Field::Attribute), identifier(name)),
            ],
        )
    }

    /// Expression for a dotted path: `a.b.c` becomes nested attributes
    pub fn dotted_expression(path: &str) -> SyntaxNode {
        let mut parts = path.split('.');
        let head = identifier(parts.next().unwrap_or_default());
        parts.fold(head, attribute)
    }

    /// `dotted_name` node as used in import statements
    pub fn dotted_name(path: &str) -> SyntaxNode {
        let mut children = Vec::new();
        for (index, part) in path.split('.').enumerate() {
            if index > 0 {
                children.push(punct("."));
            }
            children.push(Child::node(None, identifier(part)));
        }
        SyntaxNode::new(SyntaxKind::DottedName, children)
    }

    /// `-> annotation` type node
    pub fn type_annotation(expression: SyntaxNode) -> SyntaxNode {
        SyntaxNode::new(SyntaxKind::Type, vec![Child::node(None, expression)])
    }

    fn import_item(name: &str, alias: Option<&str>) -> SyntaxNode {
        match alias {
            Some(alias) => SyntaxNode::new(
                SyntaxKind::AliasedImport,
                vec![
                    Child::node(Some(Field::Name), dotted_name(name)),
                    space(),
                    keyword("as"),
                    space(),
                    Child::node(Some(Field::Alias), identifier(alias)),
                ],
            ),
            None => dotted_name(name),
        }
    }

    /// `import module [as alias]`
    pub fn import_statement(module: &str, alias: Option<&str>) -> SyntaxNode {
        import_statement_of(&[(module.to_string(), alias.map(str::to_string))])
    }

    /// `import a, b as c`
    pub fn import_statement_of(modules: &[(String, Option<String>)]) -> SyntaxNode {
        let mut children = vec![keyword("import"), space()];
        for (index, (module, alias)) in modules.iter().enumerate() {
            if index > 0 {
                children.push(punct(","));
                children.push(space());
            }
            children.push(Child::node(
                Some(Field::Name),
                import_item(module, alias.as_deref()),
            ));
        }
        SyntaxNode::new(SyntaxKind::ImportStatement, children)
    }

    /// `from module import a, b as c`
    pub fn import_from_statement(module: &str, names: &[(String, Option<String>)]) -> SyntaxNode {
        let mut children = vec![
            keyword("from"),
            space(),
            Child::node(Some(Field::ModuleName), dotted_name(module)),
            space(),
            keyword("import"),
            space(),
        ];
        for (index, (name, alias)) in names.iter().enumerate() {
            if index > 0 {
                children.push(punct(","));
                children.push(space());
            }
            children.push(Child::node(
                Some(Field::Name),
                import_item(name, alias.as_deref()),
            ));
        }
        SyntaxNode::new(SyntaxKind::ImportFromStatement, children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_prints_dotted() {
        let node = build::dotted_expression("wx.DateTime.FromDMY");
        assert_eq!(node.text(), "wx.DateTime.FromDMY");
        assert!(node.is(SyntaxKind::Attribute));
        let object = node.field(Field::Object).unwrap();
        assert_eq!(object.significant_text(), "wx.DateTime");
    }

    #[test]
    fn test_map_children_shares_unchanged_nodes() {
        let node = build::attribute(build::identifier("wx"), "Color");
        let same = node.map_children(|_, child| child.clone());
        assert!(same.ptr_eq(&node));

        let renamed = node.map_children(|field, child| match field {
            Some(Field::Attribute) => build::identifier("Colour"),
            _ => child.clone(),
        });
        assert_eq!(renamed.text(), "wx.Colour");
        assert!(renamed
            .field(Field::Object)
            .unwrap()
            .ptr_eq(&node.field(Field::Object).unwrap()));
    }

    #[test]
    fn test_structural_equality_ignores_allocation() {
        let a = build::dotted_name("wx.adv");
        let b = build::dotted_name("wx.adv");
        assert_eq!(a, b);
        assert_ne!(a, build::dotted_name("wx.lib"));
    }

    #[test]
    fn test_field_labels_survive_rewrites() {
        let node = build::attribute(build::identifier("wx"), "Color");
        let renamed = node.with_field(Field::Attribute, build::identifier("Colour"));
        assert_eq!(renamed.field(Field::Attribute).unwrap().text(), "Colour");
        assert_eq!(renamed.field_index(Field::Attribute), Some(2));
        assert_eq!(renamed.child_count(), 3);

        let spliced = renamed.splice(1..1, vec![Child::token(TokenKind::Whitespace, " ")]);
        assert_eq!(spliced.text(), "wx .Colour");
        assert_eq!(spliced.significant_text(), "wx.Colour");
        assert_eq!(spliced.field(Field::Object).unwrap().text(), "wx");
    }

    #[test]
    fn test_import_builders() {
        assert_eq!(build::import_statement("wx", None).text(), "import wx");
        assert_eq!(build::import_statement("wx", Some("w")).text(), "import wx as w");
        let names = vec![("Bitmap".to_string(), None), ("Icon".to_string(), Some("I".to_string()))];
        assert_eq!(
            build::import_from_statement("wx", &names).text(),
            "from wx import Bitmap, Icon as I"
        );
    }

    #[test]
    fn test_kind_round_trip() {
        for name in ["call", "attribute", "class_definition", "keyword_argument", "lambda"] {
            assert_eq!(SyntaxKind::from_ts(name).as_str(), name);
        }
        assert_eq!(SyntaxKind::from_ts("await"), SyntaxKind::Other("await"));
    }

    #[test]
    fn test_raw_kinds_round_trip_through_the_grammar() {
        for kind in [SyntaxKind::Call, SyntaxKind::Lambda, SyntaxKind::Other("conditional_expression")] {
            let raw = PythonLanguage::kind_to_raw(GreenKind::Node(kind));
            assert_eq!(PythonLanguage::kind_from_raw(raw), GreenKind::Node(kind));
        }
        for field in [Field::Body, Field::ModuleName, Field::Other("condition")] {
            let raw = PythonLanguage::kind_to_raw(GreenKind::Slot(field));
            assert_eq!(PythonLanguage::kind_from_raw(raw), GreenKind::Slot(field));
        }
        let raw = PythonLanguage::kind_to_raw(GreenKind::Token(TokenKind::Comment));
        assert_eq!(PythonLanguage::kind_from_raw(raw), GreenKind::Token(TokenKind::Comment));
    }
}
