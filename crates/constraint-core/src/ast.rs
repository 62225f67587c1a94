//! Constraint AST - closed node family for mortgage-eligibility rules
//!
//! The tree is split in two layers:
//! - **Constraint**: boolean-producing rules (TaskConstraint, ComparisonConstraint,
//!   MaintainRatioConstraint, OneOf, AllOf, If)
//! - **Operands**: the expression pieces rules are built from (Value, Variable,
//!   TaskResult, AffineTerm, AffineExpression)
//!
//! `Node` is the union of both. Every enum is matched exhaustively; adding a kind
//! is a compile error in every consumer until it is handled.
//!
//! ## Wire format
//!
//! Nodes are JSON objects internally tagged by `"typename"`:
//!
//! ```text
//! {"typename":"ComparisonConstraint",
//!  "lhs":{"typename":"Variable","name":"loan_amount"},
//!  "operator":">=",
//!  "rhs":{"typename":"Value","type":"number","value":50000}}
//! ```
//!
//! Shape is enforced while deserializing: task paths must start with `$`,
//! coefficients and ratios must be numeric, and an `If` condition must be a
//! ComparisonConstraint.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// =============================================================================
// KIND TAGS
// =============================================================================

/// Kind tag of every node in the family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeKind {
    Value,
    Variable,
    TaskResult,
    AffineTerm,
    AffineExpression,
    TaskConstraint,
    ComparisonConstraint,
    MaintainRatioConstraint,
    OneOf,
    AllOf,
    If,
}

impl NodeKind {
    pub const ALL: [NodeKind; 11] = [
        NodeKind::Value,
        NodeKind::Variable,
        NodeKind::TaskResult,
        NodeKind::AffineTerm,
        NodeKind::AffineExpression,
        NodeKind::TaskConstraint,
        NodeKind::ComparisonConstraint,
        NodeKind::MaintainRatioConstraint,
        NodeKind::OneOf,
        NodeKind::AllOf,
        NodeKind::If,
    ];

    /// The `typename` string used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Value => "Value",
            NodeKind::Variable => "Variable",
            NodeKind::TaskResult => "TaskResult",
            NodeKind::AffineTerm => "AffineTerm",
            NodeKind::AffineExpression => "AffineExpression",
            NodeKind::TaskConstraint => "TaskConstraint",
            NodeKind::ComparisonConstraint => "ComparisonConstraint",
            NodeKind::MaintainRatioConstraint => "MaintainRatioConstraint",
            NodeKind::OneOf => "OneOf",
            NodeKind::AllOf => "AllOf",
            NodeKind::If => "If",
        }
    }

    /// True for kinds that evaluate to a boolean-producing rule
    pub fn is_constraint(&self) -> bool {
        match self {
            NodeKind::TaskConstraint
            | NodeKind::ComparisonConstraint
            | NodeKind::MaintainRatioConstraint
            | NodeKind::OneOf
            | NodeKind::AllOf
            | NodeKind::If => true,
            NodeKind::Value
            | NodeKind::Variable
            | NodeKind::TaskResult
            | NodeKind::AffineTerm
            | NodeKind::AffineExpression => false,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for parsing NodeKind
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown node kind '{0}'")]
pub struct ParseKindError(pub String);

impl FromStr for NodeKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ParseKindError(s.to_string()))
    }
}

// =============================================================================
// LEAVES
// =============================================================================

/// Literal value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    Number(f64),
    String(String),
    Boolean(bool),
}

impl Value {
    pub fn number(n: f64) -> Self {
        Value::Number(n)
    }

    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::String(_) | Value::Boolean(_) => None,
        }
    }
}

/// A Value restricted to `type: "number"`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct NumericValue(pub f64);

impl TryFrom<Value> for NumericValue {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        value
            .as_number()
            .map(NumericValue)
            .ok_or_else(|| format!("expected a numeric Value, got {:?}", value))
    }
}

impl From<NumericValue> for Value {
    fn from(n: NumericValue) -> Self {
        Value::Number(n.0)
    }
}

/// Named scalar reference: `vars.<name>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
}

impl Variable {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Reference to a previously fetched task's result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    pub name: String,
}

impl TaskResult {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

// =============================================================================
// AFFINE EXPRESSIONS
// =============================================================================

/// Coefficient or constant term of an affine expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "typename")]
pub enum Scalar {
    Value(NumericValue),
    TaskResult(TaskResult),
}

/// `coefficient * variable`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffineTerm {
    pub coefficient: Scalar,
    #[serde(with = "tagged")]
    pub variable: Variable,
}

impl AffineTerm {
    pub fn new(coefficient: Scalar, variable: Variable) -> Self {
        Self {
            coefficient,
            variable,
        }
    }
}

/// Sum of affine terms and constants; both lists keep their order in output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffineExpression {
    #[serde(with = "tagged_vec")]
    pub affine_terms: Vec<AffineTerm>,
    pub constant_terms: Vec<Scalar>,
}

/// Right-hand side of comparisons and denominator of ratios
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "typename")]
pub enum Operand {
    Value(Value),
    Variable(Variable),
    TaskResult(TaskResult),
    AffineExpression(AffineExpression),
}

impl Operand {
    pub fn kind(&self) -> NodeKind {
        match self {
            Operand::Value(_) => NodeKind::Value,
            Operand::Variable(_) => NodeKind::Variable,
            Operand::TaskResult(_) => NodeKind::TaskResult,
            Operand::AffineExpression(_) => NodeKind::AffineExpression,
        }
    }
}

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "<=")]
    Lte,
}

impl Operator {
    /// Source symbol, as written inside `maintain_ratio(..)`
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Gte => ">=",
            Operator::Eq => "==",
            Operator::Lte => "<=",
        }
    }

    /// DSL comparison method name
    pub fn method(&self) -> &'static str {
        match self {
            Operator::Gte => "is_gte",
            Operator::Eq => "is_eq",
            Operator::Lte => "is_lte",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

// =============================================================================
// CONSTRAINTS
// =============================================================================

/// JSONPath-like task selector, always rooted at `$`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskPath(String);

impl TaskPath {
    pub fn new(path: impl Into<String>) -> Result<Self, String> {
        let path = path.into();
        if path.starts_with('$') {
            Ok(Self(path))
        } else {
            Err(format!("task path must start with '$', got \"{}\"", path))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Identifier bound to the fetched value: the last dot-delimited segment
    ///
    /// `$.a.b.c` binds `c` no matter how deeply the constraint is nested.
    pub fn binding(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }
}

impl TryFrom<String> for TaskPath {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TaskPath::new(value)
    }
}

impl From<TaskPath> for String {
    fn from(path: TaskPath) -> Self {
        path.0
    }
}

impl fmt::Display for TaskPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Root a task is fetched from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTaskRoot", into = "RawTaskRoot")]
pub enum TaskRoot {
    /// The top-level loan file
    Loan,
    /// A binding introduced by an enclosing TaskConstraint
    Result(TaskResult),
}

impl TaskRoot {
    pub fn name(&self) -> &str {
        match self {
            TaskRoot::Loan => "Loan",
            TaskRoot::Result(r) => &r.name,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct RawTaskRoot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    typename: Option<String>,
    name: String,
}

impl TryFrom<RawTaskRoot> for TaskRoot {
    type Error = String;

    fn try_from(raw: RawTaskRoot) -> Result<Self, Self::Error> {
        match raw.typename.as_deref() {
            Some("TaskResult") => Ok(TaskRoot::Result(TaskResult::new(raw.name))),
            None if raw.name == "Loan" => Ok(TaskRoot::Loan),
            None => Err(format!(
                "task root '{}' must be Loan or a TaskResult",
                raw.name
            )),
            Some(other) => Err(format!("task root cannot be a {}", other)),
        }
    }
}

impl From<TaskRoot> for RawTaskRoot {
    fn from(root: TaskRoot) -> Self {
        match root {
            TaskRoot::Loan => RawTaskRoot {
                typename: None,
                name: "Loan".to_string(),
            },
            TaskRoot::Result(r) => RawTaskRoot {
                typename: Some("TaskResult".to_string()),
                name: r.name,
            },
        }
    }
}

/// Fetch a task value, optionally checking an inner constraint against it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskConstraint {
    pub root: TaskRoot,
    pub path: TaskPath,
    /// Broadcast `inner` over every element of the fetched array
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub array: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner: Option<Box<Constraint>>,
}

impl TaskConstraint {
    pub fn new(root: TaskRoot, path: TaskPath) -> Self {
        Self {
            root,
            path,
            array: false,
            inner: None,
        }
    }

    pub fn with_inner(mut self, inner: Constraint) -> Self {
        self.inner = Some(Box::new(inner));
        self
    }

    pub fn broadcast(mut self) -> Self {
        self.array = true;
        self
    }

    pub fn binding(&self) -> &str {
        self.path.binding()
    }
}

/// `lhs <op> rhs`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonConstraint {
    #[serde(with = "tagged")]
    pub lhs: Variable,
    pub operator: Operator,
    pub rhs: Operand,
}

impl ComparisonConstraint {
    pub fn new(lhs: Variable, operator: Operator, rhs: Operand) -> Self {
        Self { lhs, operator, rhs }
    }
}

/// `numerator / denominator <op> ratio`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintainRatioConstraint {
    #[serde(with = "tagged")]
    pub numerator: Variable,
    pub denominator: Operand,
    pub operator: Operator,
    #[serde(with = "tagged")]
    pub ratio: NumericValue,
}

/// Disjunction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneOf {
    pub options: Vec<Constraint>,
}

/// Conjunction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllOf {
    pub preds: Vec<Constraint>,
}

/// Conditional rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct If {
    #[serde(with = "tagged")]
    pub cond: ComparisonConstraint,
    pub then: Box<Constraint>,
    #[serde(rename = "else", default, skip_serializing_if = "Option::is_none")]
    pub otherwise: Option<Box<Constraint>>,
}

/// Boolean-producing rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "typename")]
pub enum Constraint {
    TaskConstraint(TaskConstraint),
    ComparisonConstraint(ComparisonConstraint),
    MaintainRatioConstraint(MaintainRatioConstraint),
    OneOf(OneOf),
    AllOf(AllOf),
    If(If),
}

impl Constraint {
    pub fn kind(&self) -> NodeKind {
        match self {
            Constraint::TaskConstraint(_) => NodeKind::TaskConstraint,
            Constraint::ComparisonConstraint(_) => NodeKind::ComparisonConstraint,
            Constraint::MaintainRatioConstraint(_) => NodeKind::MaintainRatioConstraint,
            Constraint::OneOf(_) => NodeKind::OneOf,
            Constraint::AllOf(_) => NodeKind::AllOf,
            Constraint::If(_) => NodeKind::If,
        }
    }

    /// Directly nested constraints, labelled with their location relative to `self`
    pub fn children(&self) -> Vec<(String, &Constraint)> {
        match self {
            Constraint::TaskConstraint(t) => t
                .inner
                .iter()
                .map(|c| ("inner".to_string(), c.as_ref()))
                .collect(),
            Constraint::ComparisonConstraint(_) | Constraint::MaintainRatioConstraint(_) => {
                Vec::new()
            }
            Constraint::OneOf(o) => o
                .options
                .iter()
                .enumerate()
                .map(|(i, c)| (format!("options[{}]", i), c))
                .collect(),
            Constraint::AllOf(a) => a
                .preds
                .iter()
                .enumerate()
                .map(|(i, c)| (format!("preds[{}]", i), c))
                .collect(),
            Constraint::If(i) => {
                let mut out = vec![("then".to_string(), i.then.as_ref())];
                if let Some(otherwise) = &i.otherwise {
                    out.push(("else".to_string(), otherwise.as_ref()));
                }
                out
            }
        }
    }

    /// Pre-order walk of every constraint in the tree, `self` first
    pub fn walk(&self) -> Vec<(NodePath, &Constraint)> {
        let mut out = Vec::new();
        let mut stack = vec![(NodePath::root(), self)];
        while let Some((path, node)) = stack.pop() {
            let children = node.children();
            for (segment, child) in children.into_iter().rev() {
                stack.push((path.child(&segment), child));
            }
            out.push((path, node));
        }
        out
    }
}

// =============================================================================
// NODE - THE FULL FAMILY
// =============================================================================

/// Any node of the family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "typename")]
pub enum Node {
    Value(Value),
    Variable(Variable),
    TaskResult(TaskResult),
    AffineTerm(AffineTerm),
    AffineExpression(AffineExpression),
    TaskConstraint(TaskConstraint),
    ComparisonConstraint(ComparisonConstraint),
    MaintainRatioConstraint(MaintainRatioConstraint),
    OneOf(OneOf),
    AllOf(AllOf),
    If(If),
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Value(_) => NodeKind::Value,
            Node::Variable(_) => NodeKind::Variable,
            Node::TaskResult(_) => NodeKind::TaskResult,
            Node::AffineTerm(_) => NodeKind::AffineTerm,
            Node::AffineExpression(_) => NodeKind::AffineExpression,
            Node::TaskConstraint(_) => NodeKind::TaskConstraint,
            Node::ComparisonConstraint(_) => NodeKind::ComparisonConstraint,
            Node::MaintainRatioConstraint(_) => NodeKind::MaintainRatioConstraint,
            Node::OneOf(_) => NodeKind::OneOf,
            Node::AllOf(_) => NodeKind::AllOf,
            Node::If(_) => NodeKind::If,
        }
    }

    /// Narrow to a Constraint, handing the node back if it is an operand
    pub fn into_constraint(self) -> Result<Constraint, Node> {
        match self {
            Node::TaskConstraint(c) => Ok(Constraint::TaskConstraint(c)),
            Node::ComparisonConstraint(c) => Ok(Constraint::ComparisonConstraint(c)),
            Node::MaintainRatioConstraint(c) => Ok(Constraint::MaintainRatioConstraint(c)),
            Node::OneOf(c) => Ok(Constraint::OneOf(c)),
            Node::AllOf(c) => Ok(Constraint::AllOf(c)),
            Node::If(c) => Ok(Constraint::If(c)),
            other @ (Node::Value(_)
            | Node::Variable(_)
            | Node::TaskResult(_)
            | Node::AffineTerm(_)
            | Node::AffineExpression(_)) => Err(other),
        }
    }
}

impl From<Constraint> for Node {
    fn from(c: Constraint) -> Self {
        match c {
            Constraint::TaskConstraint(c) => Node::TaskConstraint(c),
            Constraint::ComparisonConstraint(c) => Node::ComparisonConstraint(c),
            Constraint::MaintainRatioConstraint(c) => Node::MaintainRatioConstraint(c),
            Constraint::OneOf(c) => Node::OneOf(c),
            Constraint::AllOf(c) => Node::AllOf(c),
            Constraint::If(c) => Node::If(c),
        }
    }
}

impl From<Operand> for Node {
    fn from(o: Operand) -> Self {
        match o {
            Operand::Value(v) => Node::Value(v),
            Operand::Variable(v) => Node::Variable(v),
            Operand::TaskResult(r) => Node::TaskResult(r),
            Operand::AffineExpression(e) => Node::AffineExpression(e),
        }
    }
}

impl From<Scalar> for Node {
    fn from(s: Scalar) -> Self {
        match s {
            Scalar::Value(n) => Node::Value(n.into()),
            Scalar::TaskResult(r) => Node::TaskResult(r),
        }
    }
}

macro_rules! node_conversions {
    ($($kind:ident),* $(,)?) => {
        $(
            impl From<$kind> for Node {
                fn from(inner: $kind) -> Self {
                    Node::$kind(inner)
                }
            }

            impl TryFrom<Node> for $kind {
                type Error = String;

                fn try_from(node: Node) -> Result<Self, Self::Error> {
                    match node {
                        Node::$kind(inner) => Ok(inner),
                        other => Err(format!(
                            "expected {}, got {}",
                            stringify!($kind),
                            other.kind()
                        )),
                    }
                }
            }
        )*
    };
}

node_conversions!(
    Value,
    Variable,
    TaskResult,
    AffineTerm,
    AffineExpression,
    ComparisonConstraint,
);

impl From<NumericValue> for Node {
    fn from(n: NumericValue) -> Self {
        Node::Value(n.into())
    }
}

impl TryFrom<Node> for NumericValue {
    type Error = String;

    fn try_from(node: Node) -> Result<Self, Self::Error> {
        match node {
            Node::Value(v) => NumericValue::try_from(v),
            other => Err(format!("expected a numeric Value, got {}", other.kind())),
        }
    }
}

// =============================================================================
// NODE PATHS
// =============================================================================

/// Location of a sub-node inside a tree, e.g. `root.preds[1].inner`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodePath(String);

impl NodePath {
    pub fn root() -> Self {
        Self("root".to_string())
    }

    pub fn child(&self, segment: &str) -> Self {
        Self(format!("{}.{}", self.0, segment))
    }

    pub fn is_root(&self) -> bool {
        self.0 == "root"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// SERDE ADAPTERS
// =============================================================================

/// Serialize a bare struct field with its `typename` tag by routing through `Node`
mod tagged {
    use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};

    use super::Node;

    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Clone + Into<Node>,
        S: Serializer,
    {
        value.clone().into().serialize(serializer)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: TryFrom<Node, Error = String>,
        D: Deserializer<'de>,
    {
        let node = Node::deserialize(deserializer)?;
        T::try_from(node).map_err(D::Error::custom)
    }
}

mod tagged_vec {
    use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};

    use super::Node;

    pub fn serialize<T, S>(values: &[T], serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Clone + Into<Node>,
        S: Serializer,
    {
        let nodes: Vec<Node> = values.iter().cloned().map(Into::into).collect();
        nodes.serialize(serializer)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        T: TryFrom<Node, Error = String>,
        D: Deserializer<'de>,
    {
        Vec::<Node>::deserialize(deserializer)?
            .into_iter()
            .map(|n| T::try_from(n).map_err(D::Error::custom))
            .collect()
    }
}
