//! Codegen - lowers the constraint AST to rule-DSL source
//!
//! Output is a single compact line with no inserted whitespace, so identical
//! trees always produce byte-identical text.
//!
//! ```text
//! AllOf[x >= 50000, fetch $.out_of_pocket]
//!   → dsl.allOf(vars.x.is_gte(50000),fetchTask(Loan)("$.out_of_pocket"))
//! ```

use std::fmt::Write;

use crate::ast::{
    AffineExpression, AffineTerm, AllOf, ComparisonConstraint, Constraint, If,
    MaintainRatioConstraint, Node, NumericValue, OneOf, Operand, Scalar, TaskConstraint,
    TaskResult, Value, Variable,
};

/// Compile any node to DSL source
pub fn compile(node: &Node) -> String {
    let mut out = String::new();
    node.emit(&mut out);
    out
}

/// Compile a constraint to DSL source
pub fn compile_constraint(constraint: &Constraint) -> String {
    let mut out = String::new();
    constraint.emit(&mut out);
    out
}

/// Append DSL source for a node to a buffer
pub trait Emit {
    fn emit(&self, out: &mut String);

    fn to_dsl_string(&self) -> String {
        let mut out = String::new();
        self.emit(&mut out);
        out
    }
}

/// Write a comma-separated list of items
fn emit_list<T: Emit>(items: &[T], out: &mut String) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        item.emit(out);
    }
}

fn emit_number(n: f64, out: &mut String) {
    // f64 Display never uses exponent form and drops ".0" on integral values
    // -0 prints as 0
    let n = if n == 0.0 { 0.0 } else { n };
    let _ = write!(out, "{}", n);
}

impl Emit for Node {
    fn emit(&self, out: &mut String) {
        match self {
            Node::Value(v) => v.emit(out),
            Node::Variable(v) => v.emit(out),
            Node::TaskResult(r) => r.emit(out),
            Node::AffineTerm(t) => t.emit(out),
            Node::AffineExpression(e) => e.emit(out),
            Node::TaskConstraint(c) => c.emit(out),
            Node::ComparisonConstraint(c) => c.emit(out),
            Node::MaintainRatioConstraint(c) => c.emit(out),
            Node::OneOf(c) => c.emit(out),
            Node::AllOf(c) => c.emit(out),
            Node::If(c) => c.emit(out),
        }
    }
}

impl Emit for Constraint {
    fn emit(&self, out: &mut String) {
        match self {
            Constraint::TaskConstraint(c) => c.emit(out),
            Constraint::ComparisonConstraint(c) => c.emit(out),
            Constraint::MaintainRatioConstraint(c) => c.emit(out),
            Constraint::OneOf(c) => c.emit(out),
            Constraint::AllOf(c) => c.emit(out),
            Constraint::If(c) => c.emit(out),
        }
    }
}

impl<T: Emit + ?Sized> Emit for Box<T> {
    fn emit(&self, out: &mut String) {
        self.as_ref().emit(out)
    }
}

impl Emit for Value {
    fn emit(&self, out: &mut String) {
        match self {
            Value::Number(n) => emit_number(*n, out),
            Value::String(s) => {
                out.push('"');
                out.push_str(s);
                out.push('"');
            }
            Value::Boolean(b) => out.push_str(if *b { "true" } else { "false" }),
        }
    }
}

impl Emit for NumericValue {
    fn emit(&self, out: &mut String) {
        emit_number(self.0, out)
    }
}

impl Emit for Variable {
    fn emit(&self, out: &mut String) {
        out.push_str("vars.");
        out.push_str(&self.name);
    }
}

impl Emit for TaskResult {
    fn emit(&self, out: &mut String) {
        out.push_str(&self.name);
    }
}

impl Emit for Scalar {
    fn emit(&self, out: &mut String) {
        match self {
            Scalar::Value(n) => n.emit(out),
            Scalar::TaskResult(r) => r.emit(out),
        }
    }
}

impl Emit for Operand {
    fn emit(&self, out: &mut String) {
        match self {
            Operand::Value(v) => v.emit(out),
            Operand::Variable(v) => v.emit(out),
            Operand::TaskResult(r) => r.emit(out),
            Operand::AffineExpression(e) => e.emit(out),
        }
    }
}

impl Emit for AffineTerm {
    fn emit(&self, out: &mut String) {
        self.variable.emit(out);
        out.push_str(".times(");
        self.coefficient.emit(out);
        out.push(')');
    }
}

impl Emit for AffineExpression {
    fn emit(&self, out: &mut String) {
        for term in &self.affine_terms {
            term.emit(out);
            out.push_str(".plus(");
        }
        for (i, constant) in self.constant_terms.iter().enumerate() {
            if i > 0 {
                out.push('+');
            }
            constant.emit(out);
        }
        for _ in &self.affine_terms {
            out.push(')');
        }
    }
}

impl Emit for ComparisonConstraint {
    fn emit(&self, out: &mut String) {
        self.lhs.emit(out);
        out.push('.');
        out.push_str(self.operator.method());
        out.push('(');
        self.rhs.emit(out);
        out.push(')');
    }
}

impl Emit for MaintainRatioConstraint {
    fn emit(&self, out: &mut String) {
        self.numerator.emit(out);
        out.push_str(".maintain_ratio(");
        self.denominator.emit(out);
        let _ = write!(out, ",\"{}\",", self.operator.symbol());
        self.ratio.emit(out);
        out.push(')');
    }
}

impl Emit for AllOf {
    fn emit(&self, out: &mut String) {
        out.push_str("dsl.allOf(");
        emit_list(&self.preds, out);
        out.push(')');
    }
}

impl Emit for OneOf {
    fn emit(&self, out: &mut String) {
        out.push_str("dsl.oneOf(");
        emit_list(&self.options, out);
        out.push(')');
    }
}

impl Emit for If {
    fn emit(&self, out: &mut String) {
        out.push_str("dsl.if_(");
        self.cond.emit(out);
        out.push_str(").then(");
        self.then.emit(out);
        out.push(')');
        if let Some(otherwise) = &self.otherwise {
            out.push_str(".else(");
            otherwise.emit(out);
            out.push(')');
        }
    }
}

impl Emit for TaskConstraint {
    fn emit(&self, out: &mut String) {
        let _ = write!(out, "fetchTask({})(\"{}\"", self.root.name(), self.path);
        if let Some(inner) = &self.inner {
            let binding = self.binding();
            let _ = write!(out, ",({})=>", binding);
            if self.array {
                let _ = write!(
                    out,
                    "dsl.allOf(...{binding}.map(({binding}Element)=>",
                    binding = binding
                );
                inner.emit(out);
                out.push_str("))");
            } else {
                inner.emit(out);
            }
        }
        out.push(')');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{NodeKind, Operator, TaskPath, TaskRoot};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn loan_task(path: &str) -> TaskConstraint {
        TaskConstraint::new(TaskRoot::Loan, TaskPath::new(path).unwrap())
    }

    fn from_json(value: serde_json::Value) -> Node {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_all_of() {
        let node = Node::AllOf(AllOf {
            preds: vec![
                Constraint::ComparisonConstraint(ComparisonConstraint::new(
                    Variable::new("loan_amount"),
                    Operator::Gte,
                    Operand::Value(Value::number(50_000.0)),
                )),
                Constraint::TaskConstraint(loan_task("$.out_of_pocket")),
            ],
        });

        assert_eq!(
            compile(&node),
            r#"dsl.allOf(vars.loan_amount.is_gte(50000),fetchTask(Loan)("$.out_of_pocket"))"#
        );
    }

    #[test]
    fn test_one_of() {
        let node = Node::OneOf(OneOf {
            options: vec![
                Constraint::TaskConstraint(loan_task("$.foo")),
                Constraint::TaskConstraint(loan_task("$.bar")),
            ],
        });

        assert_eq!(
            compile(&node),
            r#"dsl.oneOf(fetchTask(Loan)("$.foo"),fetchTask(Loan)("$.bar"))"#
        );
    }

    #[test]
    fn test_if_with_else() {
        let node = from_json(json!({
            "typename": "If",
            "cond": {
                "typename": "ComparisonConstraint",
                "lhs": {"typename": "Variable", "name": "foo"},
                "operator": "<=",
                "rhs": {"typename": "Value", "type": "number", "value": 5}
            },
            "then": {"typename": "TaskConstraint", "root": {"name": "Loan"}, "path": "$.bar"},
            "else": {"typename": "TaskConstraint", "root": {"name": "Loan"}, "path": "$.baz"}
        }));

        assert_eq!(
            compile(&node),
            r#"dsl.if_(vars.foo.is_lte(5)).then(fetchTask(Loan)("$.bar")).else(fetchTask(Loan)("$.baz"))"#
        );
    }

    #[test]
    fn test_if_without_else() {
        let node = Node::If(If {
            cond: ComparisonConstraint::new(
                Variable::new("occupancy"),
                Operator::Eq,
                Operand::Value(Value::string("primary")),
            ),
            then: Box::new(Constraint::TaskConstraint(loan_task("$.form1003"))),
            otherwise: None,
        });

        assert_eq!(
            compile(&node),
            r#"dsl.if_(vars.occupancy.is_eq("primary")).then(fetchTask(Loan)("$.form1003"))"#
        );
    }

    #[test]
    fn test_nested_task() {
        let inner = Constraint::TaskConstraint(loan_task("$.form1007"));
        let node = Node::TaskConstraint(loan_task("$.form1040").with_inner(inner));

        assert_eq!(
            compile(&node),
            r#"fetchTask(Loan)("$.form1040",(form1040)=>fetchTask(Loan)("$.form1007"))"#
        );
    }

    #[test]
    fn test_array_broadcast() {
        let node = from_json(json!({
            "typename": "TaskConstraint",
            "root": {"name": "Loan"},
            "path": "$.borrowers",
            "array": true,
            "inner": {
                "typename": "AllOf",
                "preds": [
                    {
                        "typename": "TaskConstraint",
                        "root": {"typename": "TaskResult", "name": "borrowersElement"},
                        "path": "$.firstName"
                    },
                    {
                        "typename": "TaskConstraint",
                        "root": {"typename": "TaskResult", "name": "borrowersElement"},
                        "path": "$.lastName"
                    }
                ]
            }
        }));

        assert_eq!(
            compile(&node),
            r#"fetchTask(Loan)("$.borrowers",(borrowers)=>dsl.allOf(...borrowers.map((borrowersElement)=>dsl.allOf(fetchTask(borrowersElement)("$.firstName"),fetchTask(borrowersElement)("$.lastName")))))"#
        );
    }

    #[test]
    fn test_array_without_inner_has_no_binding() {
        let node = Node::TaskConstraint(loan_task("$.borrowers").broadcast());
        assert_eq!(compile(&node), r#"fetchTask(Loan)("$.borrowers")"#);
    }

    #[test]
    fn test_binding_uses_last_segment_at_any_depth() {
        let deep = loan_task("$.a.b.c").with_inner(Constraint::TaskConstraint(
            TaskConstraint::new(
                TaskRoot::Result(TaskResult::new("c")),
                TaskPath::new("$.d.e").unwrap(),
            )
            .with_inner(Constraint::TaskConstraint(loan_task("$.f"))),
        ));

        assert_eq!(
            compile(&Node::TaskConstraint(deep)),
            r#"fetchTask(Loan)("$.a.b.c",(c)=>fetchTask(c)("$.d.e",(e)=>fetchTask(Loan)("$.f")))"#
        );
    }

    #[test]
    fn test_affine_expression() {
        let node = Node::ComparisonConstraint(ComparisonConstraint::new(
            Variable::new("foo"),
            Operator::Lte,
            Operand::AffineExpression(AffineExpression {
                affine_terms: vec![
                    AffineTerm::new(Scalar::Value(NumericValue(5.0)), Variable::new("bar")),
                    AffineTerm::new(Scalar::Value(NumericValue(-3.0)), Variable::new("baz")),
                ],
                constant_terms: vec![Scalar::Value(NumericValue(7.0))],
            }),
        ));

        assert_eq!(
            compile(&node),
            "vars.foo.is_lte(vars.bar.times(5).plus(vars.baz.times(-3).plus(7)))"
        );
    }

    #[test]
    fn test_affine_constants_joined_in_order() {
        let expr = AffineExpression {
            affine_terms: vec![AffineTerm::new(
                Scalar::TaskResult(TaskResult::new("rate")),
                Variable::new("balance"),
            )],
            constant_terms: vec![
                Scalar::Value(NumericValue(1.5)),
                Scalar::TaskResult(TaskResult::new("escrow")),
            ],
        };

        assert_eq!(
            compile(&Node::AffineExpression(expr)),
            "vars.balance.times(rate).plus(1.5+escrow)"
        );
    }

    #[test]
    fn test_maintain_ratio() {
        let node = Node::TaskConstraint(loan_task("$.income").with_inner(
            Constraint::MaintainRatioConstraint(MaintainRatioConstraint {
                numerator: Variable::new("debt"),
                denominator: Operand::TaskResult(TaskResult::new("income")),
                operator: Operator::Lte,
                ratio: NumericValue(0.7),
            }),
        ));

        assert_eq!(
            compile(&node),
            r#"fetchTask(Loan)("$.income",(income)=>vars.debt.maintain_ratio(income,"<=",0.7))"#
        );
    }

    #[test]
    fn test_leaves() {
        assert_eq!(compile(&Node::Value(Value::number(50_000.0))), "50000");
        assert_eq!(compile(&Node::Value(Value::number(0.7))), "0.7");
        assert_eq!(compile(&Node::Value(Value::string("condo"))), r#""condo""#);
        assert_eq!(compile(&Node::Value(Value::Boolean(true))), "true");
        assert_eq!(compile(&Node::Variable(Variable::new("fico"))), "vars.fico");
        assert_eq!(compile(&Node::TaskResult(TaskResult::new("income"))), "income");
        assert_eq!(
            compile(&Node::AffineTerm(AffineTerm::new(
                Scalar::Value(NumericValue(2.0)),
                Variable::new("x"),
            ))),
            "vars.x.times(2)"
        );
    }

    #[test]
    fn test_negative_zero_prints_as_zero() {
        assert_eq!(compile(&Node::Value(Value::number(-0.0))), "0");
        assert_eq!(compile(&Node::Value(Value::number(-3.0))), "-3");
    }

    #[test]
    fn test_comparison_operators() {
        for (op, expected) in [
            (Operator::Gte, "vars.a.is_gte(vars.b)"),
            (Operator::Eq, "vars.a.is_eq(vars.b)"),
            (Operator::Lte, "vars.a.is_lte(vars.b)"),
        ] {
            let node = Node::ComparisonConstraint(ComparisonConstraint::new(
                Variable::new("a"),
                op,
                Operand::Variable(Variable::new("b")),
            ));
            assert_eq!(compile(&node), expected);
        }
    }

    #[test]
    fn test_compile_is_deterministic() {
        let node = from_json(json!({
            "typename": "OneOf",
            "options": [
                {"typename": "TaskConstraint", "root": {"name": "Loan"}, "path": "$.x.y",
                 "inner": {"typename": "ComparisonConstraint",
                           "lhs": {"typename": "Variable", "name": "fico"},
                           "operator": ">=",
                           "rhs": {"typename": "TaskResult", "name": "y"}}},
                {"typename": "AllOf", "preds": []}
            ]
        }));

        let first = compile(&node);
        let second = compile(&node.clone());
        assert_eq!(first, second);
        assert!(!first.contains(' '));
    }

    #[test]
    fn test_every_kind_has_lowering() {
        // One sample per kind; the match forces this list to stay in sync.
        let sample = |kind: NodeKind| -> Node {
            match kind {
                NodeKind::Value => Node::Value(Value::number(1.0)),
                NodeKind::Variable => Node::Variable(Variable::new("v")),
                NodeKind::TaskResult => Node::TaskResult(TaskResult::new("r")),
                NodeKind::AffineTerm => Node::AffineTerm(AffineTerm::new(
                    Scalar::Value(NumericValue(1.0)),
                    Variable::new("v"),
                )),
                NodeKind::AffineExpression => Node::AffineExpression(AffineExpression {
                    affine_terms: vec![],
                    constant_terms: vec![Scalar::Value(NumericValue(1.0))],
                }),
                NodeKind::TaskConstraint => Node::TaskConstraint(loan_task("$.t")),
                NodeKind::ComparisonConstraint => {
                    Node::ComparisonConstraint(ComparisonConstraint::new(
                        Variable::new("v"),
                        Operator::Eq,
                        Operand::Value(Value::Boolean(false)),
                    ))
                }
                NodeKind::MaintainRatioConstraint => {
                    Node::MaintainRatioConstraint(MaintainRatioConstraint {
                        numerator: Variable::new("n"),
                        denominator: Operand::Variable(Variable::new("d")),
                        operator: Operator::Gte,
                        ratio: NumericValue(0.25),
                    })
                }
                NodeKind::OneOf => Node::OneOf(OneOf { options: vec![] }),
                NodeKind::AllOf => Node::AllOf(AllOf { preds: vec![] }),
                NodeKind::If => Node::If(If {
                    cond: ComparisonConstraint::new(
                        Variable::new("v"),
                        Operator::Gte,
                        Operand::Value(Value::number(1.0)),
                    ),
                    then: Box::new(Constraint::TaskConstraint(loan_task("$.t"))),
                    otherwise: None,
                }),
            }
        };

        let expected = [
            "1",
            "vars.v",
            "r",
            "vars.v.times(1)",
            "1",
            r#"fetchTask(Loan)("$.t")"#,
            "vars.v.is_eq(false)",
            r#"vars.n.maintain_ratio(vars.d,">=",0.25)"#,
            "dsl.oneOf()",
            "dsl.allOf()",
            r#"dsl.if_(vars.v.is_gte(1)).then(fetchTask(Loan)("$.t"))"#,
        ];

        for (kind, expected) in NodeKind::ALL.iter().zip(expected) {
            let node = sample(*kind);
            assert_eq!(node.kind(), *kind);
            assert_eq!(compile(&node), expected, "lowering of {}", kind);
        }
    }
}
