//! Structural lint for candidates and emitted source
//!
//! Pure checks that need no external service:
//! - node-level: identifiers, task paths, empty combinators, string literals
//! - text-level: balanced parentheses and terminated strings in compiled output
//! - shape: whether the emitted expression is boolean-producing
//!
//! Every check reports all of its findings; nothing short-circuits.

use crate::ast::{
    AffineExpression, Constraint, Node, NodePath, Operand, Scalar, TaskRoot, Value, Variable,
};
use crate::diagnostics::{FailureCode, ValidationFailure};

/// True if `name` is usable as a bare identifier in the target DSL
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Node-level lint of every constraint and operand in the tree
pub fn lint_constraint(root: &Constraint) -> Vec<ValidationFailure> {
    let mut failures = Vec::new();

    for (path, constraint) in root.walk() {
        match constraint {
            Constraint::TaskConstraint(task) => {
                if let TaskRoot::Result(result) = &task.root {
                    if !is_identifier(&result.name) {
                        failures.push(ValidationFailure::new(
                            FailureCode::InvalidIdentifier,
                            path.child("root"),
                            Node::TaskResult(result.clone()),
                            format!("task root '{}' is not a valid identifier", result.name),
                        ));
                    }
                }

                let raw = task.path.as_str();
                // `$`, `$.a.b` and `$creditScore` are all valid roots
                if raw.contains(char::is_whitespace)
                    || raw.contains('"')
                    || !raw.starts_with('$')
                    || raw.split('.').any(str::is_empty)
                {
                    failures.push(ValidationFailure::new(
                        FailureCode::InvalidTaskPath,
                        path.clone(),
                        constraint.clone(),
                        format!(
                            "task path \"{}\" must start with $ and have no empty segments",
                            raw
                        ),
                    ));
                } else if task.inner.is_some() && !is_identifier(task.binding()) {
                    failures.push(ValidationFailure::new(
                        FailureCode::InvalidIdentifier,
                        path.clone(),
                        constraint.clone(),
                        format!(
                            "binding '{}' derived from \"{}\" is not a valid identifier",
                            task.binding(),
                            raw
                        ),
                    ));
                }
            }
            Constraint::ComparisonConstraint(cmp) => {
                lint_variable(&cmp.lhs, path.child("lhs"), &mut failures);
                lint_operand(&cmp.rhs, path.child("rhs"), &mut failures);
            }
            Constraint::MaintainRatioConstraint(ratio) => {
                lint_variable(&ratio.numerator, path.child("numerator"), &mut failures);
                lint_operand(&ratio.denominator, path.child("denominator"), &mut failures);
                lint_scalar(&Scalar::Value(ratio.ratio), path.child("ratio"), &mut failures);
            }
            Constraint::OneOf(one_of) => {
                if one_of.options.is_empty() {
                    failures.push(ValidationFailure::new(
                        FailureCode::EmptyCombinator,
                        path.clone(),
                        constraint.clone(),
                        "OneOf has no options",
                    ));
                }
            }
            Constraint::AllOf(all_of) => {
                if all_of.preds.is_empty() {
                    failures.push(ValidationFailure::new(
                        FailureCode::EmptyCombinator,
                        path.clone(),
                        constraint.clone(),
                        "AllOf has no predicates",
                    ));
                }
            }
            Constraint::If(cond) => {
                let cond_path = path.child("cond");
                lint_variable(&cond.cond.lhs, cond_path.child("lhs"), &mut failures);
                lint_operand(&cond.cond.rhs, cond_path.child("rhs"), &mut failures);
            }
        }
    }

    failures
}

fn lint_variable(variable: &Variable, path: NodePath, failures: &mut Vec<ValidationFailure>) {
    if !is_identifier(&variable.name) {
        failures.push(ValidationFailure::new(
            FailureCode::InvalidIdentifier,
            path,
            variable.clone(),
            format!("variable '{}' is not a valid identifier", variable.name),
        ));
    }
}

fn lint_scalar(scalar: &Scalar, path: NodePath, failures: &mut Vec<ValidationFailure>) {
    match scalar {
        Scalar::Value(n) => {
            if !n.0.is_finite() {
                failures.push(ValidationFailure::new(
                    FailureCode::InvalidLiteral,
                    path,
                    Value::Number(n.0),
                    "numeric literal must be finite",
                ));
            }
        }
        Scalar::TaskResult(r) => {
            if !is_identifier(&r.name) {
                failures.push(ValidationFailure::new(
                    FailureCode::InvalidIdentifier,
                    path,
                    r.clone(),
                    format!("task result '{}' is not a valid identifier", r.name),
                ));
            }
        }
    }
}

fn lint_affine(expr: &AffineExpression, path: NodePath, failures: &mut Vec<ValidationFailure>) {
    if expr.constant_terms.is_empty() {
        // `x.plus()` has no argument to close the chain with
        failures.push(ValidationFailure::new(
            FailureCode::MalformedOutput,
            path.clone(),
            expr.clone(),
            "affine expression needs at least one constant term",
        ));
    }
    for (i, term) in expr.affine_terms.iter().enumerate() {
        let term_path = path.child(&format!("affineTerms[{}]", i));
        lint_scalar(&term.coefficient, term_path.child("coefficient"), failures);
        lint_variable(&term.variable, term_path.child("variable"), failures);
    }
    for (i, constant) in expr.constant_terms.iter().enumerate() {
        lint_scalar(constant, path.child(&format!("constantTerms[{}]", i)), failures);
    }
}

fn lint_operand(operand: &Operand, path: NodePath, failures: &mut Vec<ValidationFailure>) {
    match operand {
        Operand::Value(value) => match value {
            Value::Number(n) if !n.is_finite() => failures.push(ValidationFailure::new(
                FailureCode::InvalidLiteral,
                path,
                value.clone(),
                "numeric literal must be finite",
            )),
            Value::String(s) if s.contains('"') || s.contains('\\') || s.contains('\n') => {
                failures.push(ValidationFailure::new(
                    FailureCode::InvalidLiteral,
                    path,
                    value.clone(),
                    format!("string literal {:?} contains characters that need escaping", s),
                ))
            }
            Value::Number(_) | Value::String(_) | Value::Boolean(_) => {}
        },
        Operand::Variable(v) => lint_variable(v, path, failures),
        Operand::TaskResult(r) => {
            if !is_identifier(&r.name) {
                failures.push(ValidationFailure::new(
                    FailureCode::InvalidIdentifier,
                    path,
                    r.clone(),
                    format!("task result '{}' is not a valid identifier", r.name),
                ));
            }
        }
        Operand::AffineExpression(expr) => lint_affine(expr, path, failures),
    }
}

/// Text-level lint of compiled source: returns one message per problem
pub fn lint_source(source: &str) -> Vec<String> {
    let mut problems = Vec::new();
    let mut depth: i64 = 0;
    let mut in_string = false;
    let mut stray_whitespace = false;

    for (offset, c) in source.char_indices() {
        match c {
            '"' => in_string = !in_string,
            c if c.is_whitespace() && !in_string => stray_whitespace = true,
            '(' if !in_string => depth += 1,
            ')' if !in_string => {
                depth -= 1;
                if depth < 0 {
                    problems.push(format!("unmatched ')' at offset {}", offset));
                    depth = 0;
                }
            }
            _ => {}
        }
    }

    if in_string {
        problems.push("unterminated string literal".to_string());
    }
    if depth > 0 {
        problems.push(format!("{} unclosed '('", depth));
    }
    if stray_whitespace {
        problems.push("output must be a single compact line".to_string());
    }

    problems
}

/// True if compiled source starts with a form that yields a boolean
pub fn is_boolean_source(source: &str) -> bool {
    const COMBINATORS: [&str; 4] = ["dsl.allOf(", "dsl.oneOf(", "dsl.if_(", "fetchTask("];
    const PREDICATES: [&str; 4] = [".is_gte(", ".is_eq(", ".is_lte(", ".maintain_ratio("];

    if COMBINATORS.iter().any(|p| source.starts_with(p)) {
        return true;
    }
    // `vars.x.is_gte(..)`: the first call on the variable must be the predicate
    source.starts_with("vars.")
        && PREDICATES.iter().any(|p| {
            source
                .find('(')
                .map(|open| source[..=open].ends_with(p))
                .unwrap_or(false)
        })
}
