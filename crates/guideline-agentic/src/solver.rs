//! Satisfiability checks
//!
//! A rule that no loan can ever pass is a generation error, not a guideline.
//! The check sits behind `SatisfiabilityChecker` so an external solver can be
//! plugged in; `BoundsChecker` covers literal bounds in conjunctions locally.

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use constraint_core::{
    AllOf, ComparisonConstraint, Constraint, FailureCode, NodePath, Operand, Operator,
    ValidationFailure, Value,
};

#[async_trait]
pub trait SatisfiabilityChecker: Send + Sync {
    /// Return one `Unsatisfiable` failure per conflicting sub-tree
    async fn check(&self, constraint: &Constraint) -> Result<Vec<ValidationFailure>>;
}

/// Checker that never reports a conflict
#[derive(Debug, Clone, Copy, Default)]
pub struct Unconstrained;

#[async_trait]
impl SatisfiabilityChecker for Unconstrained {
    async fn check(&self, _constraint: &Constraint) -> Result<Vec<ValidationFailure>> {
        Ok(Vec::new())
    }
}

/// Interval check over literal comparisons that share a variable in one AllOf
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundsChecker;

#[derive(Debug, Default)]
struct Bounds {
    lower: Option<f64>,
    upper: Option<f64>,
    equal: Vec<Value>,
}

impl Bounds {
    fn add(&mut self, operator: Operator, value: &Value) {
        match (operator, value.as_number()) {
            (Operator::Gte, Some(n)) => self.lower = Some(self.lower.map_or(n, |l| l.max(n))),
            (Operator::Lte, Some(n)) => self.upper = Some(self.upper.map_or(n, |u| u.min(n))),
            (Operator::Eq, _) => self.equal.push(value.clone()),
            // ordering against a non-number is a type question, not a bounds one
            (Operator::Gte, None) | (Operator::Lte, None) => {}
        }
    }

    fn conflict(&self, name: &str) -> Option<String> {
        if let (Some(lower), Some(upper)) = (self.lower, self.upper) {
            if lower > upper {
                return Some(format!(
                    "vars.{name} >= {lower} and vars.{name} <= {upper} admit no value"
                ));
            }
        }
        if let Some(first) = self.equal.first() {
            if let Some(other) = self.equal.iter().find(|v| *v != first) {
                return Some(format!(
                    "vars.{name} cannot equal both {:?} and {:?}",
                    first, other
                ));
            }
            if let Some(n) = first.as_number() {
                if self.lower.is_some_and(|l| n < l) || self.upper.is_some_and(|u| n > u) {
                    return Some(format!(
                        "vars.{name} == {n} lies outside its other bounds"
                    ));
                }
            }
        }
        None
    }
}

/// Comparisons of a conjunction, looking through nested AllOf
fn conjuncts<'a>(all_of: &'a AllOf, out: &mut Vec<&'a ComparisonConstraint>) {
    for pred in &all_of.preds {
        match pred {
            Constraint::ComparisonConstraint(cmp) => out.push(cmp),
            Constraint::AllOf(nested) => conjuncts(nested, out),
            Constraint::TaskConstraint(_)
            | Constraint::MaintainRatioConstraint(_)
            | Constraint::OneOf(_)
            | Constraint::If(_) => {}
        }
    }
}

fn is_conjunct(path: &NodePath) -> bool {
    path.as_str()
        .rsplit('.')
        .next()
        .is_some_and(|segment| segment.starts_with("preds["))
}

impl BoundsChecker {
    pub fn conflicts(&self, constraint: &Constraint) -> Vec<ValidationFailure> {
        let mut failures = Vec::new();

        for (path, node) in constraint.walk() {
            let Constraint::AllOf(all_of) = node else {
                continue;
            };
            // an AllOf directly under another AllOf is flattened into its parent
            if is_conjunct(&path) {
                continue;
            }

            let mut comparisons = Vec::new();
            conjuncts(all_of, &mut comparisons);

            let mut by_variable: BTreeMap<&str, Bounds> = BTreeMap::new();
            for cmp in comparisons {
                if let Operand::Value(value) = &cmp.rhs {
                    by_variable
                        .entry(cmp.lhs.name.as_str())
                        .or_default()
                        .add(cmp.operator, value);
                }
            }

            for (name, bounds) in &by_variable {
                if let Some(reason) = bounds.conflict(name) {
                    failures.push(ValidationFailure::new(
                        FailureCode::Unsatisfiable,
                        path.clone(),
                        node.clone(),
                        reason,
                    ));
                }
            }
        }

        failures
    }
}

#[async_trait]
impl SatisfiabilityChecker for BoundsChecker {
    async fn check(&self, constraint: &Constraint) -> Result<Vec<ValidationFailure>> {
        Ok(self.conflicts(constraint))
    }
}
