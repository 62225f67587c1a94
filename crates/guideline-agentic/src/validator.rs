//! Candidate Validator
//!
//! Runs every check on a generated constraint and gathers the failures. The
//! checks are independent: a lint failure does not stop the satisfiability
//! or semantic checks from running, so one round reports everything the
//! generator has to fix.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use constraint_core::{
    compile_constraint, is_boolean_source, lint_constraint, lint_source, Constraint, FailureCode,
    NodeKind, NodePath, ValidationFailure,
};
use tracing::debug;

use crate::config::DEFAULT_ALLOWED_KINDS;
use crate::oracle::{PassThroughOracle, SemanticOracle, Verdict};
use crate::solver::{SatisfiabilityChecker, Unconstrained};

/// Result of validating one candidate
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    /// All checks passed; carries the compiled source
    Accepted(String),
    Rejected(Vec<ValidationFailure>),
}

impl ValidationOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ValidationOutcome::Accepted(_))
    }
}

#[async_trait]
pub trait CandidateValidator: Send + Sync {
    /// `Err` only for collaborator failures; failed checks are `Rejected`
    async fn validate(&self, raw_text: &str, candidate: &Constraint) -> Result<ValidationOutcome>;
}

/// Validator over the constraint-core lints plus pluggable solver and oracle
pub struct ConstraintValidator {
    solver: Arc<dyn SatisfiabilityChecker>,
    oracle: Arc<dyn SemanticOracle>,
    allowed_kinds: Vec<NodeKind>,
}

impl ConstraintValidator {
    pub fn new(
        solver: Arc<dyn SatisfiabilityChecker>,
        oracle: Arc<dyn SemanticOracle>,
        allowed_kinds: Vec<NodeKind>,
    ) -> Self {
        Self {
            solver,
            oracle,
            allowed_kinds,
        }
    }

    /// Structural checks only: no solver, oracle agrees with everything
    pub fn structural() -> Self {
        Self::new(
            Arc::new(Unconstrained),
            Arc::new(PassThroughOracle),
            DEFAULT_ALLOWED_KINDS.to_vec(),
        )
    }

    pub fn with_allowed_kinds(mut self, allowed_kinds: Vec<NodeKind>) -> Self {
        self.allowed_kinds = allowed_kinds;
        self
    }

    fn check_well_formed(candidate: &Constraint, source: &str) -> Vec<ValidationFailure> {
        let mut failures = lint_constraint(candidate);
        failures.extend(lint_source(source).into_iter().map(|problem| {
            ValidationFailure::new(
                FailureCode::MalformedOutput,
                NodePath::root(),
                candidate.clone(),
                problem,
            )
        }));
        failures
    }

    fn check_boolean_producing(
        &self,
        candidate: &Constraint,
        source: &str,
    ) -> Vec<ValidationFailure> {
        let mut failures = Vec::new();
        let kind = candidate.kind();

        if !self.allowed_kinds.contains(&kind) {
            failures.push(ValidationFailure::new(
                FailureCode::DisallowedKind,
                NodePath::root(),
                candidate.clone(),
                format!("{} is not allowed at the top level", kind),
            ));
        }
        if !is_boolean_source(source) {
            failures.push(ValidationFailure::new(
                FailureCode::NotBooleanProducing,
                NodePath::root(),
                candidate.clone(),
                format!("compiled source does not yield a boolean: {}", source),
            ));
        }
        failures
    }
}

impl Default for ConstraintValidator {
    fn default() -> Self {
        Self::structural()
    }
}

#[async_trait]
impl CandidateValidator for ConstraintValidator {
    async fn validate(&self, raw_text: &str, candidate: &Constraint) -> Result<ValidationOutcome> {
        let source = compile_constraint(candidate);

        let mut failures = Self::check_well_formed(candidate, &source);
        failures.extend(self.check_boolean_producing(candidate, &source));
        failures.extend(self.solver.check(candidate).await?);

        if let Verdict::Disagree { reason } = self.oracle.check(raw_text, &source).await? {
            failures.push(ValidationFailure::new(
                FailureCode::SemanticDisagreement,
                NodePath::root(),
                candidate.clone(),
                reason,
            ));
        }

        debug!(
            kind = %candidate.kind(),
            failures = failures.len(),
            "Validated candidate"
        );

        if failures.is_empty() {
            Ok(ValidationOutcome::Accepted(source))
        } else {
            Ok(ValidationOutcome::Rejected(failures))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::BoundsChecker;
    use constraint_core::{
        AllOf, ComparisonConstraint, MaintainRatioConstraint, Node, NumericValue, Operand, Operator,
        TaskConstraint, TaskPath, TaskRoot, Value, Variable,
    };
    use pretty_assertions::assert_eq;

    struct AlwaysDisagree;

    #[async_trait]
    impl SemanticOracle for AlwaysDisagree {
        async fn check(&self, _raw_text: &str, _compiled: &str) -> Result<Verdict> {
            Ok(Verdict::Disagree {
                reason: "threshold reads 620 in the guideline".to_string(),
            })
        }
    }

    struct BrokenOracle;

    #[async_trait]
    impl SemanticOracle for BrokenOracle {
        async fn check(&self, _raw_text: &str, _compiled: &str) -> Result<Verdict> {
            anyhow::bail!("connection reset")
        }
    }

    fn cmp(name: &str, operator: Operator, n: f64) -> Constraint {
        Constraint::ComparisonConstraint(ComparisonConstraint::new(
            Variable::new(name),
            operator,
            Operand::Value(Value::number(n)),
        ))
    }

    fn codes(outcome: &ValidationOutcome) -> Vec<FailureCode> {
        match outcome {
            ValidationOutcome::Accepted(_) => Vec::new(),
            ValidationOutcome::Rejected(failures) => failures.iter().map(|f| f.code).collect(),
        }
    }

    #[tokio::test]
    async fn test_accepts_valid_candidate() {
        let candidate = Constraint::AllOf(AllOf {
            preds: vec![
                cmp("loan_amount", Operator::Gte, 50000.0),
                Constraint::TaskConstraint(TaskConstraint::new(
                    TaskRoot::Loan,
                    TaskPath::new("$.out_of_pocket").unwrap(),
                )),
            ],
        });
        let outcome = ConstraintValidator::structural()
            .validate("min loan 50k", &candidate)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ValidationOutcome::Accepted(
                "dsl.allOf(vars.loan_amount.is_gte(50000),fetchTask(Loan)(\"$.out_of_pocket\"))"
                    .to_string()
            )
        );
    }

    #[tokio::test]
    async fn test_checks_do_not_short_circuit() {
        // bad identifier, contradictory bounds and an oracle objection all at once
        let candidate = Constraint::AllOf(AllOf {
            preds: vec![
                cmp("credit score", Operator::Gte, 700.0),
                cmp("ltv", Operator::Gte, 0.9),
                cmp("ltv", Operator::Lte, 0.8),
            ],
        });
        let validator = ConstraintValidator::new(
            Arc::new(BoundsChecker),
            Arc::new(AlwaysDisagree),
            DEFAULT_ALLOWED_KINDS.to_vec(),
        );
        let outcome = validator.validate("text", &candidate).await.unwrap();
        let codes = codes(&outcome);

        assert!(codes.contains(&FailureCode::InvalidIdentifier));
        assert!(codes.contains(&FailureCode::Unsatisfiable));
        assert!(codes.contains(&FailureCode::SemanticDisagreement));
    }

    #[tokio::test]
    async fn test_disagreement_is_pinned_to_root() {
        let candidate = cmp("fico", Operator::Gte, 640.0);
        let validator = ConstraintValidator::new(
            Arc::new(Unconstrained),
            Arc::new(AlwaysDisagree),
            DEFAULT_ALLOWED_KINDS.to_vec(),
        );
        let ValidationOutcome::Rejected(failures) =
            validator.validate("fico at least 620", &candidate).await.unwrap()
        else {
            panic!("expected rejection");
        };
        assert_eq!(failures.len(), 1);
        assert!(failures[0].path.is_root());
        assert_eq!(failures[0].message, "threshold reads 620 in the guideline");
        assert_eq!(failures[0].node, Node::from(candidate));
    }

    #[tokio::test]
    async fn test_ratio_not_allowed_at_top_level() {
        let candidate = Constraint::MaintainRatioConstraint(MaintainRatioConstraint {
            numerator: Variable::new("debt"),
            denominator: Operand::Variable(Variable::new("income")),
            operator: Operator::Lte,
            ratio: NumericValue(0.43),
        });
        let outcome = ConstraintValidator::structural()
            .validate("dti", &candidate)
            .await
            .unwrap();
        assert_eq!(codes(&outcome), vec![FailureCode::DisallowedKind]);

        let widened = ConstraintValidator::structural()
            .with_allowed_kinds(vec![NodeKind::MaintainRatioConstraint]);
        assert!(widened.validate("dti", &candidate).await.unwrap().is_accepted());
    }

    #[tokio::test]
    async fn test_task_path_without_dot_is_accepted() {
        let candidate = Constraint::TaskConstraint(TaskConstraint::new(
            TaskRoot::Loan,
            TaskPath::new("$creditScore").unwrap(),
        ));
        let outcome = ConstraintValidator::structural()
            .validate("credit score on file", &candidate)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ValidationOutcome::Accepted(r#"fetchTask(Loan)("$creditScore")"#.to_string())
        );
    }

    #[tokio::test]
    async fn test_empty_combinator_reported() {
        let candidate = Constraint::AllOf(AllOf { preds: vec![] });
        let outcome = ConstraintValidator::structural()
            .validate("nothing", &candidate)
            .await
            .unwrap();
        assert!(codes(&outcome).contains(&FailureCode::EmptyCombinator));
    }

    #[tokio::test]
    async fn test_oracle_error_propagates() {
        let validator = ConstraintValidator::new(
            Arc::new(Unconstrained),
            Arc::new(BrokenOracle),
            DEFAULT_ALLOWED_KINDS.to_vec(),
        );
        let err = validator
            .validate("text", &cmp("fico", Operator::Gte, 620.0))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("connection reset"));
    }
}
