//! Certificates: a solved group's full assignment together with every
//! constraint and its provenance. Checking one needs only exact
//! arithmetic, never the LP.

use std::collections::BTreeMap;
use std::fmt;

use amor_common::rational::{self, Rational};
use serde::{Deserialize, Serialize};

use crate::bound::{extract_bound, FunctionBound};
use crate::config::CostMetric;
use crate::constraint::{Constraint, ConstraintSystem};
use crate::error::AnalysisError;
use crate::signature::DeclaredSignature;
use crate::solve::Solution;
use crate::ty::AnnVar;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CertifiedVar {
    pub var: AnnVar,
    #[serde(with = "rational::serde_str_option")]
    pub lower: Option<Rational>,
    #[serde(with = "rational::serde_str")]
    pub value: Rational,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Certificate {
    pub functions: Vec<String>,
    pub degree: u32,
    pub metric: CostMetric,
    pub signatures: Vec<DeclaredSignature>,
    pub variables: Vec<CertifiedVar>,
    pub constraints: Vec<Constraint>,
}

#[derive(Debug)]
pub enum CertificateError {
    Parse(serde_json::Error),
    /// A variable used by a constraint or signature has no value.
    UnassignedVariable { var: AnnVar },
    /// A value lies below its variable's lower bound.
    BoundViolated {
        var: AnnVar,
        value: Rational,
        lower: Rational,
    },
    ConstraintViolated { index: usize, constraint: String },
    Signature(AnalysisError),
}

impl fmt::Display for CertificateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CertificateError::Parse(error) => write!(f, "malformed certificate: {}", error),
            CertificateError::UnassignedVariable { var } => {
                write!(f, "variable {} has no value", var)
            }
            CertificateError::BoundViolated { var, value, lower } => write!(
                f,
                "variable {} = {} is below its lower bound {}",
                var, value, lower
            ),
            CertificateError::ConstraintViolated { index, constraint } => {
                write!(f, "constraint #{} does not hold: {}", index, constraint)
            }
            CertificateError::Signature(error) => write!(f, "{}", error),
        }
    }
}

impl std::error::Error for CertificateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CertificateError::Parse(error) => Some(error),
            CertificateError::Signature(error) => Some(error),
            _ => None,
        }
    }
}

impl Certificate {
    pub fn new(
        system: &ConstraintSystem,
        signatures: &[DeclaredSignature],
        solution: &Solution,
        metric: CostMetric,
    ) -> Certificate {
        let variables = system
            .registry()
            .iter()
            .filter_map(|(var, info)| {
                solution.value(*var).map(|value| CertifiedVar {
                    var: *var,
                    lower: info.lower.clone(),
                    value: value.clone(),
                })
            })
            .collect();
        Certificate {
            functions: system.functions.clone(),
            degree: system.degree,
            metric,
            signatures: signatures.to_vec(),
            variables,
            constraints: system.constraints().to_vec(),
        }
    }

    pub fn assignment(&self) -> BTreeMap<AnnVar, Rational> {
        self.variables
            .iter()
            .map(|v| (v.var, v.value.clone()))
            .collect()
    }

    /// Re-check the certificate and return the bounds it proves.
    pub fn verify(&self) -> Result<Vec<FunctionBound>, CertificateError> {
        for v in &self.variables {
            if let Some(lower) = &v.lower {
                if v.value < *lower {
                    return Err(CertificateError::BoundViolated {
                        var: v.var,
                        value: v.value.clone(),
                        lower: lower.clone(),
                    });
                }
            }
        }

        let assignment = self.assignment();
        for (index, constraint) in self.constraints.iter().enumerate() {
            if let Some((var, _)) = constraint.lhs.terms().find(|(v, _)| !assignment.contains_key(v)) {
                return Err(CertificateError::UnassignedVariable { var });
            }
            if !constraint.holds(&assignment) {
                return Err(CertificateError::ConstraintViolated {
                    index,
                    constraint: constraint.to_string(),
                });
            }
        }

        self.signatures
            .iter()
            .map(|sig| {
                extract_bound(sig, &assignment).map_err(|error| match error {
                    AnalysisError::ExtractionError { var, .. } => {
                        CertificateError::UnassignedVariable { var }
                    }
                    other => CertificateError::Signature(other),
                })
            })
            .collect()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(text: &str) -> Result<Certificate, CertificateError> {
        serde_json::from_str(text).map_err(CertificateError::Parse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{LinExpr, ObjectiveStage, Provenance, Relation, Rule};
    use crate::pool::{Registry, VarInfo};
    use crate::solve::{solve_system, SimplexSolver};
    use crate::ty::{Annotated, BaseKind, Contract};
    use amor_common::rational::int;
    use amor_common::{NodeId, Span};

    /// `f(xs: List<Int>^[q0]) -[q1]-> Int` with `q0 >= 1` and `q1 >= 2`.
    fn system() -> (ConstraintSystem, Vec<DeclaredSignature>) {
        let registry: Registry = (0..2)
            .map(|v| {
                (
                    AnnVar(v),
                    VarInfo {
                        lower: Some(int(0)),
                        origin: "test".into(),
                    },
                )
            })
            .collect();
        let row = |var: u32, rhs: i64| Constraint {
            lhs: LinExpr::var(AnnVar(var)),
            rel: Relation::Ge,
            rhs: int(rhs),
            provenance: Provenance {
                function: "f".into(),
                node: NodeId(var),
                span: Span::default(),
                rule: Rule::Tick,
            },
        };
        let system = ConstraintSystem::new(
            vec!["f".into()],
            1,
            vec![row(0, 1), row(1, 2)],
            registry,
            vec![
                ObjectiveStage {
                    degree: 1,
                    objective: LinExpr::var(AnnVar(0)),
                },
                ObjectiveStage {
                    degree: 0,
                    objective: LinExpr::var(AnnVar(1)),
                },
            ],
        );
        let sig = DeclaredSignature {
            name: "f".into(),
            param_names: vec!["xs".into()],
            ty: Contract {
                params: vec![Annotated::List {
                    elem: Box::new(Annotated::Base(BaseKind::Int)),
                    coeffs: vec![AnnVar(0)],
                }],
                ret: Box::new(Annotated::Base(BaseKind::Int)),
                cost: AnnVar(1),
            },
        };
        (system, vec![sig])
    }

    fn certificate() -> Certificate {
        let (system, sigs) = system();
        let solution = solve_system(&system, &SimplexSolver, None).unwrap();
        Certificate::new(&system, &sigs, &solution, CostMetric::Ticks)
    }

    #[test]
    fn verified_certificate_yields_the_bound() {
        let cert = certificate();
        let bounds = cert.verify().unwrap();
        assert_eq!(bounds.len(), 1);
        assert_eq!(bounds[0].bound.to_string(), "|xs| + 2");
    }

    #[test]
    fn json_keeps_rationals_exact() {
        let cert = certificate();
        let json = cert.to_json().unwrap();
        assert!(json.contains(r#""value": "2""#), "{}", json);
        let back = Certificate::from_json(&json).unwrap();
        assert_eq!(back, cert);
        assert!(back.verify().is_ok());
    }

    #[test]
    fn tampered_values_are_rejected() {
        let mut cert = certificate();
        cert.variables[1].value = int(1);
        match cert.verify() {
            Err(CertificateError::ConstraintViolated { index, .. }) => assert_eq!(index, 1),
            other => panic!("expected a violated constraint, got {:?}", other),
        }

        let mut cert = certificate();
        cert.variables[0].value = int(-1);
        assert!(matches!(
            cert.verify(),
            Err(CertificateError::BoundViolated { var: AnnVar(0), .. })
        ));

        let mut cert = certificate();
        cert.variables.remove(0);
        assert!(matches!(
            cert.verify(),
            Err(CertificateError::UnassignedVariable { var: AnnVar(0) })
        ));
    }

    #[test]
    fn garbage_does_not_parse() {
        assert!(matches!(
            Certificate::from_json("{\"functions\": 3}"),
            Err(CertificateError::Parse(_))
        ));
    }
}
