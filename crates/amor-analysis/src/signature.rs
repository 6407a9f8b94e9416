//! Function signatures: the group being analyzed and the solved table.

use std::collections::BTreeMap;
use std::fmt;

use amor_common::Span;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::ty::{AnnFun, SolvedFun};

/// A solved signature: every coefficient is a rational.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionSignature {
    pub name: String,
    pub param_names: Vec<String>,
    pub ty: SolvedFun,
}

impl fmt::Display for FunctionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, (name, ty)) in self.param_names.iter().zip(&self.ty.params).enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", name, ty)?;
        }
        write!(f, ") -[{}]-> {}", self.ty.cost, self.ty.ret)
    }
}

/// An unsolved signature of a function in the group being analyzed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeclaredSignature {
    pub name: String,
    pub param_names: Vec<String>,
    pub ty: AnnFun,
}

// ── Solved table ─────────────────────────────────────────────────────────

/// Solved signatures shared by all workers. Written once per function
/// after its group completes, read by the groups that call it.
#[derive(Debug, Default)]
pub struct SignatureTable {
    solved: RwLock<BTreeMap<String, FunctionSignature>>,
}

impl SignatureTable {
    pub fn new() -> Self {
        SignatureTable::default()
    }

    pub fn publish(&self, signature: FunctionSignature) -> Result<(), AnalysisError> {
        let mut solved = self.solved.write();
        if solved.contains_key(&signature.name) {
            return Err(AnalysisError::SignatureRedefined {
                name: signature.name,
            });
        }
        solved.insert(signature.name.clone(), signature);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<FunctionSignature> {
        self.solved.read().get(name).cloned()
    }
}

// ── Group signatures ─────────────────────────────────────────────────────

#[derive(Clone, Debug, Default)]
pub struct GroupSignatures {
    declared: BTreeMap<String, DeclaredSignature>,
}

impl GroupSignatures {
    pub fn new() -> Self {
        GroupSignatures::default()
    }

    pub fn declare_signature(
        &mut self,
        name: &str,
        param_names: Vec<String>,
        ty: AnnFun,
        span: Span,
    ) -> Result<(), AnalysisError> {
        if self.declared.contains_key(name) {
            return Err(AnalysisError::DuplicateDefinition {
                name: name.to_string(),
                span,
            });
        }
        self.declared.insert(
            name.to_string(),
            DeclaredSignature {
                name: name.to_string(),
                param_names,
                ty,
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&DeclaredSignature> {
        self.declared.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeclaredSignature> {
        self.declared.values()
    }
}

/// What a call resolves to.
#[derive(Clone, Debug)]
pub enum Callee {
    /// A function of a group under analysis; its variables are reused.
    Member(DeclaredSignature),
    /// A function whose group is already solved.
    Solved(FunctionSignature),
}

/// Signature lookup during generation: the innermost group first, then
/// enclosing groups, then the solved table.
#[derive(Debug)]
pub struct SignatureScope<'t> {
    table: &'t SignatureTable,
    groups: Vec<GroupSignatures>,
}

impl<'t> SignatureScope<'t> {
    pub fn new(table: &'t SignatureTable, group: GroupSignatures) -> Self {
        SignatureScope {
            table,
            groups: vec![group],
        }
    }

    pub fn push(&mut self, group: GroupSignatures) {
        self.groups.push(group);
    }

    pub fn pop(&mut self) -> Option<GroupSignatures> {
        self.groups.pop()
    }

    pub fn current(&self) -> Option<&GroupSignatures> {
        self.groups.last()
    }

    pub fn lookup_signature(&self, name: &str, caller: &str, span: Span) -> Result<Callee, AnalysisError> {
        if let Some(sig) = self.groups.iter().rev().find_map(|g| g.get(name)) {
            return Ok(Callee::Member(sig.clone()));
        }
        self.table
            .get(name)
            .map(Callee::Solved)
            .ok_or_else(|| AnalysisError::UnknownFunction {
                function: caller.to_string(),
                name: name.to_string(),
                span,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{AnnotationPool, GroupPool};
    use crate::ty::{annotate, Annotated, BaseKind, Coefficient, Contract};
    use amor_ast::Ty;
    use amor_common::rational::int;

    fn solved(name: &str) -> FunctionSignature {
        FunctionSignature {
            name: name.into(),
            param_names: vec!["x".into()],
            ty: Contract {
                params: vec![Annotated::Base(BaseKind::Int)],
                ret: Box::new(Annotated::Base(BaseKind::Int)),
                cost: Coefficient(int(2)),
            },
        }
    }

    #[test]
    fn table_is_write_once() {
        let table = SignatureTable::new();
        table.publish(solved("f")).unwrap();
        assert_eq!(
            table.publish(solved("f")),
            Err(AnalysisError::SignatureRedefined { name: "f".into() })
        );
        assert_eq!(table.get("f").unwrap().to_string(), "f(x: Int) -[2]-> Int");
    }

    #[test]
    fn lookup_prefers_group_members() {
        let pool = AnnotationPool::new();
        let mut group_pool = GroupPool::new(&pool);
        let ty = match annotate(&Ty::fun(vec![Ty::Int], Ty::Int), 1, &mut group_pool, "f").unwrap() {
            Annotated::Fun(contract) => contract,
            other => panic!("not a function type: {:?}", other),
        };
        let table = SignatureTable::new();
        table.publish(solved("f")).unwrap();
        table.publish(solved("g")).unwrap();

        let mut group = GroupSignatures::new();
        group
            .declare_signature("f", vec!["x".into()], ty.clone(), Span::default())
            .unwrap();
        assert!(matches!(
            group.declare_signature("f", vec![], ty, Span::new(1, 2)),
            Err(AnalysisError::DuplicateDefinition { .. })
        ));

        let scope = SignatureScope::new(&table, group);
        assert!(matches!(scope.lookup_signature("f", "main", Span::default()), Ok(Callee::Member(_))));
        assert!(matches!(scope.lookup_signature("g", "main", Span::default()), Ok(Callee::Solved(_))));
        assert!(matches!(
            scope.lookup_signature("h", "main", Span::default()),
            Err(AnalysisError::UnknownFunction { .. })
        ));
    }
}
