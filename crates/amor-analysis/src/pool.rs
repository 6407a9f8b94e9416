//! Annotation variable allocation.
//!
//! [`AnnotationPool`] is the process-wide allocator: a single atomic
//! counter, passed by reference to every worker, so identifiers never
//! collide across groups analyzed in parallel. Each group draws through its
//! own [`GroupPool`], which records every variable it hands out. That
//! record is the registry against which constraint systems are validated.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};

use amor_common::rational::{self, Rational};
use num_traits::Zero;
use serde::{Deserialize, Serialize};

use crate::ty::AnnVar;

#[derive(Debug, Default)]
pub struct AnnotationPool {
    next: AtomicU32,
}

impl AnnotationPool {
    pub fn new() -> Self {
        AnnotationPool::default()
    }

    fn allocate(&self) -> AnnVar {
        AnnVar(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Number of variables handed out so far, across all groups.
    pub fn allocated(&self) -> u32 {
        self.next.load(Ordering::Relaxed)
    }
}

/// What the registry knows about a variable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarInfo {
    /// `None` means unbounded below.
    #[serde(with = "rational::serde_str_option")]
    pub lower: Option<Rational>,
    pub origin: String,
}

pub type Registry = BTreeMap<AnnVar, VarInfo>;

/// A group's view of the shared pool.
#[derive(Debug)]
pub struct GroupPool<'p> {
    pool: &'p AnnotationPool,
    registry: Registry,
}

impl<'p> GroupPool<'p> {
    pub fn new(pool: &'p AnnotationPool) -> Self {
        GroupPool {
            pool,
            registry: Registry::new(),
        }
    }

    /// A fresh variable with the lower bound 0.
    pub fn fresh(&mut self, origin: &str) -> AnnVar {
        let var = self.pool.allocate();
        self.registry.insert(
            var,
            VarInfo {
                lower: Some(Rational::zero()),
                origin: origin.to_string(),
            },
        );
        var
    }

    pub fn into_registry(self) -> Registry {
        self.registry
    }
}
