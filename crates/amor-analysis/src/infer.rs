//! Constraint generation.
//!
//! Walks each function body of a group together with its annotated
//! signature and emits the linear constraints under which the typing
//! derivation is valid. The judgment is `Γ; q ⊢ e : (A, q')`: with context
//! `Γ` and `q` units of constant potential available before evaluating `e`,
//! the result has annotated type `A` and `q'` units are left over.
//!
//! One method per expression kind, dispatched in [`Generator::infer`].
//! Contexts are split by the sharing rule before every node whose children
//! are evaluated one after another; alternatives (branches and arms) see the
//! same context.
//!
//! With cost-free typing on, every member also gets a cost-free signature,
//! derived from a second walk of its body in which nothing costs. A call
//! to a member is typed with the sum of both signatures, so a recursive
//! call may hand back more potential than the caller's own signature
//! promises.

use std::collections::BTreeSet;
use std::convert::Infallible;

use amor_ast::visit::free_vars;
use amor_ast::{Expr, ExprKind, FunctionDef, MatchArm, Pattern, PrimOp, Program, Ty};
use amor_common::rational::Rational;
use amor_common::{NodeId, Span};
use num_traits::{One, Signed, Zero};
use rustc_hash::FxHashMap;

use crate::config::{AnalysisConfig, CallMode, CostMetric};
use crate::constraint::{Constraint, ConstraintSystem, LinExpr, ObjectiveStage, Provenance, Relation, Rule};
use crate::env::TypingContext;
use crate::error::AnalysisError;
use crate::pool::{AnnotationPool, GroupPool};
use crate::signature::{Callee, DeclaredSignature, FunctionSignature, GroupSignatures, SignatureScope, SignatureTable};
use crate::ty::{annotate, shift, AnnFun, AnnTy, AnnVar, Annotated, Contract, SolvedFun, SolvedTy, Unsupported};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GenerateOptions {
    pub degree: u32,
    pub metric: CostMetric,
    pub call_mode: CallMode,
    pub cost_free: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        GenerateOptions {
            degree: 1,
            metric: CostMetric::Ticks,
            call_mode: CallMode::Fixed,
            cost_free: true,
        }
    }
}

impl From<&AnalysisConfig> for GenerateOptions {
    fn from(config: &AnalysisConfig) -> Self {
        GenerateOptions {
            degree: config.degree,
            metric: config.metric,
            call_mode: config.call_mode,
            cost_free: config.cost_free,
        }
    }
}

/// The constraint system of one group and the signatures it solves for.
#[derive(Debug)]
pub struct GroupDerivation {
    pub system: ConstraintSystem,
    pub signatures: Vec<DeclaredSignature>,
}

/// Generate the constraint system of the group `members`.
///
/// `groups_of` maps every function to the members of its call group; it is
/// consulted when a call into an already solved group is specialized.
/// Signatures of solved callees are read from `table`.
pub fn generate_group(
    program: &Program,
    members: &[String],
    groups_of: &FxHashMap<String, Vec<String>>,
    table: &SignatureTable,
    pool: &AnnotationPool,
    options: &GenerateOptions,
) -> Result<GroupDerivation, AnalysisError> {
    let mut defs = Vec::with_capacity(members.len());
    for name in members {
        let def = program.function(name).ok_or_else(|| AnalysisError::UnknownFunction {
            function: name.clone(),
            name: name.clone(),
            span: Span::default(),
        })?;
        defs.push(def);
    }

    let mut group_pool = GroupPool::new(pool);
    let group = declare_group(&defs, options.degree, "signature", &mut group_pool)?;
    let signatures: Vec<DeclaredSignature> = group.iter().cloned().collect();
    let cost_free = if options.cost_free {
        vec![declare_group(&defs, options.degree, "cost-free signature", &mut group_pool)?]
    } else {
        Vec::new()
    };

    let mut generator = Generator {
        program,
        groups_of,
        scope: SignatureScope::new(table, group),
        cost_free,
        pool: group_pool,
        options,
        constraints: Vec::new(),
        function: String::new(),
        free: false,
    };
    for def in &defs {
        generator.function_body(def)?;
    }
    for def in &defs {
        generator.cost_free_body(def)?;
    }

    let stages = objective_stages(&signatures);
    let Generator { pool, constraints, .. } = generator;
    let system = ConstraintSystem::new(
        members.to_vec(),
        options.degree,
        constraints,
        pool.into_registry(),
        stages,
    );
    tracing::debug!(
        functions = ?members,
        constraints = system.len(),
        variables = system.registry().len(),
        "generated constraint system"
    );
    Ok(GroupDerivation { system, signatures })
}

/// Fresh signatures for a group of definitions.
fn declare_group(
    defs: &[&FunctionDef],
    degree: u32,
    what: &str,
    pool: &mut GroupPool<'_>,
) -> Result<GroupSignatures, AnalysisError> {
    let mut group = GroupSignatures::new();
    for def in defs {
        let unsupported = |err: Unsupported| AnalysisError::UnsupportedType {
            function: def.name.clone(),
            ty: err.ty,
            reason: err.reason.to_string(),
            span: def.span,
        };
        let origin = format!("{}: {}", def.name, what);
        let params = def
            .params
            .iter()
            .map(|p| annotate(&p.ty, degree, pool, &origin))
            .collect::<Result<Vec<_>, _>>()
            .map_err(unsupported)?;
        let ret = annotate(&def.ret, degree, pool, &origin).map_err(unsupported)?;
        let contract = Contract {
            params,
            ret: Box::new(ret),
            cost: pool.fresh(&origin),
        };
        let param_names = def.params.iter().map(|p| p.name.clone()).collect();
        group.declare_signature(&def.name, param_names, contract, def.span)?;
    }
    Ok(group)
}

/// Lexicographic objective: parameter coefficients of the highest degree
/// first, the constant costs last.
fn objective_stages(signatures: &[DeclaredSignature]) -> Vec<ObjectiveStage> {
    let weighted: Vec<(AnnVar, u32)> = signatures
        .iter()
        .flat_map(|sig| sig.ty.params.iter().flat_map(AnnTy::degree_of))
        .collect();
    let top = weighted.iter().map(|(_, degree)| *degree).max().unwrap_or(0);

    let mut stages = Vec::new();
    for degree in (1..=top).rev() {
        let objective = LinExpr::sum(
            weighted
                .iter()
                .filter(|(_, d)| *d == degree)
                .map(|(var, _)| *var),
        );
        if !objective.is_empty() {
            stages.push(ObjectiveStage { degree, objective });
        }
    }
    stages.push(ObjectiveStage {
        degree: 0,
        objective: LinExpr::sum(signatures.iter().map(|sig| sig.ty.cost)),
    });
    stages
}

// ── Generator ────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug)]
struct Site {
    node: NodeId,
    span: Span,
}

impl Site {
    fn of(expr: &Expr) -> Site {
        Site {
            node: expr.id,
            span: expr.span,
        }
    }
}

/// Result of typing one expression.
#[derive(Clone, Debug)]
struct Typed {
    ty: AnnTy,
    /// Constant potential left after evaluation.
    q: AnnVar,
}

struct Generator<'a> {
    program: &'a Program,
    groups_of: &'a FxHashMap<String, Vec<String>>,
    scope: SignatureScope<'a>,
    /// Cost-free signatures of the groups in scope, innermost last.
    cost_free: Vec<GroupSignatures>,
    pool: GroupPool<'a>,
    options: &'a GenerateOptions,
    constraints: Vec<Constraint>,
    /// The function whose body is being walked.
    function: String,
    /// Whether that body is walked cost-free.
    free: bool,
}

impl<'a> Generator<'a> {
    // ── Bodies ───────────────────────────────────────────────────────────

    fn function_body(&mut self, def: &FunctionDef) -> Result<(), AnalysisError> {
        let sig = self
            .scope
            .current()
            .and_then(|group| group.get(&def.name))
            .cloned()
            .ok_or_else(|| AnalysisError::UnknownFunction {
                function: def.name.clone(),
                name: def.name.clone(),
                span: def.span,
            })?;
        self.walk_body(def, &sig, false)
    }

    /// Walk `def` again against its cost-free signature.
    fn cost_free_body(&mut self, def: &FunctionDef) -> Result<(), AnalysisError> {
        let Some(sig) = self.cost_free.last().and_then(|group| group.get(&def.name)).cloned() else {
            return Ok(());
        };
        self.walk_body(def, &sig, true)
    }

    fn walk_body(&mut self, def: &FunctionDef, sig: &DeclaredSignature, free: bool) -> Result<(), AnalysisError> {
        let caller = std::mem::replace(&mut self.function, def.name.clone());
        let outer = std::mem::replace(&mut self.free, free);
        if free {
            self.pin_functions(sig, Site::of(&def.body));
        }
        let result = self.derive_body(def, sig);
        self.function = caller;
        self.free = outer;
        result
    }

    /// Function-typed parameters and results of a cost-free signature are
    /// zero, so a summed call contract asks nothing extra of function
    /// arguments.
    fn pin_functions(&mut self, sig: &DeclaredSignature, site: Site) {
        let functions = sig.ty.params.iter().chain(std::iter::once(&*sig.ty.ret));
        let pinned: Vec<AnnVar> = functions
            .filter(|ty| matches!(ty, Annotated::Fun(_)))
            .flat_map(AnnTy::vars)
            .collect();
        for var in pinned {
            self.emit(LinExpr::var(var), Relation::Eq, Rational::zero(), Rule::CostFree, site);
        }
    }

    fn derive_body(&mut self, def: &FunctionDef, sig: &DeclaredSignature) -> Result<(), AnalysisError> {
        tracing::trace!(function = %def.name, signature = %sig.ty, cost_free = self.free, "deriving body");
        let ctx: TypingContext = def
            .params
            .iter()
            .zip(&sig.ty.params)
            .map(|(param, ty)| (param.name.clone(), ty.clone()))
            .collect();
        let body = self.infer(&def.body, &ctx, sig.ty.cost)?;
        let site = Site::of(&def.body);
        if !body.ty.same_shape(&sig.ty.ret) {
            return Err(self.mismatch(sig.ty.ret.erase(), body.ty.erase(), site));
        }
        self.weaken(&body.ty, &sig.ty.ret, Rule::Return, site);
        Ok(())
    }

    // ── Expressions ──────────────────────────────────────────────────────

    fn infer(&mut self, expr: &Expr, ctx: &TypingContext, q: AnnVar) -> Result<Typed, AnalysisError> {
        let site = Site::of(expr);
        match &expr.kind {
            ExprKind::Unit | ExprKind::Bool(_) | ExprKind::Int(_) => {
                let ty = match &expr.kind {
                    ExprKind::Unit => Ty::Unit,
                    ExprKind::Bool(_) => Ty::Bool,
                    _ => Ty::Int,
                };
                let ty = self.annotate(&ty, site)?;
                let q = self.charge(q, &[], self.step_cost(&expr.kind), Rule::Const, site);
                Ok(Typed { ty, q })
            }
            ExprKind::Var(name) => self.infer_var(name, expr, ctx, q),
            ExprKind::Nil(elem) => self.infer_empty(Ty::list(elem.clone()), Rule::Nil, expr, q),
            ExprKind::Leaf(elem) => self.infer_empty(Ty::tree(elem.clone()), Rule::Leaf, expr, q),
            ExprKind::Cons { head, tail } => self.infer_cons(head, tail, expr, ctx, q),
            ExprKind::Node { left, value, right } => self.infer_node([left, value, right], expr, ctx, q),
            ExprKind::Prim { op, args } => self.infer_prim(*op, args, expr, ctx, q),
            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => self.infer_if(cond, then_branch, else_branch, expr, ctx, q),
            ExprKind::Match { scrutinee, arms } => self.infer_match(scrutinee, arms, expr, ctx, q),
            ExprKind::Let { name, value, body } => {
                let q = self.charge(q, &[], self.step_cost(&expr.kind), Rule::Let, site);
                let mut body_vars = free_vars(body);
                body_vars.remove(name);
                let parts = self.split(ctx, &[free_vars(value), body_vars], site);
                let bound = self.infer(value, &parts[0], q)?;
                let body_ctx = parts[1].extend(name, bound.ty);
                self.infer(body, &body_ctx, bound.q)
            }
            ExprKind::Call { func, args } => self.infer_call(func, args, expr, ctx, q),
            ExprKind::FnRef(name) => self.infer_fn_ref(name, expr, q),
            ExprKind::Tick { cost, body } => {
                let q = if self.free {
                    q
                } else if self.options.metric == CostMetric::Ticks {
                    if cost.is_negative() {
                        tracing::warn!(
                            function = %self.function,
                            node = %expr.id,
                            cost = %cost,
                            "negative tick returns resources"
                        );
                    }
                    self.charge(q, &[], cost.clone(), Rule::Tick, site)
                } else {
                    self.charge(q, &[], self.step_cost(&expr.kind), Rule::Tick, site)
                };
                self.infer(body, ctx, q)
            }
            ExprKind::Lambda { .. } => Err(AnalysisError::UnsupportedConstruct {
                function: self.function.clone(),
                construct: "anonymous functions".to_string(),
                node: expr.id,
                span: expr.span,
            }),
        }
    }

    fn infer_var(&mut self, name: &str, expr: &Expr, ctx: &TypingContext, q: AnnVar) -> Result<Typed, AnalysisError> {
        let site = Site::of(expr);
        let bound = match ctx.lookup(name) {
            Some(ty) => ty.clone(),
            None if self.is_function(name) => return self.infer_fn_ref(name, expr, q),
            None => {
                return Err(AnalysisError::UnboundVariable {
                    function: self.function.clone(),
                    name: name.to_string(),
                    span: expr.span,
                })
            }
        };
        let origin = self.origin("variable", site);
        let ty = bound.instantiate(&mut self.pool, &origin);
        self.weaken(&bound, &ty, Rule::Var, site);
        let q = self.charge(q, &[], self.step_cost(&expr.kind), Rule::Var, site);
        Ok(Typed { ty, q })
    }

    /// `nil` and `leaf` have no potential, so any annotation fits.
    fn infer_empty(&mut self, ty: Ty, rule: Rule, expr: &Expr, q: AnnVar) -> Result<Typed, AnalysisError> {
        let site = Site::of(expr);
        let ty = self.annotate(&ty, site)?;
        let q = self.charge(q, &[], self.step_cost(&expr.kind), rule, site);
        Ok(Typed { ty, q })
    }

    fn infer_cons(
        &mut self,
        head: &Expr,
        tail: &Expr,
        expr: &Expr,
        ctx: &TypingContext,
        q: AnnVar,
    ) -> Result<Typed, AnalysisError> {
        let site = Site::of(expr);
        let q = self.charge(q, &[], self.step_cost(&expr.kind), Rule::Cons, site);
        let parts = self.split(ctx, &[free_vars(head), free_vars(tail)], site);
        let h = self.infer(head, &parts[0], q)?;
        let t = self.infer(tail, &parts[1], h.q)?;

        let Annotated::List {
            elem: tail_elem,
            coeffs: tail_coeffs,
        } = &t.ty
        else {
            return Err(self.mismatch("a list", t.ty.erase(), Site::of(tail)));
        };
        if !h.ty.same_shape(tail_elem) {
            return Err(self.mismatch(tail_elem.erase(), h.ty.erase(), Site::of(head)));
        }

        let origin = self.origin("cons", site);
        let elem = tail_elem.instantiate(&mut self.pool, &origin);
        let coeffs: Vec<AnnVar> = tail_coeffs.iter().map(|_| self.pool.fresh(&origin)).collect();
        self.weaken(&h.ty, &elem, Rule::Cons, site);
        self.weaken(tail_elem, &elem, Rule::Cons, site);
        self.shifted(tail_coeffs, &coeffs, Relation::Ge, Rule::Cons, site);
        let q = self.charge(t.q, &coeffs[..coeffs.len().min(1)], Rational::zero(), Rule::Cons, site);
        Ok(Typed {
            ty: Annotated::List {
                elem: Box::new(elem),
                coeffs,
            },
            q,
        })
    }

    fn infer_node(
        &mut self,
        children: [&Expr; 3],
        expr: &Expr,
        ctx: &TypingContext,
        q: AnnVar,
    ) -> Result<Typed, AnalysisError> {
        let site = Site::of(expr);
        let [left, value, right] = children;
        let q = self.charge(q, &[], self.step_cost(&expr.kind), Rule::Node, site);
        let parts = self.split(
            ctx,
            &[free_vars(left), free_vars(value), free_vars(right)],
            site,
        );
        let l = self.infer(left, &parts[0], q)?;
        let v = self.infer(value, &parts[1], l.q)?;
        let r = self.infer(right, &parts[2], v.q)?;

        let (
            Annotated::Tree {
                elem: left_elem,
                coeffs: left_coeffs,
            },
            Annotated::Tree {
                elem: right_elem,
                coeffs: right_coeffs,
            },
        ) = (&l.ty, &r.ty)
        else {
            let (culprit, ty) = if matches!(l.ty, Annotated::Tree { .. }) {
                (right, &r.ty)
            } else {
                (left, &l.ty)
            };
            return Err(self.mismatch("a tree", ty.erase(), Site::of(culprit)));
        };
        if !r.ty.same_shape(&l.ty) {
            return Err(self.mismatch(l.ty.erase(), r.ty.erase(), Site::of(right)));
        }
        if !v.ty.same_shape(left_elem) {
            return Err(self.mismatch(left_elem.erase(), v.ty.erase(), Site::of(value)));
        }

        let origin = self.origin("node", site);
        let elem = left_elem.instantiate(&mut self.pool, &origin);
        let coeffs: Vec<AnnVar> = left_coeffs.iter().map(|_| self.pool.fresh(&origin)).collect();
        self.weaken(&v.ty, &elem, Rule::Node, site);
        self.weaken(left_elem, &elem, Rule::Node, site);
        self.weaken(right_elem, &elem, Rule::Node, site);
        self.shifted(left_coeffs, &coeffs, Relation::Ge, Rule::Node, site);
        self.shifted(right_coeffs, &coeffs, Relation::Ge, Rule::Node, site);
        let q = self.charge(r.q, &coeffs[..coeffs.len().min(1)], Rational::zero(), Rule::Node, site);
        Ok(Typed {
            ty: Annotated::Tree {
                elem: Box::new(elem),
                coeffs,
            },
            q,
        })
    }

    fn infer_prim(
        &mut self,
        op: PrimOp,
        args: &[Expr],
        expr: &Expr,
        ctx: &TypingContext,
        q: AnnVar,
    ) -> Result<Typed, AnalysisError> {
        let site = Site::of(expr);
        let (operands, result) = op.signature();
        if operands.len() != args.len() {
            return Err(self.mismatch(
                format!("{} operands for `{}`", operands.len(), op),
                format!("{} operands", args.len()),
                site,
            ));
        }
        let mut q = self.charge(q, &[], self.step_cost(&expr.kind), Rule::Prim, site);
        let parts_vars: Vec<BTreeSet<String>> = args.iter().map(free_vars).collect();
        let parts = self.split(ctx, &parts_vars, site);
        for ((arg, part), want) in args.iter().zip(&parts).zip(&operands) {
            let typed = self.infer(arg, part, q)?;
            let found = typed.ty.erase();
            if found != *want {
                return Err(self.mismatch(want, found, Site::of(arg)));
            }
            q = typed.q;
        }
        let ty = self.annotate(&result, site)?;
        Ok(Typed { ty, q })
    }

    fn infer_if(
        &mut self,
        cond: &Expr,
        then_branch: &Expr,
        else_branch: &Expr,
        expr: &Expr,
        ctx: &TypingContext,
        q: AnnVar,
    ) -> Result<Typed, AnalysisError> {
        let site = Site::of(expr);
        let q = self.charge(q, &[], self.step_cost(&expr.kind), Rule::If, site);
        let mut branch_vars = free_vars(then_branch);
        branch_vars.extend(free_vars(else_branch));
        let parts = self.split(ctx, &[free_vars(cond), branch_vars], site);

        let c = self.infer(cond, &parts[0], q)?;
        if c.ty.erase() != Ty::Bool {
            return Err(self.mismatch(Ty::Bool, c.ty.erase(), Site::of(cond)));
        }
        let t = self.infer(then_branch, &parts[1], c.q)?;
        let e = self.infer(else_branch, &parts[1], c.q)?;
        self.join(&[(t, Site::of(then_branch)), (e, Site::of(else_branch))], site)
    }

    fn infer_match(
        &mut self,
        scrutinee: &Expr,
        arms: &[MatchArm],
        expr: &Expr,
        ctx: &TypingContext,
        q: AnnVar,
    ) -> Result<Typed, AnalysisError> {
        let site = Site::of(expr);
        if arms.is_empty() {
            return Err(AnalysisError::UnsupportedConstruct {
                function: self.function.clone(),
                construct: "match without arms".to_string(),
                node: expr.id,
                span: expr.span,
            });
        }
        let q = self.charge(q, &[], self.step_cost(&expr.kind), Rule::Match, site);

        let mut arm_vars = BTreeSet::new();
        for arm in arms {
            let binders = arm.pattern.binders();
            arm_vars.extend(
                free_vars(&arm.body)
                    .into_iter()
                    .filter(|name| !binders.contains(&name.as_str())),
            );
        }
        let parts = self.split(ctx, &[free_vars(scrutinee), arm_vars], site);
        let s = self.infer(scrutinee, &parts[0], q)?;
        if !self.free {
            self.check_exhaustive(&s.ty, arms, site);
        }

        let mut branches = Vec::with_capacity(arms.len());
        for arm in arms {
            let arm_site = Site {
                node: expr.id,
                span: if arm.span.is_empty() { expr.span } else { arm.span },
            };
            let (arm_ctx, arm_q) = self.bind_pattern(&arm.pattern, &s, &parts[1], arm_site)?;
            let typed = self.infer(&arm.body, &arm_ctx, arm_q)?;
            branches.push((typed, Site::of(&arm.body)));
        }
        self.join(&branches, site)
    }

    /// Context and constant potential of one arm. Destructuring a list or
    /// tree releases its first coefficient; every substructure gets its own
    /// annotation, bounded by the shifted one.
    fn bind_pattern(
        &mut self,
        pattern: &Pattern,
        scrutinee: &Typed,
        ctx: &TypingContext,
        site: Site,
    ) -> Result<(TypingContext, AnnVar), AnalysisError> {
        match (pattern, &scrutinee.ty) {
            (Pattern::Wildcard, _) | (Pattern::Nil, Annotated::List { .. }) | (Pattern::Leaf, Annotated::Tree { .. }) => {
                Ok((ctx.clone(), scrutinee.q))
            }
            (Pattern::Cons { head, tail }, Annotated::List { elem, coeffs }) => {
                let q = self.release(coeffs, scrutinee.q, site);
                let head_ty = self.narrowed(elem, site);
                let tail_ty = Annotated::List {
                    elem: Box::new(self.narrowed(elem, site)),
                    coeffs: self.substructure(coeffs, site),
                };
                Ok((ctx.extend(head, head_ty).extend(tail, tail_ty), q))
            }
            (Pattern::Node { left, value, right }, Annotated::Tree { elem, coeffs }) => {
                let q = self.release(coeffs, scrutinee.q, site);
                let left_ty = Annotated::Tree {
                    elem: Box::new(self.narrowed(elem, site)),
                    coeffs: self.substructure(coeffs, site),
                };
                let value_ty = self.narrowed(elem, site);
                let right_ty = Annotated::Tree {
                    elem: Box::new(self.narrowed(elem, site)),
                    coeffs: self.substructure(coeffs, site),
                };
                let ctx = ctx
                    .extend(left, left_ty)
                    .extend(value, value_ty)
                    .extend(right, right_ty);
                Ok((ctx, q))
            }
            (pattern, ty) => Err(self.mismatch(
                format!("a pattern for {}", ty.erase()),
                format!("pattern `{}`", pattern),
                site,
            )),
        }
    }

    /// Constant potential after releasing the first coefficient.
    fn release(&mut self, coeffs: &[AnnVar], q: AnnVar, site: Site) -> AnnVar {
        let origin = self.origin("match", site);
        let released = self.pool.fresh(&origin);
        self.emit(
            LinExpr::var(released).minus(q).minus_all(coeffs.first().copied()),
            Relation::Le,
            Rational::zero(),
            Rule::Match,
            site,
        );
        released
    }

    /// Fresh coefficients of a substructure: at most `◁coeffs`.
    fn substructure(&mut self, coeffs: &[AnnVar], site: Site) -> Vec<AnnVar> {
        let origin = self.origin("match", site);
        let sub: Vec<AnnVar> = coeffs.iter().map(|_| self.pool.fresh(&origin)).collect();
        self.shifted(&sub, coeffs, Relation::Le, Rule::Match, site);
        sub
    }

    /// A fresh copy of the element type `elem` carrying at most its potential.
    fn narrowed(&mut self, elem: &AnnTy, site: Site) -> AnnTy {
        let origin = self.origin("match", site);
        let ty = elem.instantiate(&mut self.pool, &origin);
        self.weaken(elem, &ty, Rule::Match, site);
        ty
    }

    fn check_exhaustive(&self, ty: &AnnTy, arms: &[MatchArm], site: Site) {
        let covers = |want: fn(&Pattern) -> bool| {
            arms.iter()
                .any(|arm| matches!(arm.pattern, Pattern::Wildcard) || want(&arm.pattern))
        };
        let missing = match ty {
            Annotated::List { .. } if !covers(|p| matches!(p, Pattern::Nil)) => Some("nil"),
            Annotated::List { .. } if !covers(|p| matches!(p, Pattern::Cons { .. })) => Some("cons"),
            Annotated::Tree { .. } if !covers(|p| matches!(p, Pattern::Leaf)) => Some("leaf"),
            Annotated::Tree { .. } if !covers(|p| matches!(p, Pattern::Node { .. })) => Some("node"),
            _ => None,
        };
        if let Some(missing) = missing {
            tracing::warn!(
                function = %self.function,
                node = %site.node,
                missing,
                "non-exhaustive match"
            );
        }
    }

    fn infer_call(
        &mut self,
        func: &str,
        args: &[Expr],
        expr: &Expr,
        ctx: &TypingContext,
        q: AnnVar,
    ) -> Result<Typed, AnalysisError> {
        let site = Site::of(expr);
        let contract = match ctx.lookup(func) {
            Some(Annotated::Fun(contract)) => contract.clone(),
            Some(other) => return Err(self.mismatch("a function", other.erase(), site)),
            None => self.callee_contract(func, site)?,
        };
        if contract.params.len() != args.len() {
            return Err(self.mismatch(
                format!("{} arguments to `{}`", contract.params.len(), func),
                format!("{} arguments", args.len()),
                site,
            ));
        }

        let parts_vars: Vec<BTreeSet<String>> = args.iter().map(free_vars).collect();
        let parts = self.split(ctx, &parts_vars, site);
        let mut q = q;
        for ((arg, part), param) in args.iter().zip(&parts).zip(&contract.params) {
            let typed = self.infer(arg, part, q)?;
            if !typed.ty.same_shape(param) {
                return Err(self.mismatch(param.erase(), typed.ty.erase(), Site::of(arg)));
            }
            self.equate(&typed.ty, param, Rule::App, Site::of(arg));
            q = typed.q;
        }

        let q = self.charge(q, &[contract.cost], self.step_cost(&expr.kind), Rule::App, site);
        let origin = self.origin("call result", site);
        let ty = contract.ret.instantiate(&mut self.pool, &origin);
        self.weaken(&contract.ret, &ty, Rule::App, site);
        Ok(Typed { ty, q })
    }

    fn infer_fn_ref(&mut self, name: &str, expr: &Expr, q: AnnVar) -> Result<Typed, AnalysisError> {
        let site = Site::of(expr);
        let contract = self.callee_contract(name, site)?;
        let q = self.charge(q, &[], self.step_cost(&expr.kind), Rule::FnRef, site);
        Ok(Typed {
            ty: Annotated::Fun(contract),
            q,
        })
    }

    // ── Callees ──────────────────────────────────────────────────────────

    /// The contract a call of the top-level function `name` is typed with.
    fn callee_contract(&mut self, name: &str, site: Site) -> Result<AnnFun, AnalysisError> {
        match self.lookup(name, site)? {
            Callee::Member(sig) => Ok(self.member_contract(sig, site)),
            // Only a callee whose result carries potential needs more than
            // the all-zero cost-free typing.
            Callee::Solved(sig) if self.free => {
                if sig.ty.ret.has_potential() {
                    Ok(self.specialize(&sig.name, site)?.ty)
                } else {
                    Ok(self.cost_free_instance(&sig, site))
                }
            }
            Callee::Solved(sig) => {
                if self.options.call_mode == CallMode::Specialize || sig.ty.has_function_params() {
                    Ok(self.specialize(&sig.name, site)?.ty)
                } else {
                    Ok(self.instance(&sig, site))
                }
            }
        }
    }

    fn lookup(&self, name: &str, site: Site) -> Result<Callee, AnalysisError> {
        self.scope
            .lookup_signature(name, &self.function, site.span)
            .map_err(|err| match err {
                AnalysisError::UnknownFunction { .. } if self.is_function(name) => AnalysisError::DependencyFailed {
                    function: self.function.clone(),
                    callee: name.to_string(),
                },
                other => other,
            })
    }

    /// Contract of a call to a group member: its signature in a cost-free
    /// body, else its signature plus its cost-free signature.
    fn member_contract(&mut self, sig: DeclaredSignature, site: Site) -> AnnFun {
        let Some(free) = self.cost_free.iter().rev().find_map(|group| group.get(&sig.name)).cloned() else {
            return sig.ty;
        };
        if self.free {
            return free.ty;
        }
        let origin = self.origin(&format!("call of {}", sig.name), site);
        let contract = sig.ty.instantiate(&mut self.pool, &origin);
        let parts = sig.ty.vars().into_iter().zip(free.ty.vars());
        for (total, (paid, spare)) in contract.vars().into_iter().zip(parts) {
            let lhs = LinExpr::var(total).minus(paid).minus(spare);
            self.emit(lhs, Relation::Eq, Rational::zero(), Rule::CostFree, site);
        }
        contract
    }

    /// A fresh copy of a solved signature that may ask for more than the
    /// callee needs and promise less than it returns.
    fn instance(&mut self, sig: &FunctionSignature, site: Site) -> AnnFun {
        let origin = self.origin(&format!("instance of {}", sig.name), site);
        let contract = self.fresh_contract(&sig.ty, &origin);
        self.bind_fun(&contract, &sig.ty, site);
        contract
    }

    /// The all-zero typing, valid for any callee when nothing costs.
    fn cost_free_instance(&mut self, sig: &FunctionSignature, site: Site) -> AnnFun {
        let origin = self.origin(&format!("cost-free instance of {}", sig.name), site);
        let contract = self.fresh_contract(&sig.ty, &origin);
        for var in contract.vars() {
            self.emit(LinExpr::var(var), Relation::Eq, Rational::zero(), Rule::CostFree, site);
        }
        contract
    }

    fn fresh_contract(&mut self, solved: &SolvedFun, origin: &str) -> AnnFun {
        let pool = &mut self.pool;
        let fresh: Result<AnnFun, Infallible> = solved.try_map(&mut |_| Ok(pool.fresh(origin)));
        match fresh {
            Ok(contract) => contract,
            Err(never) => match never {},
        }
    }

    fn bind_fun(&mut self, inst: &AnnFun, solved: &SolvedFun, site: Site) {
        for (param, fixed) in inst.params.iter().zip(&solved.params) {
            self.bind_ty(param, fixed, Relation::Ge, site);
        }
        self.bind_ty(&inst.ret, &solved.ret, Relation::Le, site);
        self.emit(
            LinExpr::var(inst.cost),
            Relation::Ge,
            solved.cost.0.clone(),
            Rule::Instance,
            site,
        );
    }

    fn bind_ty(&mut self, inst: &AnnTy, solved: &SolvedTy, rel: Relation, site: Site) {
        match (inst, solved) {
            (Annotated::List { elem, coeffs }, Annotated::List { elem: fixed_elem, coeffs: fixed })
            | (Annotated::Tree { elem, coeffs }, Annotated::Tree { elem: fixed_elem, coeffs: fixed }) => {
                for (var, value) in coeffs.iter().zip(fixed) {
                    self.emit(LinExpr::var(*var), rel, value.0.clone(), Rule::Instance, site);
                }
                self.bind_ty(elem, fixed_elem, rel, site);
            }
            // Contracts nested in a solved signature are fixed exactly.
            (Annotated::Fun(contract), Annotated::Fun(fixed)) => {
                for (var, value) in contract.coefficients().into_iter().zip(fixed.coefficients()) {
                    self.emit(LinExpr::var(var), Relation::Eq, value.0, Rule::Instance, site);
                }
            }
            _ => {}
        }
    }

    /// Re-derive the group of the solved function `name` inside the current
    /// system, with fresh signatures, and return `name`'s. Inside a
    /// cost-free body the group is only derived cost-free.
    fn specialize(&mut self, name: &str, site: Site) -> Result<DeclaredSignature, AnalysisError> {
        let program = self.program;
        let members = self
            .groups_of
            .get(name)
            .cloned()
            .unwrap_or_else(|| vec![name.to_string()]);
        let mut defs = Vec::with_capacity(members.len());
        for member in &members {
            let def = program.function(member).ok_or_else(|| AnalysisError::DependencyFailed {
                function: self.function.clone(),
                callee: member.clone(),
            })?;
            defs.push(def);
        }
        tracing::debug!(
            caller = %self.function,
            callee = name,
            node = %site.node,
            cost_free = self.free,
            "specializing callee group"
        );

        let degree = self.options.degree;
        let group = declare_group(&defs, degree, "signature", &mut self.pool)?;
        let sig = group
            .get(name)
            .cloned()
            .ok_or_else(|| AnalysisError::UnknownFunction {
                function: self.function.clone(),
                name: name.to_string(),
                span: site.span,
            })?;
        let cost_free = if self.free {
            group.clone()
        } else if self.options.cost_free {
            declare_group(&defs, degree, "cost-free signature", &mut self.pool)?
        } else {
            GroupSignatures::new()
        };
        let free = self.free;
        self.scope.push(group);
        self.cost_free.push(cost_free);
        let result = defs
            .iter()
            .try_for_each(|def| if free { Ok(()) } else { self.function_body(def) })
            .and_then(|()| defs.iter().try_for_each(|def| self.cost_free_body(def)));
        self.cost_free.pop();
        self.scope.pop();
        result.map(|()| sig)
    }

    // ── Sharing ──────────────────────────────────────────────────────────

    /// One context per sequential part. A data binding used by several
    /// parts is split into copies whose annotations sum to the original;
    /// bindings no part uses are dropped.
    fn split(&mut self, ctx: &TypingContext, parts: &[BTreeSet<String>], site: Site) -> Vec<TypingContext> {
        let mut out = vec![TypingContext::new(); parts.len()];
        for (name, ty) in ctx.iter() {
            let users: Vec<usize> = parts
                .iter()
                .enumerate()
                .filter(|(_, vars)| vars.contains(name))
                .map(|(i, _)| i)
                .collect();
            if users.len() > 1 && ty.has_potential() {
                let origin = self.origin(&format!("share {}", name), site);
                let copies: Vec<AnnTy> = users.iter().map(|_| ty.instantiate(&mut self.pool, &origin)).collect();
                self.share(ty, &copies, site);
                for (i, copy) in users.into_iter().zip(copies) {
                    out[i] = out[i].extend(name, copy);
                }
            } else {
                for i in users {
                    out[i] = out[i].extend(name, ty.clone());
                }
            }
        }
        out
    }

    fn share(&mut self, ty: &AnnTy, copies: &[AnnTy], site: Site) {
        let copy_vars: Vec<Vec<AnnVar>> = copies.iter().map(AnnTy::vars).collect();
        for (i, var) in ty.vars().into_iter().enumerate() {
            let lhs = LinExpr::var(var).minus_all(copy_vars.iter().map(|vars| vars[i]));
            self.emit(lhs, Relation::Eq, Rational::zero(), Rule::Share, site);
        }
    }

    /// Joint result of alternatives: each carries at least the joint
    /// annotation and leaves at least the joint potential.
    fn join(&mut self, branches: &[(Typed, Site)], site: Site) -> Result<Typed, AnalysisError> {
        let Some((first, _)) = branches.first() else {
            return Err(AnalysisError::UnsupportedConstruct {
                function: self.function.clone(),
                construct: "branching without alternatives".to_string(),
                node: site.node,
                span: site.span,
            });
        };
        for (branch, branch_site) in branches {
            if !branch.ty.same_shape(&first.ty) {
                return Err(self.mismatch(first.ty.erase(), branch.ty.erase(), *branch_site));
            }
        }
        let origin = self.origin("join", site);
        let ty = first.ty.instantiate(&mut self.pool, &origin);
        let q = self.pool.fresh(&origin);
        for (branch, _) in branches {
            self.weaken(&branch.ty, &ty, Rule::Weaken, site);
            self.at_least(branch.q, q, Rule::Weaken, site);
        }
        Ok(Typed { ty, q })
    }

    // ── Emission ─────────────────────────────────────────────────────────

    fn emit(&mut self, lhs: LinExpr, rel: Relation, rhs: Rational, rule: Rule, site: Site) {
        if lhs.is_empty() && rel.holds(&Rational::zero(), &rhs) {
            return;
        }
        tracing::trace!(
            function = %self.function,
            node = %site.node,
            rule = %rule,
            "{} {} {}",
            lhs,
            rel,
            rhs
        );
        self.constraints.push(Constraint {
            lhs,
            rel,
            rhs,
            provenance: Provenance {
                function: self.function.clone(),
                node: site.node,
                span: site.span,
                rule,
            },
        });
    }

    fn equate(&mut self, a: &AnnTy, b: &AnnTy, rule: Rule, site: Site) {
        for (x, y) in a.vars().into_iter().zip(b.vars()) {
            self.emit(LinExpr::var(x).minus(y), Relation::Eq, Rational::zero(), rule, site);
        }
    }

    fn at_least(&mut self, x: AnnVar, y: AnnVar, rule: Rule, site: Site) {
        self.emit(LinExpr::var(x).minus(y), Relation::Ge, Rational::zero(), rule, site);
    }

    /// `sub` may be used where `sup` is expected.
    fn weaken(&mut self, sub: &AnnTy, sup: &AnnTy, rule: Rule, site: Site) {
        match (sub, sup) {
            (Annotated::List { elem: a, coeffs: ca }, Annotated::List { elem: b, coeffs: cb })
            | (Annotated::Tree { elem: a, coeffs: ca }, Annotated::Tree { elem: b, coeffs: cb }) => {
                for (x, y) in ca.iter().zip(cb) {
                    self.at_least(*x, *y, rule, site);
                }
                self.weaken(a, b, rule, site);
            }
            (Annotated::Fun(f), Annotated::Fun(g)) => {
                for (p, r) in f.params.iter().zip(&g.params) {
                    self.weaken(r, p, rule, site);
                }
                self.weaken(&f.ret, &g.ret, rule, site);
                self.at_least(g.cost, f.cost, rule, site);
            }
            _ => {}
        }
    }

    /// `sub rel ◁sup`, coefficient by coefficient.
    fn shifted(&mut self, sub: &[AnnVar], sup: &[AnnVar], rel: Relation, rule: Rule, site: Site) {
        for (var, sources) in sub.iter().zip(shift(sup)) {
            let lhs = LinExpr::var(*var).minus_all(sources);
            self.emit(lhs, rel, Rational::zero(), rule, site);
        }
    }

    /// Pay `cost` plus the `extra` variables out of `from`; returns the
    /// potential left.
    fn charge(&mut self, from: AnnVar, extra: &[AnnVar], cost: Rational, rule: Rule, site: Site) -> AnnVar {
        if extra.is_empty() && cost.is_zero() {
            return from;
        }
        let origin = self.origin("potential", site);
        let to = self.pool.fresh(&origin);
        let lhs = LinExpr::var(from).minus(to).minus_all(extra.iter().copied());
        self.emit(lhs, Relation::Eq, cost, rule, site);
        to
    }

    // ── Helpers ──────────────────────────────────────────────────────────

    fn step_cost(&self, kind: &ExprKind) -> Rational {
        if self.free {
            return Rational::zero();
        }
        match self.options.metric {
            CostMetric::Ticks => Rational::zero(),
            CostMetric::Steps => Rational::one(),
            CostMetric::Heap => match kind {
                ExprKind::Cons { .. } | ExprKind::Node { .. } => Rational::one(),
                _ => Rational::zero(),
            },
        }
    }

    fn annotate(&mut self, ty: &Ty, site: Site) -> Result<AnnTy, AnalysisError> {
        let origin = self.origin("literal", site);
        annotate(ty, self.options.degree, &mut self.pool, &origin).map_err(|err| AnalysisError::UnsupportedType {
            function: self.function.clone(),
            ty: err.ty,
            reason: err.reason.to_string(),
            span: site.span,
        })
    }

    fn is_function(&self, name: &str) -> bool {
        self.program.function(name).is_some()
    }

    fn origin(&self, what: &str, site: Site) -> String {
        format!("{}: {} at {}", self.function, what, site.node)
    }

    fn mismatch(&self, expected: impl ToString, found: impl ToString, site: Site) -> AnalysisError {
        AnalysisError::TypeMismatch {
            function: self.function.clone(),
            expected: expected.to_string(),
            found: found.to_string(),
            node: site.node,
            span: site.span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::{BaseKind, Coefficient};
    use amor_ast::build::*;
    use amor_common::rational::int as q;

    // ── Helpers ──────────────────────────────────────────────────────────

    fn generate(program: &Program, members: &[&str], table: &SignatureTable) -> Result<GroupDerivation, AnalysisError> {
        let pool = AnnotationPool::new();
        generate_with(program, members, table, &pool)
    }

    fn generate_with(
        program: &Program,
        members: &[&str],
        table: &SignatureTable,
        pool: &AnnotationPool,
    ) -> Result<GroupDerivation, AnalysisError> {
        let members: Vec<String> = members.iter().map(|m| m.to_string()).collect();
        generate_group(
            program,
            &members,
            &FxHashMap::default(),
            table,
            pool,
            &GenerateOptions::default(),
        )
    }

    fn ints() -> Ty {
        Ty::list(Ty::Int)
    }

    fn append() -> FunctionDef {
        func(
            "append",
            vec![("xs", ints()), ("ys", ints())],
            ints(),
            match_(
                var("xs"),
                vec![
                    arm(pat_nil(), var("ys")),
                    arm(
                        pat_cons("h", "t"),
                        tick(1, cons(var("h"), call("append", vec![var("t"), var("ys")]))),
                    ),
                ],
            ),
        )
    }

    fn rules(derivation: &GroupDerivation) -> Vec<Rule> {
        derivation
            .system
            .constraints()
            .iter()
            .map(|c| c.provenance.rule)
            .collect()
    }

    // ── Tests ────────────────────────────────────────────────────────────

    #[test]
    fn recursive_calls_reuse_the_group_signature() {
        let program = program(vec![append()]);
        let derivation = generate(&program, &["append"], &SignatureTable::new()).unwrap();
        assert_eq!(derivation.signatures.len(), 1);
        let sig = &derivation.signatures[0];
        assert_eq!(sig.ty.to_string(), "(List<Int>^[q0], List<Int>^[q1]) -[q3]-> List<Int>^[q2]");

        let rules = rules(&derivation);
        assert!(rules.contains(&Rule::App));
        assert!(!rules.contains(&Rule::Instance));
        // The recursive call's contract includes the group's own cost variable.
        assert!(derivation
            .system
            .constraints()
            .iter()
            .any(|c| c.provenance.rule == Rule::CostFree && c.lhs.coeff(sig.ty.cost).is_some()));
        // Only the regular walk pays the tick.
        assert_eq!(rules.iter().filter(|r| **r == Rule::Tick).count(), 1);
        derivation.system.validate().unwrap();

        let stages = derivation.system.stages();
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[0].degree, 1);
        assert_eq!(stages[0].objective.to_string(), "q0 + q1");
        assert_eq!(stages[1].objective.to_string(), "q3");
    }

    #[test]
    fn without_cost_free_typing_recursive_calls_pay_the_signature() {
        let program = program(vec![append()]);
        let options = GenerateOptions {
            cost_free: false,
            ..GenerateOptions::default()
        };
        let derivation = generate_group(
            &program,
            &["append".to_string()],
            &FxHashMap::default(),
            &SignatureTable::new(),
            &AnnotationPool::new(),
            &options,
        )
        .unwrap();
        let sig = &derivation.signatures[0];
        assert!(!rules(&derivation).contains(&Rule::CostFree));
        assert!(derivation
            .system
            .constraints()
            .iter()
            .any(|c| c.provenance.rule == Rule::App && c.lhs.coeff(sig.ty.cost).is_some()));
    }

    #[test]
    fn cost_free_variables_stay_out_of_the_objective() {
        let program = program(vec![append()]);
        let derivation = generate(&program, &["append"], &SignatureTable::new()).unwrap();
        let registry = derivation.system.registry();
        let cost_free: Vec<AnnVar> = registry
            .iter()
            .filter(|(_, info)| info.origin == "append: cost-free signature")
            .map(|(var, _)| *var)
            .collect();
        assert_eq!(cost_free.len(), 4);
        for stage in derivation.system.stages() {
            assert!(cost_free.iter().all(|var| stage.objective.coeff(*var).is_none()));
        }
    }

    #[test]
    fn function_parameters_of_cost_free_signatures_are_pinned() {
        let apply = func(
            "apply",
            vec![("f", Ty::fun(vec![Ty::Int], Ty::Int)), ("x", Ty::Int)],
            Ty::Int,
            call("f", vec![var("x")]),
        );
        let program = program(vec![apply]);
        let derivation = generate(&program, &["apply"], &SignatureTable::new()).unwrap();
        let pinned = derivation
            .system
            .constraints()
            .iter()
            .filter(|c| c.provenance.rule == Rule::CostFree && c.lhs.len() == 1)
            .count();
        // The parameter's contract has a cost and nothing else.
        assert_eq!(pinned, 1);
    }

    #[test]
    fn generation_is_deterministic_up_to_renaming() {
        let program = program(vec![append()]);
        let pool = AnnotationPool::new();
        let table = SignatureTable::new();
        let first = generate_with(&program, &["append"], &table, &pool).unwrap();
        let second = generate_with(&program, &["append"], &table, &pool).unwrap();

        let first_vars: BTreeSet<AnnVar> = first.system.registry().keys().copied().collect();
        assert!(second.system.registry().keys().all(|v| !first_vars.contains(v)));
        assert_eq!(first.system.canonical_form(), second.system.canonical_form());
    }

    #[test]
    fn data_used_twice_is_shared() {
        let f = func(
            "twice",
            vec![("xs", ints())],
            Ty::list(ints()),
            cons(var("xs"), cons(var("xs"), nil(ints()))),
        );
        let program = program(vec![f]);
        let derivation = generate(&program, &["twice"], &SignatureTable::new()).unwrap();
        assert!(rules(&derivation).contains(&Rule::Share));
    }

    #[test]
    fn destructured_subtrees_are_annotated_separately() {
        let f = func(
            "f",
            vec![("t", Ty::tree(Ty::Int))],
            Ty::Int,
            match_(
                var("t"),
                vec![
                    arm(pat_leaf(), int(0)),
                    arm(pat_node("l", "x", "r"), int(1)),
                ],
            ),
        );
        let program = program(vec![f]);
        let options = GenerateOptions {
            cost_free: false,
            ..GenerateOptions::default()
        };
        let derivation = generate_group(
            &program,
            &["f".to_string()],
            &FxHashMap::default(),
            &SignatureTable::new(),
            &AnnotationPool::new(),
            &options,
        )
        .unwrap();
        let matched: Vec<&Constraint> = derivation
            .system
            .constraints()
            .iter()
            .filter(|c| c.provenance.rule == Rule::Match)
            .collect();
        // One `sub <= ◁q` row per subtree and one release row, no equalities.
        assert_eq!(matched.len(), 3);
        assert!(matched.iter().all(|c| c.rel == Relation::Le));
        assert_eq!(matched.iter().filter(|c| c.lhs.len() == 2).count(), 2);
    }

    #[test]
    fn anonymous_functions_are_unsupported() {
        let f = func(
            "f",
            vec![],
            Ty::fun(vec![Ty::Int], Ty::Int),
            lambda(vec![("x", Ty::Int)], var("x")),
        );
        let program = program(vec![f]);
        let err = generate(&program, &["f"], &SignatureTable::new()).unwrap_err();
        assert!(matches!(err, AnalysisError::UnsupportedConstruct { .. }), "{:?}", err);
    }

    #[test]
    fn tree_pattern_on_a_list_is_a_mismatch() {
        let f = func(
            "f",
            vec![("xs", ints())],
            Ty::Int,
            match_(var("xs"), vec![arm(pat_leaf(), int(0)), arm(Pattern::Wildcard, int(1))]),
        );
        let program = program(vec![f]);
        let err = generate(&program, &["f"], &SignatureTable::new()).unwrap_err();
        match err {
            AnalysisError::TypeMismatch { expected, found, .. } => {
                assert_eq!(expected, "a pattern for List<Int>");
                assert_eq!(found, "pattern `leaf`");
            }
            other => panic!("expected a type mismatch, got {:?}", other),
        }
    }

    #[test]
    fn missing_partner_is_unknown() {
        let even = func(
            "even",
            vec![("xs", ints())],
            Ty::Bool,
            match_(
                var("xs"),
                vec![
                    arm(pat_nil(), bool_(true)),
                    arm(pat_cons("_", "t"), call("odd", vec![var("t")])),
                ],
            ),
        );
        let program = program(vec![even]);
        let err = generate(&program, &["even"], &SignatureTable::new()).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::UnknownFunction {
                function: "even".into(),
                name: "odd".into(),
                span: Span::default(),
            }
        );
    }

    #[test]
    fn unsolved_dependency_fails() {
        let helper = func("helper", vec![], Ty::Int, int(1));
        let main = func("main", vec![], Ty::Int, call("helper", vec![]));
        let program = program(vec![helper, main]);
        let err = generate(&program, &["main"], &SignatureTable::new()).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::DependencyFailed {
                function: "main".into(),
                callee: "helper".into(),
            }
        );
    }

    #[test]
    fn solved_callees_are_instantiated() {
        let helper = func("helper", vec![], Ty::Int, tick(2, int(1)));
        let main = func("main", vec![], Ty::Int, call("helper", vec![]));
        let program = program(vec![helper, main]);
        let table = SignatureTable::new();
        table
            .publish(FunctionSignature {
                name: "helper".into(),
                param_names: vec![],
                ty: Contract {
                    params: vec![],
                    ret: Box::new(Annotated::Base(BaseKind::Int)),
                    cost: Coefficient(q(2)),
                },
            })
            .unwrap();
        let derivation = generate(&program, &["main"], &table).unwrap();
        let instance: Vec<&Constraint> = derivation
            .system
            .constraints()
            .iter()
            .filter(|c| c.provenance.rule == Rule::Instance)
            .collect();
        assert_eq!(instance.len(), 1);
        assert_eq!(instance[0].rel, Relation::Ge);
        assert_eq!(instance[0].rhs, q(2));
    }

    #[test]
    fn steps_metric_charges_every_node() {
        let f = func("f", vec![], Ty::Int, prim(PrimOp::Add, vec![int(1), int(2)]));
        let program = program(vec![f]);
        let members = vec!["f".to_string()];
        let options = GenerateOptions {
            metric: CostMetric::Steps,
            ..GenerateOptions::default()
        };
        let derivation = generate_group(
            &program,
            &members,
            &FxHashMap::default(),
            &SignatureTable::new(),
            &AnnotationPool::new(),
            &options,
        )
        .unwrap();
        let charged = derivation
            .system
            .constraints()
            .iter()
            .filter(|c| c.rhs == q(1))
            .count();
        assert_eq!(charged, 3);
    }
}
