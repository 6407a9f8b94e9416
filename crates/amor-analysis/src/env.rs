//! Typing contexts.

use crate::ty::AnnTy;

/// Ordered bindings from program variables to annotated types. Contexts
/// are never mutated in place: every operation returns a derived context.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TypingContext {
    bindings: Vec<(String, AnnTy)>,
}

impl TypingContext {
    pub fn new() -> Self {
        TypingContext::default()
    }

    /// Bind `name`, shadowing any earlier binding of the same name.
    /// Binders named `_` are ignored.
    pub fn extend(&self, name: &str, ty: AnnTy) -> TypingContext {
        if name == "_" {
            return self.clone();
        }
        let mut bindings: Vec<(String, AnnTy)> =
            self.bindings.iter().filter(|(n, _)| n != name).cloned().collect();
        bindings.push((name.to_string(), ty));
        TypingContext { bindings }
    }

    pub fn lookup(&self, name: &str) -> Option<&AnnTy> {
        self.bindings.iter().rev().find(|(n, _)| n == name).map(|(_, ty)| ty)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AnnTy)> {
        self.bindings.iter().map(|(n, ty)| (n.as_str(), ty))
    }
}

impl FromIterator<(String, AnnTy)> for TypingContext {
    fn from_iter<I: IntoIterator<Item = (String, AnnTy)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(TypingContext::new(), |ctx, (name, ty)| ctx.extend(&name, ty))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::{Annotated, BaseKind};

    fn int() -> AnnTy {
        Annotated::Base(BaseKind::Int)
    }

    fn boolean() -> AnnTy {
        Annotated::Base(BaseKind::Bool)
    }

    #[test]
    fn extend_shadows_without_mutating() {
        let base = TypingContext::new().extend("x", int());
        let derived = base.extend("x", boolean()).extend("y", int());
        assert_eq!(base.lookup("x"), Some(&int()));
        assert_eq!(derived.lookup("x"), Some(&boolean()));
        let names: Vec<&str> = derived.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["x", "y"]);
    }

    #[test]
    fn wildcard_binders_are_dropped() {
        let ctx = TypingContext::new().extend("_", int());
        assert_eq!(ctx.iter().count(), 0);
    }

    #[test]
    fn collected_bindings_keep_the_last_duplicate() {
        let ctx: TypingContext = vec![
            ("a".to_string(), int()),
            ("b".to_string(), boolean()),
            ("a".to_string(), boolean()),
        ]
        .into_iter()
        .collect();
        let names: Vec<&str> = ctx.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(ctx.lookup("a"), Some(&boolean()));
        assert_eq!(ctx.lookup("c"), None);
    }
}
