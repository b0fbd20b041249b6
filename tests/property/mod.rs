//! Property-based tests for unification and lookup

mod unify_laws;
