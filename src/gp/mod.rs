//! Common items related to Genetic Programming.
//!
//! Expressions are nodes with some level of arity - aka the number of inputs.
//!
//! - `function`: the closed set of function tags and the `FunctionSet` trees are built from.
//! - `expr`: expression nodes, their construction (grow, full), evaluation, addressing and point
//!   mutation.
//! - `individual`: unevaluated trees, evaluated individuals and subtree crossover.
//! - `operators`: selection, recombination and mutation of a whole generation.

pub mod expr;
pub mod function;
pub mod individual;
pub mod operators;
