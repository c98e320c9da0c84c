//! The contract between the evolutionary core and whatever an expression is evaluated against.
//!
//! Two kinds of target ship with the crate:
//!
//! - [`Pairs`]: a finite set of `(x, y)` samples, scored by the sum of squared errors
//!   (minimised).
//! - [`Trail`] (through [`Stateful`]): a grid environment walked by an agent whose program is the
//!   expression, scored by the food it eats (maximised).

mod pairs;
mod trail;

pub use self::pairs::Pairs;
pub use self::trail::{Agent, Environment, Heading, Stateful, Trail};

use crate::error::Result;
use crate::gp::expr::Node;
use crate::gp::function::{Action, FunctionSet};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// What an expression reads and acts upon while it is being evaluated.
pub trait Context {
    /// The value of the `x` terminal.
    fn input(&self) -> f64;
    /// Whether the agent senses food ahead. Always `false` outside of an environment.
    fn sense(&mut self) -> bool {
        false
    }
    /// Perform an agent action. A no-op outside of an environment.
    fn act(&mut self, _action: Action) {}
}

/// A plain number is the context for symbolic regression: the `x` terminal reads it.
impl Context for f64 {
    fn input(&self) -> f64 {
        *self
    }
}

/// The direction in which a target's score improves.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    Minimize,
    Maximize,
}

impl Objective {
    /// Apply the size penalty to a raw score, always in the direction that makes bigger trees worse.
    pub fn penalize(self, score: f64, penalty: f64, size: usize) -> f64 {
        match self {
            Objective::Minimize => score + penalty * size as f64,
            Objective::Maximize => score - penalty * size as f64,
        }
    }

    /// Order two fitness values so that `Less` means `a` is better than `b`.
    ///
    /// Invalid values (NaN, infinite or subnormal) are strictly worse than every valid value and
    /// equal to each other.
    pub fn rank(self, a: f64, b: f64) -> Ordering {
        match (is_valid(a), is_valid(b)) {
            (true, true) => {
                let ord = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
                match self {
                    Objective::Minimize => ord,
                    Objective::Maximize => ord.reverse(),
                }
            }
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => Ordering::Equal,
        }
    }
}

/// A fitness value that may take part in comparisons: finite and not subnormal.
pub fn is_valid(fitness: f64) -> bool {
    fitness.is_finite() && !fitness.is_subnormal()
}

/// How much computation a single evaluation may spend.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Budget {
    Full,
    /// A fraction in `(0, 1]` of the full budget, for cheap approximate scoring.
    Reduced(f64),
}

/// The raw outcome of evaluating an expression against a target.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Scored {
    /// The raw score: squared error or food eaten.
    pub score: f64,
    /// The score normalised against the best achievable score.
    pub adjusted: f64,
}

/// Anything an expression can be scored against.
pub trait Target: Sync {
    fn objective(&self) -> Objective;

    /// Score the expression rooted at `root`.
    ///
    /// Returns `Error::NonFinite` if the expression ever yields a non-finite value.
    fn score(&self, root: &Node, budget: Budget) -> Result<Scored>;

    /// A human-readable account of the evaluation, for reports.
    fn trace(&self, root: &Node) -> Result<String>;

    /// Reject a function set whose expressions could never score against this target.
    fn accepts(&self, _set: &FunctionSet) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_respects_direction() {
        assert_eq!(Objective::Minimize.rank(1.0, 2.0), Ordering::Less);
        assert_eq!(Objective::Maximize.rank(1.0, 2.0), Ordering::Greater);
        assert_eq!(Objective::Minimize.rank(0.0, 2.0), Ordering::Less);
    }

    #[test]
    fn invalid_fitness_is_always_worse() {
        let invalid = [f64::NAN, f64::INFINITY, f64::NEG_INFINITY, f64::MIN_POSITIVE / 2.0];
        for &objective in &[Objective::Minimize, Objective::Maximize] {
            for &bad in &invalid {
                assert_eq!(objective.rank(1e300, bad), Ordering::Less);
                assert_eq!(objective.rank(bad, -1e300), Ordering::Greater);
                assert_eq!(objective.rank(bad, f64::NAN), Ordering::Equal);
            }
        }
    }

    #[test]
    fn penalty_makes_size_worse() {
        assert_eq!(Objective::Minimize.penalize(1.0, 0.5, 4), 3.0);
        assert_eq!(Objective::Maximize.penalize(10.0, 0.5, 4), 8.0);
    }
}
