//! Tree-based genetic programming.
//!
//! A population of expression trees is evolved toward a fitness objective: each generation,
//! parents are selected, recombined by subtree crossover (optionally with brood selection),
//! mutated and re-scored against an evaluation [`Target`](target::Target), and the previous best
//! individual is copied forward by elitism. Offspring production is split across a thread pool.
//!
//! ```no_run
//! use treegp::{ga, Config, Pairs};
//!
//! let target = Pairs::sample((0..10).map(f64::from), |x| x * x).unwrap();
//! let config = Config { seed: Some(1), ..Config::default() };
//! let (_trial, outcome) = ga::run_trials(&config, &target).unwrap();
//! println!("{}", outcome.best);
//! ```

pub mod config;
pub mod draw;
pub mod error;
pub mod ga;
pub mod gp;
pub mod target;

pub use crate::config::{Config, Mutation, Selection};
pub use crate::error::{Error, Result};
pub use crate::ga::{Evolution, Outcome, Stats};
pub use crate::gp::expr::{Method, Node, PointMutation, Size};
pub use crate::gp::function::{Function, FunctionSet};
pub use crate::gp::individual::{Individual, Tree};
pub use crate::target::{Pairs, Stateful, Target, Trail};
