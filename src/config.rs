//! Run configuration: every tunable of the evolution, with defaults and validation.
//!
//! A `Config` is checked once, when it is built, and is read-only for the rest of the run.

use crate::error::{Error, Result};
use crate::gp::expr::PointMutation;
use crate::gp::function::{Function, FunctionSet};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How parents are drawn from the previous generation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    /// The best of `tournament_size` uniformly drawn individuals.
    Tournament,
    /// A tournament held within the fitter group (of `fit_size` individuals) with probability
    /// `over_select_chance`, and within the remainder otherwise.
    OverSelection,
}

/// How offspring are mutated.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mutation {
    /// Each non-root node is point-mutated with probability `mutate_chance`.
    Point,
    /// With probability `mutate_chance`, one structural operator is applied to the tree.
    Operators,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub population_size: usize,
    pub generations: usize,
    /// Initial trees are built to a depth drawn from `[min_depth, max_depth]`.
    pub min_depth: usize,
    pub max_depth: usize,
    /// Offspring deeper than this are discarded after crossover and mutation.
    pub depth_limit: usize,
    pub selection: Selection,
    pub tournament_size: usize,
    pub over_select_chance: f64,
    pub fit_size: usize,
    /// `2` crosses each pair once; anything larger is the brood size of brood selection.
    pub crossover_size: usize,
    pub crossover_chance: f64,
    /// The fraction of a full evaluation spent scoring each brood offspring.
    pub brood_budget: f64,
    /// The chance that a crossover point is an internal node.
    pub internals_chance: f64,
    pub mutation: Mutation,
    pub point_mutation: PointMutation,
    pub mutate_chance: f64,
    /// The chance that an initial tree is built with the grow method.
    pub grow_chance: f64,
    pub constant_min: f64,
    pub constant_max: f64,
    pub elitism_size: usize,
    /// Charged per node of a tree against its raw score.
    pub penalty: f64,
    pub leaves: Vec<Function>,
    pub internals: Vec<Function>,
    /// A fixed grow bias. The ratio of internals to all functions is used when absent.
    pub internal_chance: Option<f64>,
    /// Worker count. The number of logical CPUs is used when absent.
    pub threads: Option<usize>,
    /// Master seed. Drawn from entropy when absent.
    pub seed: Option<u64>,
    pub trials: usize,
    /// Action budget of stateful environments.
    pub ticks: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            population_size: 128,
            generations: 128,
            min_depth: 0,
            max_depth: 4,
            depth_limit: 17,
            selection: Selection::Tournament,
            tournament_size: 3,
            over_select_chance: 0.8,
            fit_size: 32,
            crossover_size: 2,
            crossover_chance: 0.8,
            brood_budget: 0.5,
            internals_chance: 0.9,
            mutation: Mutation::Point,
            point_mutation: PointMutation::SameArity,
            mutate_chance: 0.01,
            grow_chance: 0.5,
            constant_min: 0.0,
            constant_max: 10.0,
            elitism_size: 2,
            penalty: 0.1,
            leaves: vec![Function::Constant, Function::Input],
            internals: vec![
                Function::Add,
                Function::Subtract,
                Function::Multiply,
                Function::Divide,
            ],
            internal_chance: None,
            threads: None,
            seed: None,
            trials: 1,
            ticks: 600,
        }
    }
}

fn probability(name: &str, p: f64) -> Result<()> {
    if (0.0..=1.0).contains(&p) {
        Ok(())
    } else {
        Err(Error::Config(format!("{} must be within [0, 1], found {}", name, p)))
    }
}

fn at_least_one(name: &str, n: usize) -> Result<()> {
    if n > 0 {
        Ok(())
    } else {
        Err(Error::Config(format!("{} must be at least 1", name)))
    }
}

impl Config {
    /// The defaults with the agent function set, for environment targets.
    pub fn agent() -> Self {
        Config {
            leaves: vec![Function::Forward, Function::Left, Function::Right],
            internals: vec![Function::IfFoodAhead, Function::Prog2],
            ..Config::default()
        }
    }

    /// Check every invariant of the configuration.
    pub fn validate(&self) -> Result<()> {
        at_least_one("population_size", self.population_size)?;
        at_least_one("generations", self.generations)?;
        at_least_one("trials", self.trials)?;
        at_least_one("ticks", self.ticks)?;
        if self.min_depth > self.max_depth {
            return Err(Error::Config(format!(
                "min_depth {} exceeds max_depth {}",
                self.min_depth, self.max_depth
            )));
        }
        if self.max_depth > self.depth_limit {
            return Err(Error::Config(format!(
                "max_depth {} exceeds depth_limit {}",
                self.max_depth, self.depth_limit
            )));
        }
        at_least_one("tournament_size", self.tournament_size)?;
        if self.tournament_size > self.population_size {
            return Err(Error::Config(format!(
                "tournament_size {} exceeds population_size {}",
                self.tournament_size, self.population_size
            )));
        }
        if self.selection == Selection::OverSelection
            && (self.fit_size == 0 || self.fit_size > self.population_size)
        {
            return Err(Error::Config(format!(
                "fit_size {} must be within [1, population_size {}]",
                self.fit_size, self.population_size
            )));
        }
        if self.elitism_size > self.population_size {
            return Err(Error::Config(format!(
                "elitism_size {} exceeds population_size {}",
                self.elitism_size, self.population_size
            )));
        }
        if self.crossover_size < 2 {
            return Err(Error::Config(format!(
                "crossover_size must be at least 2, found {}",
                self.crossover_size
            )));
        }
        if !(self.brood_budget > 0.0 && self.brood_budget <= 1.0) {
            return Err(Error::Config(format!(
                "brood_budget must be within (0, 1], found {}",
                self.brood_budget
            )));
        }
        probability("over_select_chance", self.over_select_chance)?;
        probability("crossover_chance", self.crossover_chance)?;
        probability("internals_chance", self.internals_chance)?;
        probability("mutate_chance", self.mutate_chance)?;
        probability("grow_chance", self.grow_chance)?;
        if !self.constant_min.is_finite() || !self.constant_max.is_finite() {
            return Err(Error::Config("constant range must be finite".to_string()));
        }
        if !(self.penalty.is_finite() && self.penalty >= 0.0) {
            return Err(Error::Config(format!(
                "penalty must be finite and non-negative, found {}",
                self.penalty
            )));
        }
        if self.threads == Some(0) {
            return Err(Error::Config("threads must be at least 1".to_string()));
        }
        self.function_set().map(|_| ())
    }

    /// Parse and validate a TOML configuration. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Config::from_toml_str(&text)
    }

    /// The function set trees are built from.
    pub fn function_set(&self) -> Result<FunctionSet> {
        FunctionSet::new(
            self.leaves.clone(),
            self.internals.clone(),
            (self.constant_min, self.constant_max),
            self.internal_chance,
        )
    }

    /// The number of workers offspring production is split across.
    pub fn workers(&self) -> usize {
        self.threads.unwrap_or_else(num_cpus::get).max(1)
    }
}
