//! Operators that produce a new generation from the previous one: selection, recombination and
//! mutation, followed by evaluation of each offspring.
//!
//! A `Breeder` bundles everything an offspring block needs. It only ever borrows the previous
//! generation, so any number of breeders can work on the same parents at once.

use crate::config::{Config, Mutation, Selection};
use crate::draw::Draw;
use crate::error::{Error, Result};
use crate::gp::expr::{self, Locus};
use crate::gp::function::FunctionSet;
use crate::gp::individual::{self, Individual, Tree};
use crate::target::{Budget, Target};
use log::{debug, warn};
use rand::Rng;

/// The structural mutation operators.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Structural {
    /// Replace a subtree with a random leaf.
    Shrink,
    /// Make a subtree the whole tree.
    Hoist,
    /// Replace a subtree with a freshly grown one.
    Regrow,
    /// Point-mutate every node of a subtree.
    Replace,
}

impl Structural {
    pub const ALL: [Structural; 4] =
        [Structural::Shrink, Structural::Hoist, Structural::Regrow, Structural::Replace];
}

/// The previous generation, from which parents are selected.
#[derive(Debug)]
pub struct Parents<'a> {
    population: &'a [Individual],
    // Population indices from fittest to least fit, for over-selection.
    ranked: Vec<usize>,
}

impl<'a> Parents<'a> {
    /// Wrap a population. The population is ranked once here when `selection` needs it.
    pub fn new(population: &'a [Individual], selection: Selection) -> Self {
        let ranked = match selection {
            Selection::Tournament => Vec::new(),
            Selection::OverSelection => {
                let mut ranked: Vec<usize> = (0..population.len()).collect();
                ranked.sort_by(|&a, &b| population[a].rank(&population[b]));
                ranked
            }
        };
        Parents { population, ranked }
    }

    pub fn population(&self) -> &'a [Individual] {
        self.population
    }

    /// The best of `size` individuals drawn uniformly with replacement.
    pub fn tournament<R: Rng>(&self, rng: &mut R, size: usize) -> &'a Individual {
        let last = self.population.len() - 1;
        let mut winner = &self.population[rng.uniform_int(0, last)];
        for _ in 1..size {
            let contestant = &self.population[rng.uniform_int(0, last)];
            if contestant.rank(winner).is_lt() {
                winner = contestant;
            }
        }
        winner
    }

    /// A tournament held within the `fit_size` fittest individuals with probability `chance`, and
    /// within the rest of the population otherwise.
    ///
    /// When the fitter group spans the whole population, every tournament is held within it.
    pub fn over_select<R: Rng>(&self, rng: &mut R, size: usize, chance: f64, fit_size: usize) -> &'a Individual {
        if self.ranked.is_empty() {
            // Not ranked for over-selection.
            return self.tournament(rng, size);
        }
        let fit_size = fit_size.clamp(1, self.ranked.len());
        let (lo, hi) = if rng.bernoulli(chance) || fit_size == self.ranked.len() {
            (0, fit_size - 1)
        } else {
            (fit_size, self.ranked.len() - 1)
        };
        // The group is sorted, so the lowest drawn rank wins.
        let best = (0..size).map(|_| rng.uniform_int(lo, hi)).min().unwrap_or(lo);
        &self.population[self.ranked[best]]
    }
}

/// Produces evaluated offspring from a borrowed parent generation.
pub struct Breeder<'a, T: ?Sized> {
    pub config: &'a Config,
    pub set: &'a FunctionSet,
    pub target: &'a T,
    pub parents: &'a Parents<'a>,
}

impl<'a, T> Breeder<'a, T>
where
    T: Target + ?Sized,
{
    /// Draw a parent according to the configured selection scheme.
    pub fn select<R: Rng>(&self, rng: &mut R) -> &'a Individual {
        let c = self.config;
        match c.selection {
            Selection::Tournament => self.parents.tournament(rng, c.tournament_size),
            Selection::OverSelection => {
                self.parents.over_select(rng, c.tournament_size, c.over_select_chance, c.fit_size)
            }
        }
    }

    /// Produce exactly `count` evaluated offspring.
    ///
    /// Parents are drawn in pairs. Each pair is recombined with probability `crossover_chance`,
    /// then every child is mutated and scored with the full budget.
    pub fn breed<R: Rng>(&self, rng: &mut R, count: usize) -> Result<Vec<Individual>> {
        let mut offspring = Vec::with_capacity(count);
        while offspring.len() < count {
            let mother = self.select(rng);
            let father = self.select(rng);
            let (a, b) = if rng.bernoulli(self.config.crossover_chance) {
                self.recombine(rng, mother, father)?
            } else {
                (mother.tree().clone(), father.tree().clone())
            };
            for child in vec![a, b] {
                if offspring.len() == count {
                    break;
                }
                let child = self.mutate(rng, child)?;
                offspring.push(child.evaluate(self.target, self.config.penalty, Budget::Full)?);
            }
        }
        Ok(offspring)
    }

    /// Cross a pair once, or run a brood when `crossover_size` exceeds two.
    pub fn recombine<R: Rng>(
        &self,
        rng: &mut R,
        mother: &Individual,
        father: &Individual,
    ) -> Result<(Tree, Tree)> {
        if self.config.crossover_size > 2 {
            return self.brood(rng, mother, father);
        }
        let mut a = mother.tree().clone();
        let mut b = father.tree().clone();
        individual::crossover(rng, self.config.internals_chance, &mut a, &mut b)?;
        let limit = self.config.depth_limit;
        if a.size().depth > limit {
            a = mother.tree().clone();
        }
        if b.size().depth > limit {
            b = father.tree().clone();
        }
        Ok((a, b))
    }

    /// Brood selection: cross `crossover_size` copies of the pair, score every child within the
    /// depth limit on a reduced budget and keep the best two.
    ///
    /// Missing survivors are made up from the parents.
    pub fn brood<R: Rng>(&self, rng: &mut R, mother: &Individual, father: &Individual) -> Result<(Tree, Tree)> {
        let c = self.config;
        let mut brood = Vec::with_capacity(c.crossover_size * 2);
        for _ in 0..c.crossover_size {
            let mut a = mother.tree().clone();
            let mut b = father.tree().clone();
            individual::crossover(rng, c.internals_chance, &mut a, &mut b)?;
            for child in vec![a, b] {
                if child.size().depth <= c.depth_limit {
                    brood.push(child.evaluate(self.target, c.penalty, Budget::Reduced(c.brood_budget))?);
                }
            }
        }
        brood.sort_by(|a, b| a.rank(b));
        debug!("brood of {} kept {} within the depth limit", c.crossover_size * 2, brood.len());
        if brood.len() < 2 {
            warn!("brood produced {} offspring within depth {}; refilling from parents", brood.len(), c.depth_limit);
        }
        let mut survivors = brood.into_iter().map(Individual::into_tree);
        let a = survivors.next().unwrap_or_else(|| mother.tree().clone());
        let b = survivors.next().unwrap_or_else(|| father.tree().clone());
        Ok((a, b))
    }

    /// Mutate a child according to the configured scheme.
    ///
    /// A mutant that exceeds the depth limit is discarded and the child is returned unchanged.
    pub fn mutate<R: Rng>(&self, rng: &mut R, tree: Tree) -> Result<Tree> {
        let c = self.config;
        let mut mutant = tree.clone();
        match c.mutation {
            Mutation::Point => {
                mutant.mutate(rng, self.set, c.point_mutation, c.mutate_chance);
            }
            Mutation::Operators => {
                if !rng.bernoulli(c.mutate_chance) {
                    return Ok(tree);
                }
                let op = Structural::ALL[rng.uniform_int(0, Structural::ALL.len() - 1)];
                structural(rng, self.set, c, op, &mut mutant)?;
            }
        }
        // A mutant deeper than the limit is discarded in favour of its source.
        if mutant.size().depth > c.depth_limit {
            return Ok(tree);
        }
        Ok(mutant)
    }
}

/// Apply `op` to a uniformly chosen child of a uniformly chosen internal node.
///
/// A tree that is a lone leaf has its root regrown instead.
pub fn structural<R: Rng>(rng: &mut R, set: &FunctionSet, config: &Config, op: Structural, tree: &mut Tree) -> Result<()> {
    let internals = tree.size().internals;
    if internals == 0 {
        let depth = rng.uniform_int(config.min_depth, config.max_depth);
        *tree.root_mut() = expr::gen::grow_tree(rng, set, depth);
        return Ok(());
    }
    let locus = Locus::Internal(rng.uniform_int(0, internals - 1));
    let parent = tree
        .root_mut()
        .visit_mut(locus)
        .ok_or_else(|| Error::Invariant(format!("mutation point {:?} not found", locus)))?;
    let index = rng.uniform_int(0, parent.arity() - 1);
    let child = &mut parent.children_mut()[index];
    match op {
        Structural::Shrink => *child = expr::Node::random_leaf(rng, set),
        Structural::Hoist => {
            let hoisted = child.clone();
            *tree.root_mut() = hoisted;
        }
        Structural::Regrow => {
            let depth = rng.uniform_int(config.min_depth, config.max_depth);
            *child = expr::gen::grow_tree(rng, set, depth);
        }
        Structural::Replace => {
            child.mutate_tree(rng, set, config.point_mutation, 1.0);
            child.mutate_self(rng, set, config.point_mutation);
        }
    }
    Ok(())
}
