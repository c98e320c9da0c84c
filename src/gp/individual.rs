//! Candidate solutions: bare trees and evaluated individuals.
//!
//! A `Tree` is an expression whose size and fitness are unknown. Evaluating it against a target
//! consumes it and yields an `Individual`, the only type that carries a size and fitness and the
//! only type that can be compared. Crossover and mutation operate on `Tree`s, so an individual
//! must be turned back into a tree (discarding its cached values) before it can be changed. A
//! stale fitness can therefore never take part in selection.

use crate::draw::Draw;
use crate::error::{Error, Result};
use crate::gp::expr::{self, Locus, Method, Node, PointMutation, Size};
use crate::gp::function::FunctionSet;
use crate::target::{Budget, Objective, Target};
use rand::Rng;
use std::cmp::Ordering;
use std::fmt;
use std::mem;

/// An expression tree that has not been evaluated since it was built or last changed.
#[derive(Clone, Debug, PartialEq)]
pub struct Tree {
    root: Node,
}

/// An evaluated expression tree along with its cached size and fitness.
#[derive(Clone, Debug)]
pub struct Individual {
    tree: Tree,
    size: Size,
    score: f64,
    fitness: f64,
    adjusted: f64,
    objective: Objective,
}

impl Tree {
    pub fn new(root: Node) -> Self {
        Tree { root }
    }

    /// Build a random tree with the given method and depth.
    pub fn generate<R: Rng>(rng: &mut R, set: &FunctionSet, method: Method, depth: usize) -> Self {
        Tree { root: expr::gen::tree(rng, set, method, depth) }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Node {
        &mut self.root
    }

    pub fn into_root(self) -> Node {
        self.root
    }

    pub fn size(&self) -> Size {
        self.root.size()
    }

    /// Point-mutate every non-root node independently with probability `chance`.
    pub fn mutate<R: Rng>(&mut self, rng: &mut R, set: &FunctionSet, mode: PointMutation, chance: f64) {
        self.root.mutate_tree(rng, set, mode, chance);
    }

    /// Score the tree against `target`, producing an individual.
    ///
    /// `penalty` is charged per node of the tree, in whichever direction makes larger trees worse.
    pub fn evaluate<T>(self, target: &T, penalty: f64, budget: Budget) -> Result<Individual>
    where
        T: Target + ?Sized,
    {
        let scored = target.score(&self.root, budget)?;
        let size = self.root.size();
        let objective = target.objective();
        Ok(Individual {
            tree: self,
            size,
            score: scored.score,
            fitness: objective.penalize(scored.score, penalty, size.total()),
            adjusted: scored.adjusted,
            objective,
        })
    }
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.root)
    }
}

impl std::str::FromStr for Tree {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        s.parse().map(Tree::new)
    }
}

impl Individual {
    /// Build a random tree and evaluate it straight away.
    pub fn generate<R, T>(
        rng: &mut R,
        set: &FunctionSet,
        method: Method,
        depth: usize,
        target: &T,
        penalty: f64,
    ) -> Result<Self>
    where
        R: Rng,
        T: Target + ?Sized,
    {
        Tree::generate(rng, set, method, depth).evaluate(target, penalty, Budget::Full)
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Give up the cached values in exchange for a tree that may be changed.
    pub fn into_tree(self) -> Tree {
        self.tree
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn internals(&self) -> usize {
        self.size.internals
    }

    pub fn leaves(&self) -> usize {
        self.size.leaves
    }

    pub fn total(&self) -> usize {
        self.size.total()
    }

    pub fn depth(&self) -> usize {
        self.size.depth
    }

    /// The raw score: residual sum of squares, or food eaten.
    pub fn score(&self) -> f64 {
        self.score
    }

    /// The score after the size penalty.
    pub fn fitness(&self) -> f64 {
        self.fitness
    }

    pub fn adjusted(&self) -> f64 {
        self.adjusted
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    /// `Less` if `self` is fitter than `other`.
    pub fn rank(&self, other: &Individual) -> Ordering {
        self.objective.rank(self.fitness, other.fitness)
    }

    /// The best of the given individuals, if any.
    pub fn best<'a, I>(individuals: I) -> Option<&'a Individual>
    where
        I: IntoIterator<Item = &'a Individual>,
    {
        individuals.into_iter().min_by(|a, b| a.rank(b))
    }

    /// A per-sample account of how this individual scores against `target`.
    pub fn trace<T: Target + ?Sized>(&self, target: &T) -> Result<String> {
        target.trace(self.tree.root())
    }
}

impl fmt::Display for Individual {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "Size {}, with {} internals, and {} leaves, depth {}.",
            self.total(),
            self.internals(),
            self.leaves(),
            self.depth()
        )?;
        writeln!(
            f,
            "Raw score: {}, fitness: {}, and adjusted: {}.",
            self.score, self.fitness, self.adjusted
        )?;
        write!(f, "Formula: {}", self.tree)
    }
}

/// Pick a crossover point: internal with probability `internal_chance` when the tree has any
/// internal node, a leaf otherwise.
fn crossover_point<R: Rng>(rng: &mut R, internal_chance: f64, size: Size) -> Locus {
    if rng.bernoulli(internal_chance) && size.internals > 0 {
        Locus::Internal(rng.uniform_int(0, size.internals - 1))
    } else {
        Locus::Leaf(rng.uniform_int(0, size.leaves - 1))
    }
}

/// Exchange a random subtree of `a` with a random subtree of `b`.
///
/// Each tree's crossover point is drawn independently. Both trees remain well formed.
pub fn crossover<R: Rng>(rng: &mut R, internal_chance: f64, a: &mut Tree, b: &mut Tree) -> Result<()> {
    let locus_a = crossover_point(rng, internal_chance, a.size());
    let locus_b = crossover_point(rng, internal_chance, b.size());
    let node_a = a.root.visit_mut(locus_a).ok_or_else(|| {
        Error::Invariant(format!("crossover point {:?} missing from first parent", locus_a))
    })?;
    let node_b = b.root.visit_mut(locus_b).ok_or_else(|| {
        Error::Invariant(format!("crossover point {:?} missing from second parent", locus_b))
    })?;
    mem::swap(node_a, node_b);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw;
    use crate::target::Pairs;

    fn squares() -> Pairs {
        Pairs::new(vec![(0.0, 0.0), (1.0, 1.0), (2.0, 4.0), (3.0, 9.0)]).unwrap()
    }

    fn well_formed(node: &Node) -> bool {
        node.children().len() == node.arity() && node.children().iter().all(well_formed)
    }

    #[test]
    fn evaluation_caches_size_and_fitness() {
        let tree: Tree = "(* x x)".parse().unwrap();
        let ind = tree.evaluate(&squares(), 0.5, Budget::Full).unwrap();
        assert_eq!(ind.score(), 0.0);
        assert_eq!(ind.fitness(), 1.5);
        assert_eq!(ind.adjusted(), 1.0);
        assert_eq!(ind.total(), 3);
        assert_eq!(ind.depth(), 1);
    }

    #[test]
    fn best_prefers_valid_fitness() {
        let target = squares();
        let good = "(* x x)".parse::<Tree>().unwrap().evaluate(&target, 0.0, Budget::Full).unwrap();
        let poor = "x".parse::<Tree>().unwrap().evaluate(&target, 0.0, Budget::Full).unwrap();
        let population = vec![poor.clone(), good.clone(), poor];
        let best = Individual::best(&population).unwrap();
        assert_eq!(best.tree(), good.tree());
    }

    #[test]
    fn crossover_keeps_trees_well_formed() {
        let set = FunctionSet::numeric((0.0, 10.0));
        let mut rng = draw::engine(Some(21));
        for _ in 0..500 {
            let mut a = Tree::generate(&mut rng, &set, Method::Grow, 4);
            let mut b = Tree::generate(&mut rng, &set, Method::Full, 3);
            let total = a.size().total() + b.size().total();
            crossover(&mut rng, 0.9, &mut a, &mut b).unwrap();
            assert!(well_formed(a.root()));
            assert!(well_formed(b.root()));
            assert_eq!(a.size().total() + b.size().total(), total);
        }
    }

    #[test]
    fn crossover_of_leaves_swaps_them() {
        let mut rng = draw::engine(Some(1));
        let mut a: Tree = "x".parse().unwrap();
        let mut b: Tree = "3".parse().unwrap();
        crossover(&mut rng, 0.9, &mut a, &mut b).unwrap();
        assert_eq!(a.to_string(), "3");
        assert_eq!(b.to_string(), "x");
    }

    #[test]
    fn display_summarises() {
        let ind = "(+ x 1)".parse::<Tree>().unwrap().evaluate(&squares(), 0.0, Budget::Full).unwrap();
        let text = ind.to_string();
        assert!(text.contains("Size 3, with 1 internals, and 2 leaves"));
        assert!(text.ends_with("Formula: (+ x 1)"));
    }
}
