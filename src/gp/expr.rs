//! Items related to expressions.

use crate::draw::Draw;
use crate::error::{Error, Result};
use crate::gp::function::{Function, FunctionSet};
use crate::target::Context;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A node within an expression tree.
///
/// Each node carries a `Function` and exactly `function.arity()` children. Nodes with arity `0`
/// are leaves (terminals); all others are internal nodes. Only `Constant` leaves carry a value.
///
/// Cloning a node deep-copies the whole subtree, so two trees never share structure.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    function: Function,
    constant: Option<f64>,
    children: Vec<Node>,
}

/// The shape of a tree, derived by traversal.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub internals: usize,
    pub leaves: usize,
    /// Edges on the longest root-to-leaf path. A lone leaf has depth `0`.
    pub depth: usize,
}

/// The two tree construction methods.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    /// Internal nodes may be placed anywhere above the depth limit.
    Grow,
    /// Internal nodes everywhere above the depth limit, leaves at it.
    Full,
}

/// The address of a node: the n-th internal node or the n-th leaf in pre-order.
///
/// Indices start at zero and count the root.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Locus {
    Internal(usize),
    Leaf(usize),
}

/// How a point mutation treats an internal node.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointMutation {
    /// Redraw a function of the same arity.
    SameArity,
    /// Redraw any other internal function, then truncate or grow children to fit its arity.
    AnyArity,
}

/// The depth of subtrees grown to repair a node whose arity grew during mutation.
pub const REPAIR_DEPTH: usize = 2;

impl Size {
    pub fn total(&self) -> usize {
        self.internals + self.leaves
    }
}

impl Locus {
    fn index(self) -> usize {
        match self {
            Locus::Internal(i) | Locus::Leaf(i) => i,
        }
    }

    fn addresses(self, node: &Node) -> bool {
        match self {
            Locus::Internal(_) => !node.is_leaf(),
            Locus::Leaf(_) => node.is_leaf(),
        }
    }
}

/// Generate a random expression using "ramped half-and-half".
///
/// The grow method is chosen with probability `grow_chance`, the full method otherwise.
pub fn gen<R>(rng: &mut R, set: &FunctionSet, max_depth: usize, grow_chance: f64) -> Node
where
    R: Rng,
{
    if rng.bernoulli(grow_chance) {
        gen::grow_tree(rng, set, max_depth)
    } else {
        gen::full_tree(rng, set, max_depth)
    }
}

/// Functions for generating expression trees.
pub mod gen {
    use super::{Method, Node};
    use crate::draw::Draw;
    use crate::gp::function::FunctionSet;
    use rand::Rng;

    /// Generate an expression tree using the "full" approach.
    ///
    /// Every node above `depth` is internal and every leaf lies at exactly `depth`.
    pub fn full_tree<R: Rng>(rng: &mut R, set: &FunctionSet, depth: usize) -> Node {
        build(rng, set, Method::Full, 0, depth)
    }

    /// Generate an expression tree using the "grow" approach.
    ///
    /// Above `depth`, each node is internal with probability `set.internal_chance()`; the root is
    /// always internal when `depth > 0`. No node lies deeper than `depth`.
    pub fn grow_tree<R: Rng>(rng: &mut R, set: &FunctionSet, depth: usize) -> Node {
        build(rng, set, Method::Grow, 0, depth)
    }

    /// Generate a tree with the given method.
    pub fn tree<R: Rng>(rng: &mut R, set: &FunctionSet, method: Method, depth: usize) -> Node {
        build(rng, set, method, 0, depth)
    }

    fn build<R: Rng>(
        rng: &mut R,
        set: &FunctionSet,
        method: Method,
        depth: usize,
        max_depth: usize,
    ) -> Node {
        let internal = depth < max_depth
            && match method {
                Method::Full => true,
                Method::Grow => depth == 0 || rng.bernoulli(set.internal_chance()),
            };
        let function = if internal { set.internal(rng) } else { None };
        match function {
            Some(function) => {
                let children = (0..function.arity())
                    .map(|_| build(rng, set, method, depth + 1, max_depth))
                    .collect();
                Node { function, constant: None, children }
            }
            None => Node::random_leaf(rng, set),
        }
    }
}

/// Yield `1` in place of any result that overflowed to a non-finite value.
fn protect(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        1.0
    }
}

impl Node {
    /// A node with the given function and children.
    ///
    /// Returns `Error::Invariant` if the number of children does not match the arity, or if the
    /// function is `Constant` (use `Node::constant`).
    pub fn new(function: Function, children: Vec<Node>) -> Result<Self> {
        if function == Function::Constant {
            return Err(Error::Invariant("constants must be built with a value".to_string()));
        }
        if children.len() != function.arity() {
            return Err(Error::Invariant(format!(
                "`{}` takes {} children, {} given",
                function,
                function.arity(),
                children.len()
            )));
        }
        Ok(Node { function, constant: None, children })
    }

    /// A constant leaf.
    pub fn constant(value: f64) -> Self {
        Node { function: Function::Constant, constant: Some(value), children: Vec::new() }
    }

    /// A uniformly drawn leaf from the set, with a fresh constant if it is one.
    pub fn random_leaf<R: Rng>(rng: &mut R, set: &FunctionSet) -> Self {
        let function = set.leaf(rng);
        let constant = match function {
            Function::Constant => Some(set.constant(rng)),
            _ => None,
        };
        Node { function, constant, children: Vec::new() }
    }

    pub fn function(&self) -> Function {
        self.function
    }

    pub fn arity(&self) -> usize {
        self.function.arity()
    }

    pub fn value(&self) -> Option<f64> {
        self.constant
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut [Node] {
        &mut self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Evaluate the expression within the given context.
    ///
    /// Evaluation is depth-first and post-order, except that a conditional evaluates only the
    /// branch its predicate selects. Protected operators keep every intermediate value finite. A
    /// non-finite input is rejected as `Error::NonFinite` at the leaf that reads it, and a constant
    /// leaf without a value is an `Error::Invariant`.
    pub fn evaluate<C: Context>(&self, ctx: &mut C) -> Result<f64> {
        let value = self.compute(ctx)?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(Error::NonFinite { value, expr: self.to_string() })
        }
    }

    fn compute<C: Context>(&self, ctx: &mut C) -> Result<f64> {
        let c = &self.children;
        let value = match self.function {
            Function::Constant => self.constant.ok_or_else(|| {
                Error::Invariant("constant leaf without a value".to_string())
            })?,
            Function::Input => {
                let x = ctx.input();
                if !x.is_finite() {
                    return Err(Error::NonFinite { value: x, expr: self.to_string() });
                }
                x
            }
            Function::Forward | Function::Left | Function::Right => {
                if let Some(action) = self.function.action() {
                    ctx.act(action);
                }
                0.0
            }
            Function::Sqrt => c[0].compute(ctx)?.abs().sqrt(),
            Function::Sin => c[0].compute(ctx)?.sin(),
            Function::Cos => c[0].compute(ctx)?.cos(),
            Function::Log => {
                let a = c[0].compute(ctx)?;
                if a == 0.0 {
                    0.0
                } else {
                    a.abs().ln()
                }
            }
            Function::Exp => protect(c[0].compute(ctx)?.exp()),
            Function::Add => {
                let (a, b) = (c[0].compute(ctx)?, c[1].compute(ctx)?);
                protect(a + b)
            }
            Function::Subtract => {
                let (a, b) = (c[0].compute(ctx)?, c[1].compute(ctx)?);
                protect(a - b)
            }
            Function::Multiply => {
                let (a, b) = (c[0].compute(ctx)?, c[1].compute(ctx)?);
                protect(a * b)
            }
            Function::Divide => {
                let (a, b) = (c[0].compute(ctx)?, c[1].compute(ctx)?);
                if b == 0.0 {
                    1.0
                } else {
                    protect(a / b)
                }
            }
            Function::Pow => {
                let (a, b) = (c[0].compute(ctx)?, c[1].compute(ctx)?);
                protect(a.abs().powf(b.abs()))
            }
            Function::IfFoodAhead => {
                if ctx.sense() {
                    c[0].compute(ctx)?
                } else {
                    c[1].compute(ctx)?
                }
            }
            Function::Prog2 => {
                c[0].compute(ctx)?;
                c[1].compute(ctx)?
            }
            Function::Lesser => {
                let (a, b) = (c[0].compute(ctx)?, c[1].compute(ctx)?);
                if a < b {
                    c[2].compute(ctx)?
                } else {
                    c[3].compute(ctx)?
                }
            }
            Function::Greater => {
                let (a, b) = (c[0].compute(ctx)?, c[1].compute(ctx)?);
                if a > b {
                    c[2].compute(ctx)?
                } else {
                    c[3].compute(ctx)?
                }
            }
        };
        Ok(value)
    }

    /// Count internal nodes, leaves and depth via post-order traversal.
    pub fn size(&self) -> Size {
        let mut size = Size::default();
        for child in &self.children {
            let s = child.size();
            size.internals += s.internals;
            size.leaves += s.leaves;
            size.depth = size.depth.max(s.depth + 1);
        }
        if self.is_leaf() {
            size.leaves += 1;
        } else {
            size.internals += 1;
        }
        size
    }

    /// Find the node at `locus`, or `None` if the index is out of range.
    pub fn visit(&self, locus: Locus) -> Option<&Node> {
        let mut seen = 0;
        self.find(locus, &mut seen)
    }

    /// Mutable counterpart of `visit`.
    pub fn visit_mut(&mut self, locus: Locus) -> Option<&mut Node> {
        let mut seen = 0;
        self.find_mut(locus, &mut seen)
    }

    fn find(&self, locus: Locus, seen: &mut usize) -> Option<&Node> {
        if locus.addresses(self) {
            if *seen == locus.index() {
                return Some(self);
            }
            *seen += 1;
        }
        self.children.iter().filter_map(|child| child.find(locus, seen)).next()
    }

    fn find_mut(&mut self, locus: Locus, seen: &mut usize) -> Option<&mut Node> {
        if locus.addresses(self) {
            if *seen == locus.index() {
                return Some(self);
            }
            *seen += 1;
        }
        for child in &mut self.children {
            if let Some(found) = child.find_mut(locus, seen) {
                return Some(found);
            }
        }
        None
    }

    /// Point-mutate this node alone.
    ///
    /// A constant is scaled by `1 + N(0, 1)`. Any other leaf is swapped for a different leaf of
    /// the set, if there is one. An internal node is given a different function: of the same
    /// arity, or of any arity with its children repaired, depending on `mode`. If the set holds
    /// no alternative the node is left as is.
    pub fn mutate_self<R: Rng>(&mut self, rng: &mut R, set: &FunctionSet, mode: PointMutation) {
        if self.is_leaf() {
            match self.constant.as_mut() {
                Some(k) => *k *= 1.0 + rng.normal(0.0, 1.0),
                None => {
                    if let Some(f) = set.alternative(self.function, rng) {
                        self.function = f;
                    }
                }
            }
            return;
        }
        match mode {
            PointMutation::SameArity => {
                if let Some(f) = set.alternative(self.function, rng) {
                    self.function = f;
                }
            }
            PointMutation::AnyArity => {
                if let Some(f) = set.any_other_internal(self.function, rng) {
                    self.function = f;
                    self.children.truncate(f.arity());
                    while self.children.len() < f.arity() {
                        self.children.push(gen::grow_tree(rng, set, REPAIR_DEPTH));
                    }
                }
            }
        }
    }

    /// Point-mutate each node below this one independently with probability `chance`.
    ///
    /// The node this is called on is never mutated itself, so calling it on a tree's root leaves
    /// the root function intact.
    pub fn mutate_tree<R: Rng>(
        &mut self,
        rng: &mut R,
        set: &FunctionSet,
        mode: PointMutation,
        chance: f64,
    ) {
        for child in &mut self.children {
            // Post-order: subtrees grown to repair an arity change are not mutated again.
            child.mutate_tree(rng, set, mode, chance);
            if rng.bernoulli(chance) {
                child.mutate_self(rng, set, mode);
            }
        }
    }
}

/// Prefix (Polish) notation: `(+ x (* 2.5 x))`.
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (self.function, self.constant) {
            (Function::Constant, Some(k)) => write!(f, "{}", k),
            (function, _) if self.is_leaf() => write!(f, "{}", function),
            (function, _) => {
                write!(f, "({}", function)?;
                for child in &self.children {
                    write!(f, " {}", child)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl FromStr for Node {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let spaced = s.replace('(', " ( ").replace(')', " ) ");
        let mut tokens = spaced.split_whitespace().peekable();
        let node = parse(&mut tokens)?;
        match tokens.next() {
            None => Ok(node),
            Some(extra) => Err(Error::Parse(format!("unexpected `{}` after expression", extra))),
        }
    }
}

fn parse<'a, I>(tokens: &mut std::iter::Peekable<I>) -> Result<Node>
where
    I: Iterator<Item = &'a str>,
{
    let token = tokens
        .next()
        .ok_or_else(|| Error::Parse("unexpected end of expression".to_string()))?;
    if token == "(" {
        let symbol = tokens
            .next()
            .ok_or_else(|| Error::Parse("expected a function after `(`".to_string()))?;
        let function = Function::from_symbol(symbol)
            .ok_or_else(|| Error::Parse(format!("unknown function `{}`", symbol)))?;
        let mut children = Vec::with_capacity(function.arity());
        while tokens.peek().map_or(false, |&t| t != ")") {
            children.push(parse(tokens)?);
        }
        if tokens.next() != Some(")") {
            return Err(Error::Parse(format!("unclosed `({}`", symbol)));
        }
        return Node::new(function, children).map_err(|e| Error::Parse(e.to_string()));
    }
    if token == ")" {
        return Err(Error::Parse("unexpected `)`".to_string()));
    }
    match Function::from_symbol(token) {
        Some(function) if function.is_leaf() => Ok(Node::new(function, Vec::new())?),
        Some(function) => Err(Error::Parse(format!("`{}` needs {} arguments", function, function.arity()))),
        None => match token.parse::<f64>() {
            Ok(k) if k.is_finite() => Ok(Node::constant(k)),
            _ => Err(Error::Parse(format!("unknown token `{}`", token))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw;

    fn eval(expr: &str, x: f64) -> f64 {
        let node: Node = expr.parse().unwrap();
        node.evaluate(&mut { x }).unwrap()
    }

    fn well_formed(node: &Node) -> bool {
        node.children().len() == node.arity() && node.children().iter().all(well_formed)
    }

    #[test]
    fn protected_operators() {
        assert_eq!(eval("(/ x 0)", 3.0), 1.0);
        assert_eq!(eval("(/ x 0)", -7.25), 1.0);
        assert_eq!(eval("(sqrt x)", -4.0), 2.0);
        assert_eq!(eval("(log x)", 0.0), 0.0);
        assert!((eval("(log x)", -1.0)).abs() < 1e-12);
        assert_eq!(eval("(^ x 2)", -3.0), 9.0);
        assert_eq!(eval("(^ 2 x)", -3.0), 8.0);
    }

    #[test]
    fn overflow_is_protected() {
        assert_eq!(eval("(exp x)", 1000.0), 1.0);
        assert_eq!(eval("(* x x)", 1e200), 1.0);
        assert_eq!(eval("(/ x 0.0000001)", 1e308), 1.0);
    }

    #[test]
    fn non_finite_input_is_reported() {
        let node: Node = "(+ x 1)".parse().unwrap();
        assert!(matches!(
            node.evaluate(&mut f64::INFINITY),
            Err(Error::NonFinite { ref expr, .. }) if expr == "x"
        ));
        let node: Node = "x".parse().unwrap();
        assert!(matches!(node.evaluate(&mut f64::NAN), Err(Error::NonFinite { .. })));
        let node: Node = "(/ 1 x)".parse().unwrap();
        assert!(matches!(node.evaluate(&mut f64::NEG_INFINITY), Err(Error::NonFinite { .. })));
    }

    #[test]
    fn constant_without_value_is_an_invariant_error() {
        let node = Node { function: Function::Constant, constant: None, children: Vec::new() };
        assert!(matches!(node.evaluate(&mut 1.0), Err(Error::Invariant(_))));
        let children = vec![node, Node::constant(1.0)];
        let sum = Node { function: Function::Add, constant: None, children };
        assert!(matches!(sum.evaluate(&mut 1.0), Err(Error::Invariant(_))));
    }

    #[test]
    fn conditionals_select_one_arm() {
        assert_eq!(eval("(< x 1 10 20)", 0.0), 10.0);
        assert_eq!(eval("(< x 1 10 20)", 2.0), 20.0);
        assert_eq!(eval("(> x 1 10 20)", 2.0), 10.0);
    }

    #[test]
    fn conditional_branches_are_lazy() {
        use crate::gp::function::Action;

        #[derive(Default)]
        struct Count {
            acts: Vec<Action>,
        }
        impl Context for Count {
            fn input(&self) -> f64 {
                0.0
            }
            fn act(&mut self, action: Action) {
                self.acts.push(action);
            }
        }

        let node: Node = "(< 0 1 left right)".parse().unwrap();
        let mut ctx = Count::default();
        node.evaluate(&mut ctx).unwrap();
        assert_eq!(ctx.acts, vec![Action::Left]);
    }

    #[test]
    fn size_counts_nodes() {
        let node: Node = "(+ x (* 2 (sin x)))".parse().unwrap();
        let size = node.size();
        assert_eq!(size.internals, 3);
        assert_eq!(size.leaves, 3);
        assert_eq!(size.depth, 3);
        assert_eq!(size.total(), 6);
        assert_eq!(Node::constant(1.0).size(), Size { internals: 0, leaves: 1, depth: 0 });
    }

    #[test]
    fn visit_is_pre_order() {
        let node: Node = "(+ (- x 1) (* 2 3))".parse().unwrap();
        assert_eq!(node.visit(Locus::Internal(0)).unwrap().function(), Function::Add);
        assert_eq!(node.visit(Locus::Internal(1)).unwrap().function(), Function::Subtract);
        assert_eq!(node.visit(Locus::Internal(2)).unwrap().function(), Function::Multiply);
        assert_eq!(node.visit(Locus::Leaf(0)).unwrap().function(), Function::Input);
        assert_eq!(node.visit(Locus::Leaf(1)).unwrap().value(), Some(1.0));
        assert_eq!(node.visit(Locus::Leaf(3)).unwrap().value(), Some(3.0));
        assert!(node.visit(Locus::Internal(3)).is_none());
        assert!(node.visit(Locus::Leaf(4)).is_none());
    }

    #[test]
    fn visit_mut_reaches_the_same_node() {
        let mut node: Node = "(+ (- x 1) (* 2 3))".parse().unwrap();
        *node.visit_mut(Locus::Leaf(2)).unwrap() = "x".parse().unwrap();
        assert_eq!(node.to_string(), "(+ (- x 1) (* x 3))");
    }

    #[test]
    fn display_round_trips() {
        for s in &["x", "2.5", "-0.75", "(+ x (* 2.5 x))", "(< x 1 (sqrt x) (log x))"] {
            let node: Node = s.parse().unwrap();
            assert_eq!(node.to_string(), *s);
        }
    }

    #[test]
    fn parse_rejects_malformed() {
        for s in &["", "(", "(+ x)", "(+ x 1 2)", "(foo x)", "+", "(+ x 1))", "nan", "k"] {
            assert!(s.parse::<Node>().is_err(), "{:?} should not parse", s);
        }
    }

    #[test]
    fn full_tree_leaves_at_depth() {
        let set = FunctionSet::numeric((0.0, 10.0));
        let mut rng = draw::engine(Some(9));
        for depth in 0..5 {
            let tree = gen::full_tree(&mut rng, &set, depth);
            let size = tree.size();
            assert_eq!(size.depth, depth);
            fn leaf_depths(node: &Node, d: usize, out: &mut Vec<usize>) {
                if node.is_leaf() {
                    out.push(d);
                }
                for c in node.children() {
                    leaf_depths(c, d + 1, out);
                }
            }
            let mut depths = Vec::new();
            leaf_depths(&tree, 0, &mut depths);
            assert!(depths.iter().all(|&d| d == depth));
            assert_eq!(depths.len(), size.leaves);
        }
    }

    #[test]
    fn grow_root_is_internal() {
        let set = FunctionSet::arithmetic((0.0, 10.0));
        let mut rng = draw::engine(Some(2));
        for _ in 0..50 {
            assert!(!gen::grow_tree(&mut rng, &set, 3).is_leaf());
        }
        assert!(gen::grow_tree(&mut rng, &set, 0).is_leaf());
    }

    #[test]
    fn mutate_self_changes_internal_function() {
        let set = FunctionSet::numeric((0.0, 10.0));
        let mut rng = draw::engine(Some(4));
        for _ in 0..200 {
            let mut node = gen::full_tree(&mut rng, &set, 2);
            let before = node.function();
            node.mutate_self(&mut rng, &set, PointMutation::SameArity);
            assert_ne!(node.function(), before);
            assert_eq!(node.arity(), before.arity());
            assert_eq!(node.children().len(), node.arity());
        }
    }

    #[test]
    fn any_arity_mutation_repairs_children() {
        let set = FunctionSet::numeric((0.0, 10.0));
        let mut rng = draw::engine(Some(8));
        for _ in 0..200 {
            let mut node = gen::full_tree(&mut rng, &set, 2);
            let before = node.function();
            node.mutate_self(&mut rng, &set, PointMutation::AnyArity);
            assert_ne!(node.function(), before);
            assert!(well_formed(&node));
        }
    }

    #[test]
    fn any_arity_mutate_tree_terminates_at_full_chance() {
        let set = FunctionSet::new(
            vec![Function::Constant, Function::Input],
            vec![Function::Sqrt, Function::Add, Function::Lesser],
            (0.0, 10.0),
            None,
        )
        .unwrap();
        let mut rng = draw::engine(Some(12));
        for _ in 0..100 {
            let mut node = gen::full_tree(&mut rng, &set, 3);
            let root = node.function();
            node.mutate_tree(&mut rng, &set, PointMutation::AnyArity, 1.0);
            assert_eq!(node.function(), root);
            assert!(well_formed(&node));
            assert!(node.size().depth <= 3 + REPAIR_DEPTH);
        }
    }

    #[test]
    fn constant_mutation_keeps_tag() {
        let set = FunctionSet::arithmetic((0.0, 10.0));
        let mut rng = draw::engine(Some(6));
        let mut node = Node::constant(2.0);
        node.mutate_self(&mut rng, &set, PointMutation::SameArity);
        assert_eq!(node.function(), Function::Constant);
        assert!(node.value().is_some());
    }

    #[test]
    fn mutate_tree_spares_the_root() {
        let set = FunctionSet::arithmetic((0.0, 10.0));
        let mut rng = draw::engine(Some(10));
        for _ in 0..50 {
            let mut node = gen::full_tree(&mut rng, &set, 3);
            let root = node.function();
            let before = node.clone();
            node.mutate_tree(&mut rng, &set, PointMutation::SameArity, 1.0);
            assert_eq!(node.function(), root);
            assert_ne!(node, before);
        }
    }
}
