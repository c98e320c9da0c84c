//! The closed set of functions an expression node may carry.

use crate::draw::Draw;
use crate::error::{Error, Result};
use fnv::FnvHashMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Every function an expression may be built from.
///
/// A function's arity is a pure function of its tag.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Function {
    // Nullary.
    Constant,
    Input,
    Forward,
    Left,
    Right,
    // Unary.
    Sqrt,
    Sin,
    Cos,
    Log,
    Exp,
    // Binary.
    Add,
    Subtract,
    Multiply,
    Divide,
    Pow,
    IfFoodAhead,
    Prog2,
    // Quaternary.
    Lesser,
    Greater,
}

/// The actuators an agent function performs on a stateful environment.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Forward,
    Left,
    Right,
}

impl Function {
    /// All known functions.
    pub const ALL: [Function; 19] = [
        Function::Constant,
        Function::Input,
        Function::Forward,
        Function::Left,
        Function::Right,
        Function::Sqrt,
        Function::Sin,
        Function::Cos,
        Function::Log,
        Function::Exp,
        Function::Add,
        Function::Subtract,
        Function::Multiply,
        Function::Divide,
        Function::Pow,
        Function::IfFoodAhead,
        Function::Prog2,
        Function::Lesser,
        Function::Greater,
    ];

    /// The number of child expressions the function requires.
    pub fn arity(self) -> usize {
        match self {
            Function::Constant
            | Function::Input
            | Function::Forward
            | Function::Left
            | Function::Right => 0,
            Function::Sqrt | Function::Sin | Function::Cos | Function::Log | Function::Exp => 1,
            Function::Add
            | Function::Subtract
            | Function::Multiply
            | Function::Divide
            | Function::Pow
            | Function::IfFoodAhead
            | Function::Prog2 => 2,
            Function::Lesser | Function::Greater => 4,
        }
    }

    /// Whether this is a nullary (leaf) function.
    pub fn is_leaf(self) -> bool {
        self.arity() == 0
    }

    /// The action performed by an agent leaf, if any.
    pub fn action(self) -> Option<Action> {
        match self {
            Function::Forward => Some(Action::Forward),
            Function::Left => Some(Action::Left),
            Function::Right => Some(Action::Right),
            _ => None,
        }
    }

    /// The symbol used for this function in prefix notation.
    ///
    /// Constants are written as their value instead.
    pub fn symbol(self) -> &'static str {
        match self {
            Function::Constant => "k",
            Function::Input => "x",
            Function::Forward => "forward",
            Function::Left => "left",
            Function::Right => "right",
            Function::Sqrt => "sqrt",
            Function::Sin => "sin",
            Function::Cos => "cos",
            Function::Log => "log",
            Function::Exp => "exp",
            Function::Add => "+",
            Function::Subtract => "-",
            Function::Multiply => "*",
            Function::Divide => "/",
            Function::Pow => "^",
            Function::IfFoodAhead => "if-food",
            Function::Prog2 => "prog2",
            Function::Lesser => "<",
            Function::Greater => ">",
        }
    }

    /// Look a function up by its prefix-notation symbol.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Function::ALL
            .iter()
            .cloned()
            .filter(|f| *f != Function::Constant)
            .find(|f| f.symbol() == symbol)
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// The immutable set of functions, constant range and grow bias used to build and mutate trees.
///
/// Passed explicitly into every construction and mutation instead of living in global tables.
#[derive(Clone, Debug)]
pub struct FunctionSet {
    leaves: Vec<Function>,
    internals: Vec<Function>,
    by_arity: FnvHashMap<usize, Vec<Function>>,
    constants: (f64, f64),
    internal_chance: Option<f64>,
}

impl FunctionSet {
    /// Build a function set.
    ///
    /// `leaves` must all be nullary and `internals` must all have arity above zero. Constants are
    /// drawn from `[constants.0, constants.1)`. When `internal_chance` is `None`, the grow method
    /// picks an internal node with probability `internals / (internals + leaves)`.
    pub fn new(
        leaves: Vec<Function>,
        internals: Vec<Function>,
        constants: (f64, f64),
        internal_chance: Option<f64>,
    ) -> Result<Self> {
        if leaves.is_empty() {
            return Err(Error::Config("at least one leaf function is required".to_string()));
        }
        if let Some(f) = leaves.iter().find(|f| !f.is_leaf()) {
            return Err(Error::Config(format!("`{}` cannot be used as a leaf", f)));
        }
        if let Some(f) = internals.iter().find(|f| f.is_leaf()) {
            return Err(Error::Config(format!("`{}` cannot be used as an internal", f)));
        }
        if !(constants.0 < constants.1) {
            return Err(Error::Config(format!(
                "constant range [{}, {}) is empty",
                constants.0, constants.1
            )));
        }
        if let Some(p) = internal_chance {
            if !(0.0..=1.0).contains(&p) {
                return Err(Error::Config(format!("internal chance {} is not in [0, 1]", p)));
            }
        }
        Ok(FunctionSet::assemble(leaves, internals, constants, internal_chance))
    }

    fn assemble(
        leaves: Vec<Function>,
        internals: Vec<Function>,
        constants: (f64, f64),
        internal_chance: Option<f64>,
    ) -> Self {
        let mut by_arity = FnvHashMap::default();
        for &f in leaves.iter().chain(internals.iter()) {
            let same: &mut Vec<Function> = by_arity.entry(f.arity()).or_insert_with(Vec::new);
            if !same.contains(&f) {
                same.push(f);
            }
        }
        FunctionSet { leaves, internals, by_arity, constants, internal_chance }
    }

    /// `{+, -, *, /}` over `{constant, x}`.
    pub fn arithmetic(constants: (f64, f64)) -> Self {
        FunctionSet::assemble(
            vec![Function::Constant, Function::Input],
            vec![Function::Add, Function::Subtract, Function::Multiply, Function::Divide],
            constants,
            None,
        )
    }

    /// Every numeric function over `{constant, x}`.
    pub fn numeric(constants: (f64, f64)) -> Self {
        let internals = Function::ALL
            .iter()
            .cloned()
            .filter(|f| !f.is_leaf() && *f != Function::IfFoodAhead && *f != Function::Prog2)
            .collect();
        FunctionSet::assemble(vec![Function::Constant, Function::Input], internals, constants, None)
    }

    /// The agent set: actions as leaves, `if-food` and `prog2` as internals.
    pub fn agent() -> Self {
        FunctionSet::assemble(
            vec![Function::Forward, Function::Left, Function::Right],
            vec![Function::IfFoodAhead, Function::Prog2],
            (0.0, 1.0),
            None,
        )
    }

    pub fn leaves(&self) -> &[Function] {
        &self.leaves
    }

    pub fn internals(&self) -> &[Function] {
        &self.internals
    }

    pub fn constants(&self) -> (f64, f64) {
        self.constants
    }

    /// Whether `f` may appear in trees built from this set.
    pub fn contains(&self, f: Function) -> bool {
        self.by_arity.get(&f.arity()).map_or(false, |same| same.contains(&f))
    }

    /// The probability with which the grow method places an internal node above the depth limit.
    pub fn internal_chance(&self) -> f64 {
        match self.internal_chance {
            Some(p) => p,
            None => {
                let internals = self.internals.len() as f64;
                internals / (internals + self.leaves.len() as f64)
            }
        }
    }

    /// A uniformly drawn leaf function.
    pub fn leaf<R: Rng>(&self, rng: &mut R) -> Function {
        self.leaves[rng.uniform_int(0, self.leaves.len() - 1)]
    }

    /// A uniformly drawn internal function, or `None` if the set has no internals.
    pub fn internal<R: Rng>(&self, rng: &mut R) -> Option<Function> {
        if self.internals.is_empty() {
            return None;
        }
        Some(self.internals[rng.uniform_int(0, self.internals.len() - 1)])
    }

    /// A constant drawn uniformly from the constant range.
    pub fn constant<R: Rng>(&self, rng: &mut R) -> f64 {
        rng.uniform_real(self.constants.0, self.constants.1)
    }

    /// A function of the same arity as `prior` but a different tag.
    ///
    /// Constants are excluded as alternatives. Returns `None` when the set holds no alternative,
    /// in which case no redraw can ever succeed.
    pub fn alternative<R: Rng>(&self, prior: Function, rng: &mut R) -> Option<Function> {
        let same = self.by_arity.get(&prior.arity())?;
        let choices = same.iter().filter(|&&f| f != prior && f != Function::Constant).count();
        if choices == 0 {
            return None;
        }
        // Redraw until the function differs.
        loop {
            let f = same[rng.uniform_int(0, same.len() - 1)];
            if f != prior && f != Function::Constant {
                return Some(f);
            }
        }
    }

    /// An internal function different from `prior`, of any arity.
    pub fn any_other_internal<R: Rng>(&self, prior: Function, rng: &mut R) -> Option<Function> {
        if self.internals.iter().all(|&f| f == prior) {
            return None;
        }
        loop {
            let f = self.internals[rng.uniform_int(0, self.internals.len() - 1)];
            if f != prior {
                return Some(f);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw;

    #[test]
    fn arity_classes() {
        assert_eq!(Function::Constant.arity(), 0);
        assert_eq!(Function::Input.arity(), 0);
        assert_eq!(Function::Sqrt.arity(), 1);
        assert_eq!(Function::Pow.arity(), 2);
        assert_eq!(Function::Prog2.arity(), 2);
        assert_eq!(Function::Lesser.arity(), 4);
        assert_eq!(Function::Greater.arity(), 4);
    }

    #[test]
    fn symbols_round_trip() {
        for &f in Function::ALL.iter().filter(|&&f| f != Function::Constant) {
            assert_eq!(Function::from_symbol(f.symbol()), Some(f));
        }
        assert_eq!(Function::from_symbol("k"), None);
    }

    #[test]
    fn rejects_misplaced_functions() {
        let set = FunctionSet::new(vec![Function::Add], vec![], (0.0, 1.0), None);
        assert!(matches!(set, Err(Error::Config(_))));
        let set = FunctionSet::new(vec![Function::Input], vec![Function::Input], (0.0, 1.0), None);
        assert!(matches!(set, Err(Error::Config(_))));
        let set = FunctionSet::new(vec![Function::Input], vec![], (1.0, 1.0), None);
        assert!(matches!(set, Err(Error::Config(_))));
    }

    #[test]
    fn internal_chance_follows_ratio() {
        let set = FunctionSet::arithmetic((0.0, 1.0));
        assert!((set.internal_chance() - 4.0 / 6.0).abs() < 1e-12);
        let fixed = FunctionSet::new(
            vec![Function::Input],
            vec![Function::Add],
            (0.0, 1.0),
            Some(0.25),
        )
        .unwrap();
        assert_eq!(fixed.internal_chance(), 0.25);
    }

    #[test]
    fn alternative_differs_and_keeps_arity() {
        let set = FunctionSet::numeric((0.0, 10.0));
        let mut rng = draw::engine(Some(5));
        for &f in set.internals() {
            for _ in 0..20 {
                let g = set.alternative(f, &mut rng).unwrap();
                assert_ne!(f, g);
                assert_eq!(f.arity(), g.arity());
            }
        }
    }

    #[test]
    fn alternative_absent_when_alone() {
        let set = FunctionSet::arithmetic((0.0, 1.0));
        let mut rng = draw::engine(Some(5));
        assert_eq!(set.alternative(Function::Input, &mut rng), None);
    }
}
