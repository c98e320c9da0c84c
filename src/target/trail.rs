//! Behaviour evolution in a stateful environment.
//!
//! An agent's expression is evaluated over and over against the environment until the
//! environment reports that it is no longer active, after which the environment's score is read
//! back.

use super::{Budget, Context, Objective, Scored, Target};
use crate::error::{Error, Result};
use crate::gp::expr::Node;
use crate::gp::function::{Action, FunctionSet};
use std::path::Path;

/// A stateful world that an agent program senses and acts upon.
pub trait Environment: Clone + Send + Sync {
    /// Whether the agent may still act.
    fn active(&self) -> bool;
    /// Whether there is food directly ahead of the agent.
    fn look(&self) -> bool;
    fn forward(&mut self);
    fn left(&mut self);
    fn right(&mut self);
    /// The score accumulated so far.
    fn fitness(&self) -> f64;
    /// The best achievable score.
    fn max(&self) -> f64;
    /// A human-readable picture of the current state.
    fn print(&self) -> String;
    /// The number of actions the agent may take in total.
    fn ticks(&self) -> usize;
    fn set_ticks(&mut self, ticks: usize);
}

/// The evaluation context handed to an expression run against an environment.
///
/// The `x` terminal reads `1` when food is ahead and `0` otherwise.
#[derive(Debug)]
pub struct Agent<'a, E> {
    env: &'a mut E,
    acted: bool,
}

impl<'a, E: Environment> Agent<'a, E> {
    pub fn new(env: &'a mut E) -> Self {
        Agent { env, acted: false }
    }

    /// Whether any action reached the environment.
    pub fn acted(&self) -> bool {
        self.acted
    }
}

impl<'a, E: Environment> Context for Agent<'a, E> {
    fn input(&self) -> f64 {
        if self.env.look() {
            1.0
        } else {
            0.0
        }
    }

    fn sense(&mut self) -> bool {
        self.env.look()
    }

    fn act(&mut self, action: Action) {
        if !self.env.active() {
            return;
        }
        match action {
            Action::Forward => self.env.forward(),
            Action::Left => self.env.left(),
            Action::Right => self.env.right(),
        }
        self.acted = true;
    }
}

/// Run `root` against `env` until the environment is exhausted.
///
/// A program that performs no action during a whole pass can never exhaust the environment, so
/// the run stops there.
pub fn run<E: Environment>(root: &Node, env: &mut E) -> Result<()> {
    while env.active() {
        let mut agent = Agent::new(env);
        root.evaluate(&mut agent)?;
        if !agent.acted() {
            break;
        }
    }
    Ok(())
}

/// A target that scores expressions by running them in a fresh copy of an environment.
#[derive(Clone, Debug)]
pub struct Stateful<E> {
    prototype: E,
}

impl<E: Environment> Stateful<E> {
    pub fn new(prototype: E) -> Self {
        Stateful { prototype }
    }

    pub fn prototype(&self) -> &E {
        &self.prototype
    }

    fn fresh(&self, budget: Budget) -> E {
        let mut env = self.prototype.clone();
        if let Budget::Reduced(fraction) = budget {
            let ticks = (env.ticks() as f64 * fraction).round().max(1.0) as usize;
            env.set_ticks(ticks);
        }
        env
    }
}

impl<E: Environment> Target for Stateful<E> {
    fn objective(&self) -> Objective {
        Objective::Maximize
    }

    fn score(&self, root: &Node, budget: Budget) -> Result<Scored> {
        let mut env = self.fresh(budget);
        run(root, &mut env)?;
        let score = env.fitness();
        let adjusted = if env.max() > 0.0 { score / env.max() } else { 0.0 };
        Ok(Scored { score, adjusted })
    }

    fn trace(&self, root: &Node) -> Result<String> {
        let mut env = self.fresh(Budget::Full);
        run(root, &mut env)?;
        let mut out = env.print();
        out.push_str(&format!("Score: {} of {}\n", env.fitness(), env.max()));
        Ok(out)
    }

    /// An agent can only change its environment through action leaves.
    fn accepts(&self, set: &FunctionSet) -> Result<()> {
        if set.leaves().iter().any(|f| f.action().is_some()) {
            Ok(())
        } else {
            Err(Error::Config(
                "an environment target needs at least one action leaf (forward, left or right)".to_string(),
            ))
        }
    }
}

/// The direction the agent faces.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Heading {
    North,
    East,
    South,
    West,
}

impl Heading {
    fn left(self) -> Self {
        match self {
            Heading::North => Heading::West,
            Heading::West => Heading::South,
            Heading::South => Heading::East,
            Heading::East => Heading::North,
        }
    }

    fn right(self) -> Self {
        match self {
            Heading::North => Heading::East,
            Heading::East => Heading::South,
            Heading::South => Heading::West,
            Heading::West => Heading::North,
        }
    }

    fn glyph(self) -> char {
        match self {
            Heading::North => '^',
            Heading::East => '>',
            Heading::South => 'v',
            Heading::West => '<',
        }
    }
}

/// A toroidal grid of food cells walked by an ant.
///
/// The ant starts in the top-left corner facing east and eats any food on the cells it enters.
/// Every action costs one tick. The environment is active until the ticks run out or all the food
/// has been eaten.
#[derive(Clone, Debug, PartialEq)]
pub struct Trail {
    width: usize,
    height: usize,
    food: Vec<bool>,
    visited: Vec<bool>,
    position: (usize, usize),
    heading: Heading,
    eaten: usize,
    total: usize,
    ticks: usize,
    used: usize,
}

impl Trail {
    /// Parse a map: `#` marks food, `.` an empty cell. All rows must be the same width.
    pub fn parse(map: &str, ticks: usize) -> Result<Self> {
        let rows: Vec<&str> = map.lines().map(str::trim_end).filter(|l| !l.is_empty()).collect();
        let width = rows.first().map_or(0, |r| r.chars().count());
        if width == 0 {
            return Err(Error::Parse("trail map is empty".to_string()));
        }
        let mut food = Vec::with_capacity(width * rows.len());
        for (n, row) in rows.iter().enumerate() {
            if row.chars().count() != width {
                return Err(Error::Parse(format!(
                    "trail row {} is {} cells wide, expected {}",
                    n + 1,
                    row.chars().count(),
                    width
                )));
            }
            for ch in row.chars() {
                match ch {
                    '#' => food.push(true),
                    '.' => food.push(false),
                    other => {
                        return Err(Error::Parse(format!("unknown trail cell `{}` on row {}", other, n + 1)))
                    }
                }
            }
        }
        let total = food.iter().filter(|&&f| f).count();
        let mut visited = vec![false; food.len()];
        visited[0] = true;
        Ok(Trail {
            width,
            height: rows.len(),
            food,
            visited,
            position: (0, 0),
            heading: Heading::East,
            eaten: 0,
            total,
            ticks,
            used: 0,
        })
    }

    /// Read a map file.
    pub fn load<P: AsRef<Path>>(path: P, ticks: usize) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        Trail::parse(&text, ticks).map_err(|e| Error::Parse(format!("{}: {}", path.display(), e)))
    }

    pub fn position(&self) -> (usize, usize) {
        self.position
    }

    pub fn heading(&self) -> Heading {
        self.heading
    }

    pub fn eaten(&self) -> usize {
        self.eaten
    }

    fn ahead(&self) -> (usize, usize) {
        let (x, y) = self.position;
        match self.heading {
            Heading::North => (x, (y + self.height - 1) % self.height),
            Heading::South => (x, (y + 1) % self.height),
            Heading::East => ((x + 1) % self.width, y),
            Heading::West => ((x + self.width - 1) % self.width, y),
        }
    }

    fn cell(&self, (x, y): (usize, usize)) -> usize {
        y * self.width + x
    }
}

impl Environment for Trail {
    fn active(&self) -> bool {
        self.used < self.ticks && self.eaten < self.total
    }

    fn look(&self) -> bool {
        self.food[self.cell(self.ahead())]
    }

    fn forward(&mut self) {
        self.used += 1;
        self.position = self.ahead();
        let cell = self.cell(self.position);
        self.visited[cell] = true;
        if self.food[cell] {
            self.food[cell] = false;
            self.eaten += 1;
        }
    }

    fn left(&mut self) {
        self.used += 1;
        self.heading = self.heading.left();
    }

    fn right(&mut self) {
        self.used += 1;
        self.heading = self.heading.right();
    }

    fn fitness(&self) -> f64 {
        self.eaten as f64
    }

    fn max(&self) -> f64 {
        self.total as f64
    }

    fn print(&self) -> String {
        let mut out = String::with_capacity((self.width + 1) * self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                let cell = self.cell((x, y));
                let ch = if (x, y) == self.position {
                    self.heading.glyph()
                } else if self.food[cell] {
                    '#'
                } else if self.visited[cell] {
                    'o'
                } else {
                    '.'
                };
                out.push(ch);
            }
            out.push('\n');
        }
        out.push_str(&format!(
            "Ate {} of {} in {} of {} ticks\n",
            self.eaten, self.total, self.used, self.ticks
        ));
        out
    }

    fn ticks(&self) -> usize {
        self.ticks
    }

    fn set_ticks(&mut self, ticks: usize) {
        self.ticks = ticks;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: &str = "\
.###.
.....
";

    #[test]
    fn parses_map() {
        let trail = Trail::parse(LINE, 100).unwrap();
        assert_eq!(trail.max(), 3.0);
        assert!(trail.look());
        assert!(trail.active());
        assert!(Trail::parse("", 10).is_err());
        assert!(Trail::parse("..\n...", 10).is_err());
        assert!(Trail::parse(".x.", 10).is_err());
    }

    #[test]
    fn actions_cost_ticks_and_wrap() {
        let mut trail = Trail::parse(LINE, 100).unwrap();
        trail.left();
        assert_eq!(trail.heading(), Heading::North);
        trail.forward();
        assert_eq!(trail.position(), (0, 1));
        trail.right();
        trail.right();
        trail.right();
        assert_eq!(trail.heading(), Heading::West);
        trail.forward();
        assert_eq!(trail.position(), (4, 1));
        assert_eq!(trail.used, 6);
    }

    #[test]
    fn walking_the_line_eats_everything() {
        let target = Stateful::new(Trail::parse(LINE, 100).unwrap());
        let root: Node = "forward".parse().unwrap();
        let scored = target.score(&root, Budget::Full).unwrap();
        assert_eq!(scored.score, 3.0);
        assert_eq!(scored.adjusted, 1.0);
    }

    #[test]
    fn turning_forever_eats_nothing() {
        let target = Stateful::new(Trail::parse(LINE, 50).unwrap());
        let root: Node = "left".parse().unwrap();
        assert_eq!(target.score(&root, Budget::Full).unwrap().score, 0.0);
    }

    #[test]
    fn idle_program_terminates() {
        let target = Stateful::new(Trail::parse(LINE, 50).unwrap());
        let root: Node = "(+ x 1)".parse().unwrap();
        assert_eq!(target.score(&root, Budget::Full).unwrap().score, 0.0);
    }

    #[test]
    fn reduced_budget_limits_ticks() {
        let target = Stateful::new(Trail::parse(LINE, 10).unwrap());
        let root: Node = "forward".parse().unwrap();
        // One tick in ten: only the first step is taken.
        assert_eq!(target.score(&root, Budget::Reduced(0.1)).unwrap().score, 1.0);
    }

    #[test]
    fn if_food_ahead_is_lazy() {
        let target = Stateful::new(Trail::parse(".##..\n", 3).unwrap());
        // Running both branches would spend a tick turning off the trail after the first bite.
        let root: Node = "(if-food forward left)".parse().unwrap();
        let scored = target.score(&root, Budget::Full).unwrap();
        assert_eq!(scored.score, 2.0);
    }

    #[test]
    fn trace_prints_the_grid() {
        let target = Stateful::new(Trail::parse(LINE, 100).unwrap());
        let root: Node = "forward".parse().unwrap();
        let trace = target.trace(&root).unwrap();
        assert!(trace.contains("Ate 3 of 3"));
        assert!(trace.contains("Score: 3 of 3"));
        assert!(trace.ends_with('\n'));
    }

    #[test]
    fn function_sets_without_actions_are_rejected() {
        let target = Stateful::new(Trail::parse(LINE, 100).unwrap());
        let arithmetic = FunctionSet::arithmetic((0.0, 10.0));
        assert!(matches!(target.accepts(&arithmetic), Err(Error::Config(_))));
        target.accepts(&FunctionSet::agent()).unwrap();
    }
}
