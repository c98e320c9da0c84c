//! Symbolic regression against a fixed set of samples.

use super::{Budget, Objective, Scored, Target};
use crate::error::{Error, Result};
use crate::gp::expr::Node;
use std::path::Path;

/// An ordered, finite, non-empty collection of `(x, y)` samples.
#[derive(Clone, Debug, PartialEq)]
pub struct Pairs {
    values: Vec<(f64, f64)>,
}

impl Pairs {
    /// Returns `Error::Parse` if `values` is empty or holds a non-finite number.
    pub fn new(values: Vec<(f64, f64)>) -> Result<Self> {
        if values.is_empty() {
            return Err(Error::Parse("no samples given".to_string()));
        }
        if let Some(&(x, y)) = values.iter().find(|(x, y)| !x.is_finite() || !y.is_finite()) {
            return Err(Error::Parse(format!("sample ({}, {}) is not finite", x, y)));
        }
        Ok(Pairs { values })
    }

    /// Sample `f` at each of the given inputs.
    pub fn sample<F, I>(xs: I, f: F) -> Result<Self>
    where
        I: IntoIterator<Item = f64>,
        F: Fn(f64) -> f64,
    {
        Pairs::new(xs.into_iter().map(|x| (x, f(x))).collect())
    }

    /// Parse whitespace separated `x y` columns, one sample per line.
    ///
    /// Blank lines and lines starting with `#` are skipped.
    pub fn parse(text: &str) -> Result<Self> {
        let mut values = Vec::new();
        for (n, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut columns = line.split_whitespace().map(str::parse::<f64>);
            match (columns.next(), columns.next(), columns.next()) {
                (Some(Ok(x)), Some(Ok(y)), None) => values.push((x, y)),
                _ => {
                    return Err(Error::Parse(format!(
                        "line {}: expected two numeric columns, found `{}`",
                        n + 1,
                        line
                    )))
                }
            }
        }
        Pairs::new(values)
    }

    /// Read samples from a columnar data file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        Pairs::parse(&text).map_err(|e| Error::Parse(format!("{}: {}", path.display(), e)))
    }

    pub fn values(&self) -> &[(f64, f64)] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Sum of squared errors over every `stride`-th sample.
    fn residual(&self, root: &Node, stride: usize) -> Result<f64> {
        let mut error = 0.0;
        for &(x, y) in self.values.iter().step_by(stride) {
            let output = root.evaluate(&mut { x })?;
            error += (output - y).powi(2);
        }
        Ok(error)
    }
}

impl Target for Pairs {
    fn objective(&self) -> Objective {
        Objective::Minimize
    }

    /// A reduced budget scores an evenly strided subset of the samples.
    fn score(&self, root: &Node, budget: Budget) -> Result<Scored> {
        let stride = match budget {
            Budget::Full => 1,
            Budget::Reduced(fraction) => (1.0 / fraction.max(f64::EPSILON)).ceil().max(1.0) as usize,
        };
        let score = self.residual(root, stride.min(self.values.len()))?;
        Ok(Scored { score, adjusted: 1.0 / (1.0 + score) })
    }

    fn trace(&self, root: &Node) -> Result<String> {
        let mut out = String::new();
        let mut total = 0.0;
        for &(x, y) in &self.values {
            let output = root.evaluate(&mut { x })?;
            let error = (output - y).powi(2);
            total += error;
            out.push_str(&format!("f({}) = {}, y = {}, E = {}\n", x, output, y, error));
        }
        out.push_str(&format!("Residual sum of squares: {}\n", total));
        out.push_str(&format!("Adjusted fitness: {}\n", 1.0 / (1.0 + total)));
        Ok(out)
    }
}
