//! The generational loop of the genetic program.
//!
//! # Genetic Algorithms
//!
//! The genetic algorithm process can be described as follows:
//!
//! 1. Initialise a *Population* of *Individual*s using ramped half-and-half.
//! 2. Select parents from the population, recombine and mutate them, and evaluate the
//!    *Fitness* of each resulting offspring.
//! 3. Copy the previous generation's best individual over random offspring (elitism).
//! 4. Replace the population with the offspring.
//! 5. After a fixed number of generations we're done, otherwise GOTO 2.
//!
//! Offspring production is split into one block per worker. Each block receives its own engine
//! forked in order from the master engine and writes into its own result slot, so a run is
//! reproducible from its seed and worker count.

use crate::config::Config;
use crate::draw::{self, Draw};
use crate::error::{Error, Result};
use crate::gp::expr;
use crate::gp::function::FunctionSet;
use crate::gp::individual::{Individual, Tree};
use crate::gp::operators::{Breeder, Parents};
use crate::target::{Budget, Target};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::Rng;
use scoped_threadpool::Pool as ThreadPool;
use serde::{Deserialize, Serialize};

/// A summary of one generation's population.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub generation: usize,
    pub best_score: f64,
    pub best_fitness: f64,
    pub best_adjusted: f64,
    pub mean_adjusted: f64,
    pub best_size: usize,
    pub mean_size: f64,
    pub best_depth: usize,
    pub mean_depth: f64,
}

/// The result of a complete run.
#[derive(Clone, Debug)]
pub struct Outcome {
    /// The best individual of the final population.
    pub best: Individual,
    /// The best individual of any generation.
    pub best_ever: Individual,
    /// One entry per generation, the final population included.
    pub history: Vec<Stats>,
}

/// The state of a run: the current population and everything needed to replace it.
pub struct Evolution<'a, T: ?Sized> {
    thread_pool: ThreadPool,
    config: Config,
    set: FunctionSet,
    target: &'a T,
    population: Vec<Individual>,
    best_ever: Individual,
    generation: usize,
    history: Vec<Stats>,
}

impl Stats {
    /// Summarise a non-empty population.
    pub fn of(generation: usize, population: &[Individual]) -> Result<Self> {
        let best = Individual::best(population)
            .ok_or_else(|| Error::Invariant("cannot summarise an empty population".to_string()))?;
        let n = population.len() as f64;
        let (mut adjusted, mut size, mut depth) = (0.0, 0.0, 0.0);
        for i in population {
            adjusted += i.adjusted();
            size += i.total() as f64;
            depth += i.depth() as f64;
        }
        Ok(Stats {
            generation,
            best_score: best.score(),
            best_fitness: best.fitness(),
            best_adjusted: best.adjusted(),
            mean_adjusted: adjusted / n,
            best_size: best.total(),
            mean_size: size / n,
            best_depth: best.depth(),
            mean_depth: depth / n,
        })
    }
}

/// Split `n` slots into `workers` blocks, spreading the remainder over the first blocks.
///
/// The block sizes always sum to `n`.
pub fn partition(n: usize, workers: usize) -> Vec<usize> {
    let workers = workers.max(1);
    let (base, rem) = (n / workers, n % workers);
    (0..workers).map(|i| base + usize::from(i < rem)).collect()
}

/// Run `work` once per block on the pool and concatenate the blocks in order.
fn in_blocks<R, F>(pool: &mut ThreadPool, rng: &mut R, size: usize, work: F) -> Result<Vec<Individual>>
where
    R: Rng,
    F: Fn(&mut StdRng, usize) -> Result<Vec<Individual>> + Sync,
{
    let blocks = partition(size, pool.thread_count() as usize);
    let mut rngs: Vec<StdRng> = blocks.iter().map(|_| rng.fork()).collect();
    let mut results: Vec<Option<Result<Vec<Individual>>>> = blocks.iter().map(|_| None).collect();
    let work = &work;
    pool.scoped(|scoped| {
        for ((&count, rng), slot) in blocks.iter().zip(rngs.iter_mut()).zip(results.iter_mut()) {
            scoped.execute(move || *slot = Some(work(rng, count)));
        }
    });
    let mut individuals = Vec::with_capacity(size);
    for (i, slot) in results.into_iter().enumerate() {
        let block = slot.ok_or_else(|| Error::Invariant(format!("block {} produced nothing", i)))?;
        individuals.extend(block?);
    }
    Ok(individuals)
}

impl<'a, T> Evolution<'a, T>
where
    T: Target + ?Sized,
{
    /// Validate the configuration and build and evaluate the initial population.
    ///
    /// Every individual is built to a depth drawn from `[min_depth, max_depth]` with the grow
    /// method (with probability `grow_chance`) or the full method.
    pub fn new<R: Rng>(config: &Config, target: &'a T, rng: &mut R) -> Result<Self> {
        config.validate()?;
        let set = config.function_set()?;
        target.accepts(&set)?;
        let workers = config.workers();
        let mut thread_pool = ThreadPool::new(workers as u32);
        info!(
            "evolving {} individuals for {} generations on {} workers",
            config.population_size, config.generations, workers
        );
        let population = in_blocks(&mut thread_pool, rng, config.population_size, |rng, count| {
            (0..count)
                .map(|_| {
                    let depth = rng.uniform_int(config.min_depth, config.max_depth);
                    let root = expr::gen(rng, &set, depth, config.grow_chance);
                    Tree::new(root).evaluate(target, config.penalty, Budget::Full)
                })
                .collect()
        })?;
        let best_ever = Individual::best(&population)
            .cloned()
            .ok_or_else(|| Error::Invariant("initial population is empty".to_string()))?;
        Ok(Evolution {
            thread_pool,
            config: config.clone(),
            set,
            target,
            population,
            best_ever,
            generation: 0,
            history: Vec::new(),
        })
    }

    pub fn population(&self) -> &[Individual] {
        &self.population
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn history(&self) -> &[Stats] {
        &self.history
    }

    /// The best individual of the current population.
    pub fn best(&self) -> &Individual {
        // The population is never empty.
        Individual::best(&self.population).unwrap_or(&self.best_ever)
    }

    pub fn best_ever(&self) -> &Individual {
        &self.best_ever
    }

    /// Step forward by a single generation, returning the statistics of the replaced population.
    pub fn step<R: Rng>(&mut self, rng: &mut R) -> Result<Stats> {
        let Evolution {
            ref mut thread_pool,
            ref config,
            ref set,
            target,
            ref mut population,
            ref mut best_ever,
            ref mut generation,
            ref mut history,
        } = *self;

        let current: &[Individual] = &population[..];
        let elite = Individual::best(current)
            .cloned()
            .ok_or_else(|| Error::Invariant("population is empty".to_string()))?;
        let parents = Parents::new(current, config.selection);
        let g = *generation;

        // 1. Summarise the current generation in the background while producing offspring.
        let (offspring, stats) = crossbeam::thread::scope(|s| {
            let logger = s.spawn(move |_| -> Result<Stats> {
                let stats = Stats::of(g, current)?;
                info!(
                    "generation {}: best score {}, fitness {}, adjusted {} (mean {}), size {} (mean {:.2}), depth {} (mean {:.2})",
                    stats.generation,
                    stats.best_score,
                    stats.best_fitness,
                    stats.best_adjusted,
                    stats.mean_adjusted,
                    stats.best_size,
                    stats.mean_size,
                    stats.best_depth,
                    stats.mean_depth
                );
                Ok(stats)
            });
            let offspring = in_blocks(thread_pool, rng, config.population_size, |rng, count| {
                let breeder = Breeder { config, set, target, parents: &parents };
                breeder.breed(rng, count)
            });
            let stats: std::thread::Result<Result<Stats>> = logger.join();
            (offspring, stats)
        })
        .map_err(|_| Error::Invariant("offspring production panicked".to_string()))?;
        let stats = stats.map_err(|_| Error::Invariant("statistics thread panicked".to_string()))??;
        let mut offspring = offspring?;

        // 2. Elitism.
        let last = offspring.len() - 1;
        for _ in 0..config.elitism_size {
            let slot = rng.uniform_int(0, last);
            debug!("elite copied into slot {}", slot);
            offspring[slot] = elite.clone();
        }

        // 3. Replacement.
        *population = offspring;
        if let Some(best) = Individual::best(population.iter()) {
            if best.rank(best_ever).is_lt() {
                *best_ever = best.clone();
            }
        }
        history.push(stats.clone());
        *generation += 1;
        Ok(stats)
    }

    /// Run every remaining generation.
    ///
    /// The primary result is the best individual of the final population. The best individual
    /// seen in any generation is reported alongside it.
    pub fn run<R: Rng>(mut self, rng: &mut R) -> Result<Outcome> {
        while self.generation < self.config.generations {
            self.step(rng)?;
        }
        let last = Stats::of(self.generation, &self.population)?;
        self.history.push(last);
        let best = self.best().clone();
        info!("finished after {} generations, best {}", self.generation, best.tree());
        Ok(Outcome { best, best_ever: self.best_ever, history: self.history })
    }
}

/// Run a complete evolution from `rng`.
pub fn evolve<T, R>(config: &Config, target: &T, rng: &mut R) -> Result<Outcome>
where
    T: Target + ?Sized,
    R: Rng,
{
    Evolution::new(config, target, rng)?.run(rng)
}

/// Run `config.trials` independent evolutions.
///
/// Each trial is seeded from an engine seeded with `config.seed`. Returns the 1-based number of
/// the trial whose final best individual is fittest, along with its outcome.
pub fn run_trials<T>(config: &Config, target: &T) -> Result<(usize, Outcome)>
where
    T: Target + ?Sized,
{
    config.validate()?;
    let mut master = draw::engine(config.seed);
    let mut winner: Option<(usize, Outcome)> = None;
    for trial in 1..=config.trials {
        let mut rng = master.fork();
        let outcome = evolve(config, target, &mut rng)?;
        info!("trial {} best fitness {}", trial, outcome.best.fitness());
        let better = match winner {
            Some((_, ref w)) => outcome.best.rank(&w.best).is_lt(),
            None => true,
        };
        if better {
            winner = Some((trial, outcome));
        }
    }
    winner.ok_or_else(|| Error::Config("trials must be at least 1".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::Pairs;

    fn squares() -> Pairs {
        Pairs::new(vec![(0.0, 0.0), (1.0, 1.0), (2.0, 4.0), (3.0, 9.0)]).unwrap()
    }

    fn small() -> Config {
        Config {
            population_size: 20,
            generations: 5,
            threads: Some(3),
            seed: Some(1),
            ..Config::default()
        }
    }

    #[test]
    fn partition_covers_every_slot() {
        assert_eq!(partition(10, 3), vec![4, 3, 3]);
        assert_eq!(partition(12, 4), vec![3, 3, 3, 3]);
        assert_eq!(partition(2, 4), vec![1, 1, 0, 0]);
        assert_eq!(partition(5, 0), vec![5]);
        for n in 0..50 {
            for w in 1..9 {
                assert_eq!(partition(n, w).iter().sum::<usize>(), n);
            }
        }
    }

    #[test]
    fn initial_population_is_ramped() {
        let config = Config { min_depth: 1, max_depth: 3, ..small() };
        let mut rng = draw::engine(Some(2));
        let target = squares();
        let evo = Evolution::new(&config, &target, &mut rng).unwrap();
        assert_eq!(evo.population().len(), 20);
        assert!(evo.population().iter().all(|i| (1..=3).contains(&i.depth())));
    }

    #[test]
    fn step_keeps_population_size() {
        let mut rng = draw::engine(Some(3));
        let target = squares();
        let mut evo = Evolution::new(&small(), &target, &mut rng).unwrap();
        let stats = evo.step(&mut rng).unwrap();
        assert_eq!(stats.generation, 0);
        assert_eq!(evo.generation(), 1);
        assert_eq!(evo.population().len(), 20);
        assert_eq!(evo.history().len(), 1);
    }

    #[test]
    fn run_records_every_generation() {
        let mut rng = draw::engine(Some(4));
        let outcome = evolve(&small(), &squares(), &mut rng).unwrap();
        assert_eq!(outcome.history.len(), 6);
        assert!(outcome.best_ever.rank(&outcome.best).is_le());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut rng = draw::engine(Some(5));
        let config = Config { elitism_size: 100, ..small() };
        assert!(matches!(evolve(&config, &squares(), &mut rng), Err(Error::Config(_))));
    }

    #[test]
    fn trials_report_a_winner() {
        let config = Config { trials: 3, ..small() };
        let (trial, outcome) = run_trials(&config, &squares()).unwrap();
        assert!((1..=3).contains(&trial));
        assert_eq!(outcome.history.len(), 6);
    }
}
