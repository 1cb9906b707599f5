//! A bounded, derivative-free global minimizer: differential evolution
//! with the `best/1/bin` strategy, dithered mutation, Latin hypercube
//! initialization and immediate replacement.
//!
//! All work is done in the unit hypercube and scaled to the bounds when
//! the objective is evaluated. The search stops when the spread of the
//! population's energies falls below `tol` times their mean magnitude, or
//! after `max_generations`.

use rand::prelude::*;
use rand::rngs::StdRng;

/// Search parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvolutionSettings {
    /// Population size per dimension.
    pub popsize : usize,
    pub max_generations : usize,
    /// Relative convergence tolerance on the population energies.
    pub tol : f64,
    /// Absolute convergence tolerance on the population energies.
    pub atol : f64,
    /// Mutation factor drawn uniformly from this range every generation.
    pub mutation : (f64, f64),
    pub recombination : f64,
}

impl Default for EvolutionSettings {
    fn default() -> Self {
        EvolutionSettings {
            popsize : 15,
            max_generations : 1000,
            tol : 0.2,
            atol : 0.0,
            mutation : (0.5, 1.0),
            recombination : 0.7,
        }
    }
}

/// Outcome of a search.
#[derive(Debug, Clone, PartialEq)]
pub struct EvolutionResult<const N : usize> {
    pub x : [f64; N],
    pub energy : f64,
    pub generations : usize,
    pub evaluations : usize,
    /// `false` when the generation cap was hit before the tolerance.
    pub converged : bool,
}

/// Maps a point of the unit hypercube onto the bounds.
fn scale<const N : usize>(unit : &[f64; N], bounds : &[(f64, f64); N]) -> [f64; N] {
    let mut out = [0.0; N];
    for k in 0..N {
        out[k] = bounds[k].0 + unit[k] * (bounds[k].1 - bounds[k].0);
    }
    out
}

/// Latin hypercube sample of `count` points in `[0, 1]^N`.
fn latin_hypercube<const N : usize>(count : usize, rng : &mut StdRng) -> Vec<[f64; N]> {
    let mut population = vec![[0.0; N]; count];
    for k in 0..N {
        let mut strata : Vec<usize> = (0..count).collect();
        strata.shuffle(rng);
        for (member, stratum) in population.iter_mut().zip(strata) {
            member[k] = (stratum as f64 + rng.gen::<f64>()) / count as f64;
        }
    }
    population
}

fn converged(energies : &[f64], tol : f64, atol : f64) -> bool {
    let n = energies.len() as f64;
    let mean = energies.iter().sum::<f64>() / n;
    let var = energies.iter().map(|e| (e - mean) * (e - mean)).sum::<f64>() / n;
    var.sqrt() <= atol + tol * mean.abs()
}

/// Minimizes `objective` over the box `bounds`.
///
/// ## Arguments
///
/// * `objective` - function of the `N` parameters to minimize
///
/// * `bounds` - `(low, high)` for every parameter; equal ends pin a
/// parameter to that value
///
/// * `settings` - population and stopping parameters
///
/// * `rng` - random stream; a seeded `StdRng` makes the search repeatable
///
/// ## Example
///
/// ```rust, ignore
/// let mut rng = StdRng::seed_from_u64(7);
/// let result = differential_evolution(
///     |x : &[f64; 2]| (x[0] - 1.0).powi(2) + (x[1] + 2.0).powi(2),
///     &[(-5.0, 5.0), (-5.0, 5.0)],
///     &EvolutionSettings::default(),
///     &mut rng,
/// );
/// ```
pub fn differential_evolution<const N : usize, F>(
    objective : F,
    bounds : &[(f64, f64); N],
    settings : &EvolutionSettings,
    rng : &mut StdRng
) -> EvolutionResult<N> where F : Fn(&[f64; N]) -> f64 {
    let count = (settings.popsize * N).max(5);
    let mut population = latin_hypercube::<N>(count, rng);
    let mut energies : Vec<f64> = population.iter()
        .map(|member| objective(&scale(member, bounds)))
        .collect();
    let mut evaluations = count;

    let mut best = 0;
    for (i, e) in energies.iter().enumerate() {
        if *e < energies[best] {
            best = i;
        }
    }

    let mut generations = 0;
    let mut is_converged = converged(&energies, settings.tol, settings.atol);

    while !is_converged && generations < settings.max_generations {
        let factor = rng.gen_range(settings.mutation.0..=settings.mutation.1);

        for candidate in 0..count {
            let (r1, r2) = loop {
                let r1 = rng.gen_range(0..count);
                let r2 = rng.gen_range(0..count);
                if r1 != r2 && r1 != candidate && r2 != candidate {
                    break (r1, r2);
                }
            };

            let fill_point = rng.gen_range(0..N);
            let mut trial = population[candidate];
            for k in 0..N {
                if k == fill_point || rng.gen::<f64>() < settings.recombination {
                    trial[k] = population[best][k]
                        + factor * (population[r1][k] - population[r2][k]);
                }
                // out-of-box components are redrawn inside the box
                if !(0.0..=1.0).contains(&trial[k]) {
                    trial[k] = rng.gen::<f64>();
                }
            }

            let energy = objective(&scale(&trial, bounds));
            evaluations += 1;
            if energy <= energies[candidate] {
                population[candidate] = trial;
                energies[candidate] = energy;
                if energy <= energies[best] {
                    best = candidate;
                }
            }
        }

        generations += 1;
        is_converged = converged(&energies, settings.tol, settings.atol);
    }

    EvolutionResult {
        x : scale(&population[best], bounds),
        energy : energies[best],
        generations,
        evaluations,
        converged : is_converged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_a_shifted_bowl() {
        let mut rng = StdRng::seed_from_u64(3);
        let settings = EvolutionSettings { tol : 1e-6, ..Default::default() };
        let result = differential_evolution(
            |x : &[f64; 2]| (x[0] - 1.5).powi(2) + (x[1] + 2.0).powi(2) + 1.0,
            &[(-5.0, 5.0), (-5.0, 5.0)],
            &settings,
            &mut rng,
        );
        assert!((result.x[0] - 1.5).abs() < 1e-2);
        assert!((result.x[1] + 2.0).abs() < 1e-2);
        assert!((result.energy - 1.0).abs() < 1e-3);
    }

    #[test]
    fn stays_inside_bounds_and_respects_pinned_parameters() {
        let mut rng = StdRng::seed_from_u64(11);
        let result = differential_evolution(
            |x : &[f64; 3]| -(x[0] + x[1] + x[2]),
            &[(0.0, 1.0), (2.0, 2.0), (-1.0, 3.0)],
            &EvolutionSettings { tol : 1e-6, ..Default::default() },
            &mut rng,
        );
        assert!((0.0..=1.0).contains(&result.x[0]));
        assert_eq!(result.x[1], 2.0);
        assert!((-1.0..=3.0).contains(&result.x[2]));
        assert!(result.x[2] > 2.5);
    }

    #[test]
    fn same_seed_same_answer() {
        let run = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            differential_evolution(
                |x : &[f64; 1]| (x[0] * 3.0).sin() + 0.1 * x[0] * x[0],
                &[(-4.0, 4.0)],
                &EvolutionSettings::default(),
                &mut rng,
            )
        };
        assert_eq!(run(42), run(42));
    }
}
