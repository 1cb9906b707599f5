//! Penalized (Whittaker) smoothing of coordinate sequences, with the
//! penalty weight chosen so the summed squared residual meets a target.
//!
//! Closed curves use the cyclic second-difference penalty and are solved
//! exactly in the Fourier domain; open curves use the ordinary penalty and
//! a banded (pentadiagonal) Cholesky solve.

use std::f64::consts::PI;

const LOG_LAMBDA_MIN : f64 = -8.0;
const LOG_LAMBDA_MAX : f64 = 12.0;
const BISECTION_STEPS : usize = 60;

/// Discrete Fourier transform of a real sequence, as (re, im).
fn dft(values : &[f64]) -> (Vec<f64>, Vec<f64>) {
    let n = values.len();
    let mut re = vec![0.0; n];
    let mut im = vec![0.0; n];
    for k in 0..n {
        for (j, v) in values.iter().enumerate() {
            let angle = -2.0 * PI * ((k * j) % n) as f64 / n as f64;
            re[k] += v * angle.cos();
            im[k] += v * angle.sin();
        }
    }
    (re, im)
}

/// Inverse of `dft`, keeping only the real part.
fn inverse_dft(re : &[f64], im : &[f64]) -> Vec<f64> {
    let n = re.len();
    (0..n).map(|j| {
        let mut acc = 0.0;
        for k in 0..n {
            let angle = 2.0 * PI * ((k * j) % n) as f64 / n as f64;
            acc += re[k] * angle.cos() - im[k] * angle.sin();
        }
        acc / n as f64
    }).collect()
}

/// Eigenvalues of the cyclic second-difference penalty `D'D`.
fn cyclic_penalty_spectrum(n : usize) -> Vec<f64> {
    (0..n).map(|k| {
        let w = 2.0 - 2.0 * (2.0 * PI * k as f64 / n as f64).cos();
        w * w
    }).collect()
}

/// Finds the penalty weight whose residual meets `target` by bisection
/// in log space. `residual` must be non-decreasing in lambda.
fn bisect_lambda<F : Fn(f64) -> f64>(residual : F, target : f64) -> f64 {
    if target <= 0.0 {
        return 0.0;
    }
    let (mut lo, mut hi) = (LOG_LAMBDA_MIN, LOG_LAMBDA_MAX);
    if residual(10f64.powf(hi)) <= target {
        return 10f64.powf(hi);
    }
    if residual(10f64.powf(lo)) >= target {
        return 10f64.powf(lo);
    }
    for _ in 0..BISECTION_STEPS {
        let mid = 0.5 * (lo + hi);
        if residual(10f64.powf(mid)) > target {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    10f64.powf(lo)
}

/// Smooths the coordinate channels of a closed curve (no repeated
/// closing point) so their combined squared residual is about `target`.
pub(crate) fn smooth_closed(channels : &[Vec<f64>], target : f64) -> Vec<Vec<f64>> {
    let n = channels.first().map_or(0, |c| c.len());
    if n < 3 {
        return channels.to_vec();
    }
    let spectrum = cyclic_penalty_spectrum(n);
    let transforms : Vec<(Vec<f64>, Vec<f64>)> = channels.iter().map(|c| dft(c)).collect();

    // Parseval: residual power per frequency is |Y_k|^2 (1 - 1/(1 + lambda w_k))^2 / n
    let power : Vec<f64> = (0..n).map(|k| {
        transforms.iter().map(|(re, im)| re[k] * re[k] + im[k] * im[k]).sum::<f64>()
    }).collect();
    let residual = |lambda : f64| -> f64 {
        power.iter().zip(spectrum.iter()).map(|(p, w)| {
            let keep = 1.0 / (1.0 + lambda * w);
            p * (1.0 - keep) * (1.0 - keep)
        }).sum::<f64>() / n as f64
    };
    let lambda = bisect_lambda(residual, target);

    transforms.iter().map(|(re, im)| {
        let (re, im) : (Vec<f64>, Vec<f64>) = re.iter().zip(im.iter()).zip(spectrum.iter())
            .map(|((r, i), w)| {
                let keep = 1.0 / (1.0 + lambda * w);
                (r * keep, i * keep)
            })
            .unzip();
        inverse_dft(&re, &im)
    }).collect()
}

/// Solves `(I + lambda D'D) z = y` for the open second-difference
/// penalty. The matrix is symmetric positive definite and pentadiagonal,
/// so an LDL' factorization over the band is exact and linear time.
fn solve_open(values : &[f64], lambda : f64) -> Vec<f64> {
    let n = values.len();
    // Band of D'D: main, first and second off-diagonals.
    let mut d0 = vec![6.0; n];
    let mut d1 = vec![-4.0; n.saturating_sub(1)];
    let d2 = vec![1.0; n.saturating_sub(2)];
    d0[0] = 1.0;
    d0[n - 1] = 1.0;
    if n > 3 {
        d0[1] = 5.0;
        d0[n - 2] = 5.0;
    } else if n == 3 {
        d0[1] = 4.0;
    }
    d1[0] = -2.0;
    d1[n - 2] = -2.0;

    let diag : Vec<f64> = d0.iter().map(|v| 1.0 + lambda * v).collect();
    let off1 : Vec<f64> = d1.iter().map(|v| lambda * v).collect();
    let off2 : Vec<f64> = d2.iter().map(|v| lambda * v).collect();

    // LDL' with unit lower factor L having bands l1, l2.
    let mut dd = vec![0.0; n];
    let mut l1 = vec![0.0; n];
    let mut l2 = vec![0.0; n];
    for i in 0..n {
        if i >= 2 {
            l2[i] = off2[i - 2] / dd[i - 2];
        }
        if i >= 1 {
            let mut a = off1[i - 1];
            if i >= 2 {
                a -= l2[i] * dd[i - 2] * l1[i - 1];
            }
            l1[i] = a / dd[i - 1];
        }
        let mut d = diag[i];
        if i >= 1 {
            d -= l1[i] * l1[i] * dd[i - 1];
        }
        if i >= 2 {
            d -= l2[i] * l2[i] * dd[i - 2];
        }
        dd[i] = d;
    }

    let mut z = values.to_vec();
    for i in 0..n {
        if i >= 1 {
            z[i] -= l1[i] * z[i - 1];
        }
        if i >= 2 {
            z[i] -= l2[i] * z[i - 2];
        }
    }
    for i in 0..n {
        z[i] /= dd[i];
    }
    for i in (0..n).rev() {
        if i + 1 < n {
            z[i] -= l1[i + 1] * z[i + 1];
        }
        if i + 2 < n {
            z[i] -= l2[i + 2] * z[i + 2];
        }
    }
    z
}

/// Smooths the coordinate channels of an open curve so their combined
/// squared residual is about `target`.
pub(crate) fn smooth_open(channels : &[Vec<f64>], target : f64) -> Vec<Vec<f64>> {
    let n = channels.first().map_or(0, |c| c.len());
    if n < 3 {
        return channels.to_vec();
    }
    let residual = |lambda : f64| -> f64 {
        channels.iter().map(|c| {
            solve_open(c, lambda).iter().zip(c.iter()).map(|(z, y)| (z - y) * (z - y)).sum::<f64>()
        }).sum()
    };
    let lambda = bisect_lambda(residual, target);
    channels.iter().map(|c| solve_open(c, lambda)).collect()
}
