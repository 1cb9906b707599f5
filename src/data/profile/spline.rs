//! Interpolating cubic splines on arbitrary increasing knots,
//! with either natural or periodic end conditions.

use super::ProfileError;

/// A piecewise cubic through `(x_i, y_i)` stored as knot values
/// and second derivatives.
#[derive(Debug, Clone)]
pub struct CubicSpline {
    x : Vec<f64>,
    y : Vec<f64>,
    m : Vec<f64>,
    periodic : bool,
}

/// Solves a tridiagonal system in place (Thomas algorithm).
/// `sub[0]` and `sup[n-1]` are ignored.
fn solve_tridiagonal(sub : &[f64], diag : &[f64], sup : &[f64], rhs : &[f64]) -> Vec<f64> {
    let n = diag.len();
    let mut c_prime = vec![0.0; n];
    let mut d_prime = vec![0.0; n];

    c_prime[0] = if n > 1 { sup[0] / diag[0] } else { 0.0 };
    d_prime[0] = rhs[0] / diag[0];
    for i in 1..n {
        let denom = diag[i] - sub[i] * c_prime[i - 1];
        if i < n - 1 {
            c_prime[i] = sup[i] / denom;
        }
        d_prime[i] = (rhs[i] - sub[i] * d_prime[i - 1]) / denom;
    }

    let mut out = d_prime;
    for i in (0..n - 1).rev() {
        out[i] -= c_prime[i] * out[i + 1];
    }
    out
}

/// Solves a cyclic tridiagonal system (Sherman-Morrison).
/// `corner_low` sits at (n-1, 0), `corner_high` at (0, n-1).
fn solve_cyclic_tridiagonal(
    sub : &[f64],
    diag : &[f64],
    sup : &[f64],
    corner_low : f64,
    corner_high : f64,
    rhs : &[f64]
) -> Vec<f64> {
    let n = diag.len();
    let gamma = -diag[0];
    let mut modified = diag.to_vec();
    modified[0] = diag[0] - gamma;
    modified[n - 1] = diag[n - 1] - corner_low * corner_high / gamma;

    let x = solve_tridiagonal(sub, &modified, sup, rhs);

    let mut u = vec![0.0; n];
    u[0] = gamma;
    u[n - 1] = corner_low;
    let z = solve_tridiagonal(sub, &modified, sup, &u);

    let fact = (x[0] + corner_high * x[n - 1] / gamma)
        / (1.0 + z[0] + corner_high * z[n - 1] / gamma);

    x.iter().zip(z.iter()).map(|(xi, zi)| xi - fact * zi).collect()
}

impl CubicSpline {
    /// Natural spline (zero curvature at both ends). Two knots give
    /// the straight line between them.
    pub fn natural(x : &[f64], y : &[f64]) -> Result<CubicSpline, ProfileError> {
        let n = x.len();
        if n != y.len() {
            return Err(ProfileError::LengthMismatch{expected : n, found : y.len()});
        }
        if n < 2 {
            return Err(ProfileError::TooFewKnots{required : 2, found : n});
        }

        let mut m = vec![0.0; n];
        if n > 2 {
            let h : Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
            let inner = n - 2;
            let mut sub = vec![0.0; inner];
            let mut diag = vec![0.0; inner];
            let mut sup = vec![0.0; inner];
            let mut rhs = vec![0.0; inner];
            for k in 0..inner {
                let i = k + 1;
                sub[k] = h[i - 1];
                diag[k] = 2.0 * (h[i - 1] + h[i]);
                sup[k] = h[i];
                rhs[k] = 6.0 * ((y[i + 1] - y[i]) / h[i] - (y[i] - y[i - 1]) / h[i - 1]);
            }
            let solved = solve_tridiagonal(&sub, &diag, &sup, &rhs);
            m[1..n - 1].copy_from_slice(&solved);
        }

        Ok(CubicSpline { x : x.to_vec(), y : y.to_vec(), m, periodic : false })
    }

    /// Periodic spline. The last knot closes the loop, so `y[n-1]`
    /// is taken to equal `y[0]` and needs at least four knots.
    pub fn periodic(x : &[f64], y : &[f64]) -> Result<CubicSpline, ProfileError> {
        let n = x.len();
        if n != y.len() {
            return Err(ProfileError::LengthMismatch{expected : n, found : y.len()});
        }
        if n < 4 {
            return Err(ProfileError::TooFewKnots{required : 4, found : n});
        }
        let mut y = y.to_vec();
        y[n - 1] = y[0];

        // Unknowns are M_0..M_{p-1}; M_p wraps to M_0.
        let p = n - 1;
        let h : Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
        let mut sub = vec![0.0; p];
        let mut diag = vec![0.0; p];
        let mut sup = vec![0.0; p];
        let mut rhs = vec![0.0; p];
        for i in 0..p {
            let prev = (i + p - 1) % p;
            let y_prev = y[prev];
            sub[i] = h[prev];
            diag[i] = 2.0 * (h[prev] + h[i]);
            sup[i] = h[i];
            rhs[i] = 6.0 * ((y[i + 1] - y[i]) / h[i] - (y[i] - y_prev) / h[prev]);
        }
        let solved = solve_cyclic_tridiagonal(&sub, &diag, &sup, h[p - 1], h[p - 1], &rhs);

        let mut m = solved;
        m.push(m[0]);
        Ok(CubicSpline { x : x.to_vec(), y, m, periodic : true })
    }

    /// Evaluates the spline at `t`. Outside the knot range a natural
    /// spline extends its end pieces; a periodic one wraps.
    pub fn eval(&self, t : f64) -> f64 {
        let n = self.x.len();
        let (x0, xn) = (self.x[0], self.x[n - 1]);
        let t = if self.periodic {
            x0 + (t - x0).rem_euclid(xn - x0)
        } else {
            t
        };

        let i = self.x.partition_point(|&xi| xi <= t).clamp(1, n - 1) - 1;
        let h = self.x[i + 1] - self.x[i];
        let a = self.x[i + 1] - t;
        let b = t - self.x[i];

        self.m[i] * a.powi(3) / (6.0 * h)
            + self.m[i + 1] * b.powi(3) / (6.0 * h)
            + (self.y[i] - self.m[i] * h * h / 6.0) * a / h
            + (self.y[i + 1] - self.m[i + 1] * h * h / 6.0) * b / h
    }
}
