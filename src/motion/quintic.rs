// src/motion/quintic.rs - Quintic boundary-value profiles and their extrema

/// Relative slack allowed when comparing a profile peak against a limit
pub const LIMIT_TOLERANCE: f64 = 1e-9;

const BISECTION_ITERATIONS: usize = 60;

/// Fifth-order polynomial p(t) = c0 + c1·t + ... + c5·t⁵ joining two
/// kinematic states over a fixed duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quintic {
    coeffs: [f64; 6],
    duration: f64,
}

/// One end of a quintic profile
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Boundary {
    pub position: f64,
    pub velocity: f64,
    pub acceleration: f64,
}

/// Largest magnitudes reached over the whole profile
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peaks {
    pub velocity: f64,
    pub acceleration: f64,
    pub jerk: f64,
}

impl Quintic {
    /// Fit the unique quintic matching position, velocity and acceleration
    /// at both ends. A non-positive duration collapses onto the end state.
    pub fn from_boundary(start: Boundary, end: Boundary, duration: f64) -> Self {
        if duration <= 0.0 {
            return Self {
                coeffs: [end.position, end.velocity, 0.5 * end.acceleration, 0.0, 0.0, 0.0],
                duration: 0.0,
            };
        }
        let t = duration;
        let t2 = t * t;
        let t3 = t2 * t;
        let h = end.position - start.position;
        let (v0, v1) = (start.velocity, end.velocity);
        let (a0, a1) = (start.acceleration, end.acceleration);

        let c3 = (20.0 * h - (8.0 * v1 + 12.0 * v0) * t - (3.0 * a0 - a1) * t2) / (2.0 * t3);
        let c4 = (-30.0 * h + (14.0 * v1 + 16.0 * v0) * t + (3.0 * a0 - 2.0 * a1) * t2)
            / (2.0 * t3 * t);
        let c5 = (12.0 * h - 6.0 * (v1 + v0) * t + (a1 - a0) * t2) / (2.0 * t3 * t2);

        Self {
            coeffs: [start.position, v0, 0.5 * a0, c3, c4, c5],
            duration,
        }
    }

    /// State at time `t`, clamped to the profile's duration
    pub fn sample(&self, t: f64) -> Boundary {
        let t = t.clamp(0.0, self.duration);
        let velocity = derivative(&self.coeffs);
        let acceleration = derivative(&velocity);
        Boundary {
            position: evaluate(&self.coeffs, t),
            velocity: evaluate(&velocity, t),
            acceleration: evaluate(&acceleration, t),
        }
    }

    pub fn peaks(&self) -> Peaks {
        let velocity = derivative(&self.coeffs);
        let acceleration = derivative(&velocity);
        let jerk = derivative(&acceleration);
        Peaks {
            velocity: max_magnitude(&velocity, self.duration),
            acceleration: max_magnitude(&acceleration, self.duration),
            jerk: max_magnitude(&jerk, self.duration),
        }
    }

    /// Whether the profile stays within the given limits
    pub fn within(&self, max_velocity: f64, max_acceleration: f64, max_jerk: f64) -> bool {
        let peaks = self.peaks();
        within_limit(peaks.velocity, max_velocity)
            && within_limit(peaks.acceleration, max_acceleration)
            && within_limit(peaks.jerk, max_jerk)
    }
}

pub fn within_limit(value: f64, limit: f64) -> bool {
    value <= limit * (1.0 + LIMIT_TOLERANCE) + f64::EPSILON
}

/// Horner evaluation, lowest order coefficient first
fn evaluate(coeffs: &[f64], t: f64) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, c| acc * t + c)
}

fn derivative(coeffs: &[f64]) -> Vec<f64> {
    coeffs
        .iter()
        .enumerate()
        .skip(1)
        .map(|(power, c)| power as f64 * c)
        .collect()
}

/// Largest |p(t)| on [0, end], taken over the endpoints and critical points
fn max_magnitude(coeffs: &[f64], end: f64) -> f64 {
    let mut peak = evaluate(coeffs, 0.0).abs().max(evaluate(coeffs, end).abs());
    for root in real_roots(&derivative(coeffs), 0.0, end) {
        peak = peak.max(evaluate(coeffs, root).abs());
    }
    peak
}

/// Real roots of a polynomial inside the open interval (lo, hi).
///
/// The roots of the derivative split the interval into monotone pieces, so
/// each piece holds at most one root and a sign change can be bisected.
fn real_roots(coeffs: &[f64], lo: f64, hi: f64) -> Vec<f64> {
    match coeffs.len() {
        0 | 1 => Vec::new(),
        2 => {
            if coeffs[1] == 0.0 {
                return Vec::new();
            }
            let root = -coeffs[0] / coeffs[1];
            if root > lo && root < hi { vec![root] } else { Vec::new() }
        }
        _ => {
            let mut breaks = vec![lo];
            breaks.extend(real_roots(&derivative(coeffs), lo, hi));
            breaks.push(hi);

            let mut roots = Vec::new();
            for piece in breaks.windows(2) {
                let (mut a, mut b) = (piece[0], piece[1]);
                let (mut fa, fb) = (evaluate(coeffs, a), evaluate(coeffs, b));
                if fb == 0.0 {
                    if b < hi {
                        roots.push(b);
                    }
                    continue;
                }
                if fa == 0.0 || fa.signum() == fb.signum() {
                    continue;
                }
                for _ in 0..BISECTION_ITERATIONS {
                    let mid = 0.5 * (a + b);
                    let fm = evaluate(coeffs, mid);
                    if fm == 0.0 {
                        a = mid;
                        b = mid;
                        break;
                    }
                    if fm.signum() == fa.signum() {
                        a = mid;
                        fa = fm;
                    } else {
                        b = mid;
                    }
                }
                roots.push(0.5 * (a + b));
            }
            roots
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rest(position: f64) -> Boundary {
        Boundary {
            position,
            velocity: 0.0,
            acceleration: 0.0,
        }
    }

    #[test]
    fn test_boundary_conditions_hold() {
        let start = Boundary { position: 0.2, velocity: -0.5, acceleration: 1.0 };
        let end = Boundary { position: 1.5, velocity: 0.3, acceleration: -0.25 };
        let q = Quintic::from_boundary(start, end, 2.0);
        let s = q.sample(0.0);
        let e = q.sample(2.0);
        for (got, want) in [
            (s.position, 0.2),
            (s.velocity, -0.5),
            (s.acceleration, 1.0),
            (e.position, 1.5),
            (e.velocity, 0.3),
            (e.acceleration, -0.25),
        ] {
            assert!((got - want).abs() < 1e-9, "got {got}, want {want}");
        }
    }

    #[test]
    fn test_rest_to_rest_peaks() {
        // Minimum-jerk move: peak v = 1.875 h/T, peak a = 10/sqrt(3) h/T², peak j = 60 h/T³
        let q = Quintic::from_boundary(rest(0.0), rest(1.0), 1.0);
        let peaks = q.peaks();
        assert!((peaks.velocity - 1.875).abs() < 1e-9);
        assert!((peaks.acceleration - 10.0 / 3f64.sqrt()).abs() < 1e-6);
        assert!((peaks.jerk - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_duration_collapses_to_end() {
        let q = Quintic::from_boundary(rest(0.0), rest(2.0), 0.0);
        assert_eq!(q.sample(0.5).position, 2.0);
        assert_eq!(q.peaks().jerk, 0.0);
    }

    #[test]
    fn test_within_limits() {
        let q = Quintic::from_boundary(rest(0.0), rest(1.0), 3f64.cbrt());
        assert!(q.within(5.0, 10.0, 20.0));
        assert!(!q.within(5.0, 10.0, 19.0));
    }
}
