use std::f64::consts::{PI, TAU};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::bounds::{Bounds, ScreenSize};
use crate::complex::Complex;
use crate::formula::{FormulaKind, FractalFormula, StepStatus};
use crate::params::{FractalParameters, OrbitTrap};
use crate::result::{Classification, IterationResult, OrbitStats};

/// Periodicity checks are skipped for the first iterations; orbits rarely
/// settle that early.
const PERIODICITY_WARMUP: u32 = 32;
const PERIODICITY_EPSILON: f64 = 1e-13;

/// Switches that select between the cheap and the advanced pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationOptions {
    /// Track [`OrbitStats`] and disable every shortcut so orbits run to
    /// their natural end.
    pub advanced_statistics: bool,
    /// Row 0 maps to the top (`p2.im`) of the bounds.
    pub invert_y: bool,
}

/// Drives one pixel's orbit from its start value to a classification.
///
/// Stateless between pixels, so a single evaluator is shared by every
/// worker. Generic over the formula so a concrete family gets a statically
/// dispatched loop; `OrbitEvaluator` without parameters holds a formula
/// chosen at run time.
#[derive(Debug)]
pub struct OrbitEvaluator<F: FractalFormula + ?Sized = dyn FractalFormula> {
    formula: Arc<F>,
    bounds: Bounds,
    screen: ScreenSize,
    options: EvaluationOptions,
}

impl<F: FractalFormula + ?Sized> Clone for OrbitEvaluator<F> {
    fn clone(&self) -> Self {
        Self {
            formula: Arc::clone(&self.formula),
            bounds: self.bounds,
            screen: self.screen,
            options: self.options,
        }
    }
}

impl<F: FractalFormula + ?Sized> OrbitEvaluator<F> {
    pub fn new(
        formula: Arc<F>,
        bounds: Bounds,
        screen: ScreenSize,
        options: EvaluationOptions,
    ) -> Self {
        Self {
            formula,
            bounds,
            screen,
            options,
        }
    }

    pub fn formula(&self) -> &F {
        &self.formula
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn screen(&self) -> ScreenSize {
        self.screen
    }

    pub fn options(&self) -> EvaluationOptions {
        self.options
    }

    #[inline]
    pub fn pixel_to_complex(&self, x: u32, y: u32) -> Complex {
        self.bounds
            .pixel_to_complex(self.screen, x, y, self.options.invert_y)
    }

    /// Evaluate the pixel at `(x, y)`.
    #[inline]
    pub fn evaluate(&self, x: u32, y: u32) -> IterationResult {
        self.evaluate_point(self.pixel_to_complex(x, y))
    }

    /// Evaluate an arbitrary point of the plane.
    pub fn evaluate_point(&self, point: Complex) -> IterationResult {
        let (z0, c) = self.formula.start(point);
        match self.formula.kind() {
            FormulaKind::FixedIterations => self.run_fixed(z0, c),
            kind => self.run_orbit(kind, z0, c),
        }
    }

    /// The orbit of the pixel at `(x, y)`: `z₀` followed by up to `limit`
    /// iterates, ending early once the orbit is classified.
    pub fn trace_orbit(&self, x: u32, y: u32, limit: usize) -> Vec<Complex> {
        let (mut z, c) = self.formula.start(self.pixel_to_complex(x, y));
        let mut orbit = Vec::with_capacity(limit.min(1024) + 1);
        orbit.push(z);
        for n in 0..limit {
            let step = self.formula.iterate(n as u32, z, c);
            match step.status {
                StepStatus::Failed => break,
                StepStatus::Continue => {
                    z = step.z;
                    orbit.push(z);
                }
                StepStatus::Diverged | StepStatus::Converged { .. } => {
                    orbit.push(step.z);
                    break;
                }
            }
        }
        orbit
    }

    fn run_orbit(&self, kind: FormulaKind, z0: Complex, c: Complex) -> IterationResult {
        let f = &*self.formula;
        let params = f.params();
        let max_iter = params.max_iterations;
        let advanced = self.options.advanced_statistics;

        if !advanced && f.is_known_interior(c) {
            return IterationResult::interior(max_iter, z0);
        }

        let mut stats = advanced.then(|| StatsAccumulator::new(params, z0));

        if kind == FormulaKind::Divergent && z0.norm_sq() > params.escape_radius_sq() {
            return self.finish(Classification::Escaped, 0, z0, z0, 0.0, stats);
        }

        let mut z = z0;
        let mut previous = z0;

        // Brent's cycle detection state.
        let check_period = !advanced && kind == FormulaKind::Divergent;
        let mut old_z = z;
        let mut period: u32 = 0;
        let mut check: u32 = 3;

        for n in 0..max_iter {
            let step = f.iterate(n, z, c);
            if step.status == StepStatus::Failed {
                return self.finish(Classification::Interior, n, z, previous, 0.0, stats);
            }
            previous = z;
            z = step.z;
            if let Some(acc) = stats.as_mut() {
                acc.push(z);
            }

            match step.status {
                StepStatus::Diverged => {
                    return self.finish(Classification::Escaped, n + 1, z, previous, 0.0, stats);
                }
                StepStatus::Converged { root } => {
                    let class = Classification::Converged { root };
                    return self.finish(class, n + 1, z, previous, 0.0, stats);
                }
                _ => {}
            }

            if check_period && n >= PERIODICITY_WARMUP && n & 3 == 0 {
                if (z.re - old_z.re).abs() < PERIODICITY_EPSILON
                    && (z.im - old_z.im).abs() < PERIODICITY_EPSILON
                {
                    return IterationResult::interior(max_iter, z);
                }
                period += 1;
                if period > check {
                    old_z = z;
                    period = 0;
                    check = check.saturating_mul(2);
                }
            }
        }

        self.finish(Classification::Interior, max_iter, z, previous, 0.0, stats)
    }

    /// Fixed-count families: run every step, then classify by the sign of
    /// the mean exponent (negative means a stable regime).
    fn run_fixed(&self, z0: Complex, c: Complex) -> IterationResult {
        let f = &*self.formula;
        let max_iter = f.params().max_iterations;
        let mut stats = self
            .options
            .advanced_statistics
            .then(|| StatsAccumulator::new(f.params(), z0));

        let mut z = z0;
        let mut previous = z0;
        let mut sum = 0.0;
        for n in 0..max_iter {
            let step = f.iterate(n, z, c);
            if step.status == StepStatus::Failed {
                return self.finish(Classification::Interior, n, z, previous, 0.0, stats);
            }
            sum += step.exponent_term;
            previous = z;
            z = step.z;
            if let Some(acc) = stats.as_mut() {
                acc.push(z);
            }
        }

        let lambda = sum / max_iter as f64;
        let class = if lambda < 0.0 {
            Classification::Escaped
        } else {
            Classification::Interior
        };
        self.finish(class, max_iter, z, previous, lambda, stats)
    }

    fn finish(
        &self,
        classification: Classification,
        iterations: u32,
        z: Complex,
        previous: Complex,
        lyapunov: f64,
        stats: Option<StatsAccumulator>,
    ) -> IterationResult {
        let smooth = match classification {
            Classification::Interior => iterations as f64,
            _ => self.formula.smooth_iterations(iterations, z, previous),
        };
        IterationResult {
            classification,
            iterations,
            smooth_iterations: finite_or(smooth, iterations as f64).max(0.0),
            final_z: finite_complex(z),
            lyapunov: finite_or(lyapunov, 0.0),
            stats: stats.map(StatsAccumulator::finish),
        }
    }
}

#[inline]
fn finite_or(v: f64, fallback: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        fallback
    }
}

/// Clamp overflowed components so every stored value stays finite.
fn finite_complex(z: Complex) -> Complex {
    let fix = |v: f64| {
        if v.is_nan() {
            0.0
        } else {
            v.clamp(f64::MIN, f64::MAX)
        }
    };
    Complex::new(fix(z.re), fix(z.im))
}

/// `arg` mapped onto `[0, 1)`.
#[inline]
fn unit_angle(angle: f64) -> f64 {
    let t = (angle / TAU).rem_euclid(1.0);
    if t >= 1.0 {
        0.0
    } else {
        t
    }
}

/// Running sums behind [`OrbitStats`].
#[derive(Debug, Clone)]
struct StatsAccumulator {
    trap: OrbitTrap,
    stripe_density: f64,
    count: u32,
    distance_sum: f64,
    angle_sum: f64,
    stripe_sum: f64,
    curvature_sum: f64,
    curvature_count: u32,
    trap_min: f64,
    gaussian_min: f64,
    last: Complex,
    last_step: Option<Complex>,
}

impl StatsAccumulator {
    fn new(params: &FractalParameters, z0: Complex) -> Self {
        Self {
            trap: params.trap,
            stripe_density: params.stripe_density,
            count: 0,
            distance_sum: 0.0,
            angle_sum: 0.0,
            stripe_sum: 0.0,
            curvature_sum: 0.0,
            curvature_count: 0,
            trap_min: f64::INFINITY,
            gaussian_min: f64::INFINITY,
            last: z0,
            last_step: None,
        }
    }

    fn push(&mut self, z: Complex) {
        let step = z - self.last;
        let angle = z.arg();

        self.distance_sum += step.norm();
        self.angle_sum += unit_angle(angle);
        self.stripe_sum += 0.5 + 0.5 * (self.stripe_density * angle).sin();

        if let Some(last_step) = self.last_step {
            if last_step.norm_sq() > 0.0 && step.norm_sq() > 0.0 {
                self.curvature_sum += (step / last_step).arg().abs() / PI;
                self.curvature_count += 1;
            }
        }

        self.trap_min = self.trap_min.min(self.trap.distance(z));
        self.gaussian_min = self.gaussian_min.min(z.gaussian_distance());
        self.last_step = Some(step);
        self.last = z;
        self.count += 1;
    }

    fn finish(self) -> OrbitStats {
        let mean = |sum: f64, count: u32| {
            if count == 0 {
                0.0
            } else {
                finite_or(sum / count as f64, 0.0)
            }
        };
        let (trap_min, gaussian_min) = if self.count == 0 {
            (self.trap.distance(self.last), self.last.gaussian_distance())
        } else {
            (self.trap_min, self.gaussian_min)
        };
        OrbitStats {
            average_distance: mean(self.distance_sum, self.count),
            average_angle: mean(self.angle_sum, self.count),
            curvature: mean(self.curvature_sum, self.curvature_count),
            stripe: mean(self.stripe_sum, self.count),
            trap_distance: finite_or(trap_min, 0.0),
            gaussian_distance: finite_or(gaussian_min, 0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::julia::Julia;
    use crate::lyapunov::Lyapunov;
    use crate::mandelbrot::Mandelbrot;
    use crate::newton::{NewtonRaphson, NewtonSine};

    fn screen(w: u32, h: u32) -> ScreenSize {
        ScreenSize::new(w, h).unwrap()
    }

    fn mandelbrot_evaluator(options: EvaluationOptions) -> OrbitEvaluator<Mandelbrot> {
        let m = Mandelbrot::default();
        let bounds = m.default_bounds();
        OrbitEvaluator::new(Arc::new(m), bounds, screen(800, 600), options)
    }

    fn all_finite(r: &IterationResult) -> bool {
        let stats_ok = r.stats.map_or(true, |s| {
            [
                s.average_distance,
                s.average_angle,
                s.curvature,
                s.stripe,
                s.trap_distance,
                s.gaussian_distance,
            ]
            .iter()
            .all(|v| v.is_finite())
        });
        r.smooth_iterations.is_finite() && r.final_z.is_finite() && r.lyapunov.is_finite() && stats_ok
    }

    #[test]
    fn corner_pixel_escapes_quickly() {
        let e = mandelbrot_evaluator(EvaluationOptions::default());
        let r = e.evaluate(0, 0);
        assert!(r.is_escaped());
        assert!(r.iterations <= 2, "got {}", r.iterations);
    }

    #[test]
    fn origin_is_interior_at_max_iterations() {
        for advanced in [false, true] {
            let e = mandelbrot_evaluator(EvaluationOptions {
                advanced_statistics: advanced,
                ..Default::default()
            });
            let r = e.evaluate_point(Complex::ZERO);
            assert!(r.is_interior());
            assert_eq!(r.iterations, 256);
            assert_eq!(r.smooth_iterations, 256.0);
            assert_eq!(r.stats.is_some(), advanced);
        }
    }

    #[test]
    fn escape_before_first_step() {
        let j = Julia::default();
        let bounds = Bounds::new(Complex::new(-10.0, -10.0), Complex::new(10.0, 10.0)).unwrap();
        let e = OrbitEvaluator::new(Arc::new(j), bounds, screen(3, 3), EvaluationOptions::default());
        let r = e.evaluate(0, 0);
        assert!(r.is_escaped());
        assert_eq!(r.iterations, 0);
        assert!(r.smooth_iterations >= 0.0);
    }

    #[test]
    fn periodic_orbit_short_circuits_to_interior() {
        let m = Mandelbrot::new(FractalParameters::default().with_max_iterations(10_000));
        let bounds = m.default_bounds();
        let e = OrbitEvaluator::new(Arc::new(m), bounds, screen(2, 2), EvaluationOptions::default());
        // Outside the cardioid and bulb shortcuts but inside the set.
        let r = e.evaluate_point(Complex::new(-0.1, 0.75));
        assert!(r.is_interior());
        assert_eq!(r.iterations, 10_000);
    }

    #[test]
    fn advanced_pass_matches_cheap_classification() {
        let cheap = mandelbrot_evaluator(EvaluationOptions::default());
        let full = mandelbrot_evaluator(EvaluationOptions {
            advanced_statistics: true,
            invert_y: false,
        });
        for (x, y) in [(0, 0), (400, 300), (250, 310), (600, 100), (533, 299)] {
            let a = cheap.evaluate(x, y);
            let b = full.evaluate(x, y);
            assert_eq!(a.classification, b.classification, "pixel ({x}, {y})");
            if a.is_escaped() {
                assert_eq!(a.iterations, b.iterations);
                assert_eq!(a.smooth_iterations, b.smooth_iterations);
            }
            assert!(all_finite(&b));
        }
    }

    #[test]
    fn statistics_are_normalized() {
        let e = mandelbrot_evaluator(EvaluationOptions {
            advanced_statistics: true,
            invert_y: false,
        });
        let r = e.evaluate_point(Complex::new(-0.75, 0.1));
        let s = r.stats.unwrap();
        assert!((0.0..1.0).contains(&s.average_angle));
        assert!((0.0..=1.0).contains(&s.curvature));
        assert!((0.0..=1.0).contains(&s.stripe));
        assert!(s.gaussian_distance <= std::f64::consts::FRAC_1_SQRT_2 + 1e-12);
    }

    #[test]
    fn newton_reports_known_root() {
        let n = NewtonRaphson::default();
        let bounds = n.default_bounds();
        let e = OrbitEvaluator::new(Arc::new(n), bounds, screen(4, 4), EvaluationOptions::default());
        let r = e.evaluate_point(Complex::new(1.5, 0.1));
        assert_eq!(r.classification, Classification::Converged { root: Some(0) });
        assert!(r.smooth_iterations <= r.iterations as f64);
        assert!(r.smooth_iterations >= r.iterations as f64 - 1.0);
    }

    #[test]
    fn newton_zero_derivative_is_interior() {
        let n = NewtonRaphson::default();
        let bounds = n.default_bounds();
        let e = OrbitEvaluator::new(Arc::new(n), bounds, screen(4, 4), EvaluationOptions::default());
        let r = e.evaluate_point(Complex::ZERO);
        assert!(r.is_interior());
        assert_eq!(r.iterations, 0);
        assert!(all_finite(&r));
    }

    #[test]
    fn sine_leaves_root_unresolved() {
        let s = NewtonSine::default();
        let bounds = s.default_bounds();
        let e = OrbitEvaluator::new(Arc::new(s), bounds, screen(4, 4), EvaluationOptions::default());
        let r = e.evaluate_point(Complex::new(0.3, 0.2));
        assert_eq!(r.classification, Classification::Converged { root: None });
        assert!(r.final_z.norm() < 1e-6);
    }

    #[test]
    fn lyapunov_runs_full_count_and_classifies_by_sign() {
        let l = Lyapunov::default();
        let max = l.params().max_iterations;
        let bounds = l.default_bounds();
        let e = OrbitEvaluator::new(Arc::new(l), bounds, screen(4, 4), EvaluationOptions::default());

        let stable = e.evaluate_point(Complex::new(2.5, 2.5));
        assert!(stable.is_escaped());
        assert!(stable.lyapunov < 0.0);
        assert_eq!(stable.iterations, max);
        assert_eq!(stable.smooth_iterations, max as f64);

        let chaotic = e.evaluate_point(Complex::new(4.0, 4.0));
        assert!(chaotic.is_interior());
        assert!(chaotic.lyapunov > 0.0);
    }

    #[test]
    fn dynamic_evaluator_matches_static() {
        let m = Mandelbrot::default();
        let bounds = m.default_bounds();
        let s = screen(40, 30);
        let options = EvaluationOptions::default();
        let concrete = OrbitEvaluator::new(Arc::new(m), bounds, s, options);
        let dynamic: OrbitEvaluator =
            OrbitEvaluator::new(crate::formula::create_default("Mandelbrot").unwrap(), bounds, s, options);
        for y in 0..30 {
            for x in 0..40 {
                assert_eq!(concrete.evaluate(x, y), dynamic.evaluate(x, y));
            }
        }
    }

    #[test]
    fn orbit_trace_starts_at_z0_and_stops_on_escape() {
        let e = mandelbrot_evaluator(EvaluationOptions::default());
        let orbit = e.trace_orbit(0, 0, 100);
        assert_eq!(orbit[0], Complex::ZERO);
        assert!(orbit.len() <= 3);
        assert!(orbit.last().unwrap().norm_sq() > 16.0);

        let bounded = e.trace_orbit(533, 299, 50);
        assert!(bounded.len() <= 51);
    }

    #[test]
    fn results_are_always_finite() {
        let m = Mandelbrot::new(
            FractalParameters::new(64, 1e200)
                .unwrap()
                .with_power(7.5),
        );
        let bounds = m.default_bounds();
        let e = OrbitEvaluator::new(
            Arc::new(m),
            bounds,
            screen(16, 12),
            EvaluationOptions {
                advanced_statistics: true,
                invert_y: true,
            },
        );
        for y in 0..12 {
            for x in 0..16 {
                let r = e.evaluate(x, y);
                assert!(all_finite(&r), "pixel ({x}, {y}) gave {r:?}");
            }
        }
    }
}
