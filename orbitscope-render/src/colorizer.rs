use std::f64::consts::TAU;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use orbitscope_core::{Classification, IterationResult};

use crate::buffer::RenderBuffer;
use crate::color_map::{BuiltinMap, ColorMap};
use crate::filter::{apply_chain, Filter};
use crate::iteration_buffer::IterationBuffer;

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Which quantity of an [`IterationResult`] drives the color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColoringMethod {
    /// Ignore the result and paint [`MapSettings::fixed_color`].
    FixedColor,
    #[default]
    Iterations,
    Real,
    Imaginary,
    Modulus,
    Angle,
    Curvature,
    Striping,
    OrbitTrap,
    GaussianInteger,
    AverageDistance,
    Lyapunov,
    RootIndex,
}

impl ColoringMethod {
    /// Whether the method reads [`OrbitStats`](orbitscope_core::OrbitStats).
    pub fn needs_statistics(self) -> bool {
        matches!(
            self,
            Self::Curvature
                | Self::Striping
                | Self::OrbitTrap
                | Self::GaussianInteger
                | Self::AverageDistance
        )
    }
}

/// Transfer curve from the normalized value to the map position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScalingMode {
    #[default]
    Linear,
    Log,
    Exp,
    Sqrt,
    /// Position by percentile among all pixels colored by the same map.
    RankOrder,
}

/// Values outside `[min, max]` are clamped before normalization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClipRange {
    pub min: f64,
    pub max: f64,
}

/// How one class of pixels is turned into color.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapSettings {
    pub map: BuiltinMap,
    pub method: ColoringMethod,
    pub scaling: ScalingMode,
    /// `None` clips to the range observed in the buffer.
    pub clip: Option<ClipRange>,
    /// Times the map is traversed across the normalized range.
    pub repetition: f64,
    /// Shift of the map position, in map lengths.
    pub offset: f64,
    /// Interpolate between map entries instead of taking the nearest one.
    pub continuous: bool,
    pub fixed_color: [u8; 3],
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            map: BuiltinMap::Classic,
            method: ColoringMethod::Iterations,
            scaling: ScalingMode::Linear,
            clip: None,
            repetition: 1.0,
            offset: 0.0,
            continuous: true,
            fixed_color: [0, 0, 0],
        }
    }
}

impl MapSettings {
    pub fn fixed(color: [u8; 3]) -> Self {
        Self {
            method: ColoringMethod::FixedColor,
            fixed_color: color,
            ..Self::default()
        }
    }
}

/// Everything the colorizer needs besides the iteration data.
///
/// Changing these never requires recomputing orbits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColoringParameters {
    pub interior: MapSettings,
    pub exterior: MapSettings,
    /// Used instead of `exterior` for odd iteration bands when
    /// `tiger_stripes` is set.
    pub tiger: MapSettings,
    pub tiger_stripes: bool,
    /// Use the continuous iteration count instead of the integer one.
    pub smooth: bool,
    /// Color of cells no pass has written.
    pub background: [u8; 3],
    pub filters: Vec<Filter>,
}

impl Default for ColoringParameters {
    fn default() -> Self {
        Self {
            interior: MapSettings::fixed([0, 0, 0]),
            exterior: MapSettings::default(),
            tiger: MapSettings {
                map: BuiltinMap::Grayscale,
                ..MapSettings::default()
            },
            tiger_stripes: false,
            smooth: true,
            background: [0, 0, 0],
            filters: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Group {
    Interior = 0,
    Exterior = 1,
    Tiger = 2,
}

#[derive(Debug, Clone, Default)]
struct GroupPlan {
    min: f64,
    max: f64,
    /// Percentile per cell index for rank-order scaling; unused cells hold 0.
    ranks: Option<Vec<f64>>,
}

/// Buffer-wide data gathered once before coloring: the observed value
/// ranges, rank-order tables and the number of distinct roots.
#[derive(Debug, Clone, Default)]
pub struct ColorPlan {
    groups: [GroupPlan; 3],
    root_count: u32,
}

impl ColorPlan {
    pub fn root_count(&self) -> u32 {
        self.root_count
    }

    /// Rank percentile of the exterior cell at `index`, when rank-order
    /// scaling is active.
    pub fn exterior_rank(&self, index: usize) -> Option<f64> {
        self.groups[Group::Exterior as usize]
            .ranks
            .as_ref()
            .and_then(|r| r.get(index).copied())
    }
}

// ---------------------------------------------------------------------------
// Colorizer
// ---------------------------------------------------------------------------

/// Maps iteration results to pixels.
///
/// Coloring is split into a reduce phase ([`prepare`](Self::prepare)), run
/// once per buffer, and a pure per-pixel phase ([`color`](Self::color)).
#[derive(Debug, Clone)]
pub struct Colorizer {
    params: ColoringParameters,
    maps: [ColorMap; 3],
}

impl Colorizer {
    pub fn new(params: &ColoringParameters) -> Self {
        Self {
            params: params.clone(),
            maps: [
                ColorMap::builtin(params.interior.map),
                ColorMap::builtin(params.exterior.map),
                ColorMap::builtin(params.tiger.map),
            ],
        }
    }

    pub fn params(&self) -> &ColoringParameters {
        &self.params
    }

    fn settings(&self, group: Group) -> &MapSettings {
        match group {
            Group::Interior => &self.params.interior,
            Group::Exterior => &self.params.exterior,
            Group::Tiger => &self.params.tiger,
        }
    }

    fn group(&self, result: &IterationResult) -> Group {
        match result.classification {
            Classification::Interior => Group::Interior,
            _ if self.params.tiger_stripes && result.iterations % 2 == 1 => Group::Tiger,
            _ => Group::Exterior,
        }
    }

    /// The quantity `settings.method` reads from `result`, before clipping.
    fn raw_value(&self, settings: &MapSettings, result: &IterationResult) -> f64 {
        let iterations = if self.params.smooth {
            result.smooth_iterations
        } else {
            result.iterations as f64
        };
        let z = result.final_z;
        let stat = |f: fn(&orbitscope_core::OrbitStats) -> f64| {
            result.stats.as_ref().map_or(iterations, f)
        };
        let v = match settings.method {
            ColoringMethod::FixedColor => 0.0,
            ColoringMethod::Iterations => iterations,
            ColoringMethod::Real => z.re,
            ColoringMethod::Imaginary => z.im,
            ColoringMethod::Modulus => z.norm(),
            ColoringMethod::Angle => (z.arg() / TAU).rem_euclid(1.0),
            ColoringMethod::Curvature => stat(|s| s.curvature),
            ColoringMethod::Striping => stat(|s| s.stripe),
            ColoringMethod::OrbitTrap => stat(|s| s.trap_distance),
            ColoringMethod::GaussianInteger => stat(|s| s.gaussian_distance),
            ColoringMethod::AverageDistance => stat(|s| s.average_distance),
            ColoringMethod::Lyapunov => result.lyapunov,
            ColoringMethod::RootIndex => result.root().map_or(0.0, f64::from),
        };
        if v.is_finite() {
            v
        } else {
            0.0
        }
    }

    /// Bounds values are clipped and normalized against.
    fn clip_range(&self, settings: &MapSettings, plan: &GroupPlan) -> (f64, f64) {
        match settings.clip {
            Some(c) if c.max > c.min => (c.min, c.max),
            _ => (plan.min, plan.max),
        }
    }

    /// Reduce phase: observed ranges, rank tables and root count.
    pub fn prepare(&self, buffer: &IterationBuffer) -> ColorPlan {
        let mut plan = ColorPlan::default();
        for g in plan.groups.iter_mut() {
            g.min = f64::INFINITY;
            g.max = f64::NEG_INFINITY;
        }

        let mut members: [Vec<(usize, f64)>; 3] = Default::default();
        for (index, result) in buffer.cells().iter().enumerate() {
            let Some(result) = result else { continue };
            if let Some(root) = result.root() {
                plan.root_count = plan.root_count.max(root + 1);
            }
            let group = self.group(result);
            let v = self.raw_value(self.settings(group), result);
            let gp = &mut plan.groups[group as usize];
            gp.min = gp.min.min(v);
            gp.max = gp.max.max(v);
            if self.settings(group).scaling == ScalingMode::RankOrder {
                members[group as usize].push((index, v));
            }
        }

        for (group, mut cells) in [Group::Interior, Group::Exterior, Group::Tiger]
            .into_iter()
            .zip(members)
        {
            let gp = &mut plan.groups[group as usize];
            if !gp.min.is_finite() {
                gp.min = 0.0;
                gp.max = 0.0;
            }
            if self.settings(group).scaling != ScalingMode::RankOrder {
                continue;
            }
            let (lo, hi) = self.clip_range(self.settings(group), gp);
            for (_, v) in cells.iter_mut() {
                *v = v.clamp(lo, hi.max(lo));
            }
            gp.ranks = Some(rank_table(&mut cells, buffer.len()));
        }

        debug!(
            root_count = plan.root_count,
            exterior_min = plan.groups[Group::Exterior as usize].min,
            exterior_max = plan.groups[Group::Exterior as usize].max,
            "Prepared color plan"
        );
        plan
    }

    /// Color one cell. `index` is the cell's position in the buffer.
    pub fn color(&self, index: usize, result: Option<&IterationResult>, plan: &ColorPlan) -> [u8; 4] {
        let Some(result) = result else {
            let [r, g, b] = self.params.background;
            return [r, g, b, 255];
        };
        let group = self.group(result);
        let settings = self.settings(group);
        if settings.method == ColoringMethod::FixedColor {
            let [r, g, b] = settings.fixed_color;
            return [r, g, b, 255];
        }

        let gp = &plan.groups[group as usize];
        let t = match (&gp.ranks, settings.scaling) {
            (Some(ranks), ScalingMode::RankOrder) => ranks.get(index).copied().unwrap_or(0.0),
            (_, scaling) => {
                let (lo, hi) = self.clip_range(settings, gp);
                let v = self.raw_value(settings, result).clamp(lo, hi.max(lo));
                let t = if hi > lo { (v - lo) / (hi - lo) } else { 0.0 };
                scale(t, scaling)
            }
        };

        let mut pos = t * settings.repetition + settings.offset;
        if let (Some(root), true) = (result.root(), settings.method != ColoringMethod::RootIndex) {
            if plan.root_count > 0 {
                pos += root as f64 / plan.root_count as f64;
            }
        }

        let map = &self.maps[group as usize];
        if settings.continuous {
            map.continuous(pos)
        } else {
            map.discrete(pos)
        }
    }

    /// Colorize an entire iteration buffer into an RGBA pixel buffer,
    /// then run the filter chain.
    pub fn colorize(&self, buffer: &IterationBuffer) -> RenderBuffer {
        let plan = self.prepare(buffer);
        let mut pixels = vec![0u8; buffer.len() * 4];
        pixels
            .par_chunks_mut(4)
            .zip(buffer.cells().par_iter())
            .enumerate()
            .for_each(|(index, (pixel, cell))| {
                pixel.copy_from_slice(&self.color(index, cell.as_ref(), &plan));
            });
        let mut out = RenderBuffer {
            width: buffer.width(),
            height: buffer.height(),
            pixels,
        };
        apply_chain(&self.params.filters, &mut out);
        out
    }
}

impl Default for Colorizer {
    fn default() -> Self {
        Self::new(&ColoringParameters::default())
    }
}

#[inline]
fn scale(t: f64, mode: ScalingMode) -> f64 {
    let t = t.clamp(0.0, 1.0);
    match mode {
        ScalingMode::Linear | ScalingMode::RankOrder => t,
        ScalingMode::Log => (1.0 + 9.0 * t).log10(),
        ScalingMode::Exp => (10f64.powf(t) - 1.0) / 9.0,
        ScalingMode::Sqrt => t.sqrt(),
    }
}

/// Percentile `rank / (N − 1)` per cell index. Equal values keep scan
/// order, so they receive increasing ranks.
fn rank_table(cells: &mut [(usize, f64)], len: usize) -> Vec<f64> {
    cells.sort_by(|a, b| a.1.total_cmp(&b.1));
    let mut ranks = vec![0.0; len];
    let denom = cells.len().saturating_sub(1).max(1) as f64;
    for (rank, &(index, _)) in cells.iter().enumerate() {
        ranks[index] = rank as f64 / denom;
    }
    ranks
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbitscope_core::{Complex, OrbitStats, ScreenSize};

    fn escaped(iterations: u32, smooth: f64) -> IterationResult {
        IterationResult {
            classification: Classification::Escaped,
            iterations,
            smooth_iterations: smooth,
            final_z: Complex::new(3.0, 4.0),
            lyapunov: 0.0,
            stats: None,
        }
    }

    fn buffer_of(cells: Vec<Option<IterationResult>>) -> IterationBuffer {
        let n = cells.len() as u32;
        IterationBuffer::from_cells(n, 1, cells).unwrap()
    }

    #[test]
    fn unwritten_cell_uses_background() {
        let params = ColoringParameters {
            background: [10, 20, 30],
            ..Default::default()
        };
        let c = Colorizer::new(&params);
        let plan = ColorPlan::default();
        assert_eq!(c.color(0, None, &plan), [10, 20, 30, 255]);
    }

    #[test]
    fn interior_uses_fixed_color() {
        let c = Colorizer::default();
        let buf = buffer_of(vec![Some(IterationResult::interior(256, Complex::ZERO))]);
        let plan = c.prepare(&buf);
        assert_eq!(c.color(0, buf.cells()[0].as_ref(), &plan), [0, 0, 0, 255]);
    }

    #[test]
    fn smooth_and_integer_values_differ() {
        let cells = vec![Some(escaped(0, 0.0)), Some(escaped(20, 20.8)), Some(escaped(50, 50.0))];
        let buf = buffer_of(cells);
        let smooth = Colorizer::new(&ColoringParameters::default());
        let raw = Colorizer::new(&ColoringParameters {
            smooth: false,
            ..Default::default()
        });
        let a = smooth.color(1, buf.cells()[1].as_ref(), &smooth.prepare(&buf));
        let b = raw.color(1, buf.cells()[1].as_ref(), &raw.prepare(&buf));
        assert_ne!(a, b);
    }

    #[test]
    fn explicit_clip_range_is_honoured() {
        let mut params = ColoringParameters::default();
        params.exterior.map = BuiltinMap::Grayscale;
        params.exterior.clip = Some(ClipRange { min: 0.0, max: 10.0 });
        params.exterior.repetition = 0.5;
        let c = Colorizer::new(&params);
        let buf = buffer_of(vec![Some(escaped(5, 5.0)), Some(escaped(500, 500.0))]);
        let plan = c.prepare(&buf);
        let low = c.color(0, buf.cells()[0].as_ref(), &plan);
        let high = c.color(1, buf.cells()[1].as_ref(), &plan);
        // 500 clips to 10 → position 0.5, 5 → position 0.25.
        assert!(high[0] > low[0]);
        assert_eq!(high, ColorMap::builtin(BuiltinMap::Grayscale).continuous(0.5));
    }

    #[test]
    fn rank_order_is_monotone_with_stable_ties() {
        let mut params = ColoringParameters::default();
        params.exterior.scaling = ScalingMode::RankOrder;
        params.exterior.map = BuiltinMap::Grayscale;
        params.exterior.repetition = 0.999;
        let c = Colorizer::new(&params);
        let buf = buffer_of(vec![
            Some(escaped(30, 30.0)),
            Some(escaped(10, 10.0)),
            Some(IterationResult::interior(256, Complex::ZERO)),
            Some(escaped(10, 10.0)),
            Some(escaped(20, 20.0)),
        ]);
        let plan = c.prepare(&buf);
        let r = |i| plan.exterior_rank(i).unwrap();
        assert_eq!(r(1), 0.0);
        assert!((r(3) - 1.0 / 3.0).abs() < 1e-12);
        assert!((r(4) - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(r(0), 1.0);
    }

    #[test]
    fn single_rank_member_maps_to_zero() {
        let mut cells = vec![(4usize, 7.0)];
        let ranks = rank_table(&mut cells, 5);
        assert_eq!(ranks[4], 0.0);
    }

    #[test]
    fn tiger_stripes_use_tiger_map_on_odd_bands() {
        let mut params = ColoringParameters::default();
        params.tiger_stripes = true;
        params.tiger = MapSettings::fixed([255, 0, 255]);
        let c = Colorizer::new(&params);
        let buf = buffer_of(vec![Some(escaped(3, 3.2)), Some(escaped(4, 4.2))]);
        let plan = c.prepare(&buf);
        assert_eq!(c.color(0, buf.cells()[0].as_ref(), &plan), [255, 0, 255, 255]);
        assert_ne!(c.color(1, buf.cells()[1].as_ref(), &plan), [255, 0, 255, 255]);
    }

    #[test]
    fn statistics_methods_fall_back_to_iterations() {
        let mut params = ColoringParameters::default();
        params.exterior.method = ColoringMethod::Striping;
        let c = Colorizer::new(&params);
        let plain = escaped(7, 7.5);
        assert_eq!(c.raw_value(&params.exterior, &plain), 7.5);

        let with_stats = IterationResult {
            stats: Some(OrbitStats {
                average_distance: 0.1,
                average_angle: 0.2,
                curvature: 0.3,
                stripe: 0.4,
                trap_distance: 0.5,
                gaussian_distance: 0.6,
            }),
            ..plain
        };
        assert_eq!(c.raw_value(&params.exterior, &with_stats), 0.4);
    }

    #[test]
    fn converged_roots_shift_the_map() {
        let mut params = ColoringParameters::default();
        params.exterior.clip = Some(ClipRange { min: 0.0, max: 100.0 });
        let c = Colorizer::new(&params);
        let root = |r| IterationResult {
            classification: Classification::Converged { root: Some(r) },
            ..escaped(6, 6.0)
        };
        let buf = buffer_of(vec![Some(root(0)), Some(root(1)), Some(root(2))]);
        let plan = c.prepare(&buf);
        assert_eq!(plan.root_count(), 3);
        let a = c.color(0, buf.cells()[0].as_ref(), &plan);
        let b = c.color(1, buf.cells()[1].as_ref(), &plan);
        assert_ne!(a, b);
    }

    #[test]
    fn colorize_produces_correct_size() {
        let buf = IterationBuffer::new(ScreenSize::new(64, 48).unwrap());
        let rb = Colorizer::default().colorize(&buf);
        assert_eq!(rb.width, 64);
        assert_eq!(rb.height, 48);
        assert_eq!(rb.pixels.len(), 64 * 48 * 4);
    }

    #[test]
    fn scaling_curves_fix_endpoints() {
        for mode in [ScalingMode::Linear, ScalingMode::Log, ScalingMode::Exp, ScalingMode::Sqrt] {
            assert!(scale(0.0, mode).abs() < 1e-12, "{mode:?}");
            assert!((scale(1.0, mode) - 1.0).abs() < 1e-12, "{mode:?}");
        }
        assert!(scale(0.25, ScalingMode::Log) > 0.25);
        assert!(scale(0.25, ScalingMode::Exp) < 0.25);
    }

    #[test]
    fn parameters_fill_missing_fields_with_defaults() {
        let p: ColoringParameters = serde_json::from_str(r#"{"smooth": false}"#).unwrap();
        assert!(!p.smooth);
        assert_eq!(p.exterior, MapSettings::default());
    }
}
