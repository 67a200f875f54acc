use serde::{Deserialize, Serialize};

const LUT_SIZE: usize = 256;

/// The color maps shipped with the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BuiltinMap {
    #[default]
    Classic,
    Fire,
    Ocean,
    Neon,
    Grayscale,
}

impl BuiltinMap {
    pub const ALL: [BuiltinMap; 5] = [
        BuiltinMap::Classic,
        BuiltinMap::Fire,
        BuiltinMap::Ocean,
        BuiltinMap::Neon,
        BuiltinMap::Grayscale,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Classic => "Classic",
            Self::Fire => "Fire",
            Self::Ocean => "Ocean",
            Self::Neon => "Neon",
            Self::Grayscale => "Grayscale",
        }
    }

    fn stops(self) -> &'static [(f64, [u8; 3])] {
        match self {
            Self::Classic => &[
                (0.0, [0, 7, 100]),
                (0.16, [32, 107, 203]),
                (0.42, [237, 255, 255]),
                (0.6425, [255, 170, 0]),
                (0.8575, [0, 2, 0]),
                (1.0, [0, 7, 100]),
            ],
            Self::Fire => &[
                (0.0, [0, 0, 0]),
                (0.25, [128, 0, 0]),
                (0.5, [255, 128, 0]),
                (0.75, [255, 255, 0]),
                (1.0, [255, 255, 255]),
            ],
            Self::Ocean => &[
                (0.0, [0, 0, 30]),
                (0.3, [0, 50, 120]),
                (0.6, [0, 150, 200]),
                (0.8, [100, 220, 255]),
                (1.0, [240, 255, 255]),
            ],
            Self::Neon => &[
                (0.0, [10, 0, 20]),
                (0.2, [80, 0, 150]),
                (0.4, [200, 0, 200]),
                (0.6, [0, 200, 255]),
                (0.8, [0, 255, 100]),
                (1.0, [10, 0, 20]),
            ],
            Self::Grayscale => &[(0.0, [0, 0, 0]), (1.0, [255, 255, 255])],
        }
    }
}

/// A ring of RGBA colors sampled by a position in `[0, 1)`.
///
/// Built once per coloring change from gradient stops into a fixed-size
/// lookup table.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorMap {
    pub name: &'static str,
    colors: Vec<[u8; 4]>,
}

impl ColorMap {
    pub fn builtin(map: BuiltinMap) -> Self {
        Self {
            name: map.name(),
            colors: gradient_lut(map.stops()),
        }
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Interpolated lookup; `t` wraps around the ring.
    pub fn continuous(&self, t: f64) -> [u8; 4] {
        let len = self.colors.len() as f64;
        let idx = (t * len).rem_euclid(len);
        let lo = idx.floor() as usize % self.colors.len();
        let hi = (lo + 1) % self.colors.len();
        let frac = idx - idx.floor();
        lerp_color(self.colors[lo], self.colors[hi], frac)
    }

    /// Nearest-entry lookup; `t` wraps around the ring.
    pub fn discrete(&self, t: f64) -> [u8; 4] {
        let len = self.colors.len() as f64;
        let idx = (t * len).round().rem_euclid(len) as usize % self.colors.len();
        self.colors[idx]
    }
}

impl Default for ColorMap {
    fn default() -> Self {
        Self::builtin(BuiltinMap::Classic)
    }
}

fn lerp_color(a: [u8; 4], b: [u8; 4], t: f64) -> [u8; 4] {
    let inv = 1.0 - t;
    [
        (a[0] as f64 * inv + b[0] as f64 * t) as u8,
        (a[1] as f64 * inv + b[1] as f64 * t) as u8,
        (a[2] as f64 * inv + b[2] as f64 * t) as u8,
        255,
    ]
}

/// Build a gradient LUT by interpolating between color stops.
fn gradient_lut(stops: &[(f64, [u8; 3])]) -> Vec<[u8; 4]> {
    (0..LUT_SIZE)
        .map(|i| {
            let t = i as f64 / LUT_SIZE as f64;
            let mut lo = 0;
            for (j, &(pos, _)) in stops.iter().enumerate() {
                if pos <= t {
                    lo = j;
                }
            }
            let hi = (lo + 1).min(stops.len() - 1);
            let (lo_t, lo_c) = stops[lo];
            let (hi_t, hi_c) = stops[hi];
            let frac = if (hi_t - lo_t).abs() < 1e-10 {
                0.0
            } else {
                ((t - lo_t) / (hi_t - lo_t)).clamp(0.0, 1.0)
            };
            let a = [lo_c[0], lo_c[1], lo_c[2], 255];
            let b = [hi_c[0], hi_c[1], hi_c[2], 255];
            lerp_color(a, b, frac)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_maps_have_correct_size() {
        for m in BuiltinMap::ALL {
            assert_eq!(ColorMap::builtin(m).len(), LUT_SIZE);
        }
    }

    #[test]
    fn lookup_wraps() {
        let m = ColorMap::default();
        assert_eq!(m.continuous(0.25), m.continuous(1.25));
        assert_eq!(m.discrete(0.25), m.discrete(-0.75));
    }

    #[test]
    fn discrete_hits_table_entries() {
        let m = ColorMap::builtin(BuiltinMap::Grayscale);
        // Halfway between entries 10 and 11 rounds to 11.
        let t = 10.5 / LUT_SIZE as f64;
        assert_eq!(m.discrete(t), m.colors[11]);
        assert_ne!(m.continuous(t), m.discrete(t));
    }

    #[test]
    fn grayscale_starts_black() {
        let m = ColorMap::builtin(BuiltinMap::Grayscale);
        assert_eq!(m.continuous(0.0), [0, 0, 0, 255]);
    }
}
