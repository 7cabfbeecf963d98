use std::f64::consts::PI;

/// Radius up to which exact lattice counts are tabulated.
pub const DISCRETE_AREA_RADIUS: i64 = 50;

/// Two radii closer than this belong to the same lattice layer.
const LAYER_EPS: f64 = 1e-5;

/// Number of lattice points inside the disc of radius `|(x, y)|`.
///
/// Only the first octant is enumerated; the other seven follow by symmetry.
/// Beyond the tabulated radius the continuous `pi * r^2` is used instead.
#[derive(Debug, Clone)]
pub struct DiscreteArea {
    max_r: i64,
    data: Vec<f64>,
}

impl DiscreteArea {
    pub fn new(max_r: i64) -> Self {
        let max_r = max_r.max(0);
        let side = (max_r + 1) as usize;
        let mut data = vec![-1.0; side * side];

        // 1. First octant, sorted by exact radius
        let mut pixels: Vec<(i64, i64, f64)> = (0..=max_r)
            .flat_map(|x| (0..=x).map(move |y| (x, y, ((x * x + y * y) as f64).sqrt())))
            .filter(|&(_, _, rad)| rad <= max_r as f64 + LAYER_EPS)
            .collect();
        pixels.sort_by(|a, b| a.2.total_cmp(&b.2));

        // 2. Accumulate layer by layer; a whole layer shares the same area
        let mut area = 0.0;
        let mut i = 0;
        while i < pixels.len() {
            let rad0 = pixels[i].2;
            let mut end = i;
            while end < pixels.len() && pixels[end].2 - rad0 < LAYER_EPS {
                let (x, y, _) = pixels[end];
                area += if x == 0 && y == 0 {
                    1.0
                } else if y == 0 || x == y {
                    4.0
                } else {
                    8.0
                };
                end += 1;
            }
            for &(x, y, _) in &pixels[i..end] {
                data[x as usize * side + y as usize] = area;
                data[y as usize * side + x as usize] = area;
            }
            i = end;
        }

        Self { max_r, data }
    }

    pub fn max_r(&self) -> i64 {
        self.max_r
    }

    #[inline(always)]
    pub fn area(&self, x: i64, y: i64) -> f64 {
        let d_sq = x.saturating_mul(x).saturating_add(y.saturating_mul(y));
        if d_sq > self.max_r * self.max_r {
            return PI * d_sq as f64;
        }
        let side = (self.max_r + 1) as usize;
        self.data[x.unsigned_abs() as usize * side + y.unsigned_abs() as usize]
    }
}

impl Default for DiscreteArea {
    fn default() -> Self {
        Self::new(DISCRETE_AREA_RADIUS)
    }
}

/// Probability that a uniform point falls in the prediction disc of `z`.
///
/// `x` is the newest point, `y` the one before (`h1` frames missing in
/// between) and `z` the oldest (`h2` frames missing between `z` and `y`).
/// The hole-adjusted second difference is rounded to the lattice and its
/// disc area normalized by `image_area`.
#[inline(always)]
pub fn criterion(
    disc: &DiscreteArea,
    x: [f32; 2],
    y: [f32; 2],
    z: [f32; 2],
    h1: usize,
    h2: usize,
    image_area: f64,
) -> f32 {
    let f1 = h1 as f32 + 1.0;
    let f2 = h2 as f32 + 1.0;
    let ax = ((x[0] - y[0]) / f1 + (z[0] - y[0]) / f2).abs();
    let ay = ((x[1] - y[1]) / f1 + (z[1] - y[1]) / f2).abs();
    let ix = (ax + 0.5) as i64;
    let iy = (ay + 0.5) as i64;
    (disc.area(ix, iy) / image_area) as f32
}

/// Per-frame normalization areas, optionally cropped to the points' bounding box.
pub fn image_areas(frames: &[Vec<[f32; 2]>], width: i64, height: i64, auto_crop: bool) -> Vec<f64> {
    let full = width as f64 * height as f64;
    frames
        .iter()
        .map(|pts| {
            if !auto_crop {
                return full;
            }
            let bbox = pts.iter().fold(None, |acc: Option<[f64; 4]>, p| {
                let (px, py) = (p[0] as f64, p[1] as f64);
                Some(match acc {
                    None => [px, px, py, py],
                    Some([x0, x1, y0, y1]) => [x0.min(px), x1.max(px), y0.min(py), y1.max(py)],
                })
            });
            match bbox {
                Some([x0, x1, y0, y1]) => ((x1 - x0) * (y1 - y0)).max(1.0),
                None => 1.0,
            }
        })
        .collect()
}
