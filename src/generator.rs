use crate::error::{AstreError, AstreResult};
use crate::points::PointsFile;
use clap::Args;
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;
use tracing::{debug, info};

/// Restarts allowed per trajectory before giving up on the scene.
const MAX_RESTARTS: usize = 10_000;

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneParams {
    /// Number of frames
    #[arg(short = 'K', long, default_value_t = 10)]
    pub frames: usize,

    /// Number of trajectories
    #[arg(short = 'n', long, default_value_t = 5)]
    pub trajectories: usize,

    #[arg(long, default_value_t = 100)]
    pub width: i64,
    #[arg(long, default_value_t = 100)]
    pub height: i64,

    // === MOTION ===
    /// Deviation of the speed amplitude update
    #[arg(short = 'a', long, default_value_t = 0.2)]
    pub accel_sigma: f32,
    /// Deviation of the speed orientation update
    #[arg(short = 'o', long, default_value_t = 0.2)]
    pub orientation_sigma: f32,
    #[arg(short = 'v', long, default_value_t = 5.0)]
    pub mean_speed: f32,
    #[arg(short = 'V', long, default_value_t = 0.5)]
    pub speed_sigma: f32,

    // === NOISE ===
    /// Noise points per frame
    #[arg(short = 'N', long, default_value_t = 0)]
    pub noise: usize,
    /// Draw the noise count of each frame uniformly in [0, noise]
    #[arg(long, default_value_t = false)]
    pub random_noise: bool,

    /// Trajectories leaving the image are cut and a new one enters
    #[arg(long, default_value_t = false)]
    pub allow_exit: bool,

    /// First positions are drawn on the image border instead of uniformly
    #[arg(long, default_value_t = false)]
    pub border_start: bool,

    #[arg(long)]
    pub seed: Option<u64>,
}

impl Default for SceneParams {
    fn default() -> Self {
        Self {
            frames: 10,
            trajectories: 5,
            width: 100,
            height: 100,
            accel_sigma: 0.2,
            orientation_sigma: 0.2,
            mean_speed: 5.0,
            speed_sigma: 0.5,
            noise: 0,
            random_noise: false,
            allow_exit: false,
            border_start: false,
            seed: None,
        }
    }
}

pub struct GeneratedScene {
    pub points: PointsFile,
    pub trajectories: usize,
    pub max_speed: f32,
    pub max_accel: f32,
}

struct Mover {
    px: f32,
    py: f32,
    speed: f32,
    heading: f32,
}

struct SceneBuilder<'a> {
    params: &'a SceneParams,
    rng: fastrand::Rng,
    points: PointsFile,
    next_id: usize,
    max_speed: f32,
    max_accel: f32,
}

impl<'a> SceneBuilder<'a> {
    /// Two independent normal deviates (Box-Muller).
    fn gaussian(&mut self, mu: f32, sigma: f32) -> (f32, f32) {
        let r = 1.0 - self.rng.f32();
        let t = self.rng.f32() * TAU;
        let m = sigma * (-2.0 * r.ln()).sqrt();
        (m * t.cos() + mu, m * t.sin() + mu)
    }

    fn spawn(&mut self, on_border: bool) -> Mover {
        let (w, h) = (self.params.width as f32, self.params.height as f32);
        let mut px = self.rng.f32() * w;
        let mut py = self.rng.f32() * h;
        if on_border {
            match self.rng.u8(0..4) {
                0 => py = 0.0,
                1 => py = h - 1.0,
                2 => px = 0.0,
                _ => px = w - 1.0,
            }
        }
        let speed = self.gaussian(self.params.mean_speed, self.params.speed_sigma).0;
        let heading = self.rng.f32() * TAU;
        Mover {
            px,
            py,
            speed,
            heading,
        }
    }

    fn advance(&mut self, m: &mut Mover) {
        m.px += m.speed * m.heading.cos();
        m.py += m.speed * m.heading.sin();
        m.speed = self.gaussian(m.speed, self.params.accel_sigma).0;
        m.heading = self.gaussian(m.heading, self.params.orientation_sigma).0;
    }

    fn is_free(&self, k: usize, x: f32, y: f32) -> bool {
        (0..self.points.n_points(k)).all(|i| {
            let (px, py) = self.points.xy(k, i);
            (px - x as f64).abs() >= 1e-4 || (py - y as f64).abs() >= 1e-4
        })
    }

    fn in_image(&self, x: f32, y: f32) -> bool {
        x >= 0.0 && x < self.params.width as f32 && y >= 0.0 && y < self.params.height as f32
    }

    fn commit(&mut self, start: usize, track: &[(f32, f32)]) -> AstreResult<()> {
        let id = self.next_id as f64;
        for (offset, &(x, y)) in track.iter().enumerate() {
            self.points.push_point(start + offset, &[x as f64, y as f64, id])?;
        }
        for w in track.windows(2) {
            let (dx, dy) = (w[1].0 - w[0].0, w[1].1 - w[0].1);
            self.max_speed = self.max_speed.max((dx * dx + dy * dy).sqrt());
        }
        for w in track.windows(3) {
            let ax = w[2].0 - 2.0 * w[1].0 + w[0].0;
            let ay = w[2].1 - 2.0 * w[1].1 + w[0].1;
            self.max_accel = self.max_accel.max((ax * ax + ay * ay).sqrt());
        }
        self.next_id += 1;
        Ok(())
    }

    /// One trajectory, possibly cut in several when it may leave the image.
    fn trajectory(&mut self) -> AstreResult<()> {
        let n_frames = self.params.frames;
        let mut start = 0;
        let mut restarts = 0;

        'restart: loop {
            if restarts > MAX_RESTARTS {
                return Err(AstreError::Validation(format!(
                    "could not place trajectory {} after {} attempts",
                    self.next_id, MAX_RESTARTS
                )));
            }
            restarts += 1;

            if n_frames < start + 3 {
                return Ok(());
            }
            let mut mover = self.spawn(start > 0 || self.params.border_start);
            let mut track: Vec<(f32, f32)> = Vec::with_capacity(n_frames - start);

            while start + track.len() < n_frames {
                let k = start + track.len();
                self.advance(&mut mover);
                let ix = (mover.px + 0.5).trunc();
                let iy = (mover.py + 0.5).trunc();

                if !self.is_free(k, ix, iy) {
                    debug!("Location taken in frame {}, restarting trajectory", k);
                    continue 'restart;
                }
                if !self.in_image(ix, iy) {
                    if self.params.allow_exit && track.len() >= 3 {
                        self.commit(start, &track)?;
                        start = k;
                    }
                    continue 'restart;
                }
                track.push((ix, iy));
            }

            return self.commit(start, &track);
        }
    }

    fn noise(&mut self) -> AstreResult<()> {
        let (w, h) = (self.params.width, self.params.height);
        for k in 0..self.params.frames {
            let count = if self.params.random_noise {
                self.rng.usize(0..=self.params.noise)
            } else {
                self.params.noise
            };
            for _ in 0..count {
                let mut placed = false;
                for _ in 0..MAX_RESTARTS {
                    let x = self.rng.i64(0..w) as f32;
                    let y = self.rng.i64(0..h) as f32;
                    if self.is_free(k, x, y) {
                        self.points.push_point(k, &[x as f64, y as f64, -1.0])?;
                        placed = true;
                        break;
                    }
                }
                if !placed {
                    return Err(AstreError::Validation(format!(
                        "frame {} is too crowded for {} noise points",
                        k, count
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Draws smooth random trajectories plus uniform noise.
pub fn generate(params: &SceneParams) -> AstreResult<GeneratedScene> {
    if params.frames == 0 || params.width <= 0 || params.height <= 0 {
        return Err(AstreError::Config(
            "frames, width and height must be positive".into(),
        ));
    }
    let sigmas = [
        params.accel_sigma,
        params.orientation_sigma,
        params.mean_speed,
        params.speed_sigma,
    ];
    if sigmas.iter().any(|s| !(*s >= 0.0)) {
        return Err(AstreError::Config(
            "speeds and deviations must be non-negative".into(),
        ));
    }

    let tags = ["x", "y", "t"].iter().map(|t| Some(t.to_string())).collect();
    let mut builder = SceneBuilder {
        params,
        rng: params.seed.map_or_else(fastrand::Rng::new, fastrand::Rng::with_seed),
        points: PointsFile::new(params.width, params.height, tags, params.frames),
        next_id: 0,
        max_speed: 0.0,
        max_accel: 0.0,
    };

    for _ in 0..params.trajectories {
        builder.trajectory()?;
    }
    builder.noise()?;

    // Point order must not leak the trajectory order
    for k in 0..params.frames {
        builder.points.shuffle_frame(k, &mut builder.rng);
    }

    info!(
        "Generated {} trajectories over {} frames (max speed {:.2}, max accel {:.2})",
        builder.next_id, params.frames, builder.max_speed, builder.max_accel
    );

    Ok(GeneratedScene {
        points: builder.points,
        trajectories: builder.next_id,
        max_speed: builder.max_speed,
        max_accel: builder.max_accel,
    })
}
