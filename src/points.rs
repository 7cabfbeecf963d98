use crate::error::{AstreError, AstreResult};
use crate::trajectory::{Step, Trajectory, TrajectoryStore};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

pub const POINTS_FILE_TYPE: &str = "PointsFile v.1.0";

/// Tag of the column appended by the detector.
pub const TRAJECTORY_TAG: &str = "t";

const FRAME_TAG: &str = "f";

/// A sequence of frames, each holding fixed-width numeric points.
///
/// The frame number is not stored as a field: frame `k` of this structure
/// is frame `k + first_frame` of the file. Field 0 is `x`, field 1 is `y`.
#[derive(Debug, Clone, PartialEq)]
pub struct PointsFile {
    pub headers: Vec<(String, String)>,
    pub width: i64,
    pub height: i64,
    pub uid: i64,
    pub first_frame: i64,
    tags: Vec<Option<String>>,
    frames: Vec<Vec<f64>>,
}

impl PointsFile {
    pub fn new(width: i64, height: i64, tags: Vec<Option<String>>, n_frames: usize) -> Self {
        Self {
            headers: Vec::new(),
            width,
            height,
            uid: fresh_uid(),
            first_frame: 0,
            tags,
            frames: vec![Vec::new(); n_frames],
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> AstreResult<Self> {
        let content = fs::read_to_string(&path).map_err(|e| {
            AstreError::Format(format!(
                "Could not open points file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> AstreResult<Self> {
        let mut headers: Vec<(String, String)> = Vec::new();
        let mut in_data = false;
        let mut tags: Vec<Option<String>> = Vec::new();
        let mut rows: Vec<(i64, Vec<f64>)> = Vec::new();

        for (line_no, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let at = |msg: &str| AstreError::Format(format!("line {}: {}", line_no + 1, msg));

            if line == "DATA" {
                if in_data {
                    return Err(at("found a second DATA line"));
                }
                in_data = true;
                continue;
            }

            if !in_data {
                let (caption, value) = line
                    .split_once('=')
                    .ok_or_else(|| at("header line without '='"))?;
                let caption = caption.trim();
                if caption.is_empty() {
                    return Err(at("header line with an empty caption"));
                }
                headers.push((caption.to_string(), value.trim().to_string()));
                continue;
            }

            let mut line_tags = Vec::new();
            let mut values = Vec::new();
            for field in line.split_whitespace() {
                let (tag, value) = match field.split_once(':') {
                    Some((t, v)) => (Some(t.to_string()), v),
                    None => (None, field),
                };
                if value.is_empty()
                    || !value
                        .chars()
                        .all(|c| c.is_ascii_digit() || matches!(c, 'e' | 'E' | '+' | '-' | '.'))
                {
                    return Err(at(&format!("invalid value '{}'", value)));
                }
                let parsed: f64 = value
                    .parse()
                    .map_err(|_| at(&format!("invalid value '{}'", value)))?;
                line_tags.push(tag);
                values.push(parsed);
            }

            if rows.is_empty() {
                tags = line_tags;
            } else {
                if line_tags.len() != tags.len() {
                    return Err(at(&format!(
                        "expected {} fields, found {}",
                        tags.len(),
                        line_tags.len()
                    )));
                }
                if line_tags != tags {
                    return Err(at("field tags differ from the previous lines"));
                }
            }

            let frame = values[0];
            if frame.fract() != 0.0 {
                return Err(at(&format!("frame number {} is not an integer", frame)));
            }
            rows.push((frame as i64, values[1..].to_vec()));
        }

        let type_header = lookup(&headers, "type")
            .ok_or_else(|| AstreError::Format("missing 'type' header".into()))?;
        if type_header != POINTS_FILE_TYPE {
            return Err(AstreError::Format(format!(
                "unsupported type '{}' (expected '{}')",
                type_header, POINTS_FILE_TYPE
            )));
        }
        let width = int_header(&headers, "width")?;
        let height = int_header(&headers, "height")?;
        let uid = int_header(&headers, "uid")?;

        if !rows.is_empty() && tags.len() < 3 {
            return Err(AstreError::Format(format!(
                "points need at least 3 fields (frame, x, y), found {}",
                tags.len()
            )));
        }

        // Frame tag is implicit from here on.
        let tags: Vec<Option<String>> = tags.into_iter().skip(1).collect();

        let first_frame = rows.iter().map(|(f, _)| *f).min().unwrap_or(0);
        let n_frames = rows
            .iter()
            .map(|(f, _)| (f - first_frame) as usize + 1)
            .max()
            .unwrap_or(0);

        let mut frames = vec![Vec::new(); n_frames];
        for (frame, values) in rows {
            frames[(frame - first_frame) as usize].extend(values);
        }

        Ok(Self {
            headers,
            width,
            height,
            uid,
            first_frame,
            tags,
            frames,
        })
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> AstreResult<()> {
        fs::write(path, self.render())?;
        Ok(())
    }

    pub fn render(&self) -> String {
        let mut headers = self.headers.clone();
        set_in(&mut headers, "type", POINTS_FILE_TYPE.to_string());
        set_in(&mut headers, "uid", self.uid.to_string());
        set_in(&mut headers, "width", self.width.to_string());
        set_in(&mut headers, "height", self.height.to_string());

        let mut out = String::new();
        for (caption, content) in &headers {
            let _ = writeln!(out, "{} = {}", caption, content);
        }
        out.push_str("DATA\n");

        let n_fields = self.n_fields();
        for (k, frame) in self.frames.iter().enumerate() {
            for point in frame.chunks(n_fields.max(1)) {
                let _ = write!(out, "{}:{}", FRAME_TAG, format_g((k as i64 + self.first_frame) as f64));
                for (tag, value) in self.tags.iter().zip(point) {
                    match tag {
                        Some(t) => {
                            let _ = write!(out, " {}:{}", t, format_g(*value));
                        }
                        None => {
                            let _ = write!(out, " {}", format_g(*value));
                        }
                    }
                }
                out.push('\n');
            }
        }
        out
    }

    // --- Accessors ---

    pub fn n_frames(&self) -> usize {
        self.frames.len()
    }

    /// Number of data fields per point, frame excluded.
    pub fn n_fields(&self) -> usize {
        self.tags.len()
    }

    pub fn tags(&self) -> &[Option<String>] {
        &self.tags
    }

    pub fn n_points(&self, k: usize) -> usize {
        match self.n_fields() {
            0 => 0,
            n => self.frames[k].len() / n,
        }
    }

    pub fn max_points(&self) -> usize {
        (0..self.n_frames()).map(|k| self.n_points(k)).max().unwrap_or(0)
    }

    pub fn total_points(&self) -> usize {
        (0..self.n_frames()).map(|k| self.n_points(k)).sum()
    }

    #[inline(always)]
    pub fn point(&self, k: usize, i: usize) -> &[f64] {
        let n = self.n_fields();
        &self.frames[k][i * n..(i + 1) * n]
    }

    #[inline(always)]
    pub fn xy(&self, k: usize, i: usize) -> (f64, f64) {
        let p = self.point(k, i);
        (p[0], p[1])
    }

    pub fn header(&self, caption: &str) -> Option<&str> {
        lookup(&self.headers, caption)
    }

    pub fn set_header(&mut self, caption: &str, content: String) {
        set_in(&mut self.headers, caption, content);
    }

    pub fn push_point(&mut self, k: usize, values: &[f64]) -> AstreResult<()> {
        if values.len() != self.n_fields() {
            return Err(AstreError::Validation(format!(
                "point has {} fields, expected {}",
                values.len(),
                self.n_fields()
            )));
        }
        let frame = self.frames.get_mut(k).ok_or_else(|| {
            AstreError::Validation(format!("frame {} out of range", k))
        })?;
        frame.extend_from_slice(values);
        Ok(())
    }

    pub fn shuffle_frame(&mut self, k: usize, rng: &mut fastrand::Rng) {
        let n = self.n_fields();
        let count = self.n_points(k);
        let frame = &mut self.frames[k];
        for i in (1..count).rev() {
            let j = rng.usize(..=i);
            for f in 0..n {
                frame.swap(i * n + f, j * n + f);
            }
        }
    }

    /// Resolves a field index where negative values count from the last field.
    pub fn resolve_field(&self, field: i64) -> AstreResult<usize> {
        let n = self.n_fields() as i64;
        let idx = if field < 0 { n + field } else { field };
        if idx < 0 || idx >= n {
            return Err(AstreError::Config(format!(
                "field {} out of range ({} fields)",
                field, n
            )));
        }
        Ok(idx as usize)
    }

    // --- Trajectory column ---

    /// Integer ids of the given field, one per point (negative: unassigned).
    pub fn trajectory_ids(&self, field: usize) -> AstreResult<Vec<Vec<i64>>> {
        (0..self.n_frames())
            .map(|k| {
                (0..self.n_points(k))
                    .map(|i| {
                        let v = self.point(k, i)[field];
                        if v.fract() != 0.0 {
                            return Err(AstreError::Format(format!(
                                "trajectory tag {} of point {} in frame {} is not an integer",
                                v, i, k
                            )));
                        }
                        Ok(v as i64)
                    })
                    .collect()
            })
            .collect()
    }

    /// Builds one trajectory per distinct non-negative id of `field`, ordered by id.
    pub fn extract_trajectories(&self, field: usize) -> AstreResult<Vec<Trajectory>> {
        Ok(self
            .extract_tagged_trajectories(field)?
            .into_iter()
            .map(|(_, traj)| traj)
            .collect())
    }

    /// Same as [`Self::extract_trajectories`], keeping each trajectory's id.
    pub fn extract_tagged_trajectories(&self, field: usize) -> AstreResult<Vec<(i64, Trajectory)>> {
        let ids = self.trajectory_ids(field)?;
        let mut members: BTreeMap<i64, Vec<(usize, usize)>> = BTreeMap::new();

        for (k, frame_ids) in ids.iter().enumerate() {
            for (i, &id) in frame_ids.iter().enumerate() {
                if id < 0 {
                    continue;
                }
                let refs = members.entry(id).or_default();
                if let Some(&(last_k, last_i)) = refs.last() {
                    if last_k == k {
                        return Err(AstreError::Consistency(format!(
                            "points {} and {} of frame {} both belong to trajectory {}",
                            last_i, i, k, id
                        )));
                    }
                }
                refs.push((k, i));
            }
        }

        Ok(members
            .into_iter()
            .map(|(id, refs)| {
                let start = refs[0].0;
                let end = refs[refs.len() - 1].0;
                let mut steps = vec![Step::Absent; end - start + 1];
                for (k, i) in refs {
                    steps[k - start] = Step::Real(i);
                }
                (id, Trajectory::new(start, steps))
            })
            .collect())
    }

    /// Copy of the points with one extra column holding the trajectory index
    /// (-1 when unassigned) and one `traj:<i>:lNFA` header per trajectory.
    pub fn with_trajectory_column(&self, store: &TrajectoryStore) -> AstreResult<PointsFile> {
        let n = self.n_fields();
        let mut ids: Vec<Vec<f64>> = (0..self.n_frames())
            .map(|k| vec![-1.0; self.n_points(k)])
            .collect();

        for (id, traj) in store.iter().enumerate() {
            for (k, i) in traj.real_points() {
                let slot = ids
                    .get_mut(k)
                    .and_then(|f| f.get_mut(i))
                    .ok_or_else(|| {
                        AstreError::Consistency(format!(
                            "trajectory {} references missing point {} of frame {}",
                            id, i, k
                        ))
                    })?;
                if *slot >= 0.0 {
                    return Err(AstreError::Consistency(format!(
                        "point {} of frame {} claimed by trajectories {} and {}",
                        i, k, *slot, id
                    )));
                }
                *slot = id as f64;
            }
        }

        let mut tags = self.tags.clone();
        tags.push(Some(TRAJECTORY_TAG.to_string()));

        let frames = self
            .frames
            .iter()
            .zip(&ids)
            .map(|(frame, frame_ids)| {
                let mut out = Vec::with_capacity(frame.len() + frame_ids.len());
                for (point, id) in frame.chunks(n.max(1)).zip(frame_ids) {
                    out.extend_from_slice(point);
                    out.push(*id);
                }
                out
            })
            .collect();

        let mut headers: Vec<(String, String)> = self
            .headers
            .iter()
            .filter(|(caption, _)| !is_traj_header(caption))
            .cloned()
            .collect();
        for (id, traj) in store.iter().enumerate() {
            headers.push((format!("traj:{}:lNFA", id), traj.payload.clone()));
        }

        Ok(PointsFile {
            headers,
            width: self.width,
            height: self.height,
            uid: self.uid,
            first_frame: self.first_frame,
            tags,
            frames,
        })
    }
}

pub fn fresh_uid() -> i64 {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    secs + std::process::id() as i64
}

fn is_traj_header(caption: &str) -> bool {
    caption.starts_with("traj:") && caption.ends_with(":lNFA")
}

fn lookup<'a>(headers: &'a [(String, String)], caption: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(c, _)| c == caption)
        .map(|(_, v)| v.as_str())
}

fn set_in(headers: &mut Vec<(String, String)>, caption: &str, content: String) {
    match headers.iter_mut().find(|(c, _)| c == caption) {
        Some(entry) => entry.1 = content,
        None => headers.push((caption.to_string(), content)),
    }
}

fn int_header(headers: &[(String, String)], caption: &str) -> AstreResult<i64> {
    let raw = lookup(headers, caption)
        .ok_or_else(|| AstreError::Format(format!("missing '{}' header", caption)))?;
    raw.parse().map_err(|_| {
        AstreError::Format(format!("header '{}' is not an integer: '{}'", caption, raw))
    })
}

/// Formats a number like C's `%g`: six significant digits, trailing zeros
/// removed, exponent notation outside `[1e-4, 1e6)`.
pub fn format_g(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    const PRECISION: i32 = 6;
    let sci = format!("{:.*e}", (PRECISION - 1) as usize, value);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    if exp < -4 || exp >= PRECISION {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_zeros(mantissa), sign, exp.abs())
    } else {
        let decimals = (PRECISION - 1 - exp).max(0) as usize;
        trim_zeros(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn trim_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}
