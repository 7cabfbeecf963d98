use crate::error::{AstreError, AstreResult};
use std::fmt;
use std::str::FromStr;
use strum_macros::{Display, EnumDiscriminants, EnumString};

/// Frames a descriptor may span when no points file bounds it.
pub const MAX_DESCRIPTOR_FRAMES: usize = 1 << 20;

/// One frame of a trajectory.
#[derive(Debug, Clone, Copy, PartialEq, EnumDiscriminants)]
#[strum_discriminants(name(StepType), derive(Display))]
pub enum Step {
    /// The trajectory has no detection in this frame.
    Absent,
    /// Index of a point of the frame.
    Real(usize),
    /// Position filled in without a detection; counts as a hole.
    Interpolated { x: f32, y: f32 },
}

impl Step {
    pub fn is_real(&self) -> bool {
        matches!(self, Step::Real(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    pub start: usize,
    pub steps: Vec<Step>,
    /// Free-form annotation, the formatted log10(NFA) for detections.
    pub payload: String,
}

impl Trajectory {
    pub fn new(start: usize, steps: Vec<Step>) -> Self {
        Self {
            start,
            steps,
            payload: String::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Last frame covered by the trajectory.
    pub fn end(&self) -> usize {
        (self.start + self.len()).saturating_sub(1)
    }

    /// `(frame, point)` pairs of the real detections, in frame order.
    pub fn real_points(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.steps.iter().enumerate().filter_map(move |(idx, step)| match step {
            Step::Real(p) => Some((self.start + idx, *p)),
            _ => None,
        })
    }

    pub fn size(&self) -> usize {
        self.steps.iter().filter(|s| s.is_real()).count()
    }

    /// Number of links between a real detection and the next one.
    pub fn count_links(&self) -> usize {
        self.size().saturating_sub(1)
    }

    pub fn descriptor(&self) -> String {
        self.to_string()
    }

    /// Parses `S<start> P<i> H<n> F<frame> C<frame> A <x> <y> ... ;`.
    pub fn parse_descriptor(text: &str) -> AstreResult<Self> {
        Self::parse_descriptor_within(text, MAX_DESCRIPTOR_FRAMES)
    }

    /// Same as [`Self::parse_descriptor`], rejecting any step at or past
    /// frame `n_frames`.
    pub fn parse_descriptor_within(text: &str, n_frames: usize) -> AstreResult<Self> {
        DescriptorParser::new(text, n_frames.min(MAX_DESCRIPTOR_FRAMES)).parse()
    }
}

impl fmt::Display for Trajectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{} ", self.start)?;
        for step in &self.steps {
            match step {
                Step::Absent => write!(f, "H1 ")?,
                Step::Real(p) => write!(f, "P{} ", p)?,
                Step::Interpolated { x, y } => write!(f, "A {} {} ", x, y)?,
            }
        }
        Ok(())
    }
}

impl FromStr for Trajectory {
    type Err = AstreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_descriptor(s)
    }
}

/// Append-only list of committed trajectories.
#[derive(Debug, Clone, Default)]
pub struct TrajectoryStore {
    trajectories: Vec<Trajectory>,
}

impl TrajectoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the index of the new trajectory.
    pub fn push(&mut self, traj: Trajectory) -> usize {
        self.trajectories.push(traj);
        self.trajectories.len() - 1
    }

    pub fn len(&self) -> usize {
        self.trajectories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trajectories.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&Trajectory> {
        self.trajectories.get(id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Trajectory> {
        self.trajectories.iter()
    }

    pub fn count_links(&self) -> usize {
        self.trajectories.iter().map(Trajectory::count_links).sum()
    }
}

impl<'a> IntoIterator for &'a TrajectoryStore {
    type Item = &'a Trajectory;
    type IntoIter = std::slice::Iter<'a, Trajectory>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
enum Token {
    #[strum(serialize = "S")]
    Start,
    #[strum(serialize = "P")]
    Point,
    #[strum(serialize = "H")]
    Hole,
    #[strum(serialize = "F")]
    Forward,
    #[strum(serialize = "C")]
    Check,
    #[strum(serialize = "A")]
    Interpolated,
}

struct DescriptorParser<'a> {
    text: &'a str,
    rest: &'a str,
    n_frames: i64,
}

impl<'a> DescriptorParser<'a> {
    fn new(text: &'a str, n_frames: usize) -> Self {
        Self {
            text,
            rest: text,
            n_frames: n_frames as i64,
        }
    }

    /// Fails unless `count` more steps from `current` stay inside the frames.
    fn reserve(&self, current: i64, count: i64) -> AstreResult<usize> {
        if count > self.n_frames - current {
            return Err(self.invalid(&format!(
                "trajectory runs past frame {}",
                self.n_frames - 1
            )));
        }
        Ok(count as usize)
    }

    fn invalid(&self, msg: &str) -> AstreError {
        AstreError::Descriptor(format!("{} in '{}'", msg, self.text.trim()))
    }

    fn next_token(&mut self) -> AstreResult<Option<Token>> {
        self.rest = self.rest.trim_start();
        let mut chars = self.rest.chars();
        match chars.next() {
            None | Some(';') => Ok(None),
            Some(c) => {
                let token = Token::from_str(c.encode_utf8(&mut [0; 4]))
                    .map_err(|_| self.invalid(&format!("unexpected character '{}'", c)))?;
                self.rest = chars.as_str();
                Ok(Some(token))
            }
        }
    }

    fn number<T: FromStr>(&mut self, accept: fn(char) -> bool) -> AstreResult<T> {
        self.rest = self.rest.trim_start();
        let end = self
            .rest
            .find(|c: char| !accept(c))
            .unwrap_or(self.rest.len());
        let (digits, rest) = self.rest.split_at(end);
        let value = digits
            .parse()
            .map_err(|_| self.invalid(&format!("expected a number, found '{}'", digits)))?;
        self.rest = rest;
        Ok(value)
    }

    fn int(&mut self) -> AstreResult<i64> {
        self.number(|c| c.is_ascii_digit() || c == '+' || c == '-')
    }

    fn float(&mut self) -> AstreResult<f32> {
        self.number(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
    }

    fn parse(mut self) -> AstreResult<Trajectory> {
        let start = match self.next_token()? {
            Some(Token::Start) => self.int()?,
            Some(other) => return Err(self.invalid(&format!("'{}' before the start frame", other))),
            None => return Err(self.invalid("empty descriptor")),
        };
        if start < 0 {
            return Err(self.invalid("negative start frame"));
        }
        if start >= self.n_frames {
            return Err(self.invalid(&format!("start frame {} past the last frame", start)));
        }

        let mut steps = Vec::new();
        while let Some(token) = self.next_token()? {
            let current = start + steps.len() as i64;
            match token {
                Token::Start => return Err(self.invalid("start frame given twice")),
                Token::Point => {
                    let p = self.int()?;
                    if p < 0 {
                        return Err(self.invalid("negative point index"));
                    }
                    self.reserve(current, 1)?;
                    steps.push(Step::Real(p as usize));
                }
                Token::Hole => {
                    let n = self.int()?;
                    if n < 0 {
                        return Err(self.invalid("negative hole length"));
                    }
                    let n = self.reserve(current, n)?;
                    steps.extend(std::iter::repeat(Step::Absent).take(n));
                }
                Token::Forward => {
                    let next = self.int()?;
                    if next <= current {
                        return Err(self.invalid(&format!(
                            "cannot advance to frame {} from frame {}",
                            next, current
                        )));
                    }
                    let n = self.reserve(current, next - current)?;
                    steps.extend(std::iter::repeat(Step::Absent).take(n));
                }
                Token::Check => {
                    let f = self.int()?;
                    if f != current {
                        return Err(self.invalid(&format!(
                            "frame check {} failed (current frame is {})",
                            f, current
                        )));
                    }
                }
                Token::Interpolated => {
                    let x = self.float()?;
                    let y = self.float()?;
                    self.reserve(current, 1)?;
                    steps.push(Step::Interpolated { x, y });
                }
            }
        }

        Ok(Trajectory::new(start as usize, steps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_type_names() {
        assert_eq!(StepType::from(&Step::Real(3)).to_string(), "Real");
        assert_eq!(StepType::from(&Step::Absent).to_string(), "Absent");
    }

    #[test]
    fn test_token_letters() {
        assert_eq!(Token::from_str("F").ok(), Some(Token::Forward));
        assert!(Token::from_str("Q").is_err());
    }
}
