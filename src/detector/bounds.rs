use std::ops::RangeInclusive;

/// Sentinel of unreachable cells. Finite so that sums and maxima stay ordered.
pub const INFTY: f32 = 1e18;

#[inline(always)]
pub fn is_unreachable(value: f32) -> bool {
    value >= INFTY - 1.0
}

/// Valid DP shapes. Used identically by the fill, the scan and the back-trace.
///
/// A cell `(k, x, h, y, l, s, j)` describes a trajectory ending on point `x`
/// of frame `k`, whose previous detection is `y` in frame `k - h - 1`, spanning
/// `l` frames with `s` detections grouped in `j` runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub n_frames: usize,
    pub max_len: usize,
    pub max_hole: usize,
}

impl Bounds {
    /// `max_len == 0` means the number of frames; a negative `max_hole`
    /// means `n_frames - 3`, the longest hole a 3-point trajectory can hold.
    pub fn new(n_frames: usize, max_len: usize, max_hole: i64) -> Self {
        let longest_hole = n_frames.saturating_sub(3);
        let max_len = if max_len == 0 { n_frames } else { max_len.min(n_frames) };
        let max_hole = if max_hole < 0 {
            longest_hole
        } else {
            (max_hole as usize).min(longest_hole)
        };
        Self {
            n_frames,
            max_len,
            max_hole,
        }
    }

    pub fn adjacency_only(&self) -> bool {
        self.max_hole == 0
    }

    /// Longest hole before a point of frame `k`, `None` on the first frame.
    #[inline(always)]
    pub fn max_h(&self, k: usize) -> Option<usize> {
        if k == 0 {
            None
        } else {
            Some((k - 1).min(self.max_hole))
        }
    }

    #[allow(clippy::reversed_empty_ranges)]
    pub fn holes(&self, k: usize) -> RangeInclusive<usize> {
        match self.max_h(k) {
            Some(m) => 0..=m,
            None => 1..=0,
        }
    }

    #[inline(always)]
    pub fn max_l(&self, k: usize) -> usize {
        self.max_len.min(k + 1)
    }

    pub fn spans(&self, k: usize, h: usize) -> RangeInclusive<usize> {
        (h + 3)..=self.max_l(k)
    }

    pub fn sizes(&self, h: usize, l: usize) -> RangeInclusive<usize> {
        if self.adjacency_only() {
            l..=l
        } else {
            3..=(l - h)
        }
    }

    pub fn runs(&self, h: usize, l: usize, s: usize) -> RangeInclusive<usize> {
        if self.adjacency_only() {
            1..=1
        } else {
            let first = if h == 0 { 1 } else { 2 };
            first..=(l - s + 1).min(s)
        }
    }

    pub fn contains(&self, k: usize, h: usize, l: usize, s: usize, j: usize) -> bool {
        match self.max_h(k) {
            Some(m) if h <= m => {}
            _ => return false,
        }
        self.spans(k, h).contains(&l) && self.sizes(h, l).contains(&s) && self.runs(h, l, s).contains(&j)
    }

    /// Every `(l, s, j)` of `(k, h)`, in storage order.
    pub fn shapes(&self, k: usize, h: usize) -> impl Iterator<Item = (usize, usize, usize)> + '_ {
        self.spans(k, h).flat_map(move |l| {
            self.sizes(h, l)
                .flat_map(move |s| self.runs(h, l, s).map(move |j| (l, s, j)))
        })
    }
}

/// Coordinates of one DP cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub k: usize,
    pub x: usize,
    pub h: usize,
    pub y: usize,
    pub l: usize,
    pub s: usize,
    pub j: usize,
}

impl Cell {
    /// Frame of the predecessor `y`.
    #[inline(always)]
    pub fn p(&self) -> usize {
        self.k - self.h - 1
    }
}

/// Offsets of the `(l, s, j)` cells of one `(k, h)` pair.
#[derive(Debug, Clone)]
pub struct ShapeLayout {
    pub shapes: Vec<(usize, usize, usize)>,
    l_min: usize,
    /// Per span: index of its first row, smallest size.
    spans: Vec<(usize, usize)>,
    /// Per `(l, s)` row: offset of its first run, smallest run count.
    rows: Vec<(usize, usize)>,
}

impl ShapeLayout {
    fn new(bounds: &Bounds, k: usize, h: usize) -> Self {
        let shapes: Vec<_> = bounds.shapes(k, h).collect();
        let mut spans = Vec::new();
        let mut rows = Vec::new();
        let mut offset = 0;
        for l in bounds.spans(k, h) {
            let s_range = bounds.sizes(h, l);
            spans.push((rows.len(), *s_range.start()));
            for s in s_range {
                let j_range = bounds.runs(h, l, s);
                rows.push((offset, *j_range.start()));
                offset += j_range.count();
            }
        }
        Self {
            shapes,
            l_min: h + 3,
            spans,
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    #[inline(always)]
    pub fn offset(&self, l: usize, s: usize, j: usize) -> usize {
        let (row0, s_min) = self.spans[l - self.l_min];
        let (base, j_min) = self.rows[row0 + s - s_min];
        base + j - j_min
    }
}

/// Cells of one hole length `h` inside an end point's block.
#[derive(Debug, Clone)]
pub struct HoleLayout {
    /// Frame of the predecessor.
    pub p: usize,
    pub n_y: usize,
    pub offset: usize,
    pub shape: ShapeLayout,
}

#[derive(Debug, Clone, Default)]
pub struct FrameLayout {
    pub n_x: usize,
    /// Cells per end point.
    pub x_stride: usize,
    pub holes: Vec<HoleLayout>,
}

impl FrameLayout {
    fn new(bounds: &Bounds, counts: &[usize], k: usize) -> Self {
        let mut holes = Vec::new();
        let mut offset = 0;
        for h in bounds.holes(k) {
            let p = k - h - 1;
            let shape = ShapeLayout::new(bounds, k, h);
            let n_y = counts[p];
            let size = n_y * shape.len();
            holes.push(HoleLayout {
                p,
                n_y,
                offset,
                shape,
            });
            offset += size;
        }
        Self {
            n_x: counts[k],
            x_stride: offset,
            holes,
        }
    }

    /// Start of the `(x, h, y)` block.
    #[inline(always)]
    pub fn block(&self, x: usize, h: usize, y: usize) -> usize {
        let hole = &self.holes[h];
        x * self.x_stride + hole.offset + y * hole.shape.len()
    }
}

/// The G-function: per frame, a flat arena of minimal worst-case criteria,
/// laid out as end point, hole length, predecessor, then shape.
/// Frame 0 holds no cell.
#[derive(Debug, Clone)]
pub struct GTable {
    pub bounds: Bounds,
    pub layouts: Vec<FrameLayout>,
    pub cells: Vec<Vec<f32>>,
}

impl GTable {
    pub fn new(bounds: Bounds, counts: &[usize]) -> Self {
        let layouts: Vec<FrameLayout> = (0..bounds.n_frames)
            .map(|k| FrameLayout::new(&bounds, counts, k))
            .collect();
        let cells = layouts
            .iter()
            .map(|fl| vec![INFTY; fl.n_x * fl.x_stride])
            .collect();
        Self {
            bounds,
            layouts,
            cells,
        }
    }

    pub fn len(&self) -> usize {
        self.cells.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline(always)]
    pub fn index(&self, c: &Cell) -> usize {
        let layout = &self.layouts[c.k];
        layout.block(c.x, c.h, c.y) + layout.holes[c.h].shape.offset(c.l, c.s, c.j)
    }

    #[inline(always)]
    pub fn get(&self, c: &Cell) -> f32 {
        self.cells[c.k][self.index(c)]
    }

    /// Cells of one `(k, x, h, y)` block with their shapes, in storage order.
    pub fn block(&self, k: usize, x: usize, h: usize, y: usize) -> (&[f32], &ShapeLayout) {
        let layout = &self.layouts[k];
        let shape = &layout.holes[h].shape;
        let start = layout.block(x, h, y);
        (&self.cells[k][start..start + shape.len()], shape)
    }
}
