#![no_std]

//! Per-action PUCT arithmetic.
//!
//! Everything here works on plain slices and scalars so the same code can be
//! used by the rayon engine and by device-side kernels that cannot allocate.

/// Child index meaning "this action has not been expanded yet".
pub const UNEXPANDED: i32 = -1;

/// How the per-action prior scores stored in a tree should be read.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PriorKind {
    /// Unnormalized log-probabilities; priors are their softmax.
    #[default]
    Logits,
    /// Non-negative weights; priors are the weights divided by their sum.
    Probabilities,
}

impl PriorKind {
    /// Whether an action carrying this raw prior score may be selected.
    ///
    /// Masked actions are written as `-inf` (logits) or `NaN` (either kind).
    #[inline]
    pub fn is_valid(self, raw: f32) -> bool {
        match self {
            PriorKind::Logits => raw.is_finite(),
            PriorKind::Probabilities => raw.is_finite() && raw >= 0.0,
        }
    }
}

/// Normalization constants for the priors of one node.
///
/// Fitted in one pass over the node's raw scores, then queried per action
/// without any scratch buffer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PriorNorm {
    kind: PriorKind,
    shift: f32,
    mass: f32,
    valid: usize,
}

impl PriorNorm {
    /// Fit normalization constants over the raw scores of one node.
    pub fn fit(kind: PriorKind, raw: &[f32]) -> Self {
        let mut valid = 0;
        let mut max = f32::NEG_INFINITY;
        for &x in raw {
            if kind.is_valid(x) {
                valid += 1;
                if x > max {
                    max = x;
                }
            }
        }
        if valid == 0 {
            return Self { kind, shift: 0.0, mass: 0.0, valid };
        }

        let shift = match kind {
            PriorKind::Logits => max,
            PriorKind::Probabilities => 0.0,
        };
        let mut mass = 0.0;
        for &x in raw {
            if kind.is_valid(x) {
                mass += match kind {
                    PriorKind::Logits => libm::expf(x - shift),
                    PriorKind::Probabilities => x,
                };
            }
        }
        Self { kind, shift, mass, valid }
    }

    /// Number of valid actions seen by [`PriorNorm::fit`].
    #[inline]
    pub fn valid(&self) -> usize {
        self.valid
    }

    /// Normalized prior of one action. Zero for masked actions and when the
    /// node has no prior mass at all.
    #[inline]
    pub fn prior(&self, raw: f32) -> f32 {
        if !self.kind.is_valid(raw) || self.mass <= 0.0 {
            return 0.0;
        }
        match self.kind {
            PriorKind::Logits => libm::expf(raw - self.shift) / self.mass,
            PriorKind::Probabilities => raw / self.mass,
        }
    }
}

/// Mean backed-up value of an edge, `0` while the edge is unvisited.
#[inline]
pub fn mean_value(w: f32, n: u32) -> f32 {
    if n == 0 {
        0.0
    } else {
        w / n as f32
    }
}

/// `sqrt` of the total visit count of a node's children.
#[inline]
pub fn sqrt_visits(total: u64) -> f32 {
    libm::sqrtf(total as f32)
}

/// Exploration term `c_puct * P * sqrt(N) / (1 + n)`.
#[inline]
pub fn exploration(c_puct: f32, prior: f32, sqrt_total: f32, n: u32) -> f32 {
    c_puct * prior * sqrt_total / (1.0 + n as f32)
}

/// PUCT score of one edge.
///
/// `PUCT(s,a) = Q(s,a) + c_puct * P(s,a) * sqrt(sum_b N(s,b)) / (1 + N(s,a))`
#[inline]
pub fn puct(w: f32, n: u32, prior: f32, c_puct: f32, sqrt_total: f32) -> f32 {
    mean_value(w, n) + exploration(c_puct, prior, sqrt_total, n)
}

/// Running argmax that keeps the lowest index on ties and ignores NaN scores.
#[derive(Clone, Copy, Debug, Default)]
pub struct Argmax {
    best: Option<(usize, f32)>,
}

impl Argmax {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn offer(&mut self, index: usize, score: f32) {
        if score.is_nan() {
            return;
        }
        match self.best {
            Some((_, best)) if score <= best => {}
            _ => self.best = Some((index, score)),
        }
    }

    #[inline]
    pub fn index(&self) -> Option<usize> {
        self.best.map(|(index, _)| index)
    }

    #[inline]
    pub fn score(&self) -> Option<f32> {
        self.best.map(|(_, score)| score)
    }
}
