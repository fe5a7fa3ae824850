//! Representation algebra for Lorentz tensor features.
//!
//! A feature tensor's trailing channel axis decomposes into an ordered
//! list of blocks, each `mult` copies of a rank-`rank` Lorentz tensor.
//! The string form mirrors the usual shorthand: `"4x0n+8x1n+3x2n"` is
//! 4 scalars, 8 four-vectors and 3 rank-2 tensors, all normal parity.
//! Only normal parity is supported; `o` terms are rejected at parse time.

use crate::error::FrameError;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    Normal,
    Odd,
}

/// One block of the decomposition: `mult` copies of a rank-`rank` tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepTerm {
    pub mult: usize,
    pub rank: usize,
    pub parity: Parity,
}

impl RepTerm {
    /// Channels occupied by this term: mult * 4^rank.
    pub fn channels(&self) -> usize {
        self.mult * 4usize.pow(self.rank as u32)
    }
}

impl fmt::Display for RepTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = match self.parity {
            Parity::Normal => 'n',
            Parity::Odd => 'o',
        };
        write!(f, "{}x{}{}", self.mult, self.rank, p)
    }
}

/// Ordered decomposition of a feature tensor into Lorentz tensor blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorRep {
    terms: Vec<RepTerm>,
    dim: usize,
}

impl TensorRep {
    /// Builds a representation from explicit terms.
    ///
    /// Rejects odd parity and zero multiplicities; both are configuration
    /// errors, raised here rather than silently degraded.
    pub fn new(terms: Vec<RepTerm>) -> Result<Self, FrameError> {
        if terms.is_empty() {
            return Err(FrameError::Configuration(
                "representation must declare at least one term".to_string(),
            ));
        }
        for term in &terms {
            if term.parity == Parity::Odd {
                return Err(FrameError::Configuration(format!(
                    "odd parity is not supported (term {})",
                    term
                )));
            }
            if term.mult == 0 {
                return Err(FrameError::Configuration(format!(
                    "term {} has zero multiplicity",
                    term
                )));
            }
        }
        let dim = terms.iter().map(RepTerm::channels).sum();
        Ok(Self { terms, dim })
    }

    /// Parses the `"<mult>x<rank><parity>"` shorthand, terms joined by `+`.
    pub fn parse(s: &str) -> Result<Self, FrameError> {
        let mut terms = Vec::new();
        for raw in s.split('+') {
            let part = raw.trim();
            let (mult_str, rest) = part.split_once('x').ok_or_else(|| {
                FrameError::Configuration(format!(
                    "malformed representation term '{}' in '{}'",
                    part, s
                ))
            })?;
            let mult: usize = mult_str.trim().parse().map_err(|_| {
                FrameError::Configuration(format!(
                    "invalid multiplicity '{}' in term '{}'",
                    mult_str, part
                ))
            })?;
            let parity = match rest.chars().last() {
                Some('n') => Parity::Normal,
                Some('o') => Parity::Odd,
                _ => {
                    return Err(FrameError::Configuration(format!(
                        "term '{}' must end with parity marker 'n' or 'o'",
                        part
                    )))
                }
            };
            let rank_str = &rest[..rest.len() - 1];
            let rank: usize = rank_str.trim().parse().map_err(|_| {
                FrameError::Configuration(format!(
                    "invalid rank '{}' in term '{}'",
                    rank_str, part
                ))
            })?;
            terms.push(RepTerm { mult, rank, parity });
        }
        Self::new(terms)
    }

    pub fn terms(&self) -> &[RepTerm] {
        &self.terms
    }

    /// Total channel count declared by all terms.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Checks the declared channel count against an actual feature width.
    ///
    /// A mismatch is a configuration error, never a silent truncation.
    pub fn validate_width(&self, width: usize) -> Result<(), FrameError> {
        if width != self.dim {
            return Err(FrameError::Configuration(format!(
                "representation '{}' declares {} channels but feature has {}",
                self, self.dim, width
            )));
        }
        Ok(())
    }
}

impl fmt::Display for TensorRep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.terms.iter().map(|t| t.to_string()).collect();
        write!(f, "{}", parts.join("+"))
    }
}

impl FromStr for TensorRep {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
