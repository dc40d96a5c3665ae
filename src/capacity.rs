//! Chunk size limits, measured in sentences.
//!
//! ## The Problem
//!
//! Splitting purely on similarity drops creates two failure modes:
//!
//! - Too eager: every small dip becomes a boundary, fragmenting meaning
//! - Too lazy: uniformly similar text never dips, producing one giant chunk
//!
//! ## The Solution: Floor, Ceiling, Merge Slack
//!
//! `SentenceBounds` holds three limits:
//!
//! - `min`: a chunk may not be cut before it has this many sentences
//! - `max`: a chunk is cut here regardless of similarity
//! - `merge_limit`: after the first pass, an undersized tail may be folded into
//!   its predecessor as long as the result stays within this ceiling
//!
//! ```text
//! min = 3, max = 4, merge_limit = 6 (1.5 × max)
//!
//! First pass:  [4] [4] [2]     <- tail is below min
//! Merge pass:  [4] [6]         <- 4 + 2 <= 6, absorbed
//! ```

use std::cmp::Ordering;

/// Sentence-count limits for chunks.
///
/// # Examples
///
/// ```rust
/// use cleave::SentenceBounds;
/// use std::cmp::Ordering;
///
/// let bounds = SentenceBounds::new(3, 30).unwrap();
/// assert_eq!(bounds.fits(2), Ordering::Less);
/// assert_eq!(bounds.fits(10), Ordering::Equal);
/// assert_eq!(bounds.fits(31), Ordering::Greater);
/// assert_eq!(bounds.merge_limit(), 45);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentenceBounds {
    min: usize,
    max: usize,
    merge_factor: f32,
}

impl SentenceBounds {
    /// Slack allowed when merging an undersized chunk into its predecessor.
    pub const DEFAULT_MERGE_FACTOR: f32 = 1.5;

    /// Create bounds with the default merge factor.
    ///
    /// # Errors
    ///
    /// Returns an error unless `0 < min <= max`.
    pub fn new(min: usize, max: usize) -> Result<Self, SentenceBoundsError> {
        if min == 0 || max < min {
            return Err(SentenceBoundsError::Invalid { min, max });
        }
        Ok(Self {
            min,
            max,
            merge_factor: Self::DEFAULT_MERGE_FACTOR,
        })
    }

    /// Set the merge slack as a multiple of `max`.
    ///
    /// # Errors
    ///
    /// Returns an error if `factor < 1.0` or is not finite.
    pub fn with_merge_factor(self, factor: f32) -> Result<Self, SentenceBoundsError> {
        if !factor.is_finite() || factor < 1.0 {
            Err(SentenceBoundsError::MergeFactor(factor))
        } else {
            Ok(Self {
                merge_factor: factor,
                ..self
            })
        }
    }

    /// Minimum sentences before a similarity cut is allowed.
    #[must_use]
    pub const fn min(&self) -> usize {
        self.min
    }

    /// Sentences at which a cut is forced.
    #[must_use]
    pub const fn max(&self) -> usize {
        self.max
    }

    /// Largest chunk the merge pass may create.
    #[must_use]
    pub fn merge_limit(&self) -> usize {
        ((self.max as f64) * f64::from(self.merge_factor)).floor() as usize
    }

    /// Compare a chunk size against the bounds.
    ///
    /// Returns:
    /// - `Ordering::Less`: below `min`, not yet eligible for a cut
    /// - `Ordering::Equal`: within `min..=max`
    /// - `Ordering::Greater`: above `max`
    #[must_use]
    pub fn fits(&self, size: usize) -> Ordering {
        if size < self.min {
            Ordering::Less
        } else if size > self.max {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }

    /// Whether merging `additional` sentences into a chunk of `current`
    /// would exceed the merge limit.
    #[must_use]
    pub fn would_overflow(&self, current: usize, additional: usize) -> bool {
        current.saturating_add(additional) > self.merge_limit()
    }
}

impl Default for SentenceBounds {
    fn default() -> Self {
        Self {
            min: 3,
            max: 30,
            merge_factor: Self::DEFAULT_MERGE_FACTOR,
        }
    }
}

/// Error when configuring sentence bounds.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SentenceBoundsError {
    /// Bounds must satisfy `0 < min <= max`.
    #[error("invalid bounds: min {min}, max {max}")]
    Invalid {
        /// The requested minimum.
        min: usize,
        /// The requested maximum.
        max: usize,
    },

    /// Merge factor must be finite and at least 1.0.
    #[error("merge factor {0} must be >= 1.0")]
    MergeFactor(f32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fits() {
        let bounds = SentenceBounds::new(5, 20).unwrap();
        assert_eq!(bounds.fits(4), Ordering::Less);
        assert_eq!(bounds.fits(5), Ordering::Equal);
        assert_eq!(bounds.fits(20), Ordering::Equal);
        assert_eq!(bounds.fits(21), Ordering::Greater);
    }

    #[test]
    fn test_merge_limit_rounds_down() {
        let bounds = SentenceBounds::new(1, 5).unwrap();
        assert_eq!(bounds.merge_limit(), 7);
    }

    #[test]
    fn test_would_overflow() {
        let bounds = SentenceBounds::new(3, 4).unwrap();
        assert!(!bounds.would_overflow(4, 2));
        assert!(bounds.would_overflow(4, 3));
    }

    #[test]
    fn test_custom_merge_factor() {
        let bounds = SentenceBounds::new(2, 10)
            .unwrap()
            .with_merge_factor(1.0)
            .unwrap();
        assert_eq!(bounds.merge_limit(), 10);
        assert!(SentenceBounds::new(2, 10)
            .unwrap()
            .with_merge_factor(0.5)
            .is_err());
    }

    #[test]
    fn test_invalid_bounds() {
        assert!(SentenceBounds::new(0, 5).is_err());
        assert!(SentenceBounds::new(6, 5).is_err());
        assert!(SentenceBounds::new(5, 5).is_ok());
    }
}
