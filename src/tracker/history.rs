//! Fixed-capacity FIFO buffers for per-identity samples.

use std::collections::VecDeque;

/// Ring buffer holding the most recent `capacity` samples of one metric.
///
/// Pushing past capacity evicts the oldest sample.
#[derive(Debug, Clone)]
pub struct RollingHistory<T> {
    samples: VecDeque<T>,
    capacity: usize,
}

impl<T> RollingHistory<T> {
    /// Create an empty history. A zero capacity is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: T) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recent sample.
    pub fn last(&self) -> Option<&T> {
        self.samples.back()
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.samples.iter()
    }

    /// The last `n` samples (or fewer), oldest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &T> {
        let skip = self.samples.len().saturating_sub(n);
        self.samples.iter().skip(skip)
    }
}

impl<T: Copy + Into<f64>> RollingHistory<T> {
    /// Arithmetic mean of all samples.
    pub fn mean(&self) -> Option<f64> {
        mean_of(self.samples.iter().copied())
    }

    /// Arithmetic mean of the last `n` samples.
    pub fn mean_recent(&self, n: usize) -> Option<f64> {
        mean_of(self.recent(n).copied())
    }
}

fn mean_of<T: Into<f64>>(values: impl Iterator<Item = T>) -> Option<f64> {
    let (sum, count) = values.fold((0.0f64, 0usize), |(s, c), v| {
        (s + Into::<f64>::into(v), c + 1)
    });
    (count > 0).then(|| sum / count as f64)
}

/// Population variance (divides by `n`), `None` for an empty input.
pub fn variance(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    Some(values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eviction() {
        let mut h = RollingHistory::new(3);
        for i in 1..=4u8 {
            h.push(i);
        }
        assert_eq!(h.len(), 3);
        assert_eq!(h.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
        assert_eq!(h.last(), Some(&4));
    }

    #[test]
    fn test_recent_and_means() {
        let mut h = RollingHistory::new(50);
        for v in [1.0f32, 2.0, 3.0, 4.0] {
            h.push(v);
        }
        assert_eq!(h.recent(2).copied().collect::<Vec<_>>(), vec![3.0, 4.0]);
        assert_eq!(h.recent(10).count(), 4);
        assert_eq!(h.mean(), Some(2.5));
        assert_eq!(h.mean_recent(2), Some(3.5));

        let empty: RollingHistory<f32> = RollingHistory::new(5);
        assert_eq!(empty.mean(), None);
    }

    #[test]
    fn test_zero_capacity_is_bumped() {
        let mut h = RollingHistory::new(0);
        h.push(1u8);
        h.push(2u8);
        assert_eq!(h.capacity(), 1);
        assert_eq!(h.last(), Some(&2));
    }

    #[test]
    fn test_population_variance() {
        assert_eq!(variance(&[]), None);
        assert_eq!(variance(&[5.0; 10]), Some(0.0));
        assert_eq!(variance(&[1.0, 3.0]), Some(1.0));
    }
}
