//! A persistent tracked subject and its rolling histories.

use std::fmt;

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::tracker::cooldown::RaiseCounter;
use crate::tracker::history::RollingHistory;

/// Monotonically assigned identity number, displayed as `Student_N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IdentityId(pub u64);

impl IdentityId {
    /// Compact overlay label, `S{n}`.
    pub fn short_label(&self) -> String {
        format!("S{}", self.0)
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Student_{}", self.0)
    }
}

/// One tracked student.
#[derive(Debug, Clone)]
pub struct Identity {
    /// Unique identifier within the session
    pub id: IdentityId,
    /// Position at first sighting
    pub anchor: Point2<f32>,
    /// Face centers, oldest first
    pub positions: RollingHistory<Point2<f32>>,
    /// 1 when both eyes were visible, else 0
    pub eye_visibility: RollingHistory<u8>,
    /// Center displacement between consecutive updates
    pub movement: RollingHistory<f32>,
    pub engagement: RollingHistory<f64>,
    pub attention: RollingHistory<f64>,
    /// Hand-raise counter with its cooldown window
    pub raises: RaiseCounter,
    /// Frame ID when the identity was minted
    pub first_frame: u64,
    /// Frame ID of the most recent update
    pub last_frame: u64,
}

impl Identity {
    pub fn new(id: IdentityId, anchor: Point2<f32>, capacity: usize, frame_id: u64) -> Self {
        Self {
            id,
            anchor,
            positions: RollingHistory::new(capacity),
            eye_visibility: RollingHistory::new(capacity),
            movement: RollingHistory::new(capacity),
            engagement: RollingHistory::new(capacity),
            attention: RollingHistory::new(capacity),
            raises: RaiseCounter::new(),
            first_frame: frame_id,
            last_frame: frame_id,
        }
    }

    /// Last known position, if any sample was recorded yet.
    pub fn last_position(&self) -> Option<Point2<f32>> {
        self.positions.last().copied()
    }

    /// Append a new face center and the displacement from the previous one.
    pub fn observe_position(&mut self, center: Point2<f32>, frame_id: u64) {
        if let Some(prev) = self.last_position() {
            self.movement.push(nalgebra::distance(&prev, &center));
        }
        self.positions.push(center);
        self.last_frame = frame_id;
    }

    /// Append an eye-visibility flag: visible means at least two eyes.
    pub fn observe_eyes(&mut self, eye_count: Option<u32>) {
        if let Some(n) = eye_count {
            self.eye_visibility.push(u8::from(n >= 2));
        }
    }

    pub fn record_scores(&mut self, engagement: f64, attention: f64) {
        self.engagement.push(engagement);
        self.attention.push(attention);
    }

    #[inline]
    pub fn hand_raises(&self) -> u32 {
        self.raises.count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        let id = IdentityId(7);
        assert_eq!(id.to_string(), "Student_7");
        assert_eq!(id.short_label(), "S7");
    }

    #[test]
    fn test_movement_follows_positions() {
        let mut ident = Identity::new(IdentityId(1), Point2::new(0.0, 0.0), 50, 1);
        ident.observe_position(Point2::new(0.0, 0.0), 1);
        assert!(ident.movement.is_empty());

        ident.observe_position(Point2::new(3.0, 4.0), 2);
        assert_eq!(ident.movement.last(), Some(&5.0));
        assert_eq!(ident.positions.len(), 2);
        assert_eq!(ident.last_frame, 2);
    }

    #[test]
    fn test_eye_flags() {
        let mut ident = Identity::new(IdentityId(1), Point2::new(0.0, 0.0), 50, 1);
        ident.observe_eyes(Some(2));
        ident.observe_eyes(Some(1));
        ident.observe_eyes(Some(3));
        ident.observe_eyes(None);
        assert_eq!(ident.eye_visibility.iter().copied().collect::<Vec<_>>(), vec![1, 0, 1]);
    }
}
