//! Nearest-centroid identity association.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::tracker::identity::{Identity, IdentityId};
use crate::tracker::matching::{self, AssignmentResult, Detection};

/// How detections are paired with known identities inside the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationStrategy {
    /// Detections in iteration order each take their closest unclaimed identity.
    #[default]
    Greedy,
    /// Minimum total distance over all gated pairs.
    Optimal,
}

/// Whether identities may be minted after the first frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingMode {
    /// Match against last known positions and mint identities for newcomers.
    #[default]
    Adaptive,
    /// Seed a roster from the first frame with faces, then only match
    /// against each identity's anchor position.
    FixedRoster,
}

/// Configuration for the IdentityTracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Maximum center distance in pixels for a match (exclusive)
    pub tracking_gate: f32,
    /// Capacity of every per-identity rolling history
    pub history_capacity: usize,
    /// Upper bound on the number of identities; extra faces are dropped
    pub max_identities: Option<usize>,
    pub association: AssociationStrategy,
    pub mode: TrackingMode,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            tracking_gate: 80.0,
            history_capacity: 50,
            max_identities: None,
            association: AssociationStrategy::Greedy,
            mode: TrackingMode::Adaptive,
        }
    }
}

/// Outcome of associating one detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Association {
    Existing(IdentityId),
    /// A new identity will be minted with this id.
    New(IdentityId),
    /// No identity within the gate and minting is not allowed.
    Dropped,
}

impl Association {
    pub fn identity(&self) -> Option<IdentityId> {
        match *self {
            Association::Existing(id) | Association::New(id) => Some(id),
            Association::Dropped => None,
        }
    }
}

pub struct IdentityTracker {
    identities: Vec<Identity>,
    next_id: u64,
    config: TrackerConfig,
}

impl IdentityTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            identities: Vec::new(),
            next_id: 1,
            config,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// All identities in creation order.
    pub fn identities(&self) -> &[Identity] {
        &self.identities
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    pub fn identity(&self, id: IdentityId) -> Option<&Identity> {
        self.index_of(id).map(|i| &self.identities[i])
    }

    pub fn identity_mut(&mut self, id: IdentityId) -> Option<&mut Identity> {
        self.index_of(id).map(move |i| &mut self.identities[i])
    }

    fn index_of(&self, id: IdentityId) -> Option<usize> {
        self.identities.binary_search_by_key(&id, |t| t.id).ok()
    }

    fn at_capacity(&self, pending: usize) -> bool {
        self.config
            .max_identities
            .is_some_and(|max| self.identities.len() + pending >= max)
    }

    /// Decide, without mutating anything, which identity each detection
    /// belongs to. The result is aligned with `detections`.
    pub fn associate(&self, detections: &[Detection]) -> Vec<Association> {
        if detections.is_empty() {
            return Vec::new();
        }

        if self.config.mode == TrackingMode::FixedRoster && self.identities.is_empty() {
            return self.seed_roster(detections);
        }

        let positions: Vec<Point2<f32>> = self
            .identities
            .iter()
            .map(|t| match self.config.mode {
                TrackingMode::Adaptive => t.last_position().unwrap_or(t.anchor),
                TrackingMode::FixedRoster => t.anchor,
            })
            .collect();
        let centers: Vec<Point2<f32>> = detections.iter().map(Detection::center).collect();
        let dists = matching::distance_matrix(&positions, &centers);

        let AssignmentResult {
            matches,
            unmatched_detections,
            ..
        } = match (self.config.association, self.config.mode) {
            (AssociationStrategy::Greedy, TrackingMode::Adaptive) => {
                matching::greedy_assignment(&dists, self.config.tracking_gate)
            }
            // A face whose nearest anchor is taken is dropped, never
            // handed to a neighbour.
            (AssociationStrategy::Greedy, TrackingMode::FixedRoster) => {
                matching::nearest_assignment(&dists, self.config.tracking_gate)
            }
            (AssociationStrategy::Optimal, _) => {
                matching::linear_assignment(&dists, self.config.tracking_gate)
            }
        };

        let mut out = vec![Association::Dropped; detections.len()];
        for (row, col) in matches {
            out[col] = Association::Existing(self.identities[row].id);
        }

        if self.config.mode == TrackingMode::Adaptive {
            let mut minted = 0u64;
            for col in unmatched_detections {
                if self.at_capacity(minted as usize) {
                    break;
                }
                out[col] = Association::New(IdentityId(self.next_id + minted));
                minted += 1;
            }
        }

        out
    }

    /// Roster seeding: faces ordered top-to-bottom then left-to-right get
    /// consecutive ids, up to the identity cap.
    fn seed_roster(&self, detections: &[Detection]) -> Vec<Association> {
        let mut order: Vec<usize> = (0..detections.len()).collect();
        order.sort_by(|&a, &b| {
            let (ra, rb) = (&detections[a].bbox, &detections[b].bbox);
            ra.y.total_cmp(&rb.y).then(ra.x.total_cmp(&rb.x))
        });

        let limit = self.config.max_identities.unwrap_or(usize::MAX);
        let mut out = vec![Association::Dropped; detections.len()];
        for (rank, idx) in order.into_iter().take(limit).enumerate() {
            out[idx] = Association::New(IdentityId(self.next_id + rank as u64));
        }
        out
    }

    /// Associate and apply: mint new identities and append position and
    /// movement samples. Returns the identity updated by each detection.
    ///
    /// A frame without detections leaves every identity untouched.
    pub fn update(&mut self, detections: &[Detection], frame_id: u64) -> Vec<Option<IdentityId>> {
        if detections.is_empty() {
            trace!(frame_id, "no detections, identities left untouched");
            return Vec::new();
        }

        let associations = self.associate(detections);
        let mut minted: Vec<Identity> = Vec::new();

        for (det, assoc) in detections.iter().zip(&associations) {
            let center = det.center();
            match *assoc {
                Association::Existing(id) => {
                    if let Some(identity) = self.identity_mut(id) {
                        identity.observe_position(center, frame_id);
                    }
                }
                Association::New(id) => {
                    debug!(frame_id, identity = %id, x = center.x, y = center.y, "minted identity");
                    let mut identity =
                        Identity::new(id, center, self.config.history_capacity, frame_id);
                    identity.observe_position(center, frame_id);
                    minted.push(identity);
                }
                Association::Dropped => {
                    debug!(frame_id, x = center.x, y = center.y, "detection dropped");
                }
            }
        }

        minted.sort_by_key(|t| t.id);
        if let Some(last) = minted.last() {
            self.next_id = last.id.0 + 1;
        }
        self.identities.extend(minted);

        associations.iter().map(Association::identity).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(cx: f32, cy: f32) -> Detection {
        Detection::new(cx - 20.0, cy - 20.0, 40.0, 40.0)
    }

    #[test]
    fn test_far_detections_mint_in_order() {
        let mut tracker = IdentityTracker::new(TrackerConfig::default());
        let ids = tracker.update(&[face(100.0, 100.0), face(400.0, 100.0)], 1);
        assert_eq!(ids, vec![Some(IdentityId(1)), Some(IdentityId(2))]);

        let ids = tracker.update(&[face(700.0, 100.0)], 2);
        assert_eq!(ids, vec![Some(IdentityId(3))]);
        assert_eq!(tracker.len(), 3);
    }

    #[test]
    fn test_empty_frame_is_skipped() {
        let mut tracker = IdentityTracker::new(TrackerConfig::default());
        tracker.update(&[face(100.0, 100.0)], 1);
        assert!(tracker.update(&[], 2).is_empty());

        let ident = tracker.identity(IdentityId(1)).unwrap();
        assert_eq!(ident.positions.len(), 1);
        assert_eq!(ident.last_frame, 1);
    }

    #[test]
    fn test_identity_cap_drops_extra_faces() {
        let config = TrackerConfig {
            max_identities: Some(2),
            ..Default::default()
        };
        let mut tracker = IdentityTracker::new(config);
        let ids = tracker.update(&[face(0.0, 0.0), face(300.0, 0.0), face(600.0, 0.0)], 1);
        assert_eq!(ids, vec![Some(IdentityId(1)), Some(IdentityId(2)), None]);
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn test_fixed_roster_seeds_sorted_and_never_mints() {
        let config = TrackerConfig {
            tracking_gate: 150.0,
            max_identities: Some(6),
            mode: TrackingMode::FixedRoster,
            ..Default::default()
        };
        let mut tracker = IdentityTracker::new(config);

        // Bottom-right face listed first; roster ids follow (y, x) order.
        let ids = tracker.update(&[face(500.0, 400.0), face(100.0, 100.0)], 1);
        assert_eq!(ids, vec![Some(IdentityId(2)), Some(IdentityId(1))]);

        // A newcomer far from every anchor is ignored.
        let ids = tracker.update(&[face(110.0, 100.0), face(1200.0, 900.0)], 2);
        assert_eq!(ids, vec![Some(IdentityId(1)), None]);
        assert_eq!(tracker.len(), 2);

        // Matching is against the anchor, not the drifting last position.
        for f in 3..10 {
            tracker.update(&[face(100.0 + 20.0 * f as f32, 100.0)], f);
        }
        let ids = tracker.update(&[face(300.0, 100.0)], 10);
        assert_eq!(ids, vec![None]);
    }

    #[test]
    fn test_fixed_roster_drops_face_when_nearest_anchor_taken() {
        let config = TrackerConfig {
            tracking_gate: 150.0,
            mode: TrackingMode::FixedRoster,
            ..Default::default()
        };
        let mut tracker = IdentityTracker::new(config);
        tracker.update(&[face(100.0, 100.0), face(200.0, 100.0)], 1);

        // Both faces sit nearest to student 1; the second is not moved onto student 2.
        let ids = tracker.update(&[face(105.0, 100.0), face(110.0, 100.0)], 2);
        assert_eq!(ids, vec![Some(IdentityId(1)), None]);

        let neighbour = tracker.identity(IdentityId(2)).unwrap();
        assert_eq!(neighbour.positions.len(), 1);
        assert_eq!(neighbour.last_frame, 1);
    }

    #[test]
    fn test_optimal_association() {
        let config = TrackerConfig {
            tracking_gate: 70.0,
            association: AssociationStrategy::Optimal,
            ..Default::default()
        };
        let mut tracker = IdentityTracker::new(config);
        tracker.update(&[face(0.0, 0.0), face(60.0, 0.0)], 1);
        let ids = tracker.update(&[face(50.0, 0.0), face(110.0, 0.0)], 2);
        assert_eq!(ids, vec![Some(IdentityId(1)), Some(IdentityId(2))]);
        assert_eq!(tracker.len(), 2);
    }
}
