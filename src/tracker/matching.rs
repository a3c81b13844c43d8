//! Detections and centroid matching utilities.

use nalgebra::Point2;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::tracker::rect::Rect;

/// Cost used for padding and for pairs outside the gate.
const INFEASIBLE: f64 = 1e6;

/// Normalized (0-1) pose landmark heights used by the pose hand-raise policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseLandmarks {
    pub left_wrist_y: f32,
    pub right_wrist_y: f32,
    pub left_shoulder_y: f32,
    pub right_shoulder_y: f32,
}

/// One face observed in a single frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Bounding box in TLWH format
    pub bbox: Rect,
    /// Detection confidence score
    #[serde(default = "full_confidence")]
    pub score: f32,
    /// Number of eyes found inside the box, if the detector measured it
    #[serde(default)]
    pub eye_count: Option<u32>,
    /// Pose landmarks attached to this subject, if available
    #[serde(default)]
    pub pose: Option<PoseLandmarks>,
}

fn full_confidence() -> f32 {
    1.0
}

impl Detection {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::from_rect(Rect::new(x, y, width, height), 1.0)
    }

    pub fn from_rect(bbox: Rect, score: f32) -> Self {
        Self {
            bbox,
            score,
            eye_count: None,
            pose: None,
        }
    }

    pub fn with_eyes(mut self, eye_count: u32) -> Self {
        self.eye_count = Some(eye_count);
        self
    }

    #[inline]
    pub fn center(&self) -> Point2<f32> {
        self.bbox.center()
    }
}

/// Compute the Euclidean distance matrix between identity positions (rows)
/// and detection centers (columns).
pub fn distance_matrix(positions: &[Point2<f32>], centers: &[Point2<f32>]) -> Array2<f32> {
    let mut dists = Array2::zeros((positions.len(), centers.len()));
    for (i, p) in positions.iter().enumerate() {
        for (j, c) in centers.iter().enumerate() {
            dists[[i, j]] = nalgebra::distance(p, c);
        }
    }
    dists
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssignmentResult {
    /// (row, column) pairs, i.e. (identity index, detection index)
    pub matches: Vec<(usize, usize)>,
    pub unmatched_identities: Vec<usize>,
    pub unmatched_detections: Vec<usize>,
}

/// Greedy nearest-centroid assignment.
///
/// Columns are visited in order; each takes the closest unclaimed row whose
/// distance is strictly below `gate`. Equal distances keep the lower row
/// index, and an earlier column always wins a row over a later one.
pub fn greedy_assignment(dists: &Array2<f32>, gate: f32) -> AssignmentResult {
    let (num_rows, num_cols) = dists.dim();
    let mut claimed = vec![false; num_rows];
    let mut result = AssignmentResult::default();

    for col in 0..num_cols {
        let mut best: Option<(usize, f32)> = None;
        for row in 0..num_rows {
            if claimed[row] {
                continue;
            }
            let d = dists[[row, col]];
            let limit = best.map_or(gate, |(_, bd)| bd);
            if d < limit {
                best = Some((row, d));
            }
        }

        match best {
            Some((row, _)) => {
                claimed[row] = true;
                result.matches.push((row, col));
            }
            None => result.unmatched_detections.push(col),
        }
    }

    result.unmatched_identities = (0..num_rows).filter(|&r| !claimed[r]).collect();
    result
}

/// Nearest-row assignment without fallback.
///
/// Each column picks its single closest row (lower row on ties). The pair
/// matches when that distance is strictly below `gate` and no earlier column
/// took the row this round; otherwise the column stays unmatched.
pub fn nearest_assignment(dists: &Array2<f32>, gate: f32) -> AssignmentResult {
    let (num_rows, num_cols) = dists.dim();
    let mut claimed = vec![false; num_rows];
    let mut result = AssignmentResult::default();

    for col in 0..num_cols {
        let mut nearest: Option<(usize, f32)> = None;
        for row in 0..num_rows {
            let d = dists[[row, col]];
            if nearest.map_or(true, |(_, nd)| d < nd) {
                nearest = Some((row, d));
            }
        }

        match nearest {
            Some((row, d)) if d < gate && !claimed[row] => {
                claimed[row] = true;
                result.matches.push((row, col));
            }
            _ => result.unmatched_detections.push(col),
        }
    }

    result.unmatched_identities = (0..num_rows).filter(|&r| !claimed[r]).collect();
    result
}

/// Minimum total-distance assignment (Jonker-Volgenant) restricted to pairs
/// strictly below `gate`.
pub fn linear_assignment(dists: &Array2<f32>, gate: f32) -> AssignmentResult {
    let (num_rows, num_cols) = dists.dim();

    if num_rows == 0 {
        return AssignmentResult {
            matches: vec![],
            unmatched_identities: vec![],
            unmatched_detections: (0..num_cols).collect(),
        };
    }

    if num_cols == 0 {
        return AssignmentResult {
            matches: vec![],
            unmatched_identities: (0..num_rows).collect(),
            unmatched_detections: vec![],
        };
    }

    let size = num_rows.max(num_cols);
    let mut padded = Array2::<f64>::from_elem((size, size), INFEASIBLE);

    for i in 0..num_rows {
        for j in 0..num_cols {
            let d = dists[[i, j]];
            if d < gate {
                padded[[i, j]] = d as f64;
            }
        }
    }

    let mut matches = vec![];
    let mut unmatched_identities = vec![];
    let mut unmatched_detections_mask: Vec<bool> = vec![true; num_cols];

    match lapjv::lapjv(&padded) {
        Ok((row_to_col, _)) => {
            for (row_idx, &col_idx) in row_to_col.iter().enumerate() {
                if row_idx >= num_rows {
                    continue;
                }
                if col_idx < num_cols && dists[[row_idx, col_idx]] < gate {
                    matches.push((row_idx, col_idx));
                    unmatched_detections_mask[col_idx] = false;
                } else {
                    unmatched_identities.push(row_idx);
                }
            }
        }
        Err(e) => {
            tracing::warn!("assignment solver failed, falling back to greedy: {:?}", e);
            return greedy_assignment(dists, gate);
        }
    }

    matches.sort_by_key(|&(_, col)| col);

    let unmatched_detections: Vec<usize> = unmatched_detections_mask
        .iter()
        .enumerate()
        .filter_map(|(i, &u)| if u { Some(i) } else { None })
        .collect();

    AssignmentResult {
        matches,
        unmatched_identities,
        unmatched_detections,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(v: &[(f32, f32)]) -> Vec<Point2<f32>> {
        v.iter().map(|&(x, y)| Point2::new(x, y)).collect()
    }

    #[test]
    fn test_distance_matrix() {
        let d = distance_matrix(&pts(&[(0.0, 0.0)]), &pts(&[(3.0, 4.0), (0.0, 1.0)]));
        assert_eq!(d.dim(), (1, 2));
        assert!((d[[0, 0]] - 5.0).abs() < 1e-6);
        assert!((d[[0, 1]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_greedy_first_detection_claims() {
        // One identity, two detections both inside the gate.
        let d = distance_matrix(&pts(&[(100.0, 100.0)]), &pts(&[(130.0, 100.0), (110.0, 100.0)]));
        let res = greedy_assignment(&d, 80.0);
        assert_eq!(res.matches, vec![(0, 0)]);
        assert_eq!(res.unmatched_detections, vec![1]);
        assert!(res.unmatched_identities.is_empty());
    }

    #[test]
    fn test_greedy_gate_is_strict() {
        let d = distance_matrix(&pts(&[(0.0, 0.0)]), &pts(&[(80.0, 0.0)]));
        let res = greedy_assignment(&d, 80.0);
        assert!(res.matches.is_empty());
        assert_eq!(res.unmatched_detections, vec![0]);
        assert_eq!(res.unmatched_identities, vec![0]);
    }

    #[test]
    fn test_nearest_does_not_fall_back_to_second_row() {
        let d = distance_matrix(
            &pts(&[(100.0, 100.0), (200.0, 100.0)]),
            &pts(&[(105.0, 100.0), (110.0, 100.0)]),
        );
        let res = nearest_assignment(&d, 150.0);
        assert_eq!(res.matches, vec![(0, 0)]);
        assert_eq!(res.unmatched_detections, vec![1]);
        assert_eq!(res.unmatched_identities, vec![1]);

        // Greedy hands the second detection to the other row.
        let res = greedy_assignment(&d, 150.0);
        assert_eq!(res.matches, vec![(0, 0), (1, 1)]);
    }

    #[test]
    fn test_nearest_gate_is_strict() {
        let d = distance_matrix(&pts(&[(0.0, 0.0)]), &pts(&[(80.0, 0.0), (79.0, 0.0)]));
        let res = nearest_assignment(&d, 80.0);
        assert_eq!(res.matches, vec![(0, 1)]);
        assert_eq!(res.unmatched_detections, vec![0]);
    }

    #[test]
    fn test_greedy_tie_keeps_lower_row() {
        let d = distance_matrix(&pts(&[(0.0, 0.0), (20.0, 0.0)]), &pts(&[(10.0, 0.0)]));
        let res = greedy_assignment(&d, 80.0);
        assert_eq!(res.matches, vec![(0, 0)]);
    }

    #[test]
    fn test_linear_assignment_minimizes_total_distance() {
        // Greedy would give detection 0 to identity 1 (distance 10) and strand
        // identity 0; the optimal solution matches both.
        let ids = pts(&[(0.0, 0.0), (60.0, 0.0)]);
        let dets = pts(&[(50.0, 0.0), (110.0, 0.0)]);
        let d = distance_matrix(&ids, &dets);

        let greedy = greedy_assignment(&d, 70.0);
        assert_eq!(greedy.matches, vec![(1, 0)]);

        let optimal = linear_assignment(&d, 70.0);
        assert_eq!(optimal.matches, vec![(0, 0), (1, 1)]);
        assert!(optimal.unmatched_detections.is_empty());
    }

    #[test]
    fn test_linear_assignment_empty() {
        let d = Array2::<f32>::zeros((0, 3));
        let res = linear_assignment(&d, 80.0);
        assert_eq!(res.unmatched_detections, vec![0, 1, 2]);
    }

    #[test]
    fn test_detection_deserialize_defaults() {
        let det: Detection =
            serde_json::from_str(r#"{"bbox":{"x":1.0,"y":2.0,"width":3.0,"height":4.0}}"#)
                .unwrap();
        assert_eq!(det.score, 1.0);
        assert_eq!(det.eye_count, None);
        assert!(det.pose.is_none());
    }
}
