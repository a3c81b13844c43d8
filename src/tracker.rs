mod cooldown;
mod history;
mod identity;
mod identity_tracker;
mod matching;
mod rect;

pub use cooldown::{CooldownState, RaiseCounter};
pub use history::{RollingHistory, variance};
pub use identity::{Identity, IdentityId};
pub use identity_tracker::{
    Association, AssociationStrategy, IdentityTracker, TrackerConfig, TrackingMode,
};
pub use matching::{
    AssignmentResult, Detection, PoseLandmarks, distance_matrix, greedy_assignment,
    linear_assignment, nearest_assignment,
};
pub use rect::Rect;
