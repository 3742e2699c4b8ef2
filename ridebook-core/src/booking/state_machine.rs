use std::fmt;

use crate::models::RideStatus;

/// Event applied to a ride by a lifecycle operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RideEvent {
    /// A driver accepts, or an admin assigns one
    BindDriver,

    /// The bound driver finished the trip
    Complete,

    /// The owning customer cancels
    Cancel,

    /// The owning customer edits fields
    Edit,
}

impl fmt::Display for RideEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RideEvent::BindDriver => write!(f, "bind_driver"),
            RideEvent::Complete => write!(f, "complete"),
            RideEvent::Cancel => write!(f, "cancel"),
            RideEvent::Edit => write!(f, "edit"),
        }
    }
}

/// Trait for transitions in the ride lifecycle state machine.
pub trait Transition {
    /// Determines the status a ride moves to when `event` is applied.
    ///
    /// # Returns
    ///
    /// Returns the next status, or `None` if the event is illegal in
    /// `current`. `Edit` keeps the status unchanged when legal.
    fn transition(current: RideStatus, event: RideEvent) -> Option<RideStatus>;

    /// Gets the status of a newly created ride.
    fn initial_state() -> RideStatus {
        RideStatus::Pending
    }

    /// Whether no event can leave `status`.
    fn is_terminal(status: RideStatus) -> bool {
        [
            RideEvent::BindDriver,
            RideEvent::Complete,
            RideEvent::Cancel,
            RideEvent::Edit,
        ]
        .iter()
        .all(|event| Self::transition(status, *event).is_none())
    }
}

/// Ride lifecycle:
/// - Pending -> Accepted (driver bound)
/// - Accepted -> Completed
/// - Pending | Accepted -> Cancelled
/// - Pending -> Pending (edit)
///
/// Completed and Cancelled are terminal. No transition returns to an
/// earlier state.
pub struct RideStateMachine;

impl Transition for RideStateMachine {
    fn transition(current: RideStatus, event: RideEvent) -> Option<RideStatus> {
        match (current, event) {
            (RideStatus::Pending, RideEvent::BindDriver) => Some(RideStatus::Accepted),
            (RideStatus::Pending, RideEvent::Edit) => Some(RideStatus::Pending),
            (RideStatus::Pending, RideEvent::Cancel) => Some(RideStatus::Cancelled),
            (RideStatus::Accepted, RideEvent::Complete) => Some(RideStatus::Completed),
            (RideStatus::Accepted, RideEvent::Cancel) => Some(RideStatus::Cancelled),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_to_accepted_transition() {
        assert_eq!(
            RideStateMachine::transition(RideStatus::Pending, RideEvent::BindDriver),
            Some(RideStatus::Accepted)
        );
    }

    #[test]
    fn test_accepted_to_completed() {
        assert_eq!(
            RideStateMachine::transition(RideStatus::Accepted, RideEvent::Complete),
            Some(RideStatus::Completed)
        );
    }

    #[test]
    fn test_complete_requires_accepted() {
        assert_eq!(
            RideStateMachine::transition(RideStatus::Pending, RideEvent::Complete),
            None
        );
    }

    #[test]
    fn test_cancel_only_from_active_states() {
        assert_eq!(
            RideStateMachine::transition(RideStatus::Pending, RideEvent::Cancel),
            Some(RideStatus::Cancelled)
        );
        assert_eq!(
            RideStateMachine::transition(RideStatus::Accepted, RideEvent::Cancel),
            Some(RideStatus::Cancelled)
        );
        assert_eq!(
            RideStateMachine::transition(RideStatus::Completed, RideEvent::Cancel),
            None
        );
    }

    #[test]
    fn test_edit_only_while_pending() {
        assert_eq!(
            RideStateMachine::transition(RideStatus::Pending, RideEvent::Edit),
            Some(RideStatus::Pending)
        );
        assert_eq!(
            RideStateMachine::transition(RideStatus::Accepted, RideEvent::Edit),
            None
        );
    }

    #[test]
    fn test_terminal_states() {
        assert_eq!(RideStateMachine::initial_state(), RideStatus::Pending);
        assert!(RideStateMachine::is_terminal(RideStatus::Completed));
        assert!(RideStateMachine::is_terminal(RideStatus::Cancelled));
        assert!(!RideStateMachine::is_terminal(RideStatus::Pending));
        assert!(!RideStateMachine::is_terminal(RideStatus::Accepted));
    }

    #[test]
    fn test_no_transition_goes_backwards() {
        let rank = |s: RideStatus| match s {
            RideStatus::Pending => 0,
            RideStatus::Accepted => 1,
            RideStatus::Completed | RideStatus::Cancelled => 2,
        };
        for status in RideStatus::ALL {
            for event in [
                RideEvent::BindDriver,
                RideEvent::Complete,
                RideEvent::Cancel,
                RideEvent::Edit,
            ] {
                if let Some(next) = RideStateMachine::transition(status, event) {
                    assert!(rank(next) >= rank(status), "{status} --{event}--> {next}");
                }
            }
        }
    }
}
