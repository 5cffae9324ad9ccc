//! Rejections surfaced to the connection that caused them.
//!
//! None of these are fatal: the connection stays open and may retry. They are
//! never broadcast to other members of a room.

use thiserror::Error;

use crate::registry::JoinError;

/// A relay-level rejection. The `Display` text is what the client sees in
/// the `error` frame.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayError {
    /// The room id failed normalization (3-20 chars of `A-Z 0-9 _ -`).
    #[error("Invalid meeting ID.")]
    InvalidRoomId,

    /// The connection is already a member of a room.
    #[error("Already in a meeting.")]
    AlreadyInMeeting,

    /// The room is at its member cap.
    #[error("Meeting is full.")]
    MeetingFull,

    /// The connection exhausted its chat quota for the current window.
    #[error("Sending too fast. Please slow down.")]
    TooFast,
}

impl From<JoinError> for RelayError {
    fn from(err: JoinError) -> Self {
        match err {
            JoinError::AlreadyInRoom => RelayError::AlreadyInMeeting,
            JoinError::RoomFull => RelayError::MeetingFull,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(RelayError::InvalidRoomId.to_string(), "Invalid meeting ID.");
        assert_eq!(RelayError::AlreadyInMeeting.to_string(), "Already in a meeting.");
        assert_eq!(RelayError::MeetingFull.to_string(), "Meeting is full.");
        assert_eq!(
            RelayError::TooFast.to_string(),
            "Sending too fast. Please slow down."
        );
    }

    #[test]
    fn test_join_error_mapping() {
        assert_eq!(
            RelayError::from(JoinError::AlreadyInRoom),
            RelayError::AlreadyInMeeting
        );
        assert_eq!(RelayError::from(JoinError::RoomFull), RelayError::MeetingFull);
    }
}
