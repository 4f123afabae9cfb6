//! Id helpers.
//!
//! Session ids are full UUID v4 strings (a client-supplied `callId` takes
//! precedence over a generated one). Utterance ids are short opaque tags,
//! the first 8 characters of a fresh UUID, matching what the dashboard
//! stores per transcript entry.

use uuid::Uuid;

/// Length of a short utterance id.
const UTTERANCE_ID_LEN: usize = 8;

/// Generate a new session id.
#[must_use]
pub fn session_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generate a short opaque utterance id.
#[must_use]
pub fn utterance_id() -> String {
    let mut id = Uuid::new_v4().to_string();
    id.truncate(UTTERANCE_ID_LEN);
    id
}
