use std::error::Error;
use std::fmt;

/// The error returned when a message is sent to an actor that has
/// already stopped.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ActorStoppedError;

impl fmt::Debug for ActorStoppedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorStoppedError").finish()
    }
}

impl fmt::Display for ActorStoppedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        "the actor has stopped".fmt(f)
    }
}

impl Error for ActorStoppedError {}
