mod emergency;
mod machine;
mod session;

pub use emergency::{EmergencyMinutes, EmergencyUnlockState};
pub use machine::{
    base_state, derive, directive_for, display_state, Directive, DisplayState, UnlockInputs,
    UnlockState, UnlockView, WorkoutInProgress,
};
pub use session::UnlockSession;
