//! Shared cross-platform state types.

/// Lifecycle state of the sync engine.
///
/// Transitions are strictly `Idle -> Running -> Idle`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EngineState {
    #[default]
    Idle,
    Running,
}

impl EngineState {
    pub const fn from_running(running: bool) -> Self {
        if running {
            Self::Running
        } else {
            Self::Idle
        }
    }
}
