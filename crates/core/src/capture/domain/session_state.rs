use crate::capture::domain::capture_output::CaptureOutput;
use crate::capture::domain::dwell_accumulator::DwellState;

/// Capture latch. `Latched` is terminal for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CapturePhase {
    #[default]
    Armed,
    Latched,
}

/// Everything that persists between frames of one capture session.
///
/// Owned by the caller and threaded through each controller step; a fresh
/// value starts a new session.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionState {
    pub dwell: DwellState,
    pub phase: CapturePhase,
    pub output: CaptureOutput,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_latched(&self) -> bool {
        self.phase == CapturePhase::Latched
    }

    /// Moves to `Latched` with the captured output. Only valid from `Armed`.
    pub(crate) fn latch(self, output: CaptureOutput) -> Self {
        debug_assert_eq!(self.phase, CapturePhase::Armed, "session already latched");
        Self {
            dwell: self.dwell,
            phase: CapturePhase::Latched,
            output,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_armed_and_empty() {
        let state = SessionState::new();
        assert_eq!(state.phase, CapturePhase::Armed);
        assert!(!state.is_latched());
        assert!(state.output.is_empty());
        assert!(!state.dwell.is_accumulating());
    }

    #[test]
    fn test_latch_sets_phase_and_output() {
        let state = SessionState::new().latch(CaptureOutput::captured("img".to_string()));
        assert!(state.is_latched());
        assert!(state.output.face_detected);
        assert_eq!(state.output.image_base64, "img");
    }
}
