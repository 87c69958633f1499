use thiserror::Error;

/// Passes of one frame, in submission order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FramePhase {
    Idle,
    ClearCounts,
    Assign,
    DepthResolve,
    Shade,
    Submitted,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame pass {to:?} cannot follow {from:?}")]
    OutOfOrder { from: FramePhase, to: FramePhase },
}

impl FramePhase {
    fn may_precede(self, next: FramePhase) -> bool {
        use FramePhase::*;
        matches!(
            (self, next),
            (Idle | Submitted, ClearCounts)
                | (ClearCounts, Assign)
                | (Assign, DepthResolve | Shade)
                | (DepthResolve, Shade)
                | (Shade, Submitted)
        )
    }
}

/// Tracks the passes recorded for the current frame and rejects any that
/// would let shading read counts that were not cleared and rebuilt.
#[derive(Debug)]
pub struct FrameSequencer {
    phase: FramePhase,
    frames_submitted: u64,
}

impl Default for FrameSequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSequencer {
    pub fn new() -> Self {
        Self {
            phase: FramePhase::Idle,
            frames_submitted: 0,
        }
    }

    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    pub fn frames_submitted(&self) -> u64 {
        self.frames_submitted
    }

    pub fn advance(&mut self, next: FramePhase) -> Result<(), FrameError> {
        if !self.phase.may_precede(next) {
            return Err(FrameError::OutOfOrder {
                from: self.phase,
                to: next,
            });
        }
        self.phase = next;
        if next == FramePhase::Submitted {
            self.frames_submitted += 1;
        }
        Ok(())
    }

    /// Drops a half recorded frame. Its buffers are rebuilt from scratch by
    /// the next frame's clear.
    pub fn abandon(&mut self) {
        if !matches!(self.phase, FramePhase::Idle | FramePhase::Submitted) {
            log::warn!("Abandoning frame at {:?}", self.phase);
        }
        self.phase = FramePhase::Idle;
    }

    /// True when no frame is half recorded, so grid sized buffers may be replaced.
    pub fn is_between_frames(&self) -> bool {
        matches!(self.phase, FramePhase::Idle | FramePhase::Submitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use FramePhase::*;

    #[test]
    fn full_frame_with_and_without_depth_resolve() {
        let mut frames = FrameSequencer::new();
        for phase in [ClearCounts, Assign, DepthResolve, Shade, Submitted] {
            frames.advance(phase).unwrap();
        }
        for phase in [ClearCounts, Assign, Shade, Submitted] {
            frames.advance(phase).unwrap();
        }
        assert_eq!(frames.frames_submitted(), 2);
        assert!(frames.is_between_frames());
    }

    #[test]
    fn assign_without_clear_is_rejected() {
        let mut frames = FrameSequencer::new();
        assert_eq!(
            frames.advance(Assign),
            Err(FrameError::OutOfOrder {
                from: Idle,
                to: Assign
            })
        );
        frames.advance(ClearCounts).unwrap();
        assert!(frames.advance(Shade).is_err());
        assert!(!frames.is_between_frames());
    }

    #[test]
    fn abandon_returns_to_idle() {
        let mut frames = FrameSequencer::new();
        frames.advance(ClearCounts).unwrap();
        frames.advance(Assign).unwrap();
        frames.abandon();
        assert_eq!(frames.phase(), Idle);
        frames.advance(ClearCounts).unwrap();
        assert_eq!(frames.frames_submitted(), 0);
    }
}
