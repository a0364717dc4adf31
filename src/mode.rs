/// Whether stochastic regularisation is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Train,
    Eval,
}

/// Whether a forward step is recorded for a later backward pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradMode {
    Record,
    NoGrad,
}

/// Explicit mode passed into every forward call of the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardMode {
    pub phase: Phase,
    pub grad: GradMode,
}

impl ForwardMode {
    /// Dropout on, steps recorded for truncated BPTT.
    pub const TRAINING: ForwardMode = ForwardMode {
        phase: Phase::Train,
        grad: GradMode::Record,
    };

    /// Dropout off, nothing retained.
    pub const INFERENCE: ForwardMode = ForwardMode {
        phase: Phase::Eval,
        grad: GradMode::NoGrad,
    };

    pub fn is_training(&self) -> bool {
        self.phase == Phase::Train
    }

    pub fn records(&self) -> bool {
        self.grad == GradMode::Record
    }
}
