//! Two-phase startup queue.
//!
//! Registrations arriving before the owning component is ready are queued;
//! the Pending → Ready transition drains the queue exactly once, in arrival
//! order. Registration after Ready is refused rather than applied out of
//! band — late registrations could not take effect (for templates, bit
//! positions are already resolved) and silently accepting them would hide
//! the bug.

/// Startup phase of a [`StartupQueue`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Pending,
    Ready,
}

/// Registration refused by a [`StartupQueue`].
#[derive(Debug, PartialEq, Eq)]
pub enum StartupError {
    /// The one-shot Ready transition already happened.
    AlreadyReady,
}

impl std::fmt::Display for StartupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StartupError::AlreadyReady => write!(f, "startup already completed"),
        }
    }
}

impl std::error::Error for StartupError {}

/// Buffers registrations until a one-shot Ready transition.
#[derive(Debug)]
pub struct StartupQueue<T> {
    phase: Phase,
    queued: Vec<T>,
}

impl<T> StartupQueue<T> {
    pub fn new() -> Self {
        Self {
            phase: Phase::Pending,
            queued: Vec::new(),
        }
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.phase == Phase::Ready
    }

    /// Queue a registration. Refused once Ready.
    pub fn register(&mut self, item: T) -> Result<(), StartupError> {
        if self.is_ready() {
            return Err(StartupError::AlreadyReady);
        }
        self.queued.push(item);
        Ok(())
    }

    /// Transition to Ready and hand back everything queued, in arrival
    /// order. The transition happens exactly once; a second call is an
    /// error, not an empty list, so callers cannot double-drain by accident.
    pub fn drain_ready(&mut self) -> Result<Vec<T>, StartupError> {
        if self.is_ready() {
            return Err(StartupError::AlreadyReady);
        }
        self.phase = Phase::Ready;
        Ok(std::mem::take(&mut self.queued))
    }
}

impl<T> Default for StartupQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
