/// Hand-raise counting state for one identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CooldownState {
    /// The next qualifying raise will be counted.
    #[default]
    Idle,
    /// A raise was counted at frame `since`; further raises are observed
    /// but not counted until the window has elapsed.
    Cooldown { since: u64 },
}

/// Counts hand raises with a minimum frame gap between two counted events.
#[derive(Debug, Clone)]
pub struct RaiseCounter {
    state: CooldownState,
    count: u32,
    last_counted: Option<u64>,
}

impl Default for RaiseCounter {
    fn default() -> Self {
        Self {
            state: CooldownState::Idle,
            count: 0,
            last_counted: None,
        }
    }
}

impl RaiseCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the raise observation for `frame`. Returns true when the raise
    /// was counted.
    ///
    /// The first raise always counts; later ones only once
    /// `frame - last_counted > cooldown_frames`.
    pub fn observe(&mut self, raised: bool, frame: u64, cooldown_frames: u64) -> bool {
        let elapsed_ok = match self.last_counted {
            None => true,
            Some(last) => frame.saturating_sub(last) > cooldown_frames,
        };
        if elapsed_ok {
            self.state = CooldownState::Idle;
        }
        if !(raised && elapsed_ok) {
            return false;
        }

        self.count += 1;
        self.last_counted = Some(frame);
        self.state = CooldownState::Cooldown { since: frame };
        true
    }

    #[inline]
    pub fn count(&self) -> u32 {
        self.count
    }

    #[inline]
    pub fn state(&self) -> CooldownState {
        self.state
    }

    /// Frame index of the last counted raise.
    #[inline]
    pub fn last_counted(&self) -> Option<u64> {
        self.last_counted
    }
}
