// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::TimerToken;

/// Page clock in milliseconds. Hosts advance it with `PageCommand::Tick`.
pub type Millis = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Pending {
    token: TimerToken,
    deadline: Millis,
}

/// Trailing-edge timer owned by exactly one widget instance. Scheduling again
/// supersedes the pending token, so only the last request in a burst fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Debounce {
    delay: Millis,
    pending: Option<Pending>,
    issued: u64,
}

impl Debounce {
    pub const fn new(delay: Millis) -> Self {
        Self {
            delay,
            pending: None,
            issued: 0,
        }
    }

    pub const fn delay(&self) -> Millis {
        self.delay
    }

    pub fn schedule(&mut self, now: Millis) -> TimerToken {
        self.issued = self.issued.saturating_add(1);
        let token = TimerToken::new(self.issued);
        self.pending = Some(Pending {
            token,
            deadline: now.saturating_add(self.delay),
        });
        token
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn deadline(&self) -> Option<Millis> {
        self.pending.map(|pending| pending.deadline)
    }

    /// Returns the token and clears the timer once `now` reaches the deadline.
    pub fn fire(&mut self, now: Millis) -> Option<TimerToken> {
        let pending = self.pending?;
        if now < pending.deadline {
            return None;
        }
        self.pending = None;
        Some(pending.token)
    }
}
