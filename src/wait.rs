//! Bounded polling on top of [`dom`] probes.
//!
//! A probe that errors counts as "not yet": pages in the middle of a
//! navigation routinely reject script evaluation. Every wait gives up after
//! its [`Patience`] runs out and reports `false`/`None` instead of failing.

use std::time::Duration;

use crate::browser::BrowserSession;
use crate::dom::{self, ClickPoint};
use crate::pacing::Pacer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Patience {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Patience {
    pub const fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    fn polls(&self) -> u128 {
        let interval = self.interval.as_millis().max(1);
        self.timeout.as_millis().div_ceil(interval)
    }
}

/// Counts down the remaining polls, pausing between them.
pub struct Poller<'a> {
    pacer: &'a dyn Pacer,
    interval: Duration,
    polls_left: u128,
}

impl<'a> Poller<'a> {
    pub fn new(pacer: &'a dyn Pacer, patience: Patience) -> Self {
        Self {
            pacer,
            interval: patience.interval,
            polls_left: patience.polls(),
        }
    }

    /// Waits one interval; `false` once the budget is spent.
    pub async fn next(&mut self) -> bool {
        if self.polls_left == 0 {
            return false;
        }
        self.polls_left -= 1;
        self.pacer.pause(self.interval).await;
        true
    }
}

fn settled(probe: &str, result: anyhow::Result<bool>) -> bool {
    match result {
        Ok(done) => done,
        Err(err) => {
            tracing::debug!(probe, "probe failed: {err:#}");
            false
        }
    }
}

pub async fn until_visible(
    session: &mut dyn BrowserSession,
    pacer: &dyn Pacer,
    patience: Patience,
    id: &str,
) -> bool {
    let mut poller = Poller::new(pacer, patience);
    loop {
        if settled("element visible", dom::element_visible(session, id).await) {
            return true;
        }
        if !poller.next().await {
            return false;
        }
    }
}

pub async fn until_image_loaded(
    session: &mut dyn BrowserSession,
    pacer: &dyn Pacer,
    patience: Patience,
    id: &str,
) -> bool {
    let mut poller = Poller::new(pacer, patience);
    loop {
        if settled("image loaded", dom::image_loaded(session, id).await) {
            return true;
        }
        if !poller.next().await {
            return false;
        }
    }
}

/// Waits for the element remembered by [`dom::mark_reference`] to go stale.
pub async fn until_stale(
    session: &mut dyn BrowserSession,
    pacer: &dyn Pacer,
    patience: Patience,
) -> bool {
    let mut poller = Poller::new(pacer, patience);
    loop {
        if settled("reference stale", dom::reference_stale(session).await) {
            return true;
        }
        if !poller.next().await {
            return false;
        }
    }
}

pub async fn until_body_present(
    session: &mut dyn BrowserSession,
    pacer: &dyn Pacer,
    patience: Patience,
) -> bool {
    let mut poller = Poller::new(pacer, patience);
    loop {
        if settled("body present", dom::body_present(session).await) {
            return true;
        }
        if !poller.next().await {
            return false;
        }
    }
}

/// Waits until a click at the link's center would hit the link itself.
pub async fn until_clickable(
    session: &mut dyn BrowserSession,
    pacer: &dyn Pacer,
    patience: Patience,
    index: usize,
) -> Option<ClickPoint> {
    let mut poller = Poller::new(pacer, patience);
    loop {
        match dom::link_click_point(session, index).await {
            Ok(Some(point)) if point.clickable => return Some(point),
            Ok(_) => {}
            Err(err) => tracing::debug!(probe = "link click point", "probe failed: {err:#}"),
        }
        if !poller.next().await {
            return None;
        }
    }
}
