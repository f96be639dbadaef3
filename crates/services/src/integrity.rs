use chrono::{DateTime, Duration, Utc};
use tokio::sync::mpsc;

use interview_core::Clock;
use interview_core::model::MAX_INTEGRITY_STRIKES;

/// Focus-loss signals from the hosting environment.
///
/// Both map to the same strike event; the distinction only matters for logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FocusSignal {
    VisibilityLost,
    FocusLost,
}

/// Typed events the monitor delivers to the session controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntegrityEvent {
    Warning { strikes: u8 },
    Violation,
}

/// Outcome of registering a single focus-loss signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrikeOutcome {
    /// Collapsed into the previous strike; a single alt-tab fires both the
    /// visibility and the focus signal.
    Debounced,
    Warning(u8),
    /// Third strike. Fires exactly once; the monitor then disables itself.
    Violation,
    /// The monitor already fired its violation or was disabled.
    Disabled,
}

/// Strike counter for focus-loss during an active session.
///
/// Pure state machine: callers feed it signals with a timestamp and decide
/// what to do with the outcome. [`spawn_pump`] wires it to channels.
#[derive(Debug, Clone)]
pub struct IntegrityMonitor {
    strikes: u8,
    last_strike_at: Option<DateTime<Utc>>,
    debounce: Duration,
    disabled: bool,
}

impl Default for IntegrityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl IntegrityMonitor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            strikes: 0,
            last_strike_at: None,
            debounce: Duration::seconds(1),
            disabled: false,
        }
    }

    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    #[must_use]
    pub fn strikes(&self) -> u8 {
        self.strikes
    }

    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Register one focus-loss signal observed at `now`.
    pub fn register(&mut self, signal: FocusSignal, now: DateTime<Utc>) -> StrikeOutcome {
        if self.disabled {
            return StrikeOutcome::Disabled;
        }

        if let Some(last) = self.last_strike_at {
            if now - last < self.debounce {
                return StrikeOutcome::Debounced;
            }
        }

        self.strikes += 1;
        self.last_strike_at = Some(now);
        tracing::warn!(signal = ?signal, strikes = self.strikes, "focus lost during session");

        if self.strikes >= MAX_INTEGRITY_STRIKES {
            self.disabled = true;
            StrikeOutcome::Violation
        } else {
            StrikeOutcome::Warning(self.strikes)
        }
    }

    /// Stop reacting to further signals, e.g. once the session has ended.
    pub fn disable(&mut self) {
        self.disabled = true;
    }

    /// Fresh counter for a new session.
    pub fn reset(&mut self) {
        self.strikes = 0;
        self.last_strike_at = None;
        self.disabled = false;
    }
}

/// Bridge an external focus-signal source into typed integrity events.
///
/// The pump task ends when the source closes, the controller drops the
/// returned receiver, or the violation fires. The monitor never keeps firing
/// into a finished session.
pub fn spawn_pump(
    mut monitor: IntegrityMonitor,
    clock: Clock,
    mut signals: mpsc::Receiver<FocusSignal>,
) -> mpsc::Receiver<IntegrityEvent> {
    let (events_tx, events_rx) = mpsc::channel(8);

    tokio::spawn(async move {
        while let Some(signal) = signals.recv().await {
            match monitor.register(signal, clock.now()) {
                StrikeOutcome::Debounced => {}
                StrikeOutcome::Warning(strikes) => {
                    if events_tx
                        .send(IntegrityEvent::Warning { strikes })
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                StrikeOutcome::Violation => {
                    let _ = events_tx.send(IntegrityEvent::Violation).await;
                    break;
                }
                StrikeOutcome::Disabled => break,
            }
        }
    });

    events_rx
}
