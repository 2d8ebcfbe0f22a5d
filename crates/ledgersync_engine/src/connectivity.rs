//! Connectivity state tracking.

use parking_lot::RwLock;

#[derive(Debug, Clone, Copy)]
struct Flags {
    physical: bool,
    manual_offline: bool,
}

/// Outcome of a connectivity transition.
///
/// The engine uses this to decide what the transition requires: an event
/// when a flag actually changed, and a drain on the offline-to-online
/// edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Whether any flag changed (a repeated signal is not a transition).
    pub changed: bool,
    /// Effective online state after the transition.
    pub online: bool,
    /// Whether this transition crossed the offline-to-online edge.
    pub should_drain: bool,
}

/// Tracks the platform connectivity signal and the manual-offline override.
///
/// The effective state is `physical && !manual_offline`: the override
/// forces "offline" regardless of the physical layer. Transition methods
/// are pure state updates; persistence, events, and drain triggering are
/// wired by the engine.
#[derive(Debug)]
pub struct ConnectivityState {
    flags: RwLock<Flags>,
}

impl ConnectivityState {
    /// Creates a state with the given physical signal and no override.
    pub fn new(physical: bool) -> Self {
        Self {
            flags: RwLock::new(Flags {
                physical,
                manual_offline: false,
            }),
        }
    }

    /// Returns the effective online state.
    pub fn is_online(&self) -> bool {
        let flags = self.flags.read();
        flags.physical && !flags.manual_offline
    }

    /// Returns the last reported physical state.
    pub fn physical(&self) -> bool {
        self.flags.read().physical
    }

    /// Returns whether the manual-offline override is enabled.
    pub fn manual_offline(&self) -> bool {
        self.flags.read().manual_offline
    }

    /// Records a physical connectivity signal.
    pub fn update_physical(&self, connected: bool) -> Transition {
        let mut flags = self.flags.write();
        let was_online = flags.physical && !flags.manual_offline;
        let changed = flags.physical != connected;
        flags.physical = connected;
        let online = flags.physical && !flags.manual_offline;

        Transition {
            changed,
            online,
            should_drain: !was_online && online,
        }
    }

    /// Enables or disables the manual-offline override.
    ///
    /// Disabling re-evaluates the last known physical state; if that state
    /// is connected, the transition crosses the offline-to-online edge.
    pub fn set_manual_offline(&self, enabled: bool) -> Transition {
        let mut flags = self.flags.write();
        let was_online = flags.physical && !flags.manual_offline;
        let changed = flags.manual_offline != enabled;
        flags.manual_offline = enabled;
        let online = flags.physical && !flags.manual_offline;

        Transition {
            changed,
            online,
            should_drain: !was_online && online,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_state_combines_flags() {
        let state = ConnectivityState::new(true);
        assert!(state.is_online());

        state.set_manual_offline(true);
        assert!(!state.is_online());
        assert!(state.physical());

        state.update_physical(false);
        state.set_manual_offline(false);
        assert!(!state.is_online());
    }

    #[test]
    fn reconnect_edge_requests_drain() {
        let state = ConnectivityState::new(false);

        let t = state.update_physical(true);
        assert!(t.changed);
        assert!(t.online);
        assert!(t.should_drain);
    }

    #[test]
    fn repeated_signal_is_not_a_transition() {
        let state = ConnectivityState::new(true);

        let t = state.update_physical(true);
        assert!(!t.changed);
        assert!(!t.should_drain);
    }

    #[test]
    fn reconnect_under_override_does_not_drain() {
        let state = ConnectivityState::new(false);
        state.set_manual_offline(true);

        let t = state.update_physical(true);
        assert!(t.changed);
        assert!(!t.online);
        assert!(!t.should_drain);
    }

    #[test]
    fn disabling_override_while_connected_drains_once() {
        let state = ConnectivityState::new(true);
        state.set_manual_offline(true);

        let t = state.set_manual_offline(false);
        assert!(t.changed);
        assert!(t.online);
        assert!(t.should_drain);
    }

    #[test]
    fn disabling_override_while_disconnected_stays_offline() {
        let state = ConnectivityState::new(false);
        state.set_manual_offline(true);

        let t = state.set_manual_offline(false);
        assert!(t.changed);
        assert!(!t.online);
        assert!(!t.should_drain);
    }
}
