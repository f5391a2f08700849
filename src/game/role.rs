//! Host election as seen from one client
//!
//! The relay decides who is host; this type only folds its messages (and the
//! local solo fallback) into a role and tells the session what to start or
//! stop.

use super::scheduler::TaskToken;
use crate::net::protocol::PeerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Waiting for a host assignment; the solo fallback is armed
    Pending,
    Host,
    Guest,
    /// Fallback fired with no assignment; simulates locally, publishes nothing host-only
    Solo,
}

impl Role {
    /// Whether this peer runs the horde director
    pub fn simulates(self) -> bool {
        matches!(self, Role::Host | Role::Solo)
    }
}

/// What the session must do after a role change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    /// Start (or keep) simulating and publishing as host
    Promote,
    /// Stop simulating; cancel host-only tasks
    Demote,
    /// Fallback fired: simulate locally
    GoSolo,
    /// Lost the host; arm the fallback again
    Rearm,
}

#[derive(Debug)]
pub struct HostElection {
    role: Role,
    self_id: Option<PeerId>,
    host_id: Option<PeerId>,
    fallback: Option<TaskToken>,
}

impl Default for HostElection {
    fn default() -> Self {
        Self::new()
    }
}

impl HostElection {
    pub fn new() -> Self {
        Self {
            role: Role::Pending,
            self_id: None,
            host_id: None,
            fallback: None,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn self_id(&self) -> Option<PeerId> {
        self.self_id
    }

    pub fn host_id(&self) -> Option<PeerId> {
        self.host_id
    }

    /// New connection identity from `welcome`
    pub fn set_self(&mut self, id: PeerId) {
        self.self_id = Some(id);
    }

    pub fn arm_fallback(&mut self, token: TaskToken) {
        self.fallback = Some(token);
    }

    /// Token of the armed fallback, to cancel in the scheduler
    pub fn take_fallback(&mut self) -> Option<TaskToken> {
        self.fallback.take()
    }

    pub fn on_host_assign(&mut self, is_host: bool) -> Transition {
        if is_host {
            self.host_id = self.self_id;
            self.become_host()
        } else {
            self.become_guest()
        }
    }

    pub fn on_host_changed(&mut self, host_id: PeerId) -> Transition {
        self.host_id = Some(host_id);
        if self.self_id == Some(host_id) {
            self.become_host()
        } else {
            self.become_guest()
        }
    }

    /// Stale firings (after an assignment arrived) change nothing
    pub fn on_fallback_fired(&mut self) -> Transition {
        self.fallback = None;
        if self.role == Role::Pending {
            self.role = Role::Solo;
            Transition::GoSolo
        } else {
            Transition::Unchanged
        }
    }

    /// Transport lost; the next connection is a new identity
    pub fn on_disconnected(&mut self) -> Transition {
        self.self_id = None;
        self.host_id = None;
        match self.role {
            Role::Host => {
                self.role = Role::Solo;
                Transition::Unchanged
            }
            Role::Guest => {
                self.role = Role::Pending;
                Transition::Rearm
            }
            Role::Pending | Role::Solo => Transition::Unchanged,
        }
    }

    fn become_host(&mut self) -> Transition {
        let was = self.role;
        self.role = Role::Host;
        if was == Role::Host {
            Transition::Unchanged
        } else {
            Transition::Promote
        }
    }

    fn become_guest(&mut self) -> Transition {
        let was = self.role;
        self.role = Role::Guest;
        if was.simulates() {
            Transition::Demote
        } else {
            Transition::Unchanged
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn joined() -> (HostElection, PeerId) {
        let mut election = HostElection::new();
        let id = Uuid::new_v4();
        election.set_self(id);
        (election, id)
    }

    #[test]
    fn test_assignment_decides_role() {
        let (mut a, _) = joined();
        assert_eq!(a.on_host_assign(true), Transition::Promote);
        assert_eq!(a.role(), Role::Host);

        let (mut b, _) = joined();
        assert_eq!(b.on_host_assign(false), Transition::Unchanged);
        assert_eq!(b.role(), Role::Guest);
    }

    #[test]
    fn test_host_changed_promotes_named_peer() {
        let (mut b, id) = joined();
        b.on_host_assign(false);
        assert_eq!(b.on_host_changed(id), Transition::Promote);
        assert_eq!(b.on_host_changed(id), Transition::Unchanged);
        assert_eq!(b.host_id(), Some(id));
    }

    #[test]
    fn test_host_changed_to_other_demotes_host() {
        let (mut a, _) = joined();
        a.on_host_assign(true);
        assert_eq!(a.on_host_changed(Uuid::new_v4()), Transition::Demote);
        assert_eq!(a.role(), Role::Guest);
    }

    #[test]
    fn test_fallback_only_from_pending() {
        let mut election = HostElection::new();
        assert_eq!(election.on_fallback_fired(), Transition::GoSolo);
        assert_eq!(election.role(), Role::Solo);

        let (mut guest, _) = joined();
        guest.on_host_assign(false);
        assert_eq!(guest.on_fallback_fired(), Transition::Unchanged);
        assert_eq!(guest.role(), Role::Guest);
    }

    #[test]
    fn test_solo_then_assignment() {
        let mut election = HostElection::new();
        election.on_fallback_fired();
        election.set_self(Uuid::new_v4());
        assert_eq!(election.on_host_assign(true), Transition::Promote);

        let mut election = HostElection::new();
        election.on_fallback_fired();
        assert_eq!(election.on_host_assign(false), Transition::Demote);
    }

    #[test]
    fn test_disconnect_paths() {
        let (mut host, _) = joined();
        host.on_host_assign(true);
        assert_eq!(host.on_disconnected(), Transition::Unchanged);
        assert_eq!(host.role(), Role::Solo);
        assert_eq!(host.self_id(), None);

        let (mut guest, _) = joined();
        guest.on_host_assign(false);
        assert_eq!(guest.on_disconnected(), Transition::Rearm);
        assert_eq!(guest.role(), Role::Pending);
    }

    #[test]
    fn test_take_fallback_once() {
        let mut scheduler = crate::game::scheduler::Scheduler::new();
        let token = scheduler.schedule_in(2.0, ());
        let mut election = HostElection::new();
        election.arm_fallback(token);
        assert_eq!(election.take_fallback(), Some(token));
        assert_eq!(election.take_fallback(), None);
    }
}
