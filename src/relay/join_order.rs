use std::collections::VecDeque;

use crate::net::protocol::PeerId;

/// Connection order of the peers in a room
///
/// The host is always the front entry: the oldest surviving connection.
#[derive(Debug, Clone, Default)]
pub struct JoinOrder {
    order: VecDeque<PeerId>,
}

impl JoinOrder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, id: PeerId) {
        if !self.order.contains(&id) {
            self.order.push_back(id);
        }
    }

    pub fn host(&self) -> Option<PeerId> {
        self.order.front().copied()
    }

    pub fn is_host(&self, id: PeerId) -> bool {
        self.host() == Some(id)
    }

    /// Remove `id`; returns the newly promoted host if `id` was the host
    /// and someone is left to take over
    pub fn remove(&mut self, id: PeerId) -> Option<PeerId> {
        let was_host = self.is_host(id);
        let pos = self.order.iter().position(|p| *p == id)?;
        self.order.remove(pos);
        if was_host {
            self.promote_next()
        } else {
            None
        }
    }

    /// The peer that holds host authority after the current front leaves
    pub fn promote_next(&self) -> Option<PeerId> {
        self.host()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PeerId> {
        self.order.iter()
    }
}
