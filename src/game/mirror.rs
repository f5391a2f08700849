//! Render-side projection of the horde
//!
//! Guests replace the whole projection from each host snapshot; the host
//! feeds its own registry through the same path. Only the render calls are
//! diffed so the scene sees add/remove/update instead of a rebuild.

use hashbrown::HashSet;

use super::enemy::EnemyId;
use super::ports::{EntityId, EntityKind, RenderSink};
use crate::net::protocol::{EnemyProjection, Transform};

/// Height the render layer places enemies at
const ENEMY_Y: f32 = 0.0;

#[derive(Debug, Default)]
pub struct EnemyMirror {
    projections: Vec<EnemyProjection>,
    shown: HashSet<EnemyId>,
}

impl EnemyMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn projections(&self) -> &[EnemyProjection] {
        &self.projections
    }

    pub fn get(&self, id: EnemyId) -> Option<&EnemyProjection> {
        self.projections.iter().find(|p| p.id == id)
    }

    /// Replace the projection wholesale
    pub fn apply(&mut self, snapshot: Vec<EnemyProjection>, render: &mut dyn RenderSink) {
        let mut still_shown = HashSet::with_capacity(snapshot.len());
        for p in snapshot.iter().filter(|p| p.alive) {
            let transform = transform_of(p);
            let id = EntityId::Enemy(p.id);
            // A slot that respawned as a different kind needs a new model
            let same_kind = self
                .get(p.id)
                .is_some_and(|old| old.kind == p.kind && old.alive);
            if self.shown.contains(&p.id) && same_kind {
                render.update_transform(id, transform);
            } else {
                if self.shown.contains(&p.id) {
                    render.remove_entity(id);
                }
                render.add_entity(id, EntityKind::Enemy(p.kind), transform);
            }
            still_shown.insert(p.id);
        }
        for gone in self.shown.difference(&still_shown) {
            render.remove_entity(EntityId::Enemy(*gone));
        }
        self.shown = still_shown;
        self.projections = snapshot;
    }
}

fn transform_of(p: &EnemyProjection) -> Transform {
    Transform {
        x: p.x,
        y: ENEMY_Y,
        z: p.z,
        ry: p.yaw,
    }
}
