//! Vessel assembly: which bodies move as one.
//!
//! Linking two vessels merges them into the source's vessel. Breaking the
//! link splits them again, but only if nothing else still connects the two
//! halves: structural parent edges and the remaining live links both count.

use std::collections::{HashMap, HashSet, VecDeque};

use hecs::{Entity, World};

use crate::components::{Body, BodyId, Endpoint, VesselId};
use crate::engine::LinkRecord;

/// Merge the target body's vessel into the source body's vessel.
///
/// Returns the target's old vessel id when a merge happened, `None` when
/// both bodies already shared a vessel.
pub fn couple(world: &mut World, source_body: Entity, target_body: Entity) -> Option<VesselId> {
    let into = world.get::<&Body>(source_body).ok()?.vessel;
    let from = world.get::<&Body>(target_body).ok()?.vessel;
    if into == from {
        return None;
    }
    for (_, body) in world.query_mut::<&mut Body>() {
        if body.vessel == from {
            body.vessel = into;
        }
    }
    log::info!("Coupled vessel {:?} into {:?}", from, into);
    Some(from)
}

/// Bodies reachable from `start` over parent edges and live links.
pub fn connected_bodies(world: &World, start: Entity) -> HashSet<Entity> {
    let by_id: HashMap<BodyId, Entity> = world
        .query::<&Body>()
        .iter()
        .map(|(e, b)| (b.id, e))
        .collect();

    let mut edges: HashMap<Entity, Vec<Entity>> = HashMap::new();
    let mut connect = |a: Entity, b: Entity| {
        edges.entry(a).or_default().push(b);
        edges.entry(b).or_default().push(a);
    };
    for (e, body) in world.query::<&Body>().iter() {
        if let Some(parent) = body.parent.and_then(|p| by_id.get(&p)) {
            connect(e, *parent);
        }
    }
    let links: Vec<(Entity, Entity)> = world
        .query::<(&Endpoint, &LinkRecord)>()
        .iter()
        .map(|(_, (ep, rec))| (ep.body, rec.target))
        .collect();
    for (source_body, target_ep) in links {
        if let Ok(target) = world.get::<&Endpoint>(target_ep) {
            connect(source_body, target.body);
        }
    }

    let mut seen = HashSet::from([start]);
    let mut queue = VecDeque::from([start]);
    while let Some(e) = queue.pop_front() {
        for next in edges.get(&e).into_iter().flatten() {
            if seen.insert(*next) {
                queue.push_back(*next);
            }
        }
    }
    seen
}

/// Give the target's half of the assembly back its old vessel id, unless
/// it is still connected to the source body. Call after the link record
/// is gone. Returns true when the vessel was split.
pub fn split(world: &mut World, source_body: Entity, target_body: Entity, restore: VesselId) -> bool {
    let reached = connected_bodies(world, target_body);
    if reached.contains(&source_body) {
        log::debug!("Bodies still connected; vessel not split");
        return false;
    }
    for e in &reached {
        if let Ok(mut body) = world.get::<&mut Body>(*e) {
            body.vessel = restore;
        }
    }
    log::info!("Split {} bodies into vessel {:?}", reached.len(), restore);
    true
}
