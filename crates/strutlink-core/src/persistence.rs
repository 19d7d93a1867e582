//! Save/Load for link state
//!
//! Uses bincode. Entities are not stable across sessions, so endpoints and
//! partners are saved by `(BodyId, node name)`.
//!
//! Restoring is a single pass that fails safe: only a source and target
//! that were both Linked and point at each other come back linked. Every
//! other Linked endpoint is reset to Available.

use std::collections::HashMap;
use std::io::{Read, Write};

use hecs::{Entity, World};
use serde::{Deserialize, Serialize};
use strutlink_logic::link_state::{EndpointRole, LinkState};
use strutlink_logic::math::Pose;
use thiserror::Error;

use crate::assembly;
use crate::bus::LinkActor;
use crate::components::*;
use crate::engine::{LinkEngine, LinkRecord};
use crate::error::LinkError;
use crate::physics::PhysicsScene;
use crate::renderer::{make_renderer, RendererSlot};

/// Version number for save file format (increment when format changes)
pub const SAVE_VERSION: u32 = 1;

/// Reference to an endpoint that survives reloads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartnerRef {
    pub body: BodyId,
    pub node_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedEndpoint {
    pub body: BodyId,
    pub node_name: String,
    pub role: EndpointRole,
    pub link_type: String,
    pub node: Pose,
    pub source_config: Option<SourceConfig>,
    pub state: Option<LinkState>,
    pub partner: Option<PartnerRef>,
    /// Vessel the target half returns to when this source's link breaks.
    pub restore_vessel: Option<VesselId>,
}

/// Serializable snapshot of the link world
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveData {
    pub version: u32,
    pub bodies: Vec<Body>,
    pub endpoints: Vec<SavedEndpoint>,
    pub focused_vessel: Option<VesselId>,
    pub next_body: u32,
    pub next_vessel: u32,
}

/// What a load had to repair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub links_restored: usize,
    /// Linked endpoints without a consistent partner, reset to Available.
    pub links_reset: usize,
    /// Assemblies split because their link could not be restored.
    pub vessels_split: usize,
}

/// Errors that can occur during save/load
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Bincode(#[from] Box<bincode::ErrorKind>),
    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("Restore failed: {0}")]
    Restore(#[from] LinkError),
}

fn key_of(world: &World, ep: &Endpoint) -> Option<PartnerRef> {
    let body = world.get::<&Body>(ep.body).ok()?;
    Some(PartnerRef {
        body: body.id,
        node_name: ep.node_name.clone(),
    })
}

impl LinkEngine {
    /// Build a snapshot of bodies and endpoints.
    pub fn snapshot(&self) -> SaveData {
        let mut bodies: Vec<Body> = self.world.query::<&Body>().iter().map(|(_, b)| b.clone()).collect();
        bodies.sort_by_key(|b| b.id);

        let mut endpoints: Vec<(u32, SavedEndpoint)> = self
            .world
            .query::<(&Endpoint, Option<&LinkRecord>)>()
            .iter()
            .filter_map(|(e, (ep, record))| {
                let key = key_of(&self.world, ep)?;
                let partner = ep
                    .partner
                    .and_then(|p| self.world.get::<&Endpoint>(p).ok())
                    .and_then(|p| key_of(&self.world, &p));
                Some((
                    e.id(),
                    SavedEndpoint {
                        body: key.body,
                        node_name: key.node_name,
                        role: ep.role,
                        link_type: ep.link_type.clone(),
                        node: ep.node,
                        source_config: ep.source_config.clone(),
                        state: ep.state(),
                        partner,
                        restore_vessel: record.and_then(|r| r.restore_vessel),
                    },
                ))
            })
            .collect();
        endpoints.sort_by_key(|(id, _)| *id);

        SaveData {
            version: SAVE_VERSION,
            bodies,
            endpoints: endpoints.into_iter().map(|(_, ep)| ep).collect(),
            focused_vessel: self.focused_vessel,
            next_body: self.next_body,
            next_vessel: self.next_vessel,
        }
    }

    /// Save the link world to a writer
    pub fn save<W: Write>(&self, writer: W) -> Result<(), SaveError> {
        bincode::serialize_into(writer, &self.snapshot())?;
        Ok(())
    }

    /// Replace the link world with a saved one. Bus listeners stay attached.
    pub fn load<R: Read>(&mut self, reader: R) -> Result<LoadReport, SaveError> {
        let data: SaveData = bincode::deserialize_from(reader)?;
        if data.version != SAVE_VERSION {
            return Err(SaveError::VersionMismatch {
                expected: SAVE_VERSION,
                found: data.version,
            });
        }
        self.restore(data)
    }

    /// Rebuild the world from a snapshot and start every endpoint.
    pub fn restore(&mut self, data: SaveData) -> Result<LoadReport, SaveError> {
        let mut report = LoadReport::default();

        self.world = World::new();
        self.physics = PhysicsScene::new();
        self.bus.clear_subscriptions();
        self.bodies.clear();
        self.messages.clear();
        self.packed = false;
        self.started = true;
        self.focused_vessel = data.focused_vessel;
        self.next_body = data.next_body;
        self.next_vessel = data.next_vessel;

        for body in data.bodies {
            let id = body.id;
            let e = self.world.spawn((body,));
            self.bodies.insert(id, e);
        }

        let mut by_key: HashMap<PartnerRef, Entity> = HashMap::new();
        let mut saved: Vec<(Entity, SavedEndpoint)> = Vec::new();
        for se in data.endpoints {
            let Some(&body) = self.bodies.get(&se.body) else {
                log::error!("Endpoint {:?} refers to missing body {:?}", se.node_name, se.body);
                continue;
            };
            let spec = EndpointSpec {
                node_name: se.node_name.clone(),
                role: se.role,
                link_type: se.link_type.clone(),
                node: se.node,
                source_config: se.source_config.clone(),
            };
            let renderer = match (&se.role, &se.source_config) {
                (EndpointRole::Source, Some(c)) => Some(make_renderer(&c.renderer)),
                _ => None,
            };
            let e = self.world.spawn((Endpoint::new(body, spec),));
            if let Some(r) = renderer {
                let _ = self.world.insert_one(e, RendererSlot(r));
            }
            by_key.insert(
                PartnerRef {
                    body: se.body,
                    node_name: se.node_name.clone(),
                },
                e,
            );
            saved.push((e, se));
        }
        let saved_of: HashMap<Entity, &SavedEndpoint> = saved.iter().map(|(e, se)| (*e, se)).collect();

        // Pass 1: mutually consistent pairs.
        let mut pairs: Vec<(Entity, Entity, Option<VesselId>)> = Vec::new();
        for (e, se) in &saved {
            if se.role != EndpointRole::Source || se.state != Some(LinkState::Linked) {
                continue;
            }
            let Some(target) = se.partner.as_ref().and_then(|p| by_key.get(p)).copied() else {
                continue;
            };
            let Some(t) = saved_of.get(&target) else {
                continue;
            };
            let points_back = t.partner.as_ref() == Some(&PartnerRef {
                body: se.body,
                node_name: se.node_name.clone(),
            });
            if t.role == EndpointRole::Target && t.state == Some(LinkState::Linked) && points_back {
                pairs.push((*e, target, se.restore_vessel));
            }
        }

        let mut restored: Vec<Entity> = Vec::new();
        for (source, target, restore_vessel) in &pairs {
            let _ = self.world.insert_one(
                *source,
                LinkRecord {
                    target: *target,
                    actor: LinkActor::Api,
                    restore_vessel: *restore_vessel,
                },
            );
            self.endpoint_mut(*source)?.partner = Some(*target);
            self.endpoint_mut(*target)?.partner = Some(*source);
            self.build_joint(*source, *target)?;
            restored.push(*source);
            restored.push(*target);
            report.links_restored += 1;
        }

        // Pass 2: everything else that claimed to be linked.
        for (e, se) in &saved {
            if se.state != Some(LinkState::Linked) || restored.contains(e) {
                continue;
            }
            log::error!(
                "Cannot restore link of {:?} on body {:?}; resetting to Available",
                se.node_name,
                se.body
            );
            report.links_reset += 1;

            let Some(partner_body) = se.partner.as_ref().and_then(|p| self.bodies.get(&p.body)).copied() else {
                continue;
            };
            let Some(&own_body) = self.bodies.get(&se.body) else {
                continue;
            };
            if self.vessel_of(own_body) != self.vessel_of(partner_body) || own_body == partner_body {
                continue;
            }
            // The source side knows the original vessel of the target half.
            let (source_body, target_body) = match se.role {
                EndpointRole::Source => (own_body, partner_body),
                EndpointRole::Target => (partner_body, own_body),
            };
            let restore = match se.restore_vessel {
                Some(v) => v,
                None => self.allocate_vessel(),
            };
            if assembly::split(&mut self.world, source_body, target_body, restore) {
                report.vessels_split += 1;
            }
        }

        // Pass 3: initial states, then start.
        let linked_bodies: Vec<Entity> = restored.iter().filter_map(|e| self.body_of(*e)).collect();
        let mut order: Vec<(Entity, LinkState)> = saved
            .iter()
            .map(|(e, se)| {
                let initial = if restored.contains(e) {
                    LinkState::Linked
                } else if se.state == Some(LinkState::Locked)
                    && self.body_of(*e).is_some_and(|b| linked_bodies.contains(&b))
                {
                    LinkState::Locked
                } else {
                    LinkState::Available
                };
                (*e, initial)
            })
            .collect();
        // Targets first so a source's renderer starts against a live partner.
        order.sort_by_key(|(e, _)| (self.link_role(*e) == Some(EndpointRole::Source), e.id()));
        for (e, initial) in order {
            self.start_endpoint(e, initial)?;
        }

        log::info!(
            "Loaded {} links ({} reset, {} vessels split)",
            report.links_restored,
            report.links_reset,
            report.vessels_split
        );
        Ok(report)
    }

    fn link_role(&self, endpoint: Entity) -> Option<EndpointRole> {
        self.world.get::<&Endpoint>(endpoint).ok().map(|ep| ep.role)
    }
}
