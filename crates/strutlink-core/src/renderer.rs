//! Link renderers.
//!
//! Renderers only compute presentation geometry; nothing in the link state
//! reads it back. The one thing they contribute to linking is the collider
//! sweep, because only the renderer knows how thick the pipe is.

use serde::{Deserialize, Serialize};
use strutlink_logic::constants::DEFAULT_PIPE_DIAMETER;
use strutlink_logic::math::{Pose, Quat, Vec3};
use strutlink_logic::sweep::{first_obstruction, Obstacle};
use strutlink_logic::telescope::{PistonSegment, TelescopeLayout};

pub trait LinkRenderer: Send + Sync {
    fn start_renderer(&mut self, source: &Pose, target: &Pose);
    fn stop_renderer(&mut self);
    /// Refresh geometry for the current node poses. No-op while stopped.
    fn update_link(&mut self, source: &Pose, target: &Pose);
    fn is_started(&self) -> bool;
    /// Length of the drawn link, 0 while stopped.
    fn rendered_length(&self) -> f32;

    /// Name of the first obstacle the link would pass through.
    fn check_collider_hits(&self, source: &Pose, target: &Pose, obstacles: &[Obstacle]) -> Option<String> {
        first_obstruction(source.position, target.position, obstacles).map(|o| o.name.clone())
    }
}

/// Which renderer a source uses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RendererKind {
    Pipe { diameter: f32 },
    Telescopic(TelescopeLayout),
}

impl Default for RendererKind {
    fn default() -> Self {
        RendererKind::Pipe {
            diameter: DEFAULT_PIPE_DIAMETER,
        }
    }
}

/// Straight pipe between the two nodes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipeGeometry {
    pub start: Vec3,
    pub end: Vec3,
    pub length: f32,
    pub rotation: Quat,
}

impl PipeGeometry {
    fn between(source: &Pose, target: &Pose) -> Self {
        let dir = target.position - source.position;
        Self {
            start: source.position,
            end: target.position,
            length: dir.length(),
            rotation: Quat::look_rotation(dir),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipeRenderer {
    pub diameter: f32,
    geometry: Option<PipeGeometry>,
}

impl PipeRenderer {
    pub fn new(diameter: f32) -> Self {
        Self {
            diameter,
            geometry: None,
        }
    }

    pub fn geometry(&self) -> Option<&PipeGeometry> {
        self.geometry.as_ref()
    }
}

impl LinkRenderer for PipeRenderer {
    fn start_renderer(&mut self, source: &Pose, target: &Pose) {
        self.geometry = Some(PipeGeometry::between(source, target));
    }

    fn stop_renderer(&mut self) {
        self.geometry = None;
    }

    fn update_link(&mut self, source: &Pose, target: &Pose) {
        if self.geometry.is_some() {
            self.geometry = Some(PipeGeometry::between(source, target));
        }
    }

    fn is_started(&self) -> bool {
        self.geometry.is_some()
    }

    fn rendered_length(&self) -> f32 {
        self.geometry.map_or(0.0, |g| g.length)
    }

    /// Obstacles are grown by the pipe radius before sweeping.
    fn check_collider_hits(&self, source: &Pose, target: &Pose, obstacles: &[Obstacle]) -> Option<String> {
        let r = self.diameter * 0.5;
        let grown: Vec<Obstacle> = obstacles
            .iter()
            .map(|o| Obstacle::new(o.name.clone(), o.center, o.half_extents + Vec3::new(r, r, r)))
            .collect();
        first_obstruction(source.position, target.position, &grown).map(|o| o.name.clone())
    }
}

/// Pipe made of sliding pistons.
#[derive(Debug, Clone)]
pub struct TelescopicPipeRenderer {
    pub layout: TelescopeLayout,
    pistons: Vec<PistonSegment>,
    length: f32,
    started: bool,
}

impl TelescopicPipeRenderer {
    pub fn new(layout: TelescopeLayout) -> Self {
        Self {
            layout,
            pistons: Vec::new(),
            length: 0.0,
            started: false,
        }
    }

    pub fn pistons(&self) -> &[PistonSegment] {
        &self.pistons
    }

    fn relayout(&mut self, source: &Pose, target: &Pose) {
        let (pistons, length) = self.layout.layout(source.position, target.position);
        self.pistons = pistons;
        self.length = length;
    }
}

impl LinkRenderer for TelescopicPipeRenderer {
    fn start_renderer(&mut self, source: &Pose, target: &Pose) {
        self.started = true;
        self.relayout(source, target);
    }

    fn stop_renderer(&mut self) {
        self.started = false;
        self.pistons.clear();
        self.length = 0.0;
    }

    fn update_link(&mut self, source: &Pose, target: &Pose) {
        if self.started {
            self.relayout(source, target);
        }
    }

    fn is_started(&self) -> bool {
        self.started
    }

    fn rendered_length(&self) -> f32 {
        self.length
    }
}

/// Renderer component on a source endpoint.
pub struct RendererSlot(pub Box<dyn LinkRenderer>);

pub fn make_renderer(kind: &RendererKind) -> Box<dyn LinkRenderer> {
    match kind {
        RendererKind::Pipe { diameter } => Box::new(PipeRenderer::new(*diameter)),
        RendererKind::Telescopic(layout) => Box::new(TelescopicPipeRenderer::new(*layout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes(distance: f32) -> (Pose, Pose) {
        (
            Pose::looking(Vec3::ZERO, Vec3::FORWARD),
            Pose::looking(Vec3::new(0.0, 0.0, distance), -Vec3::FORWARD),
        )
    }

    #[test]
    fn test_pipe_lifecycle() {
        let (s, t) = nodes(1.5);
        let mut r = PipeRenderer::new(0.2);
        r.update_link(&s, &t);
        assert!(!r.is_started());

        r.start_renderer(&s, &t);
        assert!((r.rendered_length() - 1.5).abs() < 1e-5);

        let (s2, t2) = nodes(2.0);
        r.update_link(&s2, &t2);
        assert!((r.rendered_length() - 2.0).abs() < 1e-5);

        r.stop_renderer();
        assert_eq!(r.rendered_length(), 0.0);
    }

    #[test]
    fn test_pipe_thickness_catches_grazing_obstacle() {
        let (s, t) = nodes(4.0);
        // Box edge sits 0.05 off the pipe axis.
        let near = Obstacle::new("tank", Vec3::new(0.55, 0.0, 2.0), Vec3::new(0.5, 0.5, 0.5));
        let thin = PipeRenderer::new(0.0);
        let thick = PipeRenderer::new(0.2);
        assert_eq!(thin.check_collider_hits(&s, &t, std::slice::from_ref(&near)), None);
        assert_eq!(
            thick.check_collider_hits(&s, &t, &[near]),
            Some("tank".to_string())
        );
    }

    #[test]
    fn test_telescopic_clamps_length() {
        let layout = TelescopeLayout {
            piston_count: 3,
            piston_length: 0.5,
            min_overlap: 0.1,
        };
        let mut r = make_renderer(&RendererKind::Telescopic(layout));
        let (s, t) = nodes(5.0);
        r.start_renderer(&s, &t);
        assert!((r.rendered_length() - layout.max_length()).abs() < 1e-5);
    }
}
