//! Boundary to the renderer collaborator. The crate never draws; it hands
//! transforms across this seam and calls `render()` once per frame, paused
//! or not, so overlays stay visible.

use glam::{Quat, Vec3};

pub type ObjectId = u32;

pub trait Renderer {
    fn add_object(&mut self, name: &str) -> ObjectId;
    fn remove_object(&mut self, id: ObjectId);
    fn set_active_camera(&mut self, id: ObjectId);
    /// Copy a physics pose onto the visual node.
    fn sync_transform(&mut self, id: ObjectId, position: Vec3, orientation: Quat);
    /// Per-tick world/environment hook (skybox, props, day cycle).
    fn update_environment(&mut self, dt: f32);
    fn render(&mut self);
}

/// Shared-handle forwarding, so a caller can keep inspecting a renderer it
/// handed to the loop (the shell and the tests both rely on this).
impl<R: Renderer> Renderer for std::rc::Rc<std::cell::RefCell<R>> {
    fn add_object(&mut self, name: &str) -> ObjectId {
        self.borrow_mut().add_object(name)
    }
    fn remove_object(&mut self, id: ObjectId) {
        self.borrow_mut().remove_object(id)
    }
    fn set_active_camera(&mut self, id: ObjectId) {
        self.borrow_mut().set_active_camera(id)
    }
    fn sync_transform(&mut self, id: ObjectId, position: Vec3, orientation: Quat) {
        self.borrow_mut().sync_transform(id, position, orientation)
    }
    fn update_environment(&mut self, dt: f32) {
        self.borrow_mut().update_environment(dt)
    }
    fn render(&mut self) {
        self.borrow_mut().render()
    }
}

/// Counts calls and keeps the last pose. Stands in for the real renderer in
/// the demo binary; the tests use the counters to observe pipeline order.
#[derive(Debug, Default)]
pub struct NullRenderer {
    next_id: ObjectId,
    pub objects: Vec<ObjectId>,
    pub frames_rendered: u64,
    pub transform_syncs: u64,
    pub last_position: Vec3,
    pub last_orientation: Quat,
}

impl NullRenderer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Renderer for NullRenderer {
    fn add_object(&mut self, name: &str) -> ObjectId {
        let id = self.next_id;
        self.next_id += 1;
        self.objects.push(id);
        tracing::debug!(id, name, "renderer object added");
        id
    }

    fn remove_object(&mut self, id: ObjectId) {
        self.objects.retain(|&o| o != id);
    }

    fn set_active_camera(&mut self, _id: ObjectId) {}

    fn sync_transform(&mut self, _id: ObjectId, position: Vec3, orientation: Quat) {
        self.transform_syncs += 1;
        self.last_position = position;
        self.last_orientation = orientation;
    }

    fn update_environment(&mut self, _dt: f32) {}

    fn render(&mut self) {
        self.frames_rendered += 1;
    }
}
