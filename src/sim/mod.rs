pub mod clock;
pub mod frame_loop;
pub mod physics;
pub mod render;

pub use clock::SimulationClock;
pub use frame_loop::FrameLoop;
pub use physics::{BodyDesc, KinematicBody, KinematicWorld, PhysicsBody, PhysicsError, PhysicsWorld, SharedBody};
pub use render::{NullRenderer, ObjectId, Renderer};
