pub mod flight;
pub mod gamepad;
pub mod input;
pub mod pid;

pub use flight::FlightController;
pub use gamepad::{GamepadSnapshot, GamepadTracker};
pub use input::{ButtonAction, ButtonEdge, ControlVector, InputNormalizer, InputSample, InputSource, KeyboardState};
pub use pid::Pid;
