pub mod session;
pub mod states;

pub use session::Session;
pub use states::{AppMachine, AppState, Loader, SyncLoader};
