pub mod mock;
pub mod remote;
pub mod scripted;

pub use mock::MockGenerator;
pub use remote::{RemoteGenerator, RemoteGeneratorConfig};
pub use scripted::ScriptedGenerator;
