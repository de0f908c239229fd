pub mod api;
pub mod client;
pub mod contracts;
pub mod simulated;

pub use api::ConsoleApi;
pub use client::ApiPath;
pub use client::HttpRemoteClient;
pub use client::Method;
pub use client::RemoteClient;
pub use simulated::SimulatedRemoteClient;
