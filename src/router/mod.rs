// ABOUTME: pK router: daemon loop, session bookkeeping, port registry, error taxonomy

pub mod daemon;
pub mod error;
pub mod registry;
pub mod session;

pub use daemon::Router;
pub use error::RouterError;
pub use registry::PortRegistry;
pub use session::Session;
