// ABOUTME: Client-side p-call surface: builder, runtime, error/listener types

pub mod builder;
pub mod error;
pub mod listener;
pub mod runtime;
pub mod types;

pub use builder::ClientBuilder;
pub use error::{ClientError, ClientResult};
pub use listener::Listener;
pub use runtime::Runtime;
pub use types::Port;
