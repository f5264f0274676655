pub mod channel;
pub mod member;
pub mod membership;
pub mod node;
pub mod runtime;
pub mod transport;

pub use tracing::{error, info, warn};
