pub mod connection;
pub mod fanout;
pub mod heartbeat;
pub mod messages;
pub mod registry;

pub use connection::*;
pub use fanout::*;
pub use heartbeat::*;
pub use messages::*;
pub use registry::*;
