pub mod channel;
pub mod transport;

pub use channel::{Channel, State};
pub use transport::{Link, Outcome, Transport};
