//! Client side of smallchat.
//!
//! The client:
//! - Opens one TCP connection to the server
//! - Forwards each line typed on the console to the server
//! - Prints whatever the server sends, verbatim
//! - Stops when the server hangs up, input ends, or it is interrupted

pub mod connection;
pub mod decode;
pub mod session;

pub use connection::{connect, connect_until};
pub use session::{Outcome, Session};
