//! Request-time streaming of prerendered shells.
//!
//! The controller sends the document head and the shell markup first, then
//! resolves dynamic boundaries by priority group and streams an injection
//! script for each one as it completes:
//!
//! ```text
//! head + preloads -> shell -> register(ids) -> group(p=10) -> group(p=1) -> </body></html>
//! ```
//!
//! Clients that cannot consume a streamed body get one complete document
//! from [`StreamController::render_complete`].

mod config;
mod controller;
mod fallback;
mod head;
mod runtime;
mod sink;

pub use config::*;
pub use controller::*;
pub use fallback::*;
pub use head::*;
pub use runtime::*;
pub use sink::*;
