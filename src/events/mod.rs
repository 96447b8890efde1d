//! # Events Module
//!
//! Progress reporting for scans. The engine publishes [`Event`]s on an
//! [`EventSender`]; results never depend on whether a receiver exists.
//!
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//! let listener = std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         if let Event::Hash(HashEvent::Progress(p)) = event {
//!             eprintln!("{} {}/{}", p.photo_id, p.completed, p.total);
//!         }
//!     }
//! });
//! let result = ScanEngine::new(settings).run_with_events(&photos, false, &sender);
//! drop(sender);
//! listener.join().ok();
//! ```

mod channel;
mod types;

pub use channel::{null_sender, EventChannel, EventReceiver, EventSender};
pub use types::*;
