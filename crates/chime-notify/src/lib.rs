pub mod delivery;
pub mod error;
pub mod opener;
pub mod sink;

pub use delivery::run_delivery;
pub use error::NotifyError;
pub use opener::{CommandOpener, UrlOpener};
pub use sink::{build_sink, CommandSink, EventSink, LogSink};
