mod config;
mod session;

pub use config::load_config;
pub use session::Session;

pub use looper_transport::{Clock, FinishedTrack, Moment, SessionConfig, Track, TrackId};
