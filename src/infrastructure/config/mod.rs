//! Infrastructure configuration modules.

pub mod feed;
pub mod logging;
pub mod peer;
pub mod settings;

pub use feed::FeedConfig;
pub use logging::LoggingConfig;
pub use peer::PeerConfig;
pub use settings::Config;
