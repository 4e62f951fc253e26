pub mod batch_cache;
pub mod playback;
pub mod providers;
pub mod session;

pub use batch_cache::BatchCache;
pub use playback::{ClockSink, PlaybackController, PreviewSink};
pub use session::SessionController;
