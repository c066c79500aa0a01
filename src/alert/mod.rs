pub mod controller;
pub mod sound;

pub use controller::{AlertController, AlertSink};
pub use sound::RingtoneSink;
