// Adapters layer: concrete implementations that talk to the outside world.

pub mod http;
pub mod probes;
