// Domain layer: result model and the probe port. No I/O here.

pub mod model;
pub mod ports;
