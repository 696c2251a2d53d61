// Domain layer: plain data types and the transport port. No HTTP here.

pub mod model;
pub mod ports;
