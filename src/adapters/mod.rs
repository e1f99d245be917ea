//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements     | Connects to                    |
//! |------------|----------------|--------------------------------|
//! | `log_sink` | EventSink      | `log` facade                   |
//! | `model`    | EphemerisPort  | constant-rate target           |
//! |            | TrajectoryPort | configured soft limits         |
//! | `serial`   | Transport      | serial device, 19200 8N1       |

pub mod log_sink;
pub mod model;
pub mod serial;
