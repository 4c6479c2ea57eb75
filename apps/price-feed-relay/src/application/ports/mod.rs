//! Application Ports (Driver and Driven)
//!
//! Ports define interfaces for interacting with external systems.
//! - **Driver Ports** (Primary/Inbound): `PriceEventHandler`, fed by the bus consumer
//! - **Driven Ports** (Secondary/Outbound): `Connection` to clients, `BusSource` for ticks

mod bus_port;
mod connection_port;
mod event_handler_port;

#[cfg(test)]
pub use bus_port::MockBusSource;
pub use bus_port::{BusMessage, BusReadError, BusSource};
pub use connection_port::{ClientHandle, Connection, TransportError};
#[cfg(test)]
pub use event_handler_port::MockPriceEventHandler;
pub use event_handler_port::PriceEventHandler;
