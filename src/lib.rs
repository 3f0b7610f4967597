
// External data representation, a protocol for serializing data to be sent over the network
pub mod xdr;

// Remote procedure call, a protocol build on top of XDR to provide something like C-style function calls over the network
pub mod rpc;

// A protocol using RPC that's meant to communicate with instruments like oscilloscopes, power supplies, waveform generators, etc
pub mod vxi11;

// The four round trips the device layer needs, implemented for vxi11::CoreClient
pub mod transport;

// Module for devices that implement the VXI11 protocol
pub mod devices;

pub mod config;
pub mod error;
pub mod utils;

#[cfg(test)]
mod test_support;

pub use config::Settings;
pub use devices::lecroy::{AcquisitionMode, LeCroy, TriggerMode};
pub use devices::lecroy::channel::Channel;
pub use error::{Error, Result};
pub use transport::Transport;
