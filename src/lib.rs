// Library exports for the logfwd container log forwarder

pub mod backoff;
pub mod cli;
pub mod config;
pub mod container;
pub mod demux;
pub mod error;
pub mod forwarder;
pub mod handler;
pub mod logging;
pub mod sink;
