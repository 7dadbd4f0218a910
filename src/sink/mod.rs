// Sink module - Forwarding destinations and their connection lifecycle

mod connection;
mod connector;
mod manager;

pub use connection::{SinkConnection, SinkWriter};
pub use connector::{
    file_name, FileConnector, FileSinkProvider, SinkConnector, SinkProvider, TcpConnector,
    TcpSinkProvider,
};
pub use manager::{ReconnectingSink, SinkEvent, SinkHandle};
