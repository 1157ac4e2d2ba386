use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;
use wirerpc_transport::{Address, RpcListener};

use crate::connection::{Connection, ConnectionConfig};
use crate::dispatch::DispatchTable;
use crate::error::Result;

/// Accepts connections and serves each one with a shared dispatch table.
pub struct ConnectionListener {
    socket: RpcListener,
    dispatch: DispatchTable,
    config: ConnectionConfig,
    next_conn_id: AtomicU64,
}

impl ConnectionListener {
    /// Bind to `address`.
    pub fn bind(address: &Address, dispatch: DispatchTable) -> Result<Self> {
        let socket = RpcListener::bind(address)?;
        Ok(Self {
            socket,
            dispatch,
            config: ConnectionConfig::default(),
            next_conn_id: AtomicU64::new(1),
        })
    }

    /// Override the configuration applied to accepted connections.
    pub fn with_config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }

    /// Accept the next connection and start serving it.
    pub fn accept(&self) -> Result<Connection> {
        let stream = self.socket.accept()?;
        let id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        debug!(conn = id, transport = stream.transport_name(), "accepted connection");

        let config = ConnectionConfig {
            thread_name: format!("{}-{id}", self.config.thread_name),
            ..self.config.clone()
        };
        Connection::spawn_with_config(stream, self.dispatch.clone(), config)
    }

    /// Address actually bound (resolves port 0 for TCP).
    pub fn local_address(&self) -> Result<Address> {
        Ok(self.socket.local_address()?)
    }

    pub fn dispatch(&self) -> &DispatchTable {
        &self.dispatch
    }
}

impl std::fmt::Debug for ConnectionListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionListener")
            .field("socket", &self.socket)
            .field("dispatch", &self.dispatch)
            .finish_non_exhaustive()
    }
}
