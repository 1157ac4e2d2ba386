use std::net::{SocketAddr, TcpListener};
#[cfg(unix)]
use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
#[cfg(unix)]
use std::os::unix::net::UnixListener;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::address::Address;
use crate::error::{Result, TransportError};
use crate::stream::RpcStream;

/// Listening endpoint for TCP or Unix domain socket connections.
///
/// Unix socket files are created with mode `0o600` and removed on drop,
/// unless the path was replaced by something else in the meantime.
pub struct RpcListener {
    inner: ListenerInner,
}

enum ListenerInner {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix {
        listener: UnixListener,
        path: PathBuf,
        created_inode: (u64, u64),
    },
}

impl RpcListener {
    /// Default permission mode for created socket paths.
    pub const DEFAULT_SOCKET_MODE: u32 = 0o600;
    /// Maximum socket path length.
    /// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(not(target_os = "linux"))]
    const MAX_PATH_LEN: usize = 104;

    /// Bind and listen on `address`.
    pub fn bind(address: &Address) -> Result<Self> {
        match address {
            Address::Tcp(addr) => Self::bind_tcp(addr),
            #[cfg(unix)]
            Address::Unix(path) => Self::bind_unix(path),
            #[cfg(not(unix))]
            Address::Unix(_) => Err(TransportError::Unsupported(address.to_string())),
        }
    }

    fn bind_tcp(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr).map_err(|source| TransportError::Bind {
            address: addr.to_string(),
            source,
        })?;
        info!(address = addr, "listening on tcp");
        Ok(Self {
            inner: ListenerInner::Tcp(listener),
        })
    }

    #[cfg(unix)]
    fn bind_unix(path: &Path) -> Result<Self> {
        let path = path.to_path_buf();
        let bind_err = |source| TransportError::Bind {
            address: Address::Unix(path.clone()).to_string(),
            source,
        };

        let path_bytes = path.as_os_str().len();
        if path_bytes >= Self::MAX_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path,
                len: path_bytes,
                max: Self::MAX_PATH_LEN,
            });
        }

        // Remove stale socket if it exists, but never remove non-socket files.
        if path.exists() {
            let metadata = std::fs::symlink_metadata(&path).map_err(bind_err)?;
            if !metadata.file_type().is_socket() {
                return Err(bind_err(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "existing path is not a unix socket",
                )));
            }
            debug!(?path, "removing stale socket");
            std::fs::remove_file(&path).map_err(bind_err)?;
        }

        let listener = UnixListener::bind(&path).map_err(bind_err)?;
        std::fs::set_permissions(
            &path,
            std::fs::Permissions::from_mode(Self::DEFAULT_SOCKET_MODE),
        )
        .map_err(bind_err)?;
        let created = std::fs::symlink_metadata(&path).map_err(bind_err)?;

        info!(?path, "listening on unix domain socket");

        Ok(Self {
            inner: ListenerInner::Unix {
                listener,
                created_inode: (created.dev(), created.ino()),
                path,
            },
        })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<RpcStream> {
        let stream = match &self.inner {
            ListenerInner::Tcp(listener) => {
                let (stream, peer) = listener.accept().map_err(TransportError::Accept)?;
                stream.set_nodelay(true)?;
                debug!(%peer, "accepted tcp connection");
                RpcStream::from_tcp(stream)
            }
            #[cfg(unix)]
            ListenerInner::Unix { listener, .. } => {
                let (stream, _addr) = listener.accept().map_err(TransportError::Accept)?;
                debug!("accepted unix connection");
                RpcStream::from_unix(stream)
            }
        };
        Ok(stream)
    }

    /// The address this listener is bound to.
    ///
    /// For TCP this reports the resolved local socket address, so binding
    /// port 0 yields the port the OS picked.
    pub fn local_address(&self) -> Result<Address> {
        match &self.inner {
            ListenerInner::Tcp(listener) => {
                let addr: SocketAddr = listener.local_addr()?;
                Ok(Address::Tcp(addr.to_string()))
            }
            #[cfg(unix)]
            ListenerInner::Unix { path, .. } => Ok(Address::Unix(path.clone())),
        }
    }
}

#[cfg(unix)]
impl Drop for RpcListener {
    fn drop(&mut self) {
        let ListenerInner::Unix {
            path,
            created_inode: (expected_dev, expected_ino),
            ..
        } = &self.inner
        else {
            return;
        };

        if let Ok(metadata) = std::fs::symlink_metadata(path) {
            if metadata.file_type().is_socket()
                && metadata.dev() == *expected_dev
                && metadata.ino() == *expected_ino
            {
                debug!(?path, "cleaning up socket file");
                let _ = std::fs::remove_file(path);
            } else {
                debug!(?path, "socket path identity changed; skipping cleanup");
            }
        }
    }
}

impl std::fmt::Debug for RpcListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            ListenerInner::Tcp(listener) => f
                .debug_struct("RpcListener")
                .field("tcp", &listener.local_addr().ok())
                .finish(),
            #[cfg(unix)]
            ListenerInner::Unix { path, .. } => f
                .debug_struct("RpcListener")
                .field("unix", path)
                .finish(),
        }
    }
}
