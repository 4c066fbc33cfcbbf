//! Local socket transport for control connections
//!
//! A session maps to a Unix domain socket (Unix/macOS) or a named pipe
//! (Windows). Every message is one JSON document behind a u32 little-endian
//! length prefix.

use std::io;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::common::paths;

/// Largest frame either side accepts. Control messages are a few KB at most.
const MAX_FRAME: u32 = 1024 * 1024;

#[cfg(unix)]
pub mod platform {
    pub use interprocess::local_socket::tokio::{prelude::*, Listener, Stream};
    pub use interprocess::local_socket::{GenericFilePath as NameKind, ListenerOptions};
}

#[cfg(windows)]
pub mod platform {
    pub use interprocess::local_socket::tokio::{prelude::*, Listener, Stream};
    pub use interprocess::local_socket::{GenericNamespaced as NameKind, ListenerOptions};
}

use platform::*;

pub use platform::{Listener, Stream};

fn local_name(session: &str) -> io::Result<interprocess::local_socket::Name<'static>> {
    let name = paths::socket_name(session);
    #[cfg(unix)]
    {
        name.to_fs_name::<NameKind>()
    }
    #[cfg(windows)]
    {
        name.to_ns_name::<NameKind>()
    }
}

/// Bind the session's socket, replacing whatever file is left at its path.
/// Callers check [`is_live`] first so a running server is never displaced.
pub fn create_listener(session: &str) -> io::Result<Listener> {
    paths::ensure_socket_dir(session)?;
    paths::remove_socket(session)?;

    let listener = ListenerOptions::new().name(local_name(session)?).create_tokio()?;

    // Only the owning user may drive the run
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(
            paths::socket_path(session),
            std::fs::Permissions::from_mode(0o600),
        )?;
    }

    tracing::debug!(session, "control socket bound");
    Ok(listener)
}

pub async fn connect(session: &str) -> io::Result<Stream> {
    Stream::connect(local_name(session)?).await
}

/// Whether a server currently answers on the session's socket
pub async fn is_live(session: &str) -> bool {
    #[cfg(unix)]
    if !paths::socket_path(session).exists() {
        return false;
    }
    connect(session).await.is_ok()
}

/// Write one frame
pub async fn send_message<W: AsyncWriteExt + Unpin>(writer: &mut W, data: &[u8]) -> io::Result<()> {
    let len = u32::try_from(data.len())
        .ok()
        .filter(|len| *len <= MAX_FRAME)
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("frame of {} bytes exceeds {} byte limit", data.len(), MAX_FRAME),
            )
        })?;

    writer.write_all(&len.to_le_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    tracing::trace!(bytes = len, "frame sent");
    Ok(())
}

/// Read one frame. A clean close before the prefix is `UnexpectedEof`.
pub async fn recv_message<R: AsyncReadExt + Unpin>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut prefix = [0u8; 4];
    reader.read_exact(&mut prefix).await?;
    let len = u32::from_le_bytes(prefix);

    if len > MAX_FRAME {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("peer announced a {} byte frame", len),
        ));
    }

    let mut data = vec![0u8; len as usize];
    reader.read_exact(&mut data).await?;
    tracing::trace!(bytes = len, "frame received");
    Ok(data)
}

/// Serialize `value` and write it as one frame
pub async fn send_json<W, T>(writer: &mut W, value: &T) -> io::Result<()>
where
    W: AsyncWriteExt + Unpin,
    T: Serialize,
{
    let data = serde_json::to_vec(value).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    send_message(writer, &data).await
}

/// Read one frame and decode it; malformed JSON is `InvalidData`
pub async fn recv_json<R, T>(reader: &mut R) -> io::Result<T>
where
    R: AsyncReadExt + Unpin,
    T: DeserializeOwned,
{
    let data = recv_message(reader).await?;
    serde_json::from_slice(&data).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::protocol::{Command, Request};

    #[tokio::test]
    async fn test_request_crosses_as_one_frame() {
        let (mut a, mut b) = tokio::io::duplex(256);
        send_json(&mut a, &Request { id: 7, command: Command::Step { count: 2 } })
            .await
            .unwrap();

        let raw = recv_message(&mut b).await.unwrap();
        assert!(raw.starts_with(b"{"));

        send_message(&mut a, &raw).await.unwrap();
        let request: Request = recv_json(&mut b).await.unwrap();
        assert_eq!(request.id, 7);
        assert!(matches!(request.command, Command::Step { count: 2 }));
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_all(&(MAX_FRAME + 1).to_le_bytes()).await.unwrap();
        let err = recv_message(&mut b).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        let (mut a, _b) = tokio::io::duplex(64);
        let big = vec![b'x'; MAX_FRAME as usize + 1];
        let err = send_message(&mut a, &big).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_malformed_json_is_invalid_data() {
        let (mut a, mut b) = tokio::io::duplex(64);
        send_message(&mut a, b"{not json").await.unwrap();
        let err = recv_json::<_, Request>(&mut b).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn test_missing_socket_is_not_live() {
        let dir = tempfile::tempdir().unwrap();
        let session = dir.path().join("none.sock").to_string_lossy().into_owned();
        assert!(!is_live(&session).await);
    }
}
