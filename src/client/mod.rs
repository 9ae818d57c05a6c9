//! TUIO Client
//!
//! Owns the UDP socket, the receive task and the live entity stores.
//!
//! ```text
//!   UDP datagram ──> rosc decode ──> ProtocolDecoder ──> EntityStores
//!                                          │
//!                                          └──> TuioListener fan-out
//! ```
//!
//! The receive task holds the decoder lock per datagram, so listener
//! callbacks run on the receive task and see frames atomically. Query
//! methods return snapshots and never block the decode path for longer
//! than a store clone.

use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use rosc::OscPacket;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::errors::{Result, TuioError};
use crate::listener::{ListenerRegistry, TuioListener};
use crate::model::{SessionId, Tuio3DCursor, Tuio3DObject, TuioBlob, TuioCursor, TuioObject};
use crate::protocol::decoder::{EntityStores, ProtocolDecoder};

struct Receiver {
    handle: JoinHandle<()>,
    local_addr: SocketAddr,
}

/// Asynchronous TUIO client.
///
/// All methods take `&self`; the client can be shared across tasks and
/// queried while the receive task is running.
pub struct TuioClient {
    config: Mutex<ClientConfig>,
    stores: Arc<EntityStores>,
    listeners: ListenerRegistry,
    decoder: Arc<Mutex<ProtocolDecoder>>,
    receiver: Mutex<Option<Receiver>>,
}

impl TuioClient {
    /// Creates a client with default configuration (port 3333).
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    /// Creates a client listening on the given UDP port.
    pub fn with_port(port: u16) -> Self {
        let mut config = ClientConfig::default();
        config.network.port = port;
        Self::with_config(config)
    }

    /// Creates a client from an explicit configuration.
    pub fn with_config(config: ClientConfig) -> Self {
        let stores = Arc::new(EntityStores::default());
        let listeners = ListenerRegistry::new();
        let decoder = ProtocolDecoder::new(
            stores.clone(),
            listeners.clone(),
            config.tracking.path_capacity,
        );
        TuioClient {
            config: Mutex::new(config),
            stores,
            listeners,
            decoder: Arc::new(Mutex::new(decoder)),
            receiver: Mutex::new(None),
        }
    }

    /// The configured UDP port.
    pub fn port(&self) -> u16 {
        self.config.lock().network.port
    }

    /// Changes the UDP port for the next connection.
    pub fn set_port(&self, port: u16) -> Result<()> {
        if self.is_connected() {
            return Err(TuioError::AlreadyConnected);
        }
        self.config.lock().network.port = port;
        Ok(())
    }

    /// The socket address actually bound, once connected. Useful when
    /// the configured port is 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.receiver.lock().as_ref().map(|r| r.local_addr)
    }

    /// Whether a receive task is currently running.
    pub fn is_connected(&self) -> bool {
        self.receiver
            .lock()
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    /// Binds the UDP socket and starts the receive task.
    pub async fn connect(&self) -> Result<()> {
        if self.is_connected() {
            return Err(TuioError::AlreadyConnected);
        }
        let (bind_addr, port, buffer_size) = {
            let config = self.config.lock();
            (
                config.network.bind_addr.clone(),
                config.network.port,
                config.network.recv_buffer_size,
            )
        };
        let addr = format!("{bind_addr}:{port}");
        let socket = UdpSocket::bind(&addr)
            .await
            .map_err(|source| TuioError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = socket.local_addr()?;
        info!(%local_addr, "listening for TUIO");

        let decoder = self.decoder.clone();
        let handle = tokio::spawn(receive_loop(socket, buffer_size, decoder));
        *self.receiver.lock() = Some(Receiver { handle, local_addr });
        Ok(())
    }

    /// Stops the receive task, clears all live entities and forgets
    /// frame history. Registered listeners stay registered.
    pub fn disconnect(&self) -> Result<()> {
        let receiver = self.receiver.lock().take().ok_or(TuioError::NotConnected)?;
        receiver.handle.abort();
        self.stores.clear_all();
        self.decoder.lock().reset();
        info!("disconnected");
        Ok(())
    }

    /// Feeds one already decoded OSC packet, as if it had arrived over
    /// UDP. Lets frames come from other transports.
    pub fn process_packet(&self, packet: &OscPacket) {
        self.decoder.lock().process_packet(packet);
    }

    /// Registers a listener for entity events.
    pub fn add_listener(&self, listener: Arc<dyn TuioListener>) {
        self.listeners.add(listener);
    }

    /// Removes every registration of the given listener.
    pub fn remove_listener(&self, listener: &Arc<dyn TuioListener>) {
        self.listeners.remove(listener);
    }

    /// Removes all listeners.
    pub fn remove_all_listeners(&self) {
        self.listeners.clear();
    }

    /// Snapshot of all live 2D objects.
    pub fn objects(&self) -> Vec<TuioObject> {
        self.stores.objects.lock().values().cloned().collect()
    }

    /// Snapshot of all live 2D cursors.
    pub fn cursors(&self) -> Vec<TuioCursor> {
        self.stores.cursors.lock().values().cloned().collect()
    }

    /// Snapshot of all live 2D blobs.
    pub fn blobs(&self) -> Vec<TuioBlob> {
        self.stores.blobs.lock().values().cloned().collect()
    }

    /// Snapshot of all live 3D objects.
    pub fn objects_3d(&self) -> Vec<Tuio3DObject> {
        self.stores.objects_3d.lock().values().cloned().collect()
    }

    /// Snapshot of all live 3D cursors.
    pub fn cursors_3d(&self) -> Vec<Tuio3DCursor> {
        self.stores.cursors_3d.lock().values().cloned().collect()
    }

    /// Looks up one live 2D object by session ID.
    pub fn object(&self, session_id: SessionId) -> Option<TuioObject> {
        self.stores.objects.lock().get(&session_id).cloned()
    }

    /// Looks up one live 2D cursor by session ID.
    pub fn cursor(&self, session_id: SessionId) -> Option<TuioCursor> {
        self.stores.cursors.lock().get(&session_id).cloned()
    }

    /// Looks up one live 2D blob by session ID.
    pub fn blob(&self, session_id: SessionId) -> Option<TuioBlob> {
        self.stores.blobs.lock().get(&session_id).cloned()
    }

    /// Looks up one live 3D object by session ID.
    pub fn object_3d(&self, session_id: SessionId) -> Option<Tuio3DObject> {
        self.stores.objects_3d.lock().get(&session_id).cloned()
    }

    /// Looks up one live 3D cursor by session ID.
    pub fn cursor_3d(&self, session_id: SessionId) -> Option<Tuio3DCursor> {
        self.stores.cursors_3d.lock().get(&session_id).cloned()
    }
}

async fn receive_loop(socket: UdpSocket, buffer_size: usize, decoder: Arc<Mutex<ProtocolDecoder>>) {
    let mut buf = vec![0u8; buffer_size];
    loop {
        let len = match socket.recv(&mut buf).await {
            Ok(len) => len,
            Err(e) => {
                warn!(error = %e, "UDP receive failed");
                continue;
            }
        };
        match rosc::decoder::decode_udp(&buf[..len]) {
            Ok((_, packet)) => {
                // A sender violating an argument-layout contract must not
                // take the receive loop down with it.
                let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    decoder.lock().process_packet(&packet);
                }));
                if outcome.is_err() {
                    warn!(len, "dropping datagram with malformed TUIO arguments");
                }
            }
            Err(e) => {
                debug!(len, error = %e, "discarding undecodable datagram");
            }
        }
    }
}

impl Default for TuioClient {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TuioClient {
    fn drop(&mut self) {
        if let Some(receiver) = self.receiver.lock().take() {
            receiver.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TuioContainer;
    use rosc::{OscBundle, OscMessage, OscTime, OscType};
    use std::time::Duration;

    fn ephemeral_client() -> TuioClient {
        let mut config = ClientConfig::default();
        config.network.bind_addr = "127.0.0.1".to_string();
        config.network.port = 0;
        TuioClient::with_config(config)
    }

    fn cursor_frame(sid: i32, x: f32, y: f32, fseq: i32) -> OscPacket {
        OscPacket::Bundle(OscBundle {
            timetag: OscTime {
                seconds: 0,
                fractional: 1,
            },
            content: vec![
                OscPacket::Message(OscMessage {
                    addr: "/tuio/2Dcur".into(),
                    args: vec![
                        OscType::String("set".into()),
                        OscType::Int(sid),
                        OscType::Float(x),
                        OscType::Float(y),
                        OscType::Float(0.0),
                        OscType::Float(0.0),
                        OscType::Float(0.0),
                    ],
                }),
                OscPacket::Message(OscMessage {
                    addr: "/tuio/2Dcur".into(),
                    args: vec![OscType::String("alive".into()), OscType::Int(sid)],
                }),
                OscPacket::Message(OscMessage {
                    addr: "/tuio/2Dcur".into(),
                    args: vec![OscType::String("fseq".into()), OscType::Int(fseq)],
                }),
            ],
        })
    }

    #[test]
    fn test_process_packet_without_connection() {
        let client = TuioClient::new();
        client.process_packet(&cursor_frame(5, 0.1, 0.2, 1));
        let cursor = client.cursor(5).expect("cursor 5 live");
        assert_eq!(cursor.cursor_id(), 0);
        assert!(client.object(5).is_none());
    }

    #[test]
    fn test_set_port_updates_config() {
        let client = TuioClient::new();
        client.set_port(4444).unwrap();
        assert_eq!(client.port(), 4444);
        assert_eq!(TuioClient::with_port(5555).port(), 5555);
    }

    #[test]
    fn test_disconnect_without_connection_fails() {
        let client = TuioClient::new();
        assert!(matches!(
            client.disconnect(),
            Err(TuioError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_connect_receive_disconnect() {
        let client = ephemeral_client();
        client.connect().await.unwrap();
        assert!(client.is_connected());
        assert!(matches!(
            client.connect().await,
            Err(TuioError::AlreadyConnected)
        ));
        let addr = client.local_addr().unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let datagram = rosc::encoder::encode(&cursor_frame(9, 0.3, 0.4, 1)).unwrap();
        sender.send_to(&datagram, addr).await.unwrap();

        // The receive task runs concurrently; poll until it lands.
        let mut cursor = None;
        for _ in 0..100 {
            cursor = client.cursor(9);
            if cursor.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let cursor = cursor.expect("cursor 9 received over UDP");
        assert!((cursor.x() - 0.3).abs() < 1e-6);

        client.disconnect().unwrap();
        assert!(!client.is_connected());
        assert!(client.cursor(9).is_none());
    }

    #[tokio::test]
    async fn test_receive_loop_survives_malformed_datagram() {
        let client = ephemeral_client();
        client.connect().await.unwrap();
        let addr = client.local_addr().unwrap();
        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        // Valid OSC, but a truncated set layout for the profile.
        let malformed = rosc::encoder::encode(&OscPacket::Message(OscMessage {
            addr: "/tuio/2Dcur".into(),
            args: vec![OscType::String("set".into()), OscType::Int(5)],
        }))
        .unwrap();
        sender.send_to(&malformed, addr).await.unwrap();

        // A well-formed frame afterwards must still be processed.
        let frame = rosc::encoder::encode(&cursor_frame(9, 0.3, 0.4, 1)).unwrap();
        sender.send_to(&frame, addr).await.unwrap();

        let mut cursor = None;
        for _ in 0..100 {
            cursor = client.cursor(9);
            if cursor.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(cursor.is_some(), "receive loop died on malformed datagram");
        assert!(client.is_connected());
        client.disconnect().unwrap();
    }

    #[tokio::test]
    async fn test_bind_failure_reports_address() {
        let first = ephemeral_client();
        first.connect().await.unwrap();
        let addr = first.local_addr().unwrap();

        let mut config = ClientConfig::default();
        config.network.bind_addr = addr.ip().to_string();
        config.network.port = addr.port();
        let second = TuioClient::with_config(config);
        match second.connect().await {
            Err(TuioError::Bind { addr: reported, .. }) => {
                assert!(reported.contains(&addr.port().to_string()));
            }
            other => panic!("expected bind error, got {other:?}"),
        }
    }
}
