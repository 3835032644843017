//! # Network Module
//!
//! This module provides the TCP stream used to talk to the remote agent.
//!
//! A [`MonitoredStream`] owns one connection. A background thread reads from the socket, splits
//! the bytes into frames and pushes them into a bounded queue, so that the control loop only ever
//! performs non-blocking reads of that queue. The reader never touches anything except the queue
//! and the connection flag.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod framing;
pub use framing::*;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    io::{self, Read, Write},
    net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, Sender, SyncSender},
        Arc,
    },
    thread,
    time::Duration,
};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// MACROS
// ------------------------------------------------------------------------------------------------

macro_rules! set_sockopts {
    ($stream:expr, $(($opt:ident, $val:expr)),+) => {
        $(
            $stream.$opt($val)
                .map_err(|e| StreamError::SocketOptionError(stringify!($opt).into(), e))?;
        )+
    };
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Network parameters, loaded from `net.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetParams {
    /// Host name or address of the command agent
    pub cmd_host: String,

    /// Port of the command agent
    pub cmd_port: u16,

    /// Options for the command stream
    #[serde(default)]
    pub cmd_stream: StreamOptions,
}

/// Options which can be set on a monitored stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamOptions {
    /// Maximum time to wait for the connection to be established. Zero waits for as long as the
    /// operating system does.
    pub connect_timeout_ms: u64,

    /// Read timeout of the background reader. This bounds how long the reader takes to notice a
    /// shutdown request.
    pub read_timeout_ms: u64,

    /// Write timeout, zero for blocking writes.
    pub write_timeout_ms: u64,

    /// Size of the read buffer, which is also the largest raw frame.
    pub read_buffer_size: usize,

    /// Number of frames which can be queued before the reader waits for the consumer.
    pub queue_capacity: usize,

    /// Maximum time to wait for the reader to exit on shutdown.
    pub shutdown_timeout_ms: u64,

    /// Framing scheme used in both directions.
    pub framing: Framing,
}

/// A TCP stream read by a background thread.
pub struct MonitoredStream {
    stream: TcpStream,

    peer: SocketAddr,

    framing: Framing,

    inbound: Option<Receiver<Vec<u8>>>,

    join_handle: Option<thread::JoinHandle<()>>,

    exited: Receiver<()>,

    shutdown_timeout: Duration,

    shutdown: Arc<AtomicBool>,

    connected: Arc<AtomicBool>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum StreamError {
    #[error("Could not resolve the endpoint {0}: {1}")]
    ResolveError(String, io::Error),

    #[error("The endpoint {0} did not resolve to any address")]
    NoAddress(String),

    #[error("Could not connect to {0}: {1}")]
    CouldNotConnect(String, io::Error),

    #[error("Could not set the {0} socket option: {1}")]
    SocketOptionError(String, io::Error),

    #[error("Could not start the reader thread: {0}")]
    SpawnError(io::Error),

    #[error("The stream is not connected")]
    NotConnected,

    #[error("Could not write to the stream: {0}")]
    WriteError(io::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MonitoredStream {
    /// Connect to the given endpoint and start the background reader.
    ///
    /// Blocks until the connection is established or `connect_timeout_ms` elapses.
    pub fn connect(host: &str, port: u16, options: &StreamOptions) -> Result<Self, StreamError> {
        let endpoint = format!("{}:{}", host, port);

        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|e| StreamError::ResolveError(endpoint.clone(), e))?
            .collect();

        if addrs.is_empty() {
            return Err(StreamError::NoAddress(endpoint));
        }

        // Try each address in turn, keeping the last error
        let mut last_err = None;
        let mut stream = None;
        for addr in addrs.iter() {
            let result = match options.connect_timeout_ms {
                0 => TcpStream::connect(addr),
                t => TcpStream::connect_timeout(addr, Duration::from_millis(t)),
            };

            match result {
                Ok(s) => {
                    stream = Some(s);
                    break;
                }
                Err(e) => {
                    debug!("Could not connect to {}: {}", addr, e);
                    last_err = Some(e);
                }
            }
        }

        let stream = match stream {
            Some(s) => s,
            None => {
                return Err(StreamError::CouldNotConnect(
                    endpoint,
                    last_err.unwrap_or_else(|| io::Error::from(io::ErrorKind::NotConnected)),
                ))
            }
        };

        Self::from_stream(stream, options)
    }

    /// Start monitoring an already connected stream.
    pub fn from_stream(stream: TcpStream, options: &StreamOptions) -> Result<Self, StreamError> {
        let peer = stream
            .peer_addr()
            .map_err(|e| StreamError::SocketOptionError("peer_addr".into(), e))?;

        // A zero read timeout is not allowed, and the reader must not block forever
        let read_timeout = Duration::from_millis(options.read_timeout_ms.max(1));
        let write_timeout = match options.write_timeout_ms {
            0 => None,
            t => Some(Duration::from_millis(t)),
        };

        set_sockopts!(
            stream,
            (set_nodelay, true),
            (set_read_timeout, Some(read_timeout)),
            (set_write_timeout, write_timeout)
        );

        let reader_stream = stream
            .try_clone()
            .map_err(|e| StreamError::SocketOptionError("try_clone".into(), e))?;

        // Create atomics and channels
        let shutdown = Arc::new(AtomicBool::new(false));
        let connected = Arc::new(AtomicBool::new(true));
        let (frame_tx, frame_rx) = mpsc::sync_channel(options.queue_capacity.max(1));
        let (exited_tx, exited_rx) = mpsc::channel();

        let decoder = FrameDecoder::new(options.framing, options.read_buffer_size);
        let buffer_size = options.read_buffer_size.max(1);
        let shutdown_clone = shutdown.clone();
        let connected_clone = connected.clone();

        let join_handle = thread::Builder::new()
            .name(format!("reader_{}", peer))
            .spawn(move || {
                reader_thread(
                    reader_stream,
                    decoder,
                    buffer_size,
                    frame_tx,
                    shutdown_clone,
                    connected_clone,
                    exited_tx,
                )
            })
            .map_err(StreamError::SpawnError)?;

        info!("Connected to {}", peer);

        Ok(Self {
            stream,
            peer,
            framing: options.framing,
            inbound: Some(frame_rx),
            join_handle: Some(join_handle),
            exited: exited_rx,
            shutdown_timeout: Duration::from_millis(options.shutdown_timeout_ms),
            shutdown,
            connected,
        })
    }

    /// Return if the stream is connected or not.
    pub fn connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// The address of the remote end.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Write a whole frame to the stream.
    ///
    /// Partial writes are continued until every byte is written or an error occurs.
    pub fn send(&self, payload: &[u8]) -> Result<(), StreamError> {
        if !self.connected() {
            return Err(StreamError::NotConnected);
        }

        let bytes = encode_frame(self.framing, payload);

        let result = (&self.stream)
            .write_all(&bytes)
            .and_then(|_| (&self.stream).flush());

        result.map_err(|e| {
            self.connected.store(false, Ordering::Relaxed);
            StreamError::WriteError(e)
        })
    }

    /// Get the next recieved frame if there is one. Never blocks.
    pub fn try_recv(&self) -> Option<Vec<u8>> {
        self.inbound.as_ref().and_then(|rx| rx.try_recv().ok())
    }

    /// Close the connection and stop the reader.
    ///
    /// Waits at most `shutdown_timeout_ms` for the reader to exit, after which it is detached.
    pub fn shutdown(mut self) {
        self.close();
    }

    fn close(&mut self) {
        let join_handle = match self.join_handle.take() {
            Some(jh) => jh,
            None => return,
        };

        self.shutdown.store(true, Ordering::Relaxed);
        self.connected.store(false, Ordering::Relaxed);

        // Wake the reader from any pending read, and from any pending send to a full queue
        self.stream.shutdown(Shutdown::Both).ok();
        self.inbound.take();

        match self.exited.recv_timeout(self.shutdown_timeout) {
            Ok(_) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                join_handle.join().ok();
                info!("Connection to {} closed", self.peer);
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                warn!(
                    "Reader for {} did not exit within {:?}, detaching it",
                    self.peer, self.shutdown_timeout
                );
            }
        }
    }
}

impl Drop for MonitoredStream {
    fn drop(&mut self) {
        self.close();
    }
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 1000,
            read_timeout_ms: 20,
            write_timeout_ms: 1000,
            read_buffer_size: 1024,
            queue_capacity: 64,
            shutdown_timeout_ms: 200,
            framing: Framing::Raw,
        }
    }
}

impl Default for NetParams {
    fn default() -> Self {
        Self {
            cmd_host: String::from("127.0.0.1"),
            cmd_port: 6000,
            cmd_stream: StreamOptions::default(),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn reader_thread(
    mut stream: TcpStream,
    mut decoder: FrameDecoder,
    buffer_size: usize,
    frame_tx: SyncSender<Vec<u8>>,
    shutdown: Arc<AtomicBool>,
    connected: Arc<AtomicBool>,
    exited_tx: Sender<()>,
) {
    let mut buf = vec![0u8; buffer_size];

    'read: while !shutdown.load(Ordering::Relaxed) {
        let num_bytes = match stream.read(&mut buf) {
            Ok(0) => {
                if !shutdown.load(Ordering::Relaxed) {
                    info!("Remote end closed the connection");
                }
                break;
            }
            Ok(n) => n,
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) =>
            {
                continue
            }
            Err(e) => {
                if !shutdown.load(Ordering::Relaxed) {
                    warn!("Error reading from stream: {}", e);
                }
                break;
            }
        };

        for frame in decoder.push(&buf[..num_bytes]) {
            // Blocks while the queue is full, errors once the consumer has gone
            if frame_tx.send(frame).is_err() {
                break 'read;
            }
        }
    }

    if decoder.num_discarded() > 0 {
        warn!(
            "Reader exiting, {} oversized frames were discarded",
            decoder.num_discarded()
        );
    } else {
        debug!("Reader exiting");
    }

    connected.store(false, Ordering::Relaxed);
    exited_tx.send(()).ok();
}

#[cfg(test)]
mod test {
    use super::*;
    use std::{
        net::TcpListener,
        time::Instant,
    };

    /// Poll the stream until a frame arrives or a second passes.
    fn recv_within_1s(stream: &MonitoredStream) -> Option<Vec<u8>> {
        let start = Instant::now();
        while start.elapsed() < Duration::from_secs(1) {
            if let Some(f) = stream.try_recv() {
                return Some(f);
            }
            thread::sleep(Duration::from_millis(5));
        }
        None
    }

    #[test]
    fn test_request_response_raw() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            let mut buf = [0u8; 64];
            let n = conn.read(&mut buf).unwrap();
            conn.write_all(br#"{"move":{"x":1,"y":0,"z":0}}"#).unwrap();
            buf[..n].to_vec()
        });

        let stream = MonitoredStream::connect("127.0.0.1", port, &StreamOptions::default()).unwrap();
        assert!(stream.connected());
        assert!(stream.try_recv().is_none());

        stream.send(b"request_move").unwrap();

        assert_eq!(
            recv_within_1s(&stream),
            Some(br#"{"move":{"x":1,"y":0,"z":0}}"#.to_vec())
        );
        assert_eq!(server.join().unwrap(), b"request_move".to_vec());

        stream.shutdown();
    }

    #[test]
    fn test_prefixed_frames_in_order() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            let mut bytes = Vec::new();
            for i in 0..5 {
                bytes.extend(encode_frame(
                    Framing::LengthPrefixed,
                    format!("frame {}", i).as_bytes(),
                ));
            }
            conn.write_all(&bytes).unwrap();
            conn
        });

        let options = StreamOptions {
            framing: Framing::LengthPrefixed,
            ..Default::default()
        };
        let stream = MonitoredStream::connect("127.0.0.1", port, &options).unwrap();

        for i in 0..5 {
            assert_eq!(
                recv_within_1s(&stream),
                Some(format!("frame {}", i).into_bytes())
            );
        }

        let _conn = server.join().unwrap();
        stream.shutdown();
    }

    #[test]
    fn test_connection_refused() {
        // Find a free port then close it
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        assert!(matches!(
            MonitoredStream::connect("127.0.0.1", port, &StreamOptions::default()),
            Err(StreamError::CouldNotConnect(_, _))
        ));
    }

    #[test]
    fn test_disconnect_detected_and_shutdown_bounded() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (conn, _) = listener.accept().unwrap();
            drop(conn);
        });

        let stream = MonitoredStream::connect("127.0.0.1", port, &StreamOptions::default()).unwrap();
        server.join().unwrap();

        let start = Instant::now();
        while stream.connected() && start.elapsed() < Duration::from_secs(1) {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(!stream.connected());
        assert!(matches!(stream.send(b"x"), Err(StreamError::NotConnected)));

        let start = Instant::now();
        stream.shutdown();
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
