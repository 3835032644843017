//! # Command Client
//!
//! Maintains the connection to the remote command agent. Requests are written straight to the
//! stream, while inbound frames are collected by the stream's background reader and drained
//! here once per cycle without blocking.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, warn};

use comms_if::{
    cmd::{CommandMessage, Request},
    net::{MonitoredStream, NetParams, StreamError},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Command client
pub struct CmdClient {
    stream: MonitoredStream,

    /// Number of inbound frames which could not be decoded
    num_decode_failures: u64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum CmdClientError {
    #[error("Could not connect to the command agent: {0}")]
    ConnectionError(StreamError),

    #[error("The client is not connected to the agent")]
    NotConnected,

    #[error("Could not send the request to the agent: {0}")]
    SendError(StreamError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CmdClient {
    /// Connect to the command agent given in the parameters.
    ///
    /// Blocks until the connection is made or the connect timeout elapses.
    pub fn connect(params: &NetParams) -> Result<Self, CmdClientError> {
        let stream = MonitoredStream::connect(&params.cmd_host, params.cmd_port, &params.cmd_stream)
            .map_err(CmdClientError::ConnectionError)?;

        Ok(Self::from_stream(stream))
    }

    /// Wrap an already monitored stream.
    pub fn from_stream(stream: MonitoredStream) -> Self {
        Self {
            stream,
            num_decode_failures: 0,
        }
    }

    /// Check if the client is connected to the agent
    pub fn is_connected(&self) -> bool {
        self.stream.connected()
    }

    /// Number of inbound frames dropped because they could not be decoded.
    pub fn num_decode_failures(&self) -> u64 {
        self.num_decode_failures
    }

    /// Send a request to the agent.
    pub fn send_request(&self, request: &Request) -> Result<(), CmdClientError> {
        self.send_payload(request.to_payload().as_bytes())
    }

    /// Send raw bytes to the agent, blocking until all of them are written.
    pub fn send_payload(&self, payload: &[u8]) -> Result<(), CmdClientError> {
        if !self.stream.connected() {
            return Err(CmdClientError::NotConnected);
        }

        self.stream.send(payload).map_err(CmdClientError::SendError)
    }

    /// Get the next inbound frame, if one has arrived. Never blocks.
    pub fn poll_inbound(&self) -> Option<Vec<u8>> {
        self.stream.try_recv()
    }

    /// Decode a frame, logging it if it carries no command.
    ///
    /// The first failure is logged as a warning, later ones only at debug level.
    pub fn decode_command(&mut self, bytes: &[u8]) -> CommandMessage {
        match CommandMessage::try_decode(bytes) {
            Ok(c) => c,
            Err(e) => {
                self.num_decode_failures += 1;

                if self.num_decode_failures == 1 {
                    warn!("Dropped an inbound frame: {}", e);
                } else {
                    debug!(
                        "Dropped an inbound frame ({} so far): {}",
                        self.num_decode_failures, e
                    );
                }

                CommandMessage::Unknown
            }
        }
    }

    /// Drain every pending frame, returning the valid commands in the order they were recieved.
    pub fn receive_cmds(&mut self) -> Vec<CommandMessage> {
        let mut cmds = vec![];

        while let Some(frame) = self.poll_inbound() {
            match self.decode_command(&frame) {
                CommandMessage::Unknown => (),
                c => cmds.push(c),
            }
        }

        cmds
    }

    /// Close the connection, waiting a bounded time for the reader to stop.
    pub fn shutdown(self) {
        self.stream.shutdown();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::{
        cmd::VectorData,
        net::{Framing, StreamOptions},
    };
    use std::{
        io::{Read, Write},
        net::TcpListener,
        thread,
        time::{Duration, Instant},
    };

    fn params(port: u16, framing: Framing) -> NetParams {
        NetParams {
            cmd_host: String::from("127.0.0.1"),
            cmd_port: port,
            cmd_stream: StreamOptions {
                framing,
                ..Default::default()
            },
        }
    }

    /// Poll until `n` commands or frames have been seen, or a second passes.
    fn wait_for_cmds(client: &mut CmdClient, n: usize) -> Vec<CommandMessage> {
        let start = Instant::now();
        let mut cmds = vec![];
        while cmds.len() < n && start.elapsed() < Duration::from_secs(2) {
            cmds.extend(client.receive_cmds());
            thread::sleep(Duration::from_millis(5));
        }
        cmds
    }

    #[test]
    fn test_request_and_move() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let agent = thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            let mut buf = [0u8; 64];
            let n = conn.read(&mut buf).unwrap();
            conn.write_all(br#"{"move":{"x":1,"y":0,"z":0}}"#).unwrap();
            thread::sleep(Duration::from_millis(200));
            String::from_utf8(buf[..n].to_vec()).unwrap()
        });

        let mut client = CmdClient::connect(&params(port, Framing::Raw)).unwrap();
        assert!(client.is_connected());
        client.send_request(&Request::Move).unwrap();

        let cmds = wait_for_cmds(&mut client, 1);
        assert_eq!(cmds, vec![CommandMessage::MoveVector(VectorData::new(1.0, 0.0, 0.0))]);

        assert_eq!(agent.join().unwrap(), "request_move");
        client.shutdown();
    }

    #[test]
    fn test_garbage_is_dropped() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let agent = thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            conn.write_all(b"garbage").unwrap();
            thread::sleep(Duration::from_millis(100));
            conn.write_all(br#"{"move":{"x":0,"y":2,"z":0}}"#).unwrap();
            thread::sleep(Duration::from_millis(200));
        });

        let mut client = CmdClient::connect(&params(port, Framing::Raw)).unwrap();

        let cmds = wait_for_cmds(&mut client, 1);
        assert_eq!(cmds, vec![CommandMessage::MoveVector(VectorData::new(0.0, 2.0, 0.0))]);
        assert_eq!(client.num_decode_failures(), 1);

        agent.join().unwrap();
        client.shutdown();
    }

    #[test]
    fn test_decode_command() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let agent = thread::spawn(move || {
            listener.accept().unwrap();
        });

        let mut client = CmdClient::connect(&params(port, Framing::Raw)).unwrap();
        agent.join().unwrap();

        assert_eq!(client.decode_command(b"garbage"), CommandMessage::Unknown);
        assert_eq!(client.decode_command(b"{}"), CommandMessage::Unknown);
        assert_eq!(client.decode_command(&[0xff, 0xfe]), CommandMessage::Unknown);
        assert_eq!(client.num_decode_failures(), 3);

        client.shutdown();
    }

    #[test]
    fn test_connection_refused() {
        // Grab a free port then close the listener so nothing is listening on it
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        assert!(matches!(
            CmdClient::connect(&params(port, Framing::Raw)),
            Err(CmdClientError::ConnectionError(_))
        ));
    }

    #[test]
    fn test_disconnect_detected() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let agent = thread::spawn(move || {
            let (conn, _) = listener.accept().unwrap();
            drop(conn);
        });

        let client = CmdClient::connect(&params(port, Framing::LengthPrefixed)).unwrap();
        agent.join().unwrap();

        let start = Instant::now();
        while client.is_connected() && start.elapsed() < Duration::from_secs(2) {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(!client.is_connected());
        assert!(matches!(
            client.send_request(&Request::Move),
            Err(CmdClientError::NotConnected)
        ));
    }
}
