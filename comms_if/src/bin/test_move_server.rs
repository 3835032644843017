//! Simple command agent for testing the rover's command client.
//!
//! Answers every `request_move` with the same move frame, and logs any other request.

use std::{
    io::{Read, Write},
    net::{TcpListener, TcpStream},
    thread,
};

use comms_if::{
    cmd::{MoveFrame, Request, VectorData},
    net::{encode_frame, FrameDecoder, Framing},
};
use serde_json::json;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "test_move_server")]
struct Opt {
    /// Port to listen on
    #[structopt(short, long, default_value = "6000")]
    port: u16,

    /// Prefix each frame with its length
    #[structopt(long)]
    length_prefixed: bool,

    /// X component of the move vector
    #[structopt(default_value = "1000")]
    x: f64,

    /// Y component of the move vector
    #[structopt(default_value = "0")]
    y: f64,

    /// Z component of the move vector
    #[structopt(default_value = "0")]
    z: f64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opt = Opt::from_args();

    let framing = match opt.length_prefixed {
        true => Framing::LengthPrefixed,
        false => Framing::Raw,
    };
    let frame = MoveFrame::new(VectorData::new(opt.x, opt.y, opt.z)).to_json()?;

    let listener = TcpListener::bind(("0.0.0.0", opt.port))?;

    println!("Server running on port {}, waiting for the rover", opt.port);

    for conn in listener.incoming() {
        let conn = match conn {
            Ok(c) => c,
            Err(e) => {
                println!("Could not accept connection: {}", e);
                continue;
            }
        };

        let frame = frame.clone();
        thread::spawn(move || {
            if let Err(e) = serve(conn, framing, &frame) {
                println!("Connection error: {}", e);
            }
        });
    }

    Ok(())
}

/// Respond to requests on one connection until the rover hangs up.
fn serve(mut conn: TcpStream, framing: Framing, move_frame: &str) -> std::io::Result<()> {
    println!("Connection from {}", conn.peer_addr()?);

    let mut decoder = FrameDecoder::new(framing, 1024);
    let mut buf = [0u8; 1024];

    loop {
        let n = conn.read(&mut buf)?;
        if n == 0 {
            println!("Rover disconnected");
            return Ok(());
        }

        for payload in decoder.push(&buf[..n]) {
            let payload = String::from_utf8_lossy(&payload);
            println!("Recieved \"{}\"", payload.trim());

            let response = match Request::parse(&payload) {
                Request::Move => move_frame.to_string(),
                Request::PhysicsDetection { name, .. } => {
                    json!({ "message": format!("Physics engine reported: {}", name) }).to_string()
                }
                Request::Sos(msg) => {
                    let mission = match msg.contains("stuck") {
                        true => "rescue_mission",
                        false => "unknown_issue",
                    };
                    json!({ "mission_type": mission, "notes": msg }).to_string()
                }
            };

            println!("Sending \"{}\"", response);
            conn.write_all(&encode_frame(framing, response.as_bytes()))?;
        }
    }
}
