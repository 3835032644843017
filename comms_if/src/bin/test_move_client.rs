//! Simple command client test
//!
//! Connects to an agent, sends a movement request every second and prints the decoded commands.

use std::time::Duration;

use comms_if::{
    cmd::{CommandMessage, Request},
    net::{MonitoredStream, NetParams},
};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "test_move_client")]
struct Opt {
    /// Agent host
    #[structopt(long, default_value = "127.0.0.1")]
    host: String,

    /// Agent port
    #[structopt(short, long, default_value = "6000")]
    port: u16,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opt = Opt::from_args();
    let params = NetParams::default();

    let stream = match MonitoredStream::connect(&opt.host, opt.port, &params.cmd_stream) {
        Ok(s) => s,
        Err(e) => {
            println!("Could not connect to the server");
            return Err(e.into());
        }
    };

    // Loop over requesting commands from the server
    while stream.connected() {
        print!("Sending request... ");
        stream.send(Request::Move.to_payload().as_bytes())?;
        println!("done");

        std::thread::sleep(Duration::from_millis(1000));

        while let Some(frame) = stream.try_recv() {
            match CommandMessage::decode(&frame) {
                CommandMessage::MoveVector(v) => println!("Move: {:?}", v),
                CommandMessage::Unknown => {
                    println!("No command in \"{}\"", String::from_utf8_lossy(&frame))
                }
            }
        }
    }

    println!("Connection lost");

    stream.shutdown();

    Ok(())
}
