// ABOUTME: Small interactive pK client for exercising a running router by hand

use argh::FromArgs;
use bytes::Bytes;
use pk_ipc::client::Listener;
use pk_ipc::config::ClientConfig;
use pk_ipc::service::logging;
use pk_ipc::{ClientBuilder, ClientError, Port};
use std::net::SocketAddr;
use std::process::ExitCode;

#[derive(FromArgs)]
/// talk to a pK router: open a port, optionally send one message, then print whatever arrives
struct Args {
    /// pK router address
    #[argh(option, default = "default_server_addr()")]
    server: SocketAddr,

    /// local port to open (0 asks the router to assign one)
    #[argh(option, default = "0")]
    port: Port,

    /// destination port to send --message to
    #[argh(option)]
    to: Option<Port>,

    /// message payload; requires --to
    #[argh(option)]
    message: Option<String>,
}

fn default_server_addr() -> SocketAddr {
    ClientConfig::default().server_addr
}

struct PrintingListener;

impl Listener for PrintingListener {
    fn on_message(&mut self, source: Port, destination: Port, payload: Bytes) {
        println!(
            "[{source} -> {destination}] {}",
            String::from_utf8_lossy(&payload)
        );
    }

    fn on_error(&mut self, error: ClientError) {
        eprintln!("pK client error: {error}");
    }
}

fn main() -> ExitCode {
    logging::init();
    let args: Args = argh::from_env();

    let mut runtime = match ClientBuilder::new().server_addr(args.server).connect() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("could not connect to pK at {}: {e}", args.server);
            return ExitCode::FAILURE;
        }
    };
    runtime.set_listener(Box::new(PrintingListener));

    let local_port = match runtime.open_port(args.port) {
        Ok(port) => port,
        Err(e) => {
            eprintln!("open_port failed: {e}");
            return ExitCode::FAILURE;
        }
    };
    println!("opened port {local_port}");

    if let Some(destination) = args.to {
        let Some(message) = args.message else {
            eprintln!("--to given without --message");
            return ExitCode::FAILURE;
        };
        if let Err(e) = runtime.send_message(local_port, destination, Bytes::from(message.into_bytes())) {
            eprintln!("send_message failed: {e}");
            return ExitCode::FAILURE;
        }
        println!("sent to port {destination}");
    }

    loop {
        match runtime.receive_message(local_port, true) {
            Ok(Some(_)) => {} // PrintingListener already printed it
            Ok(None) => continue,
            Err(e) => {
                eprintln!("receive_message failed: {e}");
                return ExitCode::FAILURE;
            }
        }
    }
}
