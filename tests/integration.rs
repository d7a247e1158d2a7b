// ABOUTME: End-to-end scenarios over real TCP loopback: router on its own thread, real event loops both sides

use bytes::Bytes;
use pk_ipc::client::{ClientBuilder, ClientError};
use pk_ipc::codec::{CodecError, Encodable};
use pk_ipc::config::RouterConfig;
use pk_ipc::frame::{decode_frame, Frame, OpenPortRequest, SendMessage, Shutdown};
use pk_ipc::result_code;
use pk_ipc::router::Router;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::thread::JoinHandle;
use std::time::Duration;

fn spawn_router() -> (SocketAddr, JoinHandle<()>) {
    let config = RouterConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        ..RouterConfig::default()
    };
    let mut router = Router::bind(config).expect("router should bind to an ephemeral port");
    let addr = router.local_addr().expect("bound router should report its address");
    let handle = std::thread::spawn(move || {
        router.run().expect("router loop should not error");
    });
    (addr, handle)
}

/// Ask the router to stop over the wire, the same way any other client
/// would, then wait for its thread to exit.
fn shutdown_router(addr: SocketAddr, handle: JoinHandle<()>) {
    let mut stream = TcpStream::connect(addr).expect("connect for shutdown");
    stream
        .write_all(&Shutdown.to_bytes())
        .expect("send Shutdown frame");
    handle.join().expect("router thread should exit cleanly");
}

fn client_at(addr: SocketAddr) -> pk_ipc::client::Runtime {
    ClientBuilder::new()
        .server_addr(addr)
        .connect()
        .expect("client should connect to the router")
}

/// Read raw frames off a blocking `std::net::TcpStream`, used by the
/// one test (S6) that needs to control segmentation directly rather
/// than going through `Runtime`.
fn read_one_frame(stream: &mut TcpStream) -> Frame {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 512];
    loop {
        match decode_frame(&buf) {
            Ok((frame, consumed)) => {
                assert_eq!(consumed, buf.len(), "exactly one frame expected per read in this test");
                return frame;
            }
            Err(CodecError::Incomplete) => {}
            Err(e) => panic!("unexpected decode error: {e}"),
        }
        let n = stream.read(&mut chunk).expect("read from router");
        assert!(n > 0, "router closed the connection before a full frame arrived");
        buf.extend_from_slice(&chunk[..n]);
    }
}

#[test]
fn s1_ephemeral_open_close_round_trip() {
    let (addr, handle) = spawn_router();
    let mut client = client_at(addr);

    let port = client.open_port(0).expect("ephemeral open should succeed");
    assert!((16384..(1u64 << 32)).contains(&port));

    client.close_port(port).expect("close should succeed");

    shutdown_router(addr, handle);
}

#[test]
fn s2_loopback_delivery() {
    let (addr, handle) = spawn_router();
    let mut client = client_at(addr);
    let port = client.open_port(0).unwrap();

    client
        .send_message(port, port, Bytes::from_static(b"ping"))
        .expect("send to self should be accepted");

    let payload = client
        .receive_message(port, true)
        .expect("receive should not error")
        .expect("a payload should have been delivered");
    assert_eq!(payload.as_ref(), b"ping");

    shutdown_router(addr, handle);
}

#[test]
fn s3_fixed_port_claim_and_conflict() {
    let (addr, handle) = spawn_router();
    let mut client_a = client_at(addr);
    let mut client_b = client_at(addr);

    let port = client_a.open_port(2917).expect("A should claim port 2917");
    assert_eq!(port, 2917);

    let conflict = client_b.open_port(2917);
    assert!(matches!(conflict, Err(ClientError::DuplicatePort)));

    client_a.close_port(2917).expect("A should release 2917");

    let port_b = client_b
        .open_port(2917)
        .expect("B should be able to claim 2917 once A releases it");
    assert_eq!(port_b, 2917);

    shutdown_router(addr, handle);
}

#[test]
fn s4_implicit_release_on_disconnect() {
    let (addr, handle) = spawn_router();
    {
        let mut client_a = client_at(addr);
        client_a.open_port(5000).unwrap();
        client_a.open_port(5001).unwrap();
        client_a.open_port(5002).unwrap();
        // client_a (and its TCP connection) is dropped here, abruptly.
    }

    // Give the router's poll a moment to observe the FIN.
    std::thread::sleep(Duration::from_millis(200));

    let mut client_b = client_at(addr);
    let port = client_b
        .open_port(5001)
        .expect("B should be able to claim 5001 after A's abrupt disconnect");
    assert_eq!(port, 5001);

    shutdown_router(addr, handle);
}

#[test]
fn s5_pipelined_requests_with_reordered_responses() {
    use pk_ipc::client::ClientResult;
    use pk_ipc::Port;
    use std::cell::RefCell;
    use std::rc::Rc;

    let (addr, handle) = spawn_router();
    let mut client = client_at(addr);

    let first: Rc<RefCell<Option<ClientResult<Port>>>> = Rc::new(RefCell::new(None));
    let second: Rc<RefCell<Option<ClientResult<Port>>>> = Rc::new(RefCell::new(None));

    let first_slot = first.clone();
    client
        .open_port_async(0, Box::new(move |result| *first_slot.borrow_mut() = Some(result)))
        .expect("first open should be sent");

    let second_slot = second.clone();
    client
        .open_port_async(0, Box::new(move |result| *second_slot.borrow_mut() = Some(result)))
        .expect("second open should be sent");

    while first.borrow().is_none() || second.borrow().is_none() {
        client.pump(None).expect("pump should not error");
    }

    let first_port = first.borrow_mut().take().unwrap().expect("first open should succeed");
    let second_port = second.borrow_mut().take().unwrap().expect("second open should succeed");
    assert_ne!(
        first_port, second_port,
        "two ephemeral opens in flight at once must not collide"
    );

    shutdown_router(addr, handle);
}

#[test]
fn s6_framing_across_segment_boundaries() {
    let (addr, handle) = spawn_router();
    let mut stream = TcpStream::connect(addr).expect("raw connect");

    stream
        .write_all(&OpenPortRequest { request_id: 1, requested_port: 0 }.to_bytes())
        .unwrap();
    let Frame::OpenPortResponse(resp) = read_one_frame(&mut stream) else {
        panic!("expected OpenPortResponse");
    };
    assert_eq!(resp.result, result_code::OK);
    let port = resp.port;

    let frame_bytes = SendMessage {
        source: port,
        destination: port,
        payload: Bytes::from_static(b"hello, segmented"),
    }
    .to_bytes();

    // Deliver the same frame across three separate writes instead of
    // one, exercising the router's incremental reassembly the same way
    // an arbitrarily-segmenting TCP stack would.
    let third = frame_bytes.len() / 3;
    let (a, rest) = frame_bytes.split_at(third);
    let (b, c) = rest.split_at(third);
    for chunk in [a, b, c] {
        stream.write_all(chunk).unwrap();
        stream.flush().unwrap();
        std::thread::sleep(Duration::from_millis(5));
    }

    let Frame::DeliverMessage(delivered) = read_one_frame(&mut stream) else {
        panic!("expected exactly one DeliverMessage");
    };
    assert_eq!(delivered.source, port);
    assert_eq!(delivered.destination, port);
    assert_eq!(delivered.payload.as_ref(), b"hello, segmented");

    shutdown_router(addr, handle);
}
