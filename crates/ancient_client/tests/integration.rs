//! End-to-end tests: client, transport, server facade and engine together.

use ancient_client::{ClientConfig, LoopbackTransport, RemoteFreezer};
use ancient_protocol::{codes, RpcRequest, RpcResponse};
use ancient_server::{RpcListener, RpcServer, ServerConfig};
use ancient_store::{
    AncientEngine, AncientError, AncientRecord, AncientStore, CallContext, Category, FileFreezer,
    MemoryFreezer,
};
use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener as StdTcpListener, TcpStream as StdTcpStream};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// A server running on its own runtime for the lifetime of the fixture.
struct TcpFixture {
    addr: SocketAddr,
    shutdown: CancellationToken,
    _runtime: tokio::runtime::Runtime,
}

impl TcpFixture {
    fn start(engine: Arc<dyn AncientEngine>) -> Self {
        Self::start_with(engine, ServerConfig::new("127.0.0.1:0".parse().unwrap()))
    }

    fn start_with(engine: Arc<dyn AncientEngine>, config: ServerConfig) -> Self {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();
        let server = Arc::new(RpcServer::new(engine, &config));
        let listener = runtime
            .block_on(RpcListener::bind(server, &config))
            .unwrap();
        let addr = listener.local_addr();
        let shutdown = listener.shutdown_token();
        runtime.spawn(listener.run());
        Self {
            addr,
            shutdown,
            _runtime: runtime,
        }
    }

    fn endpoint(&self) -> String {
        self.addr.to_string()
    }

    fn client(&self) -> RemoteFreezer {
        RemoteFreezer::connect(&self.endpoint(), ClientConfig::default()).unwrap()
    }

    /// Sends one raw line and returns the decoded response.
    fn raw(&self, line: &str) -> RpcResponse {
        let stream = StdTcpStream::connect(self.addr).unwrap();
        let mut writer = stream.try_clone().unwrap();
        writeln!(writer, "{line}").unwrap();
        let mut response = String::new();
        BufReader::new(stream).read_line(&mut response).unwrap();
        RpcResponse::decode(response.trim_end().as_bytes()).unwrap()
    }
}

impl Drop for TcpFixture {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn loopback(engine: Arc<dyn AncientEngine>) -> RemoteFreezer {
    let server = RpcServer::new(engine, &ServerConfig::default());
    let transport =
        LoopbackTransport::new(move |line: &[u8]| server.handle_line(line).encode().unwrap());
    RemoteFreezer::with_transport(transport, ClientConfig::default()).unwrap()
}

fn ctx() -> CallContext {
    CallContext::background()
}

fn record(seed: u8) -> AncientRecord {
    AncientRecord::new(
        vec![seed],
        vec![seed, 0xaa],
        vec![seed, 0xbb],
        vec![seed, 0xcc],
        vec![seed, 0xdd],
    )
}

fn fill(store: &dyn AncientStore, count: u8) {
    for n in 0..count {
        store.append_ancient(&ctx(), u64::from(n), &record(n)).unwrap();
    }
}

fn assert_append_then_read(store: &dyn AncientStore) {
    let first = AncientRecord::new(vec![0x01], vec![0x02], vec![0x03], vec![0x04], vec![0x05]);
    store.append_ancient(&ctx(), 0, &first).unwrap();

    assert_eq!(store.ancients(&ctx()).unwrap(), 1);
    assert_eq!(store.ancient(&ctx(), Category::Hash, 0).unwrap(), vec![0x01]);
    assert_eq!(store.ancient(&ctx(), Category::Difficulty, 0).unwrap(), vec![0x05]);
    assert!(store.has_ancient(&ctx(), Category::Hash, 0).unwrap());
    assert!(!store.has_ancient(&ctx(), Category::Hash, 1).unwrap());
}

fn assert_out_of_order(store: &dyn AncientStore) {
    fill(store, 1);
    let err = store.append_ancient(&ctx(), 5, &record(5)).unwrap_err();
    assert!(matches!(
        err,
        AncientError::OutOfOrderAppend {
            expected: 1,
            got: 5
        }
    ));
    assert_eq!(store.ancients(&ctx()).unwrap(), 1);
}

fn assert_truncate_to_zero(store: &dyn AncientStore) {
    fill(store, 3);
    store.truncate_ancients(&ctx(), 0).unwrap();

    assert_eq!(store.ancients(&ctx()).unwrap(), 0);
    assert!(matches!(
        store.ancient(&ctx(), Category::Hash, 0),
        Err(AncientError::NotFound { number: 0, .. })
    ));
    for category in Category::ALL {
        assert!(!store.has_ancient(&ctx(), category, 0).unwrap());
    }
}

fn assert_truncate_bounds(store: &dyn AncientStore) {
    fill(store, 4);
    assert!(matches!(
        store.truncate_ancients(&ctx(), 5),
        Err(AncientError::InvalidTruncateTarget {
            target: 5,
            frozen: 4
        })
    ));

    store.truncate_ancients(&ctx(), 2).unwrap();
    assert_eq!(store.ancients(&ctx()).unwrap(), 2);
    for n in 0..4 {
        assert_eq!(store.has_ancient(&ctx(), Category::Body, n).unwrap(), n < 2);
    }
    store.append_ancient(&ctx(), 2, &record(9)).unwrap();
    assert_eq!(store.ancient(&ctx(), Category::Body, 2).unwrap(), vec![9, 0xbb]);
}

// Loopback

#[test]
fn loopback_append_then_read() {
    assert_append_then_read(&loopback(Arc::new(MemoryFreezer::new())));
}

#[test]
fn loopback_out_of_order() {
    assert_out_of_order(&loopback(Arc::new(MemoryFreezer::new())));
}

#[test]
fn loopback_truncate_to_zero() {
    assert_truncate_to_zero(&loopback(Arc::new(MemoryFreezer::new())));
}

#[test]
fn loopback_truncate_bounds() {
    assert_truncate_bounds(&loopback(Arc::new(MemoryFreezer::new())));
}

#[test]
fn remote_and_local_agree() {
    let engine = Arc::new(MemoryFreezer::new());
    let remote = loopback(engine.clone());
    fill(&remote, 5);
    remote.truncate_ancients(&ctx(), 3).unwrap();

    for category in Category::ALL {
        assert_eq!(
            remote.ancient_size(&ctx(), category).unwrap(),
            engine.ancient_size(&ctx(), category).unwrap()
        );
        for n in 0..5 {
            assert_eq!(
                remote.has_ancient(&ctx(), category, n).unwrap(),
                engine.has_ancient(&ctx(), category, n).unwrap()
            );
        }
    }
}

// TCP

#[test]
fn tcp_append_then_read() {
    let fixture = TcpFixture::start(Arc::new(MemoryFreezer::new()));
    let client = fixture.client();
    assert_eq!(client.status(), "ok [version=version 1]");
    assert_append_then_read(&client);
}

#[test]
fn tcp_out_of_order() {
    let fixture = TcpFixture::start(Arc::new(MemoryFreezer::new()));
    assert_out_of_order(&fixture.client());
}

#[test]
fn tcp_truncate_to_zero() {
    let fixture = TcpFixture::start(Arc::new(MemoryFreezer::new()));
    assert_truncate_to_zero(&fixture.client());
}

#[test]
fn tcp_truncate_bounds() {
    let fixture = TcpFixture::start(Arc::new(MemoryFreezer::new()));
    assert_truncate_bounds(&fixture.client());
}

#[test]
fn malformed_header_is_rejected_before_the_engine() {
    let fixture = TcpFixture::start(Arc::new(MemoryFreezer::new()));
    let request = RpcRequest::new(
        1,
        "freezer_appendAncient",
        vec![json!(0), json!("0x01"), json!("0xnothex"), json!("0x03"), json!("0x04"), json!("0x05")],
    );
    let line = String::from_utf8(request.encode().unwrap()).unwrap();
    let response = fixture.raw(&line);

    assert_eq!(response.error.map(|e| e.code), Some(codes::MALFORMED_ENVELOPE));
    assert_eq!(fixture.client().ancients(&ctx()).unwrap(), 0);
}

#[test]
fn failed_ancient_returns_placeholder_on_the_wire() {
    let fixture = TcpFixture::start(Arc::new(MemoryFreezer::new()));
    let response = fixture.raw(r#"{"jsonrpc":"2.0","id":5,"method":"freezer_ancient","params":["hash",0]}"#);
    assert_eq!(response.id, Some(5));
    assert_eq!(response.result, Some(json!("0x")));
    assert_eq!(response.error.map(|e| e.code), Some(codes::NOT_FOUND));
}

#[test]
fn concurrent_appends_of_same_number() {
    let fixture = TcpFixture::start(Arc::new(MemoryFreezer::new()));
    let client = Arc::new(fixture.client());
    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let client = Arc::clone(&client);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                client.append_ancient(&CallContext::background(), 0, &record(i as u8))
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    for result in results.iter().filter(|r| r.is_err()) {
        assert!(matches!(
            result,
            Err(AncientError::OutOfOrderAppend {
                expected: 1,
                got: 0
            })
        ));
    }
    assert_eq!(client.ancients(&ctx()).unwrap(), 1);
}

#[test]
fn parallel_readers_see_frozen_prefix() {
    let fixture = TcpFixture::start(Arc::new(MemoryFreezer::new()));
    let writer = fixture.client();
    let reader = Arc::new(fixture.client());

    let observer = {
        let reader = Arc::clone(&reader);
        thread::spawn(move || {
            for _ in 0..50 {
                let frozen = reader.ancients(&CallContext::background()).unwrap();
                if frozen > 0 {
                    let n = frozen - 1;
                    let hash = reader
                        .ancient(&CallContext::background(), Category::Hash, n)
                        .unwrap();
                    assert_eq!(hash, vec![n as u8]);
                }
            }
        })
    };
    fill(&writer, 20);
    observer.join().unwrap();
    assert_eq!(reader.ancients(&ctx()).unwrap(), 20);
}

#[test]
fn file_engine_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    {
        let fixture = TcpFixture::start(Arc::new(FileFreezer::open(dir.path()).unwrap()));
        let client = fixture.client();
        fill(&client, 3);
        client.sync(&ctx()).unwrap();
        client.close(&ctx()).unwrap();
    }

    let fixture = TcpFixture::start(Arc::new(FileFreezer::open(dir.path()).unwrap()));
    let client = fixture.client();
    assert_eq!(client.ancients(&ctx()).unwrap(), 3);
    assert_eq!(
        client.ancient(&ctx(), Category::Receipts, 2).unwrap(),
        vec![2, 0xcc]
    );
}

#[test]
fn close_twice_then_calls_fail() {
    let engine = Arc::new(MemoryFreezer::new());
    let fixture = TcpFixture::start(engine.clone());
    let client = fixture.client();
    fill(&client, 1);

    client.close(&ctx()).unwrap();
    client.close(&ctx()).unwrap();
    assert!(!client.is_connected());
    assert!(matches!(client.ancients(&ctx()), Err(AncientError::Closed)));
    // The first close reached the engine.
    assert!(matches!(engine.ancients(&ctx()), Err(AncientError::Closed)));
}

#[test]
fn namespaces_must_match() {
    let config = ServerConfig::new("127.0.0.1:0".parse().unwrap()).with_namespace("cold");
    let fixture = TcpFixture::start_with(Arc::new(MemoryFreezer::new()), config);

    assert!(matches!(
        RemoteFreezer::connect(&fixture.endpoint(), ClientConfig::default()),
        Err(AncientError::Transport(_))
    ));
    let client =
        RemoteFreezer::connect(&fixture.endpoint(), ClientConfig::default().with_namespace("cold"))
            .unwrap();
    assert_eq!(client.ancients(&ctx()).unwrap(), 0);
}

#[test]
fn unreachable_server_is_transport_error() {
    let addr = {
        let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    assert!(matches!(
        RemoteFreezer::connect(&addr.to_string(), ClientConfig::default()),
        Err(AncientError::Transport(_))
    ));
}

/// A server that completes the handshake and then never answers.
fn silent_server() -> String {
    let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { break };
            thread::spawn(move || {
                let mut writer = stream.try_clone().unwrap();
                for line in BufReader::new(stream).lines() {
                    let Ok(line) = line else { break };
                    let request = RpcRequest::decode(line.as_bytes()).unwrap();
                    if request.method == "freezer_pingVersion" {
                        let response = RpcResponse::success(request.id, json!("version 1"));
                        let payload = String::from_utf8(response.encode().unwrap()).unwrap();
                        if writeln!(writer, "{payload}").is_err() {
                            break;
                        }
                    }
                }
            });
        }
    });
    addr
}

#[test]
fn deadline_is_enforced() {
    let client = RemoteFreezer::connect(&silent_server(), ClientConfig::default()).unwrap();
    let started = Instant::now();
    let ctx = CallContext::background().with_timeout(Duration::from_millis(150));

    assert!(matches!(client.ancients(&ctx), Err(AncientError::DeadlineExceeded)));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn default_timeout_applies_without_deadline() {
    let config = ClientConfig::default().with_default_timeout(Duration::from_millis(150));
    let client = RemoteFreezer::connect(&silent_server(), config).unwrap();
    assert!(matches!(
        client.sync(&CallContext::background()),
        Err(AncientError::DeadlineExceeded)
    ));
}

#[test]
fn cancellation_is_enforced() {
    let client = RemoteFreezer::connect(&silent_server(), ClientConfig::default()).unwrap();
    let token = CancellationToken::new();
    let ctx = CallContext::background().with_cancel(token.clone());

    let canceler = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        token.cancel();
    });
    assert!(matches!(client.ancients(&ctx), Err(AncientError::Canceled)));
    canceler.join().unwrap();
}

#[test]
fn expired_deadline_is_refused_by_server() {
    let fixture = TcpFixture::start(Arc::new(MemoryFreezer::new()));
    let line = r#"{"jsonrpc":"2.0","id":2,"method":"freezer_sync","params":[],"deadline_ms":0}"#;
    let response = fixture.raw(line);
    assert_eq!(response.error.map(|e| e.code), Some(codes::DEADLINE_EXCEEDED));
}
