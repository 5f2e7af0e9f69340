//! End-to-end tests over real TCP connections.
//!
//! Each test spins up a server on an ephemeral port inside a dedicated
//! runtime thread, drives it through the blocking client, and shuts it down
//! through a oneshot channel.

use std::net::SocketAddr;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::oneshot;

use lkv_client::CacheClient;
use lkv_engine::Cache;
use lkv_server::{handle_connection, LineServer};

struct TestServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    join: Option<thread::JoinHandle<()>>,
}

impl TestServer {
    /// Serves `cache` through the default handler, like the binary does.
    fn spawn(cache: Arc<Cache>) -> Self {
        let mut server = LineServer::new();
        server.set_handler(
            "default",
            Box::new(move |req| cache.handle_request(&req.method, &req.args)),
        );
        Self::spawn_with(server)
    }

    fn spawn_with(server: LineServer) -> Self {
        let server = Arc::new(server);
        let (addr_tx, addr_rx) = mpsc::channel();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let join = thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("build runtime");
            runtime.block_on(async move {
                let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
                addr_tx
                    .send(listener.local_addr().expect("local addr"))
                    .expect("publish addr");

                loop {
                    tokio::select! {
                        _ = &mut shutdown_rx => break,
                        accepted = listener.accept() => {
                            let (stream, _) = match accepted {
                                Ok(pair) => pair,
                                Err(_) => break,
                            };
                            let server = Arc::clone(&server);
                            tokio::spawn(async move {
                                let _ = handle_connection(stream, server).await;
                            });
                        }
                    }
                }
            });
        });

        let addr = addr_rx.recv().expect("server address");
        TestServer {
            addr,
            shutdown: Some(shutdown_tx),
            join: Some(join),
        }
    }

    fn client(&self) -> CacheClient {
        CacheClient::connect(self.addr).expect("connect")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

#[test]
fn scalar_commands_over_the_wire() {
    let server = TestServer::spawn(Arc::new(Cache::new()));
    let mut client = server.client();

    assert_eq!(client.set("firstname", "Anton").unwrap(), "OK");
    assert_eq!(client.set("lastname", "Vlasov").unwrap(), "OK");
    assert_eq!(client.set("age", "20").unwrap(), "OK");
    assert_eq!(client.keys("a??").unwrap(), "1) \"age\"");

    assert_eq!(
        client.del(&["firstname", "nonexistant", "age"]).unwrap(),
        "(integer) 2"
    );
    assert_eq!(client.get("firstname").unwrap(), "(nil)");
    assert_eq!(client.get("lastname").unwrap(), "Vlasov");
}

#[test]
fn maps_and_lists_over_the_wire() {
    let server = TestServer::spawn(Arc::new(Cache::new()));
    let mut client = server.client();

    assert_eq!(
        client.hset("hmap1", &[("hash1", "value1")]).unwrap(),
        "(integer) 1"
    );
    assert_eq!(
        client
            .hset("hmap1", &[("hash2", "value2"), ("hash1", "value3")])
            .unwrap(),
        "(integer) 2"
    );
    assert_eq!(client.hget("hmap1", "hash1").unwrap(), "value3");
    assert_eq!(client.hget("hmap1", "hash2").unwrap(), "value2");

    for i in 0..10 {
        client.lpush("list1", &[&(9 - i).to_string()]).unwrap();
    }
    // Multi-line payloads cross the wire intact.
    assert_eq!(client.lpop_count("list1", 2).unwrap(), "1)0\n2)1\n");
    assert_eq!(
        client.lpop_span("list1", 0, -2).unwrap(),
        "1)2\n2)3\n3)4\n4)5\n5)6\n6)7\n7)8\n"
    );
    assert_eq!(
        client.lpop_count("list1", -1).unwrap(),
        "count must be positive"
    );
    assert_eq!(client.lpop_count("list1", 2).unwrap(), "1)9\n");
}

#[test]
fn errors_keep_the_connection_usable() {
    let server = TestServer::spawn(Arc::new(Cache::new()));
    let mut client = server.client();

    assert_eq!(
        client.request("NOSUCH", &["x"]).unwrap(),
        "method does not exist"
    );
    assert_eq!(
        client.request("default", &[]).unwrap(),
        "method does not exist"
    );
    assert_eq!(client.get("missing").unwrap(), "(nil)");
    assert_eq!(
        client.request("SET", &["lonely"]).unwrap(),
        "Expected format: SET key value [EX seconds]"
    );
    // An all-space request gets a bare terminator back.
    assert_eq!(client.request("", &[]).unwrap(), "");
    // And the connection still serves real commands afterwards.
    assert_eq!(client.set("key", "value").unwrap(), "OK");
    assert_eq!(client.get("key").unwrap(), "value");
}

#[test]
fn custom_handlers_serve_registered_methods() {
    let mut server = LineServer::new();
    server.set_handler(
        "ECHO",
        Box::new(|req| {
            let mut line = req.method.clone();
            for arg in &req.args {
                line.push(' ');
                line.push_str(arg);
            }
            Ok(line)
        }),
    );
    let server = TestServer::spawn_with(server);
    let mut client = server.client();

    assert_eq!(
        client.request("ECHO", &["/field", "value"]).unwrap(),
        "ECHO /field value"
    );
    assert_eq!(
        client.request("OTHER", &[]).unwrap(),
        "method does not exist"
    );
}

#[test]
fn expired_keys_vanish_between_requests() {
    let cache = Arc::new(Cache::new());
    let cleaner = cache.start_cleaner(Duration::from_millis(50));
    let server = TestServer::spawn(Arc::clone(&cache));
    let mut client = server.client();

    assert_eq!(client.set_ex("key", "v", 1).unwrap(), "OK");
    assert_eq!(client.get("key").unwrap(), "v");

    thread::sleep(Duration::from_millis(1300));
    assert_eq!(client.get("key").unwrap(), "(nil)");

    drop(server);
    cleaner.stop();
}

#[test]
fn snapshots_survive_a_server_restart() {
    let dir = tempfile::tempdir().unwrap();

    {
        let server = TestServer::spawn(Arc::new(Cache::with_save_root(dir.path())));
        let mut client = server.client();
        client.set("k", "v").unwrap();
        client.hset("h", &[("f1", "v1"), ("f2", "v2")]).unwrap();
        client.rpush("l", &["1", "2", "3"]).unwrap();
        assert_eq!(client.expire("k", 2000).unwrap(), "(integer) 1");
        assert_eq!(client.save("save1").unwrap(), "OK");
    }

    let server = TestServer::spawn(Arc::new(Cache::with_save_root(dir.path())));
    let mut client = server.client();
    assert_eq!(client.load("save1").unwrap(), "OK");
    assert_eq!(client.get("k").unwrap(), "v");
    assert_eq!(client.hget("h", "f1").unwrap(), "v1");
    assert_eq!(client.lpop_span("l", 0, -1).unwrap(), "1)1\n2)2\n3)3\n");
}
