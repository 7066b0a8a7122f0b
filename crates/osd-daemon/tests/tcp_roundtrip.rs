use std::net::SocketAddr;
use std::time::Duration;

use osd_daemon::{DispatchStats, OsdConfig, OsdServer, StoreBackend};
use osd_messenger::OsdClient;
use osd_protocol::{result, OsdCodec};
use osd_types::{ObjectId, Payload, PeerAddr, PeerId};
use tokio::task::JoinHandle;

async fn start(config: OsdConfig) -> (SocketAddr, JoinHandle<osd_daemon::OsdResult<DispatchStats>>) {
    let server = OsdServer::bind(&config).await.unwrap();
    let addr = server.local_addr();
    (addr, tokio::spawn(server.serve()))
}

fn memory_config(whoami: u32) -> OsdConfig {
    OsdConfig {
        whoami,
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        store: StoreBackend::Memory,
        ..OsdConfig::default()
    }
}

async fn client(addr: SocketAddr) -> OsdClient {
    OsdClient::connect(addr, PeerAddr::new(PeerId(1000), 1))
        .await
        .unwrap()
}

#[tokio::test]
async fn write_read_stat_delete_over_tcp() {
    let (addr, server) = start(memory_config(0)).await;
    let mut c = client(addr).await;
    let oid = ObjectId::from_name("greeting");

    assert!(c.ping().await.unwrap());

    let w = c
        .write(oid, 0, Payload::new(b"hello world".to_vec()))
        .await
        .unwrap();
    assert_eq!(w.result, 11);

    let r = c.read(oid, 5, 6).await.unwrap();
    assert_eq!(r.result, 5);
    assert_eq!(r.payload.as_slice(), b"world");

    let r = c.read(oid, 100, 6).await.unwrap();
    assert_eq!(r.length, 5);

    let s = c.stat(oid).await.unwrap();
    assert!(s.is_success());
    assert_eq!(s.size, 11);

    assert!(c.delete(oid).await.unwrap().is_success());
    assert_eq!(c.stat(oid).await.unwrap().result, result::ENOENT);
    assert_eq!(c.read(oid, 1, 0).await.unwrap().result, result::ENOENT);

    c.shutdown_daemon().await.unwrap();
    let stats = server.await.unwrap().unwrap();
    assert_eq!(stats.received, 9);
    assert_eq!(stats.replied, 8);
}

#[tokio::test]
async fn unknown_op_is_reported_and_daemon_survives() {
    let (addr, server) = start(memory_config(0)).await;
    let mut c = client(addr).await;

    let reply = c.op(ObjectId::from_name("x"), 999).await.unwrap();
    assert_eq!(reply.result, result::EOPNOTSUPP);
    assert_eq!(reply.op, 999);
    assert!(c.ping().await.unwrap());

    c.shutdown_daemon().await.unwrap();
    let stats = server.await.unwrap().unwrap();
    assert_eq!(stats.failed, 1);
}

#[tokio::test]
async fn play_dead_daemon_does_not_answer_pings() {
    let config = OsdConfig {
        play_dead: vec![3],
        ..memory_config(3)
    };
    let (addr, server) = start(config).await;
    let mut c = client(addr).await.with_timeout(Duration::from_millis(200));

    assert!(!c.ping().await.unwrap());

    // Other requests are still served.
    let oid = ObjectId::from_name("alive");
    let w = c.write(oid, 0, Payload::new(vec![7; 4])).await.unwrap();
    assert_eq!(w.result, 4);

    c.shutdown_daemon().await.unwrap();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn file_store_persists_across_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let config = OsdConfig {
        data_dir: dir.path().to_path_buf(),
        store: StoreBackend::File,
        ..memory_config(1)
    };
    let oid = ObjectId::from_name("durable");

    let (addr, server) = start(config.clone()).await;
    let mut c = client(addr).await;
    c.write(oid, 2, Payload::new(b"abc".to_vec())).await.unwrap();
    c.shutdown_daemon().await.unwrap();
    server.await.unwrap().unwrap();

    let (addr, server) = start(config).await;
    let mut c = client(addr).await;
    let r = c.read(oid, 10, 0).await.unwrap();
    assert_eq!(r.payload.as_slice(), b"\0\0abc");
    c.shutdown_daemon().await.unwrap();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn replies_reach_the_right_client() {
    let (addr, server) = start(memory_config(0)).await;
    let mut a = OsdClient::connect(addr, PeerAddr::new(PeerId(1), 0))
        .await
        .unwrap();
    let mut b = OsdClient::connect(addr, PeerAddr::new(PeerId(2), 0))
        .await
        .unwrap();

    let oid_a = ObjectId::from_name("a");
    let oid_b = ObjectId::from_name("b");
    a.write(oid_a, 0, Payload::new(vec![1; 3])).await.unwrap();
    b.write(oid_b, 0, Payload::new(vec![2; 5])).await.unwrap();

    assert_eq!(a.stat(oid_a).await.unwrap().size, 3);
    assert_eq!(b.stat(oid_b).await.unwrap().size, 5);

    a.shutdown_daemon().await.unwrap();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn large_read_is_shortened_to_fit_one_frame() {
    let config = OsdConfig {
        max_message_size: 200,
        ..memory_config(0)
    };
    let (addr, server) = start(config).await;
    let mut c = client(addr).await;
    let oid = ObjectId::from_name("chunked");

    for i in 0..3u64 {
        let w = c.write(oid, i * 60, Payload::new(vec![i as u8; 60])).await.unwrap();
        assert_eq!(w.result, 60);
    }
    assert_eq!(c.stat(oid).await.unwrap().size, 180);

    let budget = OsdCodec::new(200).max_read_payload();
    let r = c.read(oid, 180, 0).await.unwrap();
    assert_eq!(r.length, budget);
    assert_eq!(r.result, budget as i64);
    assert_eq!(r.payload.as_slice(), &striped_bytes(budget)[..]);

    // The rest of the object is still reachable, and the connection is intact.
    let rest = c.read(oid, 180 - budget, budget).await.unwrap();
    assert_eq!(rest.length, 180 - budget);
    assert!(c.ping().await.unwrap());

    c.shutdown_daemon().await.unwrap();
    let stats = server.await.unwrap().unwrap();
    assert_eq!(stats.send_errors, 0);
}

fn striped_bytes(len: u64) -> Vec<u8> {
    (0..len).map(|i| (i / 60) as u8).collect()
}
