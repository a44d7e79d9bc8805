use bytes::Bytes;
use quorumfs::network::{NetworkError, SelectionPolicy};
use quorumfs::ClientSession;
use quorumfs_tests::{TestCluster, RPC_TIMEOUT};

#[tokio::test]
async fn round_robin_cycles_live_nodes_in_candidate_order() {
    let cluster = TestCluster::start_with_down(3, 1).await;
    let balancer = cluster.start_balancer(SelectionPolicy::RoundRobin).await;
    let client = cluster.client();

    let mut picks = Vec::new();
    for _ in 0..6 {
        picks.push(client.get_server(balancer.address).await.unwrap());
    }

    let live = cluster.live();
    assert_eq!(picks, [live, live].concat());
    assert!(!picks.contains(&cluster.down()[0]));
}

#[tokio::test]
async fn random_policy_only_returns_live_nodes() {
    let cluster = TestCluster::start_with_down(2, 2).await;
    let balancer = cluster.start_balancer(SelectionPolicy::Random).await;

    for _ in 0..10 {
        let picked = cluster.client().get_server(balancer.address).await.unwrap();
        assert!(cluster.live().contains(&picked));
    }
}

#[tokio::test]
async fn balancer_with_no_live_nodes_is_unavailable() {
    let cluster = TestCluster::start_with_down(0, 2).await;
    let balancer = cluster.start_balancer(SelectionPolicy::RoundRobin).await;

    let err = cluster.client().get_server(balancer.address).await.unwrap_err();
    assert!(matches!(err, NetworkError::NoServersAvailable));
}

#[tokio::test]
async fn client_session_round_trip_through_balancer() {
    let cluster = TestCluster::start(3).await;
    let balancer = cluster.start_balancer(SelectionPolicy::RoundRobin).await;
    let scratch = tempfile::tempdir().unwrap();

    let source = scratch.path().join("payload.dat");
    tokio::fs::write(&source, b"session payload").await.unwrap();

    let session = ClientSession::connect(balancer.address, RPC_TIMEOUT).await.unwrap();
    assert_eq!(session.server(), cluster.node(0));

    let uploaded = session.upload(&source, None).await.unwrap();
    assert_eq!(uploaded.message, "UPLOAD SUCCESS!");

    let listing = session.list().await.unwrap();
    assert_eq!(listing, "0\tpayload.dat");

    let out_dir = scratch.path().join("downloads");
    tokio::fs::create_dir(&out_dir).await.unwrap();
    let downloaded = session.download(0, &out_dir).await.unwrap();
    assert!(downloaded.is_success());
    let bytes = tokio::fs::read(out_dir.join("payload.dat")).await.unwrap();
    assert_eq!(Bytes::from(bytes), Bytes::from_static(b"session payload"));

    let renamed = session.rename(0, "renamed.dat", 0).await.unwrap();
    assert_eq!(renamed.message, "Rename successful.");
    let deleted = session.delete(0).await.unwrap();
    assert_eq!(deleted.message, "DELETE SUCCESS!");
    assert_eq!(session.list().await.unwrap(), "No files on the server");
}
