use bytes::Bytes;
use quorumfs::consensus::ConsensusError;
use quorumfs::network::wire::ResponseStatus;
use quorumfs_tests::TestCluster;
use std::collections::BTreeMap;
use std::time::Duration;

#[tokio::test]
async fn upload_is_replicated_to_every_node() {
    let cluster = TestCluster::start(3).await;
    let client = cluster.client();

    let response = client
        .upload_file(cluster.node(0), "notes.txt", Bytes::from_static(b"replicated bytes"))
        .await
        .unwrap();
    assert_eq!(response.message, "UPLOAD SUCCESS!");
    assert_eq!(response.file_id, Some(0));

    let expected = BTreeMap::from([(0, "notes.txt".to_string())]);
    for node in cluster.live() {
        assert_eq!(client.list_files(*node).await.unwrap(), expected, "listing on {}", node);
    }

    let downloaded = client.download_file(cluster.node(2), 0).await.unwrap();
    assert_eq!(downloaded.message, "DOWNLOAD SUCCESS!notes.txt");
    assert_eq!(downloaded.data, Some(Bytes::from_static(b"replicated bytes")));
}

#[tokio::test]
async fn quorum_counts_only_reachable_nodes() {
    let cluster = TestCluster::start_with_down(3, 2).await;
    let client = cluster.client();

    let response = client
        .upload_file(cluster.node(1), "survivor.bin", Bytes::from_static(&[1, 2, 3]))
        .await
        .unwrap();
    assert!(response.is_success(), "{}", response.message);

    for node in cluster.live() {
        let files = client.list_files(*node).await.unwrap();
        assert_eq!(files.get(&0).map(String::as_str), Some("survivor.bin"));
    }
}

#[tokio::test]
async fn stale_majority_blocks_the_mutation() {
    let cluster = TestCluster::start(3).await;
    let client = cluster.client();
    let far_future = u64::MAX / 2;

    for index in [1, 2] {
        let promised = client.prepare_round(cluster.node(index), far_future).await.unwrap();
        assert_eq!(promised, far_future);
    }

    let rejected = client
        .upload_file(cluster.node(0), "lost.txt", Bytes::from_static(b"x"))
        .await
        .unwrap();
    assert_eq!(rejected.status, ResponseStatus::Failure);
    assert_eq!(rejected.message, "UPLOAD FAILED!");
    for node in cluster.live() {
        assert!(client.list_files(*node).await.unwrap().is_empty());
    }

    // A proposer already at the high round carries everyone with it.
    let accepted = client
        .upload_file(cluster.node(1), "kept.txt", Bytes::from_static(b"y"))
        .await
        .unwrap();
    assert!(accepted.is_success(), "{}", accepted.message);
    for node in cluster.live() {
        assert_eq!(client.list_files(*node).await.unwrap().len(), 1);
    }
}

#[tokio::test]
async fn prepare_rejects_lower_rounds_over_http() {
    let cluster = TestCluster::start(1).await;
    let client = cluster.client();

    let current = client.prepare_round(cluster.node(0), u64::MAX / 4).await.unwrap();
    let err = client.prepare_round(cluster.node(0), 1).await.unwrap_err();

    match err {
        ConsensusError::StaleProposal { proposed, current: seen } => {
            assert_eq!(proposed, 1);
            assert_eq!(seen, current);
        }
        other => panic!("expected a stale proposal, got {:?}", other),
    }
}

#[tokio::test]
async fn delete_is_refused_while_rename_holds_the_file() {
    let cluster = TestCluster::start(3).await;
    let client = cluster.client().clone();
    let proposer = cluster.node(0);

    client
        .upload_file(proposer, "draft.md", Bytes::from_static(b"# draft"))
        .await
        .unwrap();

    let renamer = {
        let client = client.clone();
        tokio::spawn(async move { client.rename_file(proposer, 0, "final.md", 1_000).await })
    };
    tokio::time::sleep(Duration::from_millis(300)).await;

    let refused = client.delete_file(proposer, 0).await.unwrap();
    assert_eq!(refused.message, "File locked, cannot delete. Try again later.");

    let overlapping = client.rename_file(proposer, 0, "other.md", 0).await.unwrap();
    assert_eq!(overlapping.message, "File locked for renaming. Try again later.");

    let renamed = renamer.await.unwrap().unwrap();
    assert_eq!(renamed.message, "Rename successful.");

    let expected = BTreeMap::from([(0, "final.md".to_string())]);
    for node in cluster.live() {
        assert_eq!(client.list_files(*node).await.unwrap(), expected, "listing on {}", node);
    }

    let deleted = client.delete_file(proposer, 0).await.unwrap();
    assert_eq!(deleted.message, "DELETE SUCCESS!");
    for node in cluster.live() {
        assert!(client.list_files(*node).await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn unknown_ids_are_reported_without_a_round() {
    let cluster = TestCluster::start(2).await;
    let client = cluster.client();

    let delete = client.delete_file(cluster.node(0), 42).await.unwrap();
    assert_eq!(delete.message, "DELETE FAILED! Invalid File Id Provided");

    let download = client.download_file(cluster.node(1), 42).await.unwrap();
    assert_eq!(download.message, "DOWNLOAD FAILED!. File Does Not exist on the server");
    assert!(download.data.is_none());
}

#[tokio::test]
async fn listing_twice_without_mutations_is_identical() {
    let cluster = TestCluster::start(3).await;
    let client = cluster.client();

    for name in ["a", "b", "c"] {
        client
            .upload_file(cluster.node(2), name, Bytes::from(name.as_bytes().to_vec()))
            .await
            .unwrap();
    }

    let first = client.list_files(cluster.node(0)).await.unwrap();
    let second = client.list_files(cluster.node(0)).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
}

fn patterned(len: usize) -> Bytes {
    Bytes::from((0..len).map(|i| (i % 251) as u8).collect::<Vec<u8>>())
}

#[tokio::test]
async fn largest_allowed_upload_reaches_every_node() {
    let limit = 64 * 1024;
    let cluster = TestCluster::builder(2).max_upload_bytes(limit).start().await;
    let client = cluster.client();
    let contents = patterned(limit);

    let response = client
        .upload_file(cluster.node(0), "big.bin", contents.clone())
        .await
        .unwrap();
    assert_eq!(response.message, "UPLOAD SUCCESS!");

    for node in cluster.live() {
        let downloaded = client.download_file(*node, 0).await.unwrap();
        assert_eq!(downloaded.message, "DOWNLOAD SUCCESS!big.bin", "download on {}", node);
        assert_eq!(downloaded.data, Some(contents.clone()), "contents on {}", node);
    }
}

#[tokio::test]
async fn upload_over_the_limit_is_refused_everywhere() {
    let limit = 16 * 1024;
    let cluster = TestCluster::builder(2).max_upload_bytes(limit).start().await;
    let client = cluster.client();

    let result = client
        .upload_file(cluster.node(0), "too-big.bin", patterned(limit + 1))
        .await;
    assert!(result.is_err());

    for node in cluster.live() {
        assert!(client.list_files(*node).await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn rename_hold_longer_than_half_the_timeout_still_completes() {
    let cluster = TestCluster::builder(2)
        .rpc_timeout(Duration::from_millis(800))
        .start()
        .await;
    let client = cluster.client();

    client
        .upload_file(cluster.node(0), "slow.txt", Bytes::from_static(b"z"))
        .await
        .unwrap();

    let renamed = client
        .rename_file(cluster.node(0), 0, "slower.txt", 600)
        .await
        .unwrap();
    assert_eq!(renamed.message, "Rename successful.");

    let expected = BTreeMap::from([(0, "slower.txt".to_string())]);
    for node in cluster.live() {
        assert_eq!(client.list_files(*node).await.unwrap(), expected, "listing on {}", node);
    }
}
