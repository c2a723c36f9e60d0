//! Full pull path over real TCP: handshake, encrypted index and chunk
//! transfer, reassembly and digest verification.

mod common;

use common::MemoryEntryStore;
use pl_core::config::EngineConfig;
use pl_core::content::relative_path;
use pl_core::error::ErrorCode;
use pl_core::hash::{digest256, fingerprint};
use pl_core::ids::{PasteId, PeerId};
use pl_core::net::HostInfo;
use pl_core::paste::{PasteEntry, PasteFileRef};
use pl_core::ports::{FileCategory, PathProviderPort, PullClientPort};
use pl_core::session::IdentityKeys;
use pl_core::task::{PasteTask, TaskOutcome, TaskType};
use pl_engine::{
    DiscoveredPeer, PullFileExecutor, PullIconExecutor, PullService, SyncCoordinator, TaskExecutor,
};
use pl_infra::{write_atomic, ChunkCache, UserDataPathProvider};
use pl_network::{HostResolver, PullClient, PullServer, SessionManager};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

const CHUNK_SIZE: u32 = 1024;

struct Peers {
    server_peer: PeerId,
    server_paths: Arc<UserDataPathProvider>,
    client: Arc<PullClient>,
    port: u16,
}

/// Bring up a serving peer with one paste entry over an ephemeral port.
async fn start_server(dir: &std::path::Path, entry: PasteEntry) -> Peers {
    let server_peer = entry.peer_id.clone();
    let entries = Arc::new(MemoryEntryStore::default());
    entries.insert(entry);

    let server_paths = Arc::new(UserDataPathProvider::new(dir.join("server-data")));
    let service = Arc::new(PullService::new(
        server_peer.clone(),
        entries,
        server_paths.clone(),
        CHUNK_SIZE,
    ));
    let sessions = Arc::new(SessionManager::new(
        server_peer.clone(),
        IdentityKeys::generate(),
        HashSet::new(),
    ));
    let server = Arc::new(PullServer::new(sessions, service));
    let (listener, addr) = PullServer::bind(0).await.unwrap();
    tokio::spawn(server.serve(listener));

    let client_sessions = Arc::new(SessionManager::new(
        PeerId::from("client"),
        IdentityKeys::generate(),
        HashSet::new(),
    ));
    let client = Arc::new(PullClient::new(client_sessions, Duration::from_secs(5)));

    Peers {
        server_peer,
        server_paths,
        client,
        port: addr.port(),
    }
}

fn entry_with_file(peer: &PeerId, paste_id: i64, path: &std::path::Path, data: &[u8]) -> PasteEntry {
    PasteEntry {
        peer_id: peer.clone(),
        paste_id: PasteId(paste_id),
        created_at_ms: chrono::Utc::now().timestamp_millis(),
        source: None,
        files: vec![PasteFileRef {
            file_name: path.file_name().unwrap().to_str().unwrap().to_string(),
            absolute_path: path.to_path_buf(),
            size: data.len() as u64,
            digest: Some(digest256(data)),
        }],
        deleted: false,
    }
}

async fn coordinator_toward(peers: &Peers) -> Arc<SyncCoordinator> {
    let coordinator = Arc::new(SyncCoordinator::new(
        EngineConfig::default(),
        Arc::new(HostResolver::new()),
    ));
    coordinator
        .refresh(vec![DiscoveredPeer {
            peer_id: peers.server_peer.clone(),
            hosts: vec![HostInfo {
                address: "127.0.0.1".parse().unwrap(),
                network_prefix_length: 8,
            }],
            port: peers.port,
            paired: true,
        }])
        .await;
    coordinator
}

#[tokio::test]
async fn test_pull_file_reassembles_and_verifies() {
    let dir = tempfile::tempdir().unwrap();
    let peer = PeerId::from("origin");

    // 9.5 chunks of varying bytes: ten chunks, the last one short.
    let data: Vec<u8> = (0..9728u32).map(|i| (i % 251) as u8).collect();
    let src = dir.path().join("photo.bin");
    std::fs::write(&src, &data).unwrap();

    let entry = entry_with_file(&peer, 7, &src, &data);
    let bucket = entry.date_bucket();
    let peers = start_server(dir.path(), entry).await;

    // Raw protocol: the index names ten chunks, all missing locally.
    let index = peers
        .client
        .pull_index("127.0.0.1", peers.port, &peers.server_peer, PasteId(7))
        .await
        .unwrap();
    assert_eq!(index.chunk_size, CHUNK_SIZE);
    assert_eq!(index.chunk_count(), 10);
    let missing = index.missing_chunks(&HashSet::new());
    assert_eq!(missing.len(), 10);

    // Each pulled chunk matches its fingerprint; reassembly matches the
    // whole-file digest.
    let file = index.files.values().next().unwrap();
    let mut reassembled = Vec::new();
    for chunk in &file.chunks {
        let bytes = peers
            .client
            .pull_chunk("127.0.0.1", peers.port, &peers.server_peer, chunk.fingerprint)
            .await
            .unwrap();
        assert_eq!(fingerprint(&bytes), chunk.fingerprint);
        reassembled.extend_from_slice(&bytes);
    }
    assert_eq!(digest256(&reassembled), file.digest);
    assert_eq!(reassembled, data);

    // Executor path: pull through the coordinator into the local tree.
    let coordinator = coordinator_toward(&peers).await;
    let client_paths = Arc::new(UserDataPathProvider::new(dir.path().join("client-data")));
    let cache = Arc::new(ChunkCache::new(dir.path().join("client-chunks")));
    let executor = PullFileExecutor::new(
        coordinator,
        peers.client.clone(),
        client_paths.clone(),
        cache,
    );

    let task = PasteTask::new(TaskType::PullFile, peers.server_peer.clone(), PasteId(7));
    assert_eq!(executor.execute(&task).await, TaskOutcome::Success);

    let relative = relative_path(&peers.server_peer, &bucket, PasteId(7), "photo.bin");
    let dest = client_paths
        .resolve(FileCategory::ReceivedFile, &relative)
        .await
        .unwrap();
    assert_eq!(std::fs::read(dest).unwrap(), data);

    // Rerunning the same task is an idempotent success.
    assert_eq!(executor.execute(&task).await, TaskOutcome::Success);
}

#[tokio::test]
async fn test_absent_resources_answer_not_found_codes() {
    let dir = tempfile::tempdir().unwrap();
    let peer = PeerId::from("origin");

    let data = vec![3u8; 64];
    let src = dir.path().join("tiny.bin");
    std::fs::write(&src, &data).unwrap();
    let peers = start_server(dir.path(), entry_with_file(&peer, 1, &src, &data)).await;

    let err = peers
        .client
        .pull_icon("127.0.0.1", peers.port, &peers.server_peer, "example.com")
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::IconNotFound);

    let err = peers
        .client
        .pull_index("127.0.0.1", peers.port, &peers.server_peer, PasteId(999))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::EntryNotFound);

    let err = peers
        .client
        .pull_chunk(
            "127.0.0.1",
            peers.port,
            &peers.server_peer,
            fingerprint(b"never indexed"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ChunkNotFound);
}

#[tokio::test]
async fn test_pull_icon_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let peer = PeerId::from("origin");

    let data = vec![9u8; 64];
    let src = dir.path().join("ignored.bin");
    std::fs::write(&src, &data).unwrap();
    let peers = start_server(dir.path(), entry_with_file(&peer, 2, &src, &data)).await;

    // Place the icon on the serving side.
    let icon_bytes = b"\x89PNG fake icon".to_vec();
    let icon_path = peers
        .server_paths
        .resolve(FileCategory::Icon, "example.com.png")
        .await
        .unwrap();
    write_atomic(&icon_path, &icon_bytes).await.unwrap();

    let coordinator = coordinator_toward(&peers).await;
    let client_paths = Arc::new(UserDataPathProvider::new(dir.path().join("client-data")));
    let executor = PullIconExecutor::new(coordinator, peers.client.clone(), client_paths.clone());

    let task = PasteTask::new(TaskType::PullIcon, peers.server_peer.clone(), PasteId(2))
        .with_source("example.com");
    assert_eq!(executor.execute(&task).await, TaskOutcome::Success);

    let local = client_paths
        .resolve(FileCategory::Icon, "example.com.png")
        .await
        .unwrap();
    assert_eq!(std::fs::read(local).unwrap(), icon_bytes);
}

#[tokio::test]
async fn test_unknown_peer_yields_cant_get_sync_address() {
    let dir = tempfile::tempdir().unwrap();
    let coordinator = Arc::new(SyncCoordinator::new(
        EngineConfig::default(),
        Arc::new(HostResolver::new()),
    ));
    let client_sessions = Arc::new(SessionManager::new(
        PeerId::from("client"),
        IdentityKeys::generate(),
        HashSet::new(),
    ));
    let client = Arc::new(PullClient::new(client_sessions, Duration::from_secs(1)));
    let client_paths = Arc::new(UserDataPathProvider::new(dir.path()));
    let executor = PullIconExecutor::new(coordinator, client, client_paths);

    let task = PasteTask::new(TaskType::PullIcon, PeerId::from("nowhere"), PasteId(1))
        .with_source("example.com");
    let outcome = executor.execute(&task).await;
    assert_eq!(
        outcome,
        TaskOutcome::fail(
            ErrorCode::CantGetSyncAddress,
            "no connect address for nowhere"
        )
    );
}
