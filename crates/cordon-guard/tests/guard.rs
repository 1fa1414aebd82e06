//! Integration tests for the state guard: state machine outcomes,
//! compare-and-swap exclusivity, staleness propagation and recovery.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::watch;

use cordon_guard::probes::{self, Readiness};
use cordon_guard::{Guard, GuardError, SecretSourceAuthorizer, State};
use cordon_history::{History, MemStore};
use cordon_manifest::Manifest;
use cordon_seed::SeedEngine;
use p256::ecdsa::SigningKey;

const SEED: [u8; 32] = [11u8; 32];
const SALT: [u8; 32] = [22u8; 32];

fn test_engine() -> Arc<SeedEngine> {
    Arc::new(SeedEngine::new(&SEED, &SALT).unwrap())
}

fn shared_history() -> History {
    History::new(Arc::new(MemStore::new()))
}

/// Builds manifest bytes referencing exactly the given policies.
fn manifest_for(policies: &[&[u8]]) -> (Vec<u8>, Vec<Vec<u8>>) {
    let mut policy_map = serde_json::Map::new();
    for policy in policies {
        let hash = hex::encode(Sha256::digest(policy));
        policy_map.insert(hash, serde_json::json!({}));
    }
    let manifest = serde_json::json!({ "policies": policy_map });
    (
        serde_json::to_vec(&manifest).unwrap(),
        policies.iter().map(|p| p.to_vec()).collect(),
    )
}

/// Authorizer producing a seed engine from fixed secrets, unconditionally.
struct StaticSeedAuthorizer {
    seed: Vec<u8>,
    salt: Vec<u8>,
}

impl StaticSeedAuthorizer {
    fn good() -> Self {
        Self {
            seed: SEED.to_vec(),
            salt: SALT.to_vec(),
        }
    }
}

#[async_trait]
impl SecretSourceAuthorizer for StaticSeedAuthorizer {
    async fn authorize_by_manifest(
        &self,
        _manifest: &Manifest,
    ) -> anyhow::Result<(Arc<SeedEngine>, SigningKey)> {
        let engine = Arc::new(SeedEngine::new(&self.seed, &self.salt)?);
        let mesh_ca_key = engine.generate_mesh_ca_key();
        Ok((engine, mesh_ca_key))
    }
}

#[tokio::test]
async fn empty_store_reports_no_state() {
    let guard = Guard::new(shared_history());
    assert!(matches!(guard.get_state().await, Err(GuardError::NoState)));
    assert_eq!(
        probes::readiness(&guard).await.unwrap(),
        Readiness::NotInitialized
    );
    assert!(probes::liveness(guard.history()).await);
}

#[tokio::test]
async fn first_update_initializes_generation_one() {
    let guard = Guard::new(shared_history());
    let (manifest_bytes, policies) = manifest_for(&[b"policy-1"]);

    let state = guard
        .update_state(None, test_engine(), &manifest_bytes, &policies)
        .await
        .unwrap();

    assert_eq!(state.generation(), 1);
    assert_eq!(state.manifest_bytes(), &manifest_bytes[..]);
    assert_eq!(guard.metrics().manifest_generation.get(), 1);

    let current = guard.get_state().await.unwrap();
    assert!(Arc::ptr_eq(&current, &state));
    assert_eq!(probes::readiness(&guard).await.unwrap(), Readiness::Ready);
}

#[tokio::test]
async fn dangling_policy_reference_is_rejected() {
    let guard = Guard::new(shared_history());
    let (manifest_bytes, _) = manifest_for(&[b"policy-1", b"policy-2"]);
    // Supply only one of the two referenced policies.
    let err = guard
        .update_state(None, test_engine(), &manifest_bytes, &[b"policy-1".to_vec()])
        .await
        .unwrap_err();
    assert!(matches!(err, GuardError::DanglingPolicy(_)));
    // Nothing was committed.
    assert!(matches!(guard.get_state().await, Err(GuardError::NoState)));
}

#[tokio::test]
async fn sequential_updates_chain_and_raise_generation() {
    let guard = Guard::new(shared_history());
    let engine = test_engine();

    let (m1, p1) = manifest_for(&[b"policy-1"]);
    let s1 = guard
        .update_state(None, engine.clone(), &m1, &p1)
        .await
        .unwrap();
    let (m2, p2) = manifest_for(&[b"policy-2"]);
    let s2 = guard
        .update_state(Some(&s1), engine.clone(), &m2, &p2)
        .await
        .unwrap();

    assert_eq!(s2.generation(), 2);
    assert_eq!(
        s2.latest().transition_hash,
        guard
            .history()
            .get_latest_insecure()
            .await
            .unwrap()
            .transition_hash
    );

    // The chain records both manifests, oldest first.
    let (manifests, policies) = guard.get_history().await.unwrap();
    assert_eq!(manifests, vec![m1, m2]);
    assert_eq!(policies.len(), 2);
}

#[tokio::test]
async fn update_from_superseded_state_is_a_concurrent_update() {
    let guard = Guard::new(shared_history());
    let engine = test_engine();

    let (m1, p1) = manifest_for(&[b"policy-1"]);
    let s1 = guard
        .update_state(None, engine.clone(), &m1, &p1)
        .await
        .unwrap();
    let (m2, p2) = manifest_for(&[b"policy-2"]);
    guard
        .update_state(Some(&s1), engine.clone(), &m2, &p2)
        .await
        .unwrap();

    // s1 is superseded; updating from it must lose at the store CAS.
    let (m3, p3) = manifest_for(&[b"policy-3"]);
    let err = guard
        .update_state(Some(&s1), engine, &m3, &p3)
        .await
        .unwrap_err();
    assert!(matches!(err, GuardError::ConcurrentUpdate));
}

#[tokio::test]
async fn concurrent_updates_have_exactly_one_winner() {
    let guard = Arc::new(Guard::new(shared_history()));
    let engine = test_engine();

    let (m1, p1) = manifest_for(&[b"policy-1"]);
    let s1 = guard
        .update_state(None, engine.clone(), &m1, &p1)
        .await
        .unwrap();

    let mut tasks = Vec::new();
    for i in 0..8u8 {
        let guard = Arc::clone(&guard);
        let engine = engine.clone();
        let s1 = Arc::clone(&s1);
        let (manifest_bytes, policies) = manifest_for(&[format!("policy-{i}").as_bytes()]);
        tasks.push(tokio::spawn(async move {
            guard
                .update_state(Some(&s1), engine, &manifest_bytes, &policies)
                .await
                .map(|state| state.manifest_bytes().to_vec())
        }));
    }

    let mut winners = Vec::new();
    for task in tasks {
        match task.await.unwrap() {
            Ok(manifest_bytes) => winners.push(manifest_bytes),
            Err(GuardError::ConcurrentUpdate) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    // Exactly one of the racing updates committed, and the cached state is
    // that winner, never a mix.
    assert_eq!(winners.len(), 1);
    let current = guard.get_state().await.unwrap();
    assert_eq!(current.manifest_bytes(), &winners[0][..]);
    assert_eq!(current.generation(), 2);
}

#[tokio::test]
async fn swap_losing_update_still_returns_its_committed_state() {
    let guard = Guard::new(shared_history());
    let engine = test_engine();

    let (m1, p1) = manifest_for(&[b"policy-1"]);
    let s1 = guard
        .update_state(None, engine.clone(), &m1, &p1)
        .await
        .unwrap();

    // Reinstall a fresh snapshot of the same latest pointer: the cell no
    // longer holds s1, but the persisted pointer still matches it.
    let reinstalled = guard
        .reset_state(Some(&s1), &StaticSeedAuthorizer::good())
        .await
        .unwrap();
    assert!(!Arc::ptr_eq(&reinstalled, &s1));
    assert_eq!(reinstalled.generation(), 1);

    // The store CAS succeeds, so the transition is durably committed, but
    // the in-memory swap loses against the reinstalled snapshot. The caller
    // still gets the computed state and may answer from it.
    let (m2, p2) = manifest_for(&[b"policy-2"]);
    let s2 = guard.update_state(Some(&s1), engine, &m2, &p2).await.unwrap();
    assert_eq!(s2.generation(), 2);
    assert_eq!(s2.manifest_bytes(), &m2[..]);

    // Cached pointer and gauge are left to the holder of the cell.
    let current = guard.get_state().await.unwrap();
    assert!(Arc::ptr_eq(&current, &reinstalled));
    assert_eq!(guard.metrics().manifest_generation.get(), 1);
}

#[tokio::test]
async fn second_instance_sees_foreign_history_as_stale() {
    let store = Arc::new(MemStore::new());
    let g1 = Guard::new(History::new(store.clone()));
    let g2 = Guard::new(History::new(store));

    let (m1, p1) = manifest_for(&[b"policy-1"]);
    g1.update_state(None, test_engine(), &m1, &p1)
        .await
        .unwrap();

    // g2 has no cached state but the store has history: stale, not
    // uninitialized.
    match g2.get_state().await {
        Err(GuardError::StaleState(None)) => {}
        other => panic!("expected stale without snapshot, got {other:?}"),
    }
    assert_eq!(probes::readiness(&g2).await.unwrap(), Readiness::Recovering);

    // Recovery installs a verified snapshot of the same generation.
    let recovered = g2
        .reset_state(None, &StaticSeedAuthorizer::good())
        .await
        .unwrap();
    assert_eq!(recovered.generation(), 1);
    assert_eq!(recovered.manifest_bytes(), &m1[..]);
    assert!(g2.get_state().await.is_ok());
}

#[tokio::test]
async fn reset_rejects_wrong_seed() {
    let store = Arc::new(MemStore::new());
    let g1 = Guard::new(History::new(store.clone()));
    let g2 = Guard::new(History::new(store));

    let (m1, p1) = manifest_for(&[b"policy-1"]);
    g1.update_state(None, test_engine(), &m1, &p1)
        .await
        .unwrap();

    // A seed that doesn't match the one that signed the history derives the
    // wrong verifying key; the secure re-read must fail.
    let wrong = StaticSeedAuthorizer {
        seed: vec![0x5a; 32],
        salt: SALT.to_vec(),
    };
    let err = g2.reset_state(None, &wrong).await.unwrap_err();
    assert!(matches!(
        err,
        GuardError::History(cordon_history::HistoryError::InvalidSignature)
    ));
    // g2 remains without a state.
    assert!(matches!(
        g2.get_state().await,
        Err(GuardError::StaleState(None))
    ));
}

/// Authorizer that moves the history forward while it is being consulted,
/// reproducing a race between the insecure and the verified latest read.
struct RacingAuthorizer {
    other: Arc<Guard>,
    engine: Arc<SeedEngine>,
}

#[async_trait]
impl SecretSourceAuthorizer for RacingAuthorizer {
    async fn authorize_by_manifest(
        &self,
        _manifest: &Manifest,
    ) -> anyhow::Result<(Arc<SeedEngine>, SigningKey)> {
        let old = self.other.get_state().await?;
        let (manifest_bytes, policies) = manifest_for(&[b"raced-policy"]);
        self.other
            .update_state(Some(&old), self.engine.clone(), &manifest_bytes, &policies)
            .await?;
        Ok((self.engine.clone(), self.engine.generate_mesh_ca_key()))
    }
}

#[tokio::test]
async fn reset_detects_history_movement_during_authorization() {
    let store = Arc::new(MemStore::new());
    let g1 = Arc::new(Guard::new(History::new(store.clone())));
    let g2 = Guard::new(History::new(store));
    let engine = test_engine();

    let (m1, p1) = manifest_for(&[b"policy-1"]);
    g1.update_state(None, engine.clone(), &m1, &p1)
        .await
        .unwrap();

    let racing = RacingAuthorizer {
        other: Arc::clone(&g1),
        engine,
    };
    let err = g2.reset_state(None, &racing).await.unwrap_err();
    assert!(matches!(err, GuardError::ConcurrentUpdate));
}

#[tokio::test]
async fn watcher_marks_foreign_update_stale() {
    let store = Arc::new(MemStore::new());
    let g1 = Guard::new(History::new(store.clone()));
    let g2 = Arc::new(Guard::new(History::new(store)));
    let engine = test_engine();

    let (m1, p1) = manifest_for(&[b"policy-1"]);
    let s1 = g1
        .update_state(None, engine.clone(), &m1, &p1)
        .await
        .unwrap();
    let r2 = g2
        .reset_state(None, &StaticSeedAuthorizer::good())
        .await
        .unwrap();
    assert_eq!(r2.generation(), 1);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let watcher = {
        let g2 = Arc::clone(&g2);
        tokio::spawn(async move { g2.watch_history(shutdown_rx).await })
    };
    // Give the watcher a moment to subscribe before g1 moves the history.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (m2, p2) = manifest_for(&[b"policy-2"]);
    g1.update_state(Some(&s1), engine, &m2, &p2).await.unwrap();

    // g2's snapshot must become stale.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        match g2.get_state().await {
            Err(GuardError::StaleState(Some(state))) => {
                assert_eq!(state.generation(), 1);
                break;
            }
            _ if tokio::time::Instant::now() > deadline => {
                panic!("state never became stale")
            }
            _ => tokio::time::sleep(Duration::from_millis(10)).await,
        }
    }

    shutdown_tx.send(true).unwrap();
    watcher.await.unwrap();
}

#[tokio::test]
async fn rapid_self_updates_do_not_go_stale() {
    let guard = Arc::new(Guard::new(shared_history()));
    let engine = test_engine();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let watcher = {
        let guard = Arc::clone(&guard);
        tokio::spawn(async move { guard.watch_history(shutdown_rx).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Two updates in quick succession; their watch notifications arrive
    // while the final state is already installed.
    let (m1, p1) = manifest_for(&[b"policy-1"]);
    let s1 = guard
        .update_state(None, engine.clone(), &m1, &p1)
        .await
        .unwrap();
    let (m2, p2) = manifest_for(&[b"policy-2"]);
    let s2 = guard
        .update_state(Some(&s1), engine, &m2, &p2)
        .await
        .unwrap();

    // Let the delayed notification echoes drain.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let current = guard.get_state().await.unwrap();
    assert!(Arc::ptr_eq(&current, &s2));
    assert!(!current.is_stale());

    shutdown_tx.send(true).unwrap();
    watcher.await.unwrap();
}

#[tokio::test]
async fn state_debug_output_hides_secrets() {
    let engine = test_engine();
    let ca = cordon_guard::CertAuthority::new(
        engine.root_ca_key().clone(),
        engine.generate_mesh_ca_key(),
    );
    let state = State::for_test(engine, Manifest::default(), b"{}".to_vec(), ca);
    let debug = format!("{state:?}");
    assert!(debug.contains("generation"));
    assert!(!debug.contains(&hex::encode(SEED)));
}
