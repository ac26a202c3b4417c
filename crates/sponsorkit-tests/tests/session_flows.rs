use std::collections::HashSet;
use std::time::Duration;

use alloy_primitives::{address, Address, Bytes, U256};
use sponsorkit_aa::{AccountFactory, RelayTaskState};
use sponsorkit_chain::Network;
use sponsorkit_common::{SponsorError, TaskStatus};
use sponsorkit_session::SessionState;
use sponsorkit_tests::{env_config, local_provider, Harness, POLL_INTERVAL};

/// Configuration -> chain selection, for every supported identifier
#[test]
fn chain_selection_from_environment() {
    let gnosis = env_config(Some("100")).unwrap().chain_config();
    assert_eq!(gnosis.chain_id, 100);
    assert_eq!(gnosis.target, address!("2dd703a17170C1b03abC26C4D5dc56c9382c5292"));
    assert_eq!(gnosis.api_key, "mainnet-key");

    let base = env_config(Some("84531")).unwrap().chain_config();
    assert_eq!(base.chain_id, 84531);
    assert_eq!(base.target, address!("FeeBbED640df887bE1aD697EC3719EB7205323E9"));
    assert_eq!(base.api_key, "testnet-key");

    for id in [None, Some("1"), Some("mumbai")] {
        let cfg = env_config(id).unwrap().chain_config();
        assert_eq!(cfg.network, Network::Mumbai);
        assert_eq!(cfg.chain_id, 80001);
        assert_eq!(cfg.target, address!("Bf17E7a45908F789707cb3d0EBb892647d798b99"));
    }
}

/// Full lifecycle: init -> login -> submit -> settle -> logout
#[tokio::test]
async fn full_session_lifecycle() {
    let config = env_config(Some("84531")).unwrap();
    let h = Harness::new(&config, local_provider());
    h.set_counter(41);
    h.init().await.unwrap();
    h.session().login().await.unwrap();

    let wallet = h.session().smart_wallet().await.unwrap();
    let owner = wallet.owner().unwrap();
    let factory = AccountFactory::new(config.wallet_factory, config.wallet_init_code_hash);
    assert_eq!(wallet.get_address().unwrap(), factory.compute_address(&owner, 0));

    let user = h.session().user_info().await.unwrap();
    assert_eq!(user.email.as_deref(), Some("e2e@example.com"));

    let first = h.app.increment().await.unwrap();
    let second = h.app.increment().await.unwrap();
    assert_ne!(first, second);

    // Every submission targets the Base Goerli relay context.
    for req in h.relay.submissions() {
        assert_eq!(req.chain_id, 84531);
        assert_eq!(req.sponsor_api_key, "testnet-key");
    }

    h.relay.set_state(&first, RelayTaskState::ExecSuccess);
    h.relay.set_state(&second, RelayTaskState::Cancelled);
    assert_eq!(h.app.refresh_tasks().await, 2);
    let statuses: Vec<TaskStatus> = h.app.tasks().iter().map(|t| t.status).collect();
    assert_eq!(statuses, vec![TaskStatus::Successful, TaskStatus::Failed]);

    assert!(h.session().logout().await);
    assert!(h.app.tasks().is_empty());
    assert!(h.session().smart_wallet().await.is_none());
    assert!(matches!(
        h.session().user_info().await,
        Err(SponsorError::NotConnected)
    ));
}

/// N submissions -> N pending tasks, unique and in submission order
#[tokio::test]
async fn submissions_tracked_in_order() {
    let h = Harness::new(&env_config(None).unwrap(), local_provider());
    h.init().await.unwrap();
    h.session().login().await.unwrap();

    let mut submitted = Vec::new();
    for _ in 0..5 {
        submitted.push(h.app.increment().await.unwrap());
    }
    let tasks = h.app.tasks();
    assert_eq!(tasks.len(), 5);
    assert_eq!(
        tasks.iter().map(|t| t.id.clone()).collect::<Vec<_>>(),
        submitted
    );
    assert_eq!(tasks.iter().map(|t| &t.id).collect::<HashSet<_>>().len(), 5);
    assert!(tasks.iter().all(|t| t.status == TaskStatus::Pending));
}

/// Sequencing violations fail fast and never reach the relay
#[tokio::test]
async fn sequencing_violations_fail_fast() {
    let h = Harness::new(&env_config(None).unwrap(), local_provider());

    assert!(matches!(
        h.session().login().await,
        Err(SponsorError::NotInitialized(_))
    ));
    assert!(matches!(
        h.app.increment().await,
        Err(SponsorError::ContractNotInitialized)
    ));

    h.init().await.unwrap();
    assert!(matches!(
        h.app.increment().await,
        Err(SponsorError::WalletNotInitialized)
    ));
    assert_eq!(
        h.app.errors().latest(),
        Some(SponsorError::WalletNotInitialized.to_string())
    );
    assert!(h.relay.submissions().is_empty());
    assert!(h.app.tasks().is_empty());
}

/// Relay rejection is reported, leaves no task, and the next call recovers
#[tokio::test]
async fn rejected_submission_then_recovery() {
    let h = Harness::new(&env_config(None).unwrap(), local_provider());
    h.init().await.unwrap();
    h.session().login().await.unwrap();

    h.relay.set_rejection(Some("sponsor balance exhausted".into()));
    assert!(matches!(
        h.app.increment().await,
        Err(SponsorError::TransactionSubmission(_))
    ));
    assert!(h.app.tasks().is_empty());
    assert!(h
        .app
        .errors()
        .latest()
        .unwrap()
        .contains("sponsor balance exhausted"));

    h.relay.set_rejection(None);
    h.app.errors().clear();
    h.app.increment().await.unwrap();
    assert_eq!(h.app.tasks().len(), 1);
    assert!(h.app.errors().latest().is_none());
}

/// Poller publishes immediately and on every interval, and goes quiet on logout
#[tokio::test(start_paused = true)]
async fn poller_follows_session_lifetime() {
    let h = Harness::new(&env_config(None).unwrap(), local_provider());
    h.set_counter(7);
    h.init().await.unwrap();
    h.session().login().await.unwrap();

    tokio::time::sleep(Duration::from_millis(10)).await;
    let status = h.app.status().await.unwrap();
    assert_eq!(status.counter, U256::from(7));
    assert!(!status.is_deployed);

    // The wallet gets deployed and the counter moves on chain.
    let wallet = h.session().smart_wallet().await.unwrap().get_address().unwrap();
    h.chain.set_code(wallet, Bytes::from(vec![0x60, 0x80]));
    h.set_counter(8);
    tokio::time::sleep(POLL_INTERVAL).await;
    let status = h.app.status().await.unwrap();
    assert_eq!(status.counter, U256::from(8));
    assert!(status.is_deployed);

    let mut updates = h.session().subscribe_status().await.unwrap();
    let _ = updates.borrow_and_update();
    h.session().logout().await;
    let requests = h.chain.request_count();

    tokio::time::sleep(POLL_INTERVAL * 5).await;
    assert_eq!(h.chain.request_count(), requests);
    assert!(!matches!(updates.has_changed(), Ok(true)));
    assert!(h.app.status().await.is_none());
}

/// Logout, then login again: a new session that shares nothing with the old one
#[tokio::test]
async fn relogin_starts_clean() {
    let h = Harness::new(&env_config(None).unwrap(), local_provider());
    h.init().await.unwrap();

    h.session().login().await.unwrap();
    let first_session = h.session().session_id().await.unwrap();
    h.app.increment().await.unwrap();
    assert!(h.session().logout().await);
    assert!(!h.session().logout().await);

    h.session().login().await.unwrap();
    assert_ne!(h.session().session_id().await.unwrap(), first_session);
    assert!(h.app.tasks().is_empty());
    assert_eq!(h.provider.connect_count(), 2);
    assert_eq!(h.provider.disconnect_count(), 1);
}

/// Cached credential -> authenticated straight from init
#[tokio::test]
async fn cached_credential_restores_session() {
    let h = Harness::new(
        &env_config(Some("100")).unwrap(),
        local_provider().with_cached_session(),
    );
    h.init().await.unwrap();
    assert_eq!(h.session().state().await, SessionState::Authenticated);
    assert_eq!(h.provider.connect_count(), 0);

    let task = h.app.increment().await.unwrap();
    assert!(task.starts_with("0x"));
    assert_eq!(h.relay.submissions()[0].sponsor_api_key, "mainnet-key");

    // Logout forgets the cached credential.
    h.session().logout().await;
    assert!(!h.provider.has_cached_credential().await);
}

/// Signing account view reflects the chain balance
#[tokio::test]
async fn wallet_account_view() {
    let h = Harness::new(&env_config(None).unwrap(), local_provider());
    h.init().await.unwrap();
    h.session().login().await.unwrap();

    let owner: Address = h.session().smart_wallet().await.unwrap().owner().unwrap();
    h.chain.set_balance(owner, U256::from(1_000_000_000u64));
    let account = h.session().wallet_account().await.unwrap();
    assert_eq!(account.address, owner);
    assert_eq!(account.balance, U256::from(1_000_000_000u64));
    assert_eq!(account.chain_id, 80001);
}
