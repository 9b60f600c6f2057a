#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use feedfence_host::config::EnforcementSection;
use feedfence_host::guard::NavDecision;
use feedfence_host::netfilter::RequestFilter;
use feedfence_host::session::SessionManager;
use feedfence_host::shell::ShellEvent;
use feedfence_host::store::PolicyStore;

use common::{offline_policy_section, Command, MockShell};

fn manager(tag: &str) -> SessionManager {
    let store = Arc::new(PolicyStore::new(&offline_policy_section(tag)));
    let filter = Arc::new(RequestFilter::new().unwrap());
    SessionManager::new(store, filter, EnforcementSection::default())
}

async fn drain() {
    for _ in 0..25 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn rapid_load_signals_collapse_into_one_injection_pass() {
    let manager = manager("debounce");
    let shell = MockShell::new();
    manager.open("x", shell.clone(), None).await.unwrap();

    shell.emit(ShellEvent::DomReady);
    shell.emit(ShellEvent::LoadFinished);
    shell.emit(ShellEvent::DomReady);
    drain().await;
    assert_eq!(shell.css_insert_count(), 0);

    // quiet period elapses once the signals stop
    tokio::time::sleep(Duration::from_millis(2_000)).await;
    drain().await;
    assert_eq!(shell.css_insert_count(), 1);

    let scripts = shell.scripts();
    assert!(scripts.iter().any(|s| s.starts_with("window.__FF_POLICY =")));
    assert!(scripts.iter().any(|s| s.contains("history.pushState")));
}

#[tokio::test(start_paused = true)]
async fn reinjection_removes_the_previous_stylesheet() {
    let manager = manager("reinject");
    let shell = MockShell::new();
    manager.open("x", shell.clone(), None).await.unwrap();

    shell.emit(ShellEvent::DomReady);
    drain().await;
    tokio::time::sleep(Duration::from_millis(2_000)).await;
    drain().await;
    assert_eq!(shell.css_insert_count(), 1);

    shell.emit(ShellEvent::LoadFinished);
    drain().await;
    tokio::time::sleep(Duration::from_millis(2_000)).await;
    drain().await;

    assert_eq!(shell.css_insert_count(), 2);
    assert!(shell
        .commands()
        .iter()
        .any(|c| matches!(c, Command::RemoveCss(_))));
}

#[tokio::test(start_paused = true)]
async fn closing_cancels_a_pending_injection() {
    let manager = manager("cancel");
    let shell = MockShell::new();
    manager.open("x", shell.clone(), None).await.unwrap();

    shell.emit(ShellEvent::DomReady);
    drain().await;
    manager.close().await;

    tokio::time::sleep(Duration::from_millis(2_000)).await;
    drain().await;
    assert_eq!(shell.css_insert_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn client_script_provider_runs_its_own_guard() {
    let manager = manager("client");
    let shell = MockShell::new();
    let session = manager.open("facebook", shell.clone(), None).await.unwrap();

    // host-side guard stays out of the way for this provider
    assert_eq!(
        session.decide_navigation("https://m.facebook.com/watch/"),
        NavDecision::Allow
    );

    shell.emit(ShellEvent::DomReady);
    drain().await;

    assert_eq!(shell.css_insert_count(), 0);
    assert!(shell.scripts().iter().any(|s| s.contains("c_user=")));
}
