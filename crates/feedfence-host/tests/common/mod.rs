#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use feedfence_host::config::PolicySection;
use feedfence_host::shell::{
    BrowserShell, CssHandle, EventKind, ShellError, ShellEvent, Subscription,
};

/// Everything the enforcement stack asked the surface to do, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Stop,
    Load(String),
    InsertCss(String),
    RemoveCss(String),
    Script(String),
    UserAgent(String),
}

#[derive(Default)]
struct Inner {
    commands: Vec<Command>,
    sinks: HashMap<usize, (Vec<EventKind>, mpsc::UnboundedSender<ShellEvent>)>,
}

/// Recording fake of the embedding surface. Commands append to a log;
/// emitted events fan out to the registered sinks.
pub struct MockShell {
    inner: Arc<Mutex<Inner>>,
    next_sub: AtomicUsize,
    next_css: AtomicUsize,
}

impl MockShell {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            next_sub: AtomicUsize::new(0),
            next_css: AtomicUsize::new(0),
        })
    }

    fn record(&self, command: Command) {
        self.inner.lock().unwrap().commands.push(command);
    }

    pub fn commands(&self) -> Vec<Command> {
        self.inner.lock().unwrap().commands.clone()
    }

    pub fn loads(&self) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter_map(|c| match c {
                Command::Load(url) => Some(url),
                _ => None,
            })
            .collect()
    }

    pub fn css_insert_count(&self) -> usize {
        self.commands()
            .iter()
            .filter(|c| matches!(c, Command::InsertCss(_)))
            .count()
    }

    pub fn scripts(&self) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter_map(|c| match c {
                Command::Script(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().unwrap().sinks.len()
    }

    /// Deliver one lifecycle event to every interested sink.
    pub fn emit(&self, event: ShellEvent) {
        let kind = match &event {
            ShellEvent::NavigationStarted { .. } => EventKind::NavigationStarted,
            ShellEvent::InPageNavigation { .. } => EventKind::InPageNavigation,
            ShellEvent::DomReady => EventKind::DomReady,
            ShellEvent::LoadFinished => EventKind::LoadFinished,
            ShellEvent::LoadFailed(_) => EventKind::LoadFailed,
        };
        let sinks: Vec<_> = self
            .inner
            .lock()
            .unwrap()
            .sinks
            .values()
            .filter(|(kinds, _)| kinds.contains(&kind))
            .map(|(_, tx)| tx.clone())
            .collect();
        for tx in sinks {
            let _ = tx.send(event.clone());
        }
    }
}

#[async_trait]
impl BrowserShell for MockShell {
    fn stop(&self) {
        self.record(Command::Stop);
    }

    async fn load_url(&self, url: &str) -> Result<(), ShellError> {
        self.record(Command::Load(url.to_string()));
        Ok(())
    }

    async fn insert_css(&self, css: &str) -> Result<CssHandle, ShellError> {
        self.record(Command::InsertCss(css.to_string()));
        let id = self.next_css.fetch_add(1, Ordering::SeqCst);
        Ok(CssHandle(format!("css-{id}")))
    }

    async fn remove_css(&self, handle: &CssHandle) -> Result<(), ShellError> {
        self.record(Command::RemoveCss(handle.0.clone()));
        Ok(())
    }

    async fn execute_script(&self, script: &str) -> Result<(), ShellError> {
        self.record(Command::Script(script.to_string()));
        Ok(())
    }

    fn set_user_agent(&self, user_agent: &str) {
        self.record(Command::UserAgent(user_agent.to_string()));
    }

    fn subscribe(
        &self,
        kinds: &[EventKind],
        sink: mpsc::UnboundedSender<ShellEvent>,
    ) -> Subscription {
        let id = self.next_sub.fetch_add(1, Ordering::SeqCst);
        self.inner
            .lock()
            .unwrap()
            .sinks
            .insert(id, (kinds.to_vec(), sink));
        let inner = Arc::clone(&self.inner);
        Subscription::new(move || {
            inner.lock().unwrap().sinks.remove(&id);
        })
    }
}

/// Multi-provider policy document used across the integration tests.
pub const POLICY_JSON: &str = r#"{
    "version": "7",
    "providers": {
        "x": {
            "start": "https://x.com/messages",
            "allow": ["https://x.com/messages*", "/i/*"],
            "block": ["https://x.com/*"],
            "dom": {
                "hide": ["[data-testid='sidebarColumn']"],
                "disableAnchorsTo": ["/explore"]
            }
        },
        "youtube": {
            "start": "https://www.youtube.com/feed/subscriptions",
            "allow": ["https://m.youtube.com/feed/*", "https://studio.youtube.com/*"],
            "block": ["https://m.youtube.com/", "https://m.youtube.com/shorts*"]
        },
        "facebook": {
            "start": "https://m.facebook.com/me",
            "allow": ["https://m.facebook.com/messages/*"],
            "block": ["https://m.facebook.com/watch*"]
        }
    }
}"#;

/// Fresh scratch directory under the system temp dir.
pub fn scratch_dir(tag: &str) -> PathBuf {
    static SEQ: AtomicUsize = AtomicUsize::new(0);
    let dir = std::env::temp_dir().join(format!(
        "feedfence-test-{tag}-{}-{}",
        std::process::id(),
        SEQ.fetch_add(1, Ordering::SeqCst),
    ));
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// Policy section with an unreachable source URL and a pre-persisted policy,
/// so sessions come up from durable storage without touching the network.
pub fn offline_policy_section(tag: &str) -> PolicySection {
    let dir = scratch_dir(tag);
    fs::write(dir.join("policy.json"), POLICY_JSON).unwrap();
    PolicySection {
        url: "http://127.0.0.1:1/api/policy".into(),
        local_paths: Vec::new(),
        storage_dir: dir.to_string_lossy().into_owned(),
    }
}
