//! The reactor drives a [`TabEngine`] from host notifications.
//!
//! Layout notifications arrive in bursts. Each one pushes a single pending
//! deadline further out, so a burst is reconciled once after it settles.
//! Every other event first flushes a pending reconcile so it sees a current
//! cache.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, trace, warn};

use crate::actor;
use crate::engine::{EngineSnapshot, SortStrategyName, TabEngine};
use crate::model::host::{ContentKey, GroupId, HostTree, LeafId, SubLocation};
use crate::model::store::KeyValueStore;

pub type Sender = actor::Sender<Event>;
pub type Receiver = actor::Receiver<Event>;

#[derive(Debug)]
pub enum Event {
    LayoutChanged,
    ActiveLeafChanged(Option<LeafId>),
    FileOpened(LeafId),
    Command(Command),
    Query(Query),
    Shutdown,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    MoveLeaf { source: LeafId, target: LeafId },
    MoveLeafToEnd { source: LeafId, group: GroupId },
    MoveLeafToNewGroup { source: LeafId },
    SetSortStrategy(Option<SortStrategyName>),
    SwapGroups { a: GroupId, b: GroupId },
    MoveGroupToEnd { group: GroupId },
    Deduplicate { key: ContentKey, leaves: Vec<LeafId>, same_group_only: bool },
    DeduplicateExistingTabs,
    CloseOthers { leaf: LeafId },
    CloseGroup { group: GroupId },
    TogglePin { leaf: LeafId },
    MakeLeafNonEphemeral { leaf: LeafId },
    RegisterPendingJump { key: ContentKey, location: SubLocation },
    SetFocusLock(bool),
}

#[derive(Debug)]
pub enum Query {
    Snapshot(oneshot::Sender<EngineSnapshot>),
    DrawTree(oneshot::Sender<String>),
}

pub struct Reactor<H, S> {
    engine: TabEngine<S>,
    host: Arc<Mutex<H>>,
    debounce: Duration,
    reconcile_passes: u64,
}

impl<H: HostTree, S: KeyValueStore> Reactor<H, S> {
    pub fn new(engine: TabEngine<S>, host: Arc<Mutex<H>>) -> Self {
        let debounce = Duration::from_millis(engine.settings().reconcile_debounce_ms.max(1));
        Reactor { engine, host, debounce, reconcile_passes: 0 }
    }

    pub fn engine(&self) -> &TabEngine<S> { &self.engine }

    pub fn into_engine(self) -> TabEngine<S> { self.engine }

    pub fn reconcile_passes(&self) -> u64 { self.reconcile_passes }

    /// Runs the reactor on the current runtime. The handle yields the reactor
    /// back once it stops.
    pub fn spawn(self) -> (Sender, JoinHandle<Self>)
    where
        H: Send + 'static,
        S: Send + 'static,
    {
        let (tx, rx) = actor::channel();
        (tx, tokio::spawn(self.run(rx)))
    }

    /// Processes events until `Shutdown` arrives or every sender is gone.
    pub async fn run(mut self, mut events: Receiver) -> Self {
        self.reconcile();
        let mut deadline: Option<Instant> = None;
        loop {
            tokio::select! {
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    deadline = None;
                    self.reconcile();
                }
                maybe = events.recv() => {
                    let Some((span, event)) = maybe else {
                        debug!("all senders dropped");
                        break;
                    };
                    match event {
                        Event::LayoutChanged => {
                            trace!(parent: &span, "layout changed");
                            deadline = Some(Instant::now() + self.debounce);
                        }
                        Event::Shutdown => {
                            debug!(parent: &span, "shutdown requested");
                            break;
                        }
                        event => {
                            if deadline.take().is_some() {
                                self.reconcile();
                            }
                            span.in_scope(|| self.handle_event(event));
                        }
                    }
                }
            }
        }
        if deadline.is_some() {
            self.reconcile();
        }
        info!(passes = self.reconcile_passes, "reactor stopped");
        self
    }

    fn reconcile(&mut self) {
        let host = self.host.clone();
        let mut host = host.lock();
        let outcome = self.engine.reconcile(&mut *host);
        self.reconcile_passes += 1;
        trace!(?outcome, pass = self.reconcile_passes, "reconciled");
    }

    fn handle_event(&mut self, event: Event) {
        let host = self.host.clone();
        let mut host = host.lock();
        let host = &mut *host;
        match event {
            Event::ActiveLeafChanged(leaf) => {
                let outcome = self.engine.on_active_leaf_changed(host, leaf);
                trace!(?outcome, "active leaf changed");
            }
            Event::FileOpened(leaf) => {
                if let Some(kept) = self.engine.on_file_opened(host, &leaf)
                    && kept != leaf
                {
                    debug!(opened = ?leaf, ?kept, "file already open elsewhere");
                }
            }
            Event::Command(cmd) => self.handle_command(host, cmd),
            Event::Query(Query::Snapshot(reply)) => {
                _ = reply.send(self.engine.snapshot());
            }
            Event::Query(Query::DrawTree(reply)) => {
                _ = reply.send(self.engine.draw_tree(host));
            }
            Event::LayoutChanged | Event::Shutdown => {}
        }
    }

    fn handle_command(&mut self, host: &mut H, cmd: Command) {
        debug!(?cmd, "command");
        let engine = &mut self.engine;
        let applied = match cmd {
            Command::MoveLeaf { source, target } => engine.move_leaf(host, &source, &target),
            Command::MoveLeafToEnd { source, group } => {
                engine.move_leaf_to_end(host, &source, &group)
            }
            Command::MoveLeafToNewGroup { source } => {
                engine.move_leaf_to_new_group(host, &source).is_some()
            }
            Command::SetSortStrategy(name) => {
                engine.set_sort_strategy(host, name);
                true
            }
            Command::SwapGroups { a, b } => engine.swap_group(&a, &b),
            Command::MoveGroupToEnd { group } => engine.move_group_to_end(&group),
            Command::Deduplicate { key, leaves, same_group_only } => {
                engine.deduplicate(host, &key, &leaves, same_group_only).is_some()
            }
            Command::DeduplicateExistingTabs => {
                engine.deduplicate_existing_tabs(host);
                true
            }
            Command::CloseOthers { leaf } => {
                engine.close_others(host, &leaf);
                true
            }
            Command::CloseGroup { group } => {
                engine.close_group(host, &group);
                true
            }
            Command::TogglePin { leaf } => engine.toggle_pin(host, &leaf).is_some(),
            Command::MakeLeafNonEphemeral { leaf } => engine.make_leaf_non_ephemeral(host, &leaf),
            Command::RegisterPendingJump { key, location } => {
                engine.register_pending_jump(key, location);
                true
            }
            Command::SetFocusLock(enabled) => {
                engine.set_focus_lock(enabled);
                true
            }
        };
        if !applied {
            warn!("command referred to something that no longer exists");
        }
    }
}
