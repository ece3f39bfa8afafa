//! Shared access to one [`PackingEngine`] from many tasks.
//!
//! The engine lives on a single blocking worker thread and is only touched there.
//! Handles send commands over a channel and await the reply, so every command
//! (including a whole packing run) executes atomically with respect to the others.
//! Two callers racing to fill the same spot cannot both succeed.

use std::path::PathBuf;

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::container::Container;
use crate::engine::{ContainerId, ItemId, PackingEngine, PackingSummary};
use crate::error::{ServiceError, StateResult};
use crate::item::Item;
use crate::state::EngineState;
use crate::strategy::{GreedyLargestFirst, PackEvent, PackingStrategy};
use crate::types::{Rotation, Vec3};

const COMMAND_BUFFER: usize = 32;

enum Command {
    AddContainer {
        container: Container,
        reply: oneshot::Sender<ContainerId>,
    },
    AddItems {
        items: Vec<Item>,
        reply: oneshot::Sender<Vec<ItemId>>,
    },
    LoadState {
        path: PathBuf,
        reply: oneshot::Sender<StateResult<bool>>,
    },
    SaveState {
        path: PathBuf,
        reply: oneshot::Sender<bool>,
    },
    VerifyState {
        path: PathBuf,
        reply: oneshot::Sender<StateResult<bool>>,
    },
    PlaceItem {
        item_index: usize,
        container_index: usize,
        position: Vec3,
        rotation: Rotation,
        reply: oneshot::Sender<bool>,
    },
    GetState {
        reply: oneshot::Sender<EngineState>,
    },
    Reset {
        reply: oneshot::Sender<()>,
    },
    Pack {
        strategy: Box<dyn PackingStrategy + Send>,
        reply: oneshot::Sender<bool>,
    },
    PackWithProgress {
        strategy: GreedyLargestFirst,
        events: mpsc::Sender<PackEvent>,
        reply: oneshot::Sender<bool>,
    },
    Summary {
        reply: oneshot::Sender<PackingSummary>,
    },
}

impl Command {
    // A dropped reply receiver means the caller stopped waiting; the command
    // has still been applied.
    fn apply(self, engine: &mut PackingEngine) {
        match self {
            Command::AddContainer { container, reply } => {
                let _ = reply.send(engine.add_container(container));
            }
            Command::AddItems { items, reply } => {
                let _ = reply.send(engine.add_items(items));
            }
            Command::LoadState { path, reply } => {
                let _ = reply.send(engine.load_state(path));
            }
            Command::SaveState { path, reply } => {
                let _ = reply.send(engine.save_state(path));
            }
            Command::VerifyState { path, reply } => {
                let _ = reply.send(engine.verify_state(path));
            }
            Command::PlaceItem {
                item_index,
                container_index,
                position,
                rotation,
                reply,
            } => {
                let placed = engine.place_item_at(item_index, container_index, position, rotation);
                let _ = reply.send(placed);
            }
            Command::GetState { reply } => {
                let _ = reply.send(engine.get_state());
            }
            Command::Reset { reply } => {
                engine.reset();
                let _ = reply.send(());
            }
            Command::Pack {
                mut strategy,
                reply,
            } => {
                let _ = reply.send(strategy.pack(engine));
            }
            Command::PackWithProgress {
                mut strategy,
                events,
                reply,
            } => {
                let complete = strategy.pack_with_progress(engine, |event| {
                    // Receiver has gone away; the run continues without progress output.
                    let _ = events.blocking_send(event.clone());
                });
                let _ = reply.send(complete);
            }
            Command::Summary { reply } => {
                let _ = reply.send(engine.summary());
            }
        }
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Command::AddContainer { .. } => "AddContainer",
            Command::AddItems { .. } => "AddItems",
            Command::LoadState { .. } => "LoadState",
            Command::SaveState { .. } => "SaveState",
            Command::VerifyState { .. } => "VerifyState",
            Command::PlaceItem { .. } => "PlaceItem",
            Command::GetState { .. } => "GetState",
            Command::Reset { .. } => "Reset",
            Command::Pack { .. } => "Pack",
            Command::PackWithProgress { .. } => "PackWithProgress",
            Command::Summary { .. } => "Summary",
        };
        f.write_str(name)
    }
}

/// Cloneable handle to an engine running on a dedicated worker.
///
/// The worker stops once every handle is dropped.
#[derive(Clone, Debug)]
pub struct PackingService {
    commands: mpsc::Sender<Command>,
}

impl PackingService {
    /// Moves `engine` onto a blocking worker and returns the first handle.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(engine: PackingEngine) -> Self {
        let (commands, rx) = mpsc::channel(COMMAND_BUFFER);
        tokio::task::spawn_blocking(move || run_worker(engine, rx));
        Self { commands }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, ServiceError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| ServiceError::Unavailable)?;
        response.await.map_err(|_| ServiceError::Unavailable)
    }

    pub async fn add_container(&self, container: Container) -> Result<ContainerId, ServiceError> {
        self.request(|reply| Command::AddContainer { container, reply })
            .await
    }

    pub async fn add_items(&self, items: Vec<Item>) -> Result<Vec<ItemId>, ServiceError> {
        self.request(|reply| Command::AddItems { items, reply }).await
    }

    /// See [`PackingEngine::load_state`]. A corrupt file surfaces as
    /// [`ServiceError::State`].
    pub async fn load_state(&self, path: impl Into<PathBuf>) -> Result<bool, ServiceError> {
        let path = path.into();
        Ok(self
            .request(|reply| Command::LoadState { path, reply })
            .await??)
    }

    pub async fn save_state(&self, path: impl Into<PathBuf>) -> Result<bool, ServiceError> {
        let path = path.into();
        self.request(|reply| Command::SaveState { path, reply })
            .await
    }

    pub async fn verify_state(&self, path: impl Into<PathBuf>) -> Result<bool, ServiceError> {
        let path = path.into();
        Ok(self
            .request(|reply| Command::VerifyState { path, reply })
            .await??)
    }

    /// Places the unplaced item at `item_index` into the container at `container_index`.
    ///
    /// Indices are resolved when the worker executes the command, against the pool
    /// as it is at that moment.
    pub async fn place_item(
        &self,
        item_index: usize,
        container_index: usize,
        position: Vec3,
        rotation: Rotation,
    ) -> Result<bool, ServiceError> {
        self.request(|reply| Command::PlaceItem {
            item_index,
            container_index,
            position,
            rotation,
            reply,
        })
        .await
    }

    pub async fn get_state(&self) -> Result<EngineState, ServiceError> {
        self.request(|reply| Command::GetState { reply }).await
    }

    pub async fn reset(&self) -> Result<(), ServiceError> {
        self.request(|reply| Command::Reset { reply }).await
    }

    /// Runs a whole packing pass without interleaving other commands.
    pub async fn pack(
        &self,
        strategy: Box<dyn PackingStrategy + Send>,
    ) -> Result<bool, ServiceError> {
        self.request(|reply| Command::Pack { strategy, reply })
            .await
    }

    /// Like [`pack`](Self::pack) for the greedy strategy, streaming progress into `events`.
    ///
    /// The receiving side must be drained concurrently, otherwise the run stalls once
    /// the channel is full.
    pub async fn pack_with_progress(
        &self,
        strategy: GreedyLargestFirst,
        events: mpsc::Sender<PackEvent>,
    ) -> Result<bool, ServiceError> {
        self.request(|reply| Command::PackWithProgress {
            strategy,
            events,
            reply,
        })
        .await
    }

    pub async fn summary(&self) -> Result<PackingSummary, ServiceError> {
        self.request(|reply| Command::Summary { reply }).await
    }
}

fn run_worker(mut engine: PackingEngine, mut commands: mpsc::Receiver<Command>) {
    debug!("packing engine worker started");
    while let Some(command) = commands.blocking_recv() {
        debug!(?command, "applying command");
        command.apply(&mut engine);
    }
    debug!("packing engine worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StateError;
    use tempfile::tempdir;

    fn cube(side: f64, name: &str) -> Item {
        Item::new_box(side, side, side, 1.0, name).unwrap()
    }

    async fn service_with_truck(length: f64) -> PackingService {
        let service = PackingService::spawn(PackingEngine::new());
        service
            .add_container(Container::new(length, 10.0, 10.0).unwrap())
            .await
            .unwrap();
        service
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_placements_never_overlap() {
        let service = service_with_truck(10.0).await;
        service
            .add_items((0..8).map(|i| cube(5.0, &format!("cube-{i}"))).collect())
            .await
            .unwrap();

        // Everybody races for the same corner; exactly one wins.
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let service = service.clone();
            tasks.push(tokio::spawn(async move {
                service
                    .place_item(0, 0, Vec3::zero(), Vec3::zero())
                    .await
                    .unwrap()
            }));
        }

        let mut wins = 0;
        for task in tasks {
            if task.await.unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);

        let summary = service.summary().await.unwrap();
        assert_eq!(summary.placed_items, 1);
        assert_eq!(summary.unplaced_items, 7);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_disjoint_placements_all_succeed() {
        let service = service_with_truck(10.0).await;
        service
            .add_items((0..10).map(|i| cube(1.0, &format!("cube-{i}"))).collect())
            .await
            .unwrap();

        let mut tasks = Vec::new();
        for slot in 0..10 {
            let service = service.clone();
            tasks.push(tokio::spawn(async move {
                service
                    .place_item(0, 0, Vec3::new(slot as f64, 0.0, 0.0), Vec3::zero())
                    .await
                    .unwrap()
            }));
        }
        for task in tasks {
            assert!(task.await.unwrap());
        }

        let state = service.get_state().await.unwrap();
        assert_eq!(state.trucks[0].loaded_items.len(), 10);
        assert!(state.unplaced_items.is_empty());
    }

    #[tokio::test]
    async fn packs_and_resets_through_the_handle() {
        let service = service_with_truck(10.0).await;
        service
            .add_items(vec![cube(3.0, "small"), cube(4.0, "large")])
            .await
            .unwrap();

        assert!(service.pack(Box::new(GreedyLargestFirst::new())).await.unwrap());
        assert!(service.summary().await.unwrap().is_complete());

        service.reset().await.unwrap();
        let state = service.get_state().await.unwrap();
        assert!(state.trucks[0].loaded_items.is_empty());
        let names: Vec<_> = state.unplaced_items.iter().map(Item::name).collect();
        assert_eq!(names, vec!["large", "small"]);
    }

    #[tokio::test]
    async fn streams_progress_events() {
        let service = service_with_truck(10.0).await;
        service
            .add_items(vec![cube(4.0, "a"), cube(4.0, "b")])
            .await
            .unwrap();

        let (tx, mut rx) = mpsc::channel(16);
        let complete = service
            .pack_with_progress(GreedyLargestFirst::new(), tx)
            .await
            .unwrap();
        assert!(complete);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        let placed = events
            .iter()
            .filter(|e| matches!(e, PackEvent::ItemPlaced { .. }))
            .count();
        assert_eq!(placed, 2);
        assert_eq!(
            events.last(),
            Some(&PackEvent::Finished {
                placed: 2,
                unplaced: 0
            })
        );
    }

    #[tokio::test]
    async fn state_files_through_the_handle() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let service = service_with_truck(10.0).await;
        service.add_items(vec![cube(2.0, "a")]).await.unwrap();
        assert!(service.place_item(0, 0, Vec3::zero(), Vec3::zero()).await.unwrap());
        assert!(service.save_state(&path).await.unwrap());
        assert!(service.verify_state(&path).await.unwrap());

        let other = PackingService::spawn(PackingEngine::new());
        assert!(other.load_state(&path).await.unwrap());
        assert_eq!(other.get_state().await.unwrap(), service.get_state().await.unwrap());

        assert!(!other.load_state(dir.path().join("missing.json")).await.unwrap());

        std::fs::write(&path, "{ not json").unwrap();
        let err = other.load_state(&path).await.unwrap_err();
        assert!(matches!(err, ServiceError::State(StateError::Corrupt(_))));
    }

    #[tokio::test]
    async fn stopped_worker_is_unavailable() {
        let (commands, rx) = mpsc::channel(1);
        drop(rx);
        let service = PackingService { commands };

        assert!(matches!(
            service.summary().await,
            Err(ServiceError::Unavailable)
        ));
        assert!(matches!(
            service.reset().await,
            Err(ServiceError::Unavailable)
        ));
    }
}
