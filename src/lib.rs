//! Three-dimensional truck loading.
//!
//! A [`PackingEngine`] owns a pool of unplaced items and a list of containers,
//! validates placements against bounds and already-loaded items, and snapshots
//! its contents to a JSON state file. Strategies such as [`GreedyLargestFirst`]
//! sequence placements automatically; [`PackingService`] shares one engine between
//! concurrent tasks.
//!
//! ```
//! use truck_loader::{Container, GreedyLargestFirst, Item, PackingEngine, PackingStrategy};
//!
//! let mut engine = PackingEngine::new();
//! engine.add_container(Container::new(10.0, 10.0, 10.0).unwrap());
//! engine.add_item(Item::new_box(4.0, 4.0, 4.0, 2.5, "crate").unwrap());
//!
//! assert!(GreedyLargestFirst::new().pack(&mut engine));
//! assert_eq!(engine.summary().placed_items, 1);
//! ```

pub mod config;
pub mod container;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod item;
pub mod service;
pub mod state;
pub mod strategy;
pub mod types;

pub use container::{Container, DoorSize, Placement};
pub use engine::{ContainerId, ItemId, PackingEngine, PackingSummary, PlacementRejection};
pub use error::{ServiceError, StateError, ValidationError};
pub use item::{BoxItem, CompoundItem, CylinderItem, Dimensions, Item, LengthUnit, WeightUnit};
pub use service::PackingService;
pub use state::EngineState;
pub use strategy::{
    GreedyLargestFirst, PackEvent, PackingConfig, PackingStrategy, PlacementProposal,
    StrategyMetadata,
};
pub use types::{BoundingBox, Dimensional, Rotation, Vec3, Weighted};
