//! Packing strategies that sequence placements automatically.
//!
//! A strategy reads the engine, proposes a placement, lets the engine validate and
//! commit it, and repeats. Manual placement bypasses strategies entirely and talks
//! to the engine directly.
//!
//! [`GreedyLargestFirst`] is the reference strategy:
//! - sort unplaced items by bounding-box volume, largest first (stable)
//! - start the largest item in the front-right corner of the current container
//!   (`x = 0`, `y = width - item width`, `z = 0`)
//! - slide it along x (deeper) while valid, then along y (left) while valid
//! - place it, re-sort, repeat; move to the next container once the current
//!   one cannot take the largest remaining item
//!
//! The greedy search never stacks: every candidate has `z = 0`.

use std::cmp::Ordering;

use tracing::{debug, info, warn};

use crate::engine::{ContainerId, ItemId, PackingEngine};
use crate::types::{Dimensional, Rotation, Vec3};

/// Configuration of the slide search.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PackingConfig {
    /// Step width of the slide along x and y (smaller = tighter, but slower)
    pub slide_step: f64,
    /// General numerical tolerance
    pub general_epsilon: f64,
}

impl PackingConfig {
    pub const DEFAULT_SLIDE_STEP: f64 = 1.0;
    pub const DEFAULT_GENERAL_EPSILON: f64 = 1e-6;

    /// Creates a builder for custom configuration.
    pub fn builder() -> PackingConfigBuilder {
        PackingConfigBuilder::default()
    }
}

impl Default for PackingConfig {
    fn default() -> Self {
        Self {
            slide_step: Self::DEFAULT_SLIDE_STEP,
            general_epsilon: Self::DEFAULT_GENERAL_EPSILON,
        }
    }
}

/// Builder for [`PackingConfig`].
#[derive(Default)]
pub struct PackingConfigBuilder {
    config: PackingConfig,
}

impl PackingConfigBuilder {
    /// Sets the slide step width.
    pub fn slide_step(mut self, step: f64) -> Self {
        self.config.slide_step = step;
        self
    }

    /// Sets the general tolerance.
    pub fn general_epsilon(mut self, epsilon: f64) -> Self {
        self.config.general_epsilon = epsilon;
        self
    }

    pub fn build(self) -> PackingConfig {
        self.config
    }
}

/// A placement a strategy wants the engine to commit.
///
/// The position is fully three-dimensional, so strategies that search stacked
/// positions need no engine changes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlacementProposal {
    pub item: ItemId,
    pub container: ContainerId,
    pub position: Vec3,
    pub rotation: Rotation,
}

/// Descriptive data about a strategy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StrategyMetadata {
    pub name: String,
    pub kind: &'static str,
}

/// Events emitted while packing, for progress reporting.
#[derive(Clone, Debug, PartialEq)]
pub enum PackEvent {
    /// An item was committed to a container.
    ItemPlaced {
        item: ItemId,
        container: ContainerId,
        position: Vec3,
    },
    /// The current container cannot take the largest remaining item.
    ContainerExhausted {
        container: ContainerId,
        blocking_item: ItemId,
    },
    /// Packing stopped.
    Finished { placed: usize, unplaced: usize },
}

/// A search procedure that sequences placements.
pub trait PackingStrategy {
    fn name(&self) -> &str;

    /// Places as many unplaced items as the strategy can.
    ///
    /// # Returns
    /// `true` iff every item that was unplaced at the start ends up placed.
    /// Running out of containers is reported as `false`, never as an error.
    fn pack(&mut self, engine: &mut PackingEngine) -> bool;

    /// Proposes the next placement without committing it.
    fn next_placement(&mut self, engine: &PackingEngine) -> Option<PlacementProposal>;

    fn metadata(&self) -> StrategyMetadata {
        let full = std::any::type_name::<Self>();
        StrategyMetadata {
            name: self.name().to_string(),
            kind: full.rsplit("::").next().unwrap_or(full),
        }
    }
}

/// Greedy largest-first corner search.
///
/// Holds only per-run state: the current volume order of unplaced items and the
/// index of the container being filled.
#[derive(Clone, Debug)]
pub struct GreedyLargestFirst {
    name: String,
    config: PackingConfig,
    order: Vec<ItemId>,
    current_container: usize,
}

impl Default for GreedyLargestFirst {
    fn default() -> Self {
        Self::new()
    }
}

impl GreedyLargestFirst {
    pub const DEFAULT_NAME: &'static str = "GreedyLargestFirst";

    pub fn new() -> Self {
        Self::with_config(PackingConfig::default())
    }

    /// Creates the strategy with a custom configuration.
    ///
    /// A slide step that is not finite and positive, or a tolerance that is not finite
    /// and non-negative, is replaced by its default.
    pub fn with_config(mut config: PackingConfig) -> Self {
        if !(config.slide_step.is_finite() && config.slide_step > 0.0) {
            warn!(
                "⚠️ Slide step {} must be finite and greater than 0. Using {}.",
                config.slide_step,
                PackingConfig::DEFAULT_SLIDE_STEP
            );
            config.slide_step = PackingConfig::DEFAULT_SLIDE_STEP;
        }
        if !(config.general_epsilon.is_finite() && config.general_epsilon >= 0.0) {
            warn!(
                "⚠️ Tolerance {} must be finite and not negative. Using {}.",
                config.general_epsilon,
                PackingConfig::DEFAULT_GENERAL_EPSILON
            );
            config.general_epsilon = PackingConfig::DEFAULT_GENERAL_EPSILON;
        }
        Self {
            name: Self::DEFAULT_NAME.to_string(),
            config,
            order: Vec::new(),
            current_container: 0,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn config(&self) -> &PackingConfig {
        &self.config
    }

    /// Index of the container the search currently fills.
    pub fn current_container(&self) -> usize {
        self.current_container
    }

    /// Like [`PackingStrategy::pack`], reporting each step to `on_event`.
    pub fn pack_with_progress(
        &mut self,
        engine: &mut PackingEngine,
        mut on_event: impl FnMut(&PackEvent),
    ) -> bool {
        self.current_container = 0;
        self.order.clear();

        let total = engine.unplaced_count();
        let mut placed = 0;

        while engine.unplaced_count() > 0 && self.current_container < engine.container_count() {
            let committed = match self.next_placement(engine) {
                Some(proposal) => {
                    engine.place_item(
                        proposal.item,
                        proposal.container,
                        proposal.position,
                        proposal.rotation,
                    ) && {
                        on_event(&PackEvent::ItemPlaced {
                            item: proposal.item,
                            container: proposal.container,
                            position: proposal.position,
                        });
                        true
                    }
                }
                None => false,
            };

            if committed {
                placed += 1;
                continue;
            }

            if let (Some(container), Some(&blocking_item)) = (
                engine.container_id_at(self.current_container),
                self.order.first(),
            ) {
                debug!(%container, %blocking_item, "container exhausted, moving on");
                on_event(&PackEvent::ContainerExhausted {
                    container,
                    blocking_item,
                });
            }
            self.current_container += 1;
        }

        let unplaced = engine.unplaced_count();
        on_event(&PackEvent::Finished { placed, unplaced });
        info!(
            strategy = %self.name,
            placed,
            unplaced,
            "📦 Packing finished"
        );
        placed == total
    }

    /// Recomputes the largest-first order of the unplaced pool.
    ///
    /// Uses the bounding-box volume, the space an item actually takes in the search.
    /// Equal volumes keep pool order.
    fn refresh_order(&mut self, engine: &PackingEngine) {
        let mut volumes: Vec<(ItemId, f64)> = engine
            .unplaced_items()
            .map(|(id, item)| (id, item.bounding_volume()))
            .collect();
        volumes.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        self.order = volumes.into_iter().map(|(id, _)| id).collect();
    }

    /// Number of whole slide steps that fit into `span`, `None` if `span` is negative.
    fn step_count(&self, span: f64) -> Option<usize> {
        let steps = (span / self.config.slide_step + self.config.general_epsilon).floor();
        (steps.is_finite() && steps >= 0.0).then_some(steps as usize)
    }

    /// Corner search for one item in one container.
    fn slide_search(
        &self,
        engine: &PackingEngine,
        item: ItemId,
        container: ContainerId,
    ) -> Option<Vec3> {
        let dims = engine.unplaced_item(item)?.dimensions();
        let truck = engine.container(container)?;
        let rotation = Vec3::zero();
        let step = self.config.slide_step;
        let valid = |position: Vec3| engine.validate_placement(item, container, position, rotation);

        let start_y = truck.width() - dims.y;
        let mut position = Vec3::new(0.0, start_y, 0.0);

        // Push back along x: the deepest valid x before the first invalid one.
        if let Some(max_k) = self.step_count(truck.length() - dims.x) {
            for k in 0..=max_k {
                position.x = k as f64 * step;
                if !valid(position) {
                    position.x = k.saturating_sub(1) as f64 * step;
                    break;
                }
            }
        }

        // Push left along y: the smallest valid y before the first invalid one.
        if let Some(top_k) = self.step_count(start_y) {
            for k in (0..=top_k).rev() {
                position.y = k as f64 * step;
                if !valid(position) {
                    position.y = ((k + 1) as f64 * step).min(start_y);
                    break;
                }
            }
        }

        valid(position).then_some(position)
    }
}

impl PackingStrategy for GreedyLargestFirst {
    fn name(&self) -> &str {
        &self.name
    }

    fn pack(&mut self, engine: &mut PackingEngine) -> bool {
        self.pack_with_progress(engine, |_| {})
    }

    fn next_placement(&mut self, engine: &PackingEngine) -> Option<PlacementProposal> {
        self.refresh_order(engine);
        let item = *self.order.first()?;
        let container = engine.container_id_at(self.current_container)?;
        let position = self.slide_search(engine, item, container)?;

        Some(PlacementProposal {
            item,
            container,
            position,
            rotation: Vec3::zero(),
        })
    }
}
