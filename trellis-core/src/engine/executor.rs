//! Tick Execution
//!
//! # Algorithm
//!
//! 1. Obtain the execution order from the scheduler. A cycle aborts the tick
//!    before any value or flag is touched.
//! 2. Visit nodes in order. For each node:
//!    - copy the value of every incoming link into its target input; strong
//!      links deliver the source's current value, weak links the source's
//!      value as of the end of the previous tick
//!    - a delivered value that differs from the input's current value marks
//!      the input as set and the node dirty
//!    - run the node if it is dirty, has never run, or always runs
//! 3. Snapshot every weak link's source value for the next tick.
//!
//! Because strong sources are ordered before their targets, a strong link
//! always delivers a value produced earlier in the same tick.
//!
//! A failing node does not stop the tick. Its error is recorded, its inputs
//! are still consumed, and the remaining nodes run against whatever values
//! its outputs held before.

use std::time::Instant;

use tracing::{debug, trace, warn};

use crate::error::{EngineError, RuntimeError};
use crate::node::handle::{NodeHandle, NodeId, PropertyHandle};
use crate::node::NodeArena;
use crate::property::Value;

use super::{LogicEngine, UpdateReport};

impl LogicEngine {
    /// Run one update pass over the graph.
    ///
    /// Returns `false` if the tick was aborted by a cycle or any node failed;
    /// the details are in `errors()`.
    pub fn tick(&mut self) -> bool {
        self.errors.clear();
        let started = Instant::now();
        let mut report = UpdateReport::default();

        let nodes = self.scheduler_nodes();
        let order = match self.scheduler.order(&nodes, &self.links) {
            Ok(order) => order.to_vec(),
            Err(cycle) => {
                let error = EngineError::from(cycle);
                self.warn_cycle(&error);
                self.push_error(&error, None);
                return false;
            }
        };
        report.sort_time = started.elapsed();

        let mut success = true;
        for id in order {
            let handle = NodeHandle::new(self.id, id);
            report.links_activated += self.propagate_into(id);

            let Some(node) = self.nodes.get_mut(id) else {
                continue;
            };
            if self.config.track_dirty_nodes && !node.needs_update() {
                trace!(node = %id, "skipping clean node");
                report.skipped.push(handle);
                continue;
            }

            report.executed.push(handle);
            if let Err(message) = node.execute(&mut self.scene) {
                let error = EngineError::from(RuntimeError {
                    node: handle,
                    node_name: node.name().to_string(),
                    message,
                });
                warn!(node = %id, error = %error, "node update failed");
                self.push_error(&error, Some(handle));
                success = false;
            }
        }

        self.snapshot_weak_links();

        report.total_time = started.elapsed();
        debug!(
            executed = report.executed.len(),
            skipped = report.skipped.len(),
            links_activated = report.links_activated,
            elapsed_us = report.total_time.as_micros() as u64,
            "tick finished"
        );
        if self.config.collect_update_report {
            self.last_report = Some(report);
        }
        success
    }

    /// Deliver every incoming link of `node`. Returns how many changed a value.
    fn propagate_into(&mut self, node: NodeId) -> usize {
        let deliveries: Vec<(u32, Value)> = self
            .links
            .links_into(node)
            .filter_map(|link| {
                let value = if link.is_weak() {
                    link.lagged_value().clone()
                } else {
                    output_value(&self.nodes, link.source())?
                };
                Some((link.target().slot(), value))
            })
            .collect();
        if deliveries.is_empty() {
            return 0;
        }

        let Some(target) = self.nodes.get_mut(node) else {
            return 0;
        };
        let mut activated = 0;
        for (slot, value) in deliveries {
            let Some(inputs) = target.inputs_mut() else {
                continue;
            };
            let unchanged = inputs.value(slot).map_or(true, |current| current.same_as(&value));
            if unchanged {
                continue;
            }
            if inputs.set_value(slot, value).is_ok() {
                target.mark_dirty();
                activated += 1;
            }
        }
        activated
    }

    /// Record each weak link's current source value for the next tick.
    fn snapshot_weak_links(&mut self) {
        let nodes = &self.nodes;
        for link in self.links.links_mut().filter(|l| l.is_weak()) {
            if let Some(value) = output_value(nodes, link.source()) {
                link.set_lagged_value(value);
            }
        }
    }
}

fn output_value(nodes: &NodeArena, prop: PropertyHandle) -> Option<Value> {
    nodes
        .get(prop.node().id())?
        .outputs()?
        .value(prop.slot())
        .ok()
        .cloned()
}

#[cfg(test)]
mod tests {
    use crate::engine::{EngineConfig, LogicEngine};
    use crate::node::ScriptDefinition;
    use crate::property::{PropertyKind, TypeSpec};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_engine(config: EngineConfig, runs: Arc<AtomicUsize>) -> LogicEngine {
        let mut engine = LogicEngine::with_config(config);
        engine
            .register_script(ScriptDefinition::new(
                "count",
                TypeSpec::structure([("x", TypeSpec::leaf(PropertyKind::Int32))]),
                TypeSpec::structure([("y", TypeSpec::leaf(PropertyKind::Int32))]),
                move |inputs, outputs| {
                    runs.fetch_add(1, Ordering::SeqCst);
                    outputs.set("y", inputs.get::<i32>("x")? + 1)
                },
            ))
            .unwrap();
        engine
    }

    #[test]
    fn clean_nodes_are_skipped() {
        let runs = Arc::new(AtomicUsize::new(0));
        let config = EngineConfig {
            collect_update_report: true,
            ..EngineConfig::default()
        };
        let mut engine = counting_engine(config, runs.clone());
        let a = engine.create_script("a", "count").unwrap();
        let b = engine.create_script("b", "count").unwrap();
        engine
            .link(engine.output(a, "y").unwrap(), engine.input(b, "x").unwrap())
            .unwrap();

        assert!(engine.tick());
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(engine.last_update_report().unwrap().links_activated(), 1);

        assert!(engine.tick());
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        let report = engine.last_update_report().unwrap();
        assert!(report.executed().is_empty());
        assert_eq!(report.skipped(), &[a, b]);

        engine.set(engine.input(a, "x").unwrap(), 10).unwrap();
        assert!(engine.tick());
        assert_eq!(runs.load(Ordering::SeqCst), 4);
        assert_eq!(engine.get::<i32>(engine.output(b, "y").unwrap()).unwrap(), 12);
    }

    #[test]
    fn unchanged_link_value_does_not_dirty_target() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut engine = counting_engine(EngineConfig::default(), runs.clone());
        let a = engine.create_script("a", "count").unwrap();
        let b = engine.create_script("b", "count").unwrap();
        engine
            .link(engine.output(a, "y").unwrap(), engine.input(b, "x").unwrap())
            .unwrap();
        assert!(engine.tick());
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        // Same input value again: a reruns, produces the same output, b stays clean.
        engine.set(engine.input(a, "x").unwrap(), 0).unwrap();
        assert!(engine.tick());
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn disabled_tracking_runs_everything() {
        let runs = Arc::new(AtomicUsize::new(0));
        let config = EngineConfig {
            track_dirty_nodes: false,
            ..EngineConfig::default()
        };
        let mut engine = counting_engine(config, runs.clone());
        engine.create_script("a", "count").unwrap();
        engine.create_script("b", "count").unwrap();

        assert!(engine.tick());
        assert!(engine.tick());
        assert_eq!(runs.load(Ordering::SeqCst), 4);
        assert!(engine.last_update_report().is_none());
    }
}
