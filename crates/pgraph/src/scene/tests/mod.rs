//! Graph-level scenario tests

mod graph_invariants;
mod node_paths;
mod pipeline_stages;

use std::sync::Arc;

use super::PandaNode;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Check the parent/child biconditional and child uniqueness between every pair of `nodes` at every stage
fn assert_consistent(nodes: &[&Arc<PandaNode>]) {
    let num_stages = nodes.first().map_or(1, |node| node.pipeline().num_stages());
    for stage in 0..num_stages {
        for parent in nodes {
            let parent_data = parent.read_data(stage);
            for child in nodes {
                let child_data = child.read_data(stage);
                let listed_down = parent_data.has_child_edge(child);
                let listed_up = child_data.up.find(parent).is_some();
                assert_eq!(
                    listed_down, listed_up,
                    "stage {stage}: {parent} -> {child} down={listed_down} up={listed_up}"
                );

                let copies = parent_data
                    .down
                    .iter()
                    .chain(parent_data.stashed.iter())
                    .filter(|connection| Arc::ptr_eq(connection.child(), child))
                    .count();
                assert!(copies <= 1, "stage {stage}: {child} listed {copies} times under {parent}");
            }
        }
    }
}

fn child_names(node: &PandaNode) -> Vec<String> {
    node.get_children().iter().map(|c| c.child().name()).collect()
}

fn stashed_names(node: &PandaNode) -> Vec<String> {
    node.get_stashed_children().iter().map(|c| c.child().name()).collect()
}
