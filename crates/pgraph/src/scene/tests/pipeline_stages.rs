use std::sync::{Arc, Barrier};
use std::thread;

use super::assert_consistent;
use crate::error::GraphError;
use crate::pipeline::{enter_stage, Pipeline};
use crate::scene::PandaNode;

#[test]
fn test_stage_one_write_is_invisible_at_stage_zero() {
    let pipeline = Pipeline::new(2);
    let node = PandaNode::new(&pipeline, "n");
    let early = node.read_data(0);

    node.write_stage(1).tag_data.insert("frame".to_string(), "cull".to_string());
    assert!(!early.tag_data.contains_key("frame"));
    assert!(!node.read_data(0).tag_data.contains_key("frame"));

    node.write_stage(0).tag_data.insert("frame".to_string(), "app".to_string());
    assert_eq!(node.read_data(0).tag_data.get("frame").map(String::as_str), Some("app"));
    assert_eq!(node.read_data(1).tag_data.get("frame").map(String::as_str), Some("cull"));

    pipeline.cycle();
    assert_eq!(node.read_data(1).tag_data.get("frame").map(String::as_str), Some("app"));
}

#[test]
fn test_app_edits_reach_later_stages_only_after_cycle() {
    let pipeline = Pipeline::new(3);
    let parent = PandaNode::new(&pipeline, "parent");
    let child = PandaNode::new(&pipeline, "child");

    parent.add_child(&child, 0);
    assert_eq!(parent.read_data(0).down.len(), 1);
    assert_eq!(parent.read_data(1).down.len(), 0);
    assert_consistent(&[&parent, &child]);

    pipeline.cycle();
    assert_eq!(parent.read_data(1).down.len(), 1);
    assert_eq!(parent.read_data(2).down.len(), 0);
    assert_consistent(&[&parent, &child]);

    pipeline.cycle();
    let _stage = enter_stage(2);
    assert_eq!(parent.get_num_children(), 1);
    assert_eq!(child.get_num_parents(), 1);
    assert_eq!(pipeline.cycle_count(), 2);
}

#[test]
fn test_edit_at_later_stage_also_edits_upstream() {
    let pipeline = Pipeline::new(2);
    let parent = PandaNode::new(&pipeline, "parent");
    let child = PandaNode::new(&pipeline, "child");
    {
        let _stage = enter_stage(1);
        parent.add_child(&child, 0);
        assert_eq!(parent.get_num_children(), 1);
    }
    assert_eq!(parent.get_num_children(), 1);
    assert_consistent(&[&parent, &child]);

    parent.remove_child(&child);
    assert_eq!(parent.read_data(0).down.len(), 0);
    assert_eq!(parent.read_data(1).down.len(), 1);
    assert_eq!(child.read_data(1).up.len(), 1);
    assert_consistent(&[&parent, &child]);

    pipeline.cycle();
    assert_consistent(&[&parent, &child]);
}

#[test]
fn test_stash_outside_base_stage_is_refused() {
    let pipeline = Pipeline::new(2);
    let parent = PandaNode::new(&pipeline, "parent");
    let child = PandaNode::new(&pipeline, "child");
    parent.add_child(&child, 0);

    let _stage = enter_stage(1);
    assert_eq!(parent.stash_child(0), Err(GraphError::NotBaseStage { stage: 1 }));
    assert_eq!(parent.unstash_child(0), Err(GraphError::NotBaseStage { stage: 1 }));
}

#[test]
fn test_cull_thread_reads_its_own_frame() {
    let pipeline = Pipeline::new(2);
    let root = PandaNode::new(&pipeline, "root");
    let barrier = Arc::new(Barrier::new(2));

    let cull = {
        let root = Arc::clone(&root);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            let _stage = enter_stage(1);
            let mut seen = Vec::new();
            for _ in 0..3 {
                barrier.wait();
                seen.push(root.get_num_children());
                barrier.wait();
            }
            seen
        })
    };

    let mut children = Vec::new();
    for frame in 0..3 {
        let child = PandaNode::new(&pipeline, format!("child{frame}"));
        root.add_child(&child, frame);
        children.push(child);
        pipeline.cycle();
        barrier.wait();
        // The cull thread reads stage 1 while this thread edits stage 0
        root.set_tag("frame", frame.to_string());
        barrier.wait();
    }

    let seen = cull.join().unwrap();
    assert_eq!(seen, [1, 2, 3]);
    root.remove_all_children();
}

#[test]
fn test_single_stage_cycle_is_a_no_op() {
    let pipeline = Pipeline::single_stage();
    let node = PandaNode::new(&pipeline, "n");
    node.set_tag("k", "v");
    pipeline.cycle();
    assert_eq!(node.get_tag("k").as_deref(), Some("v"));
    assert_eq!(pipeline.num_cyclers(), 1);
}
