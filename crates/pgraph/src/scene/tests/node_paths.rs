use std::sync::Arc;

use super::{assert_consistent, init_logging};
use crate::error::GraphError;
use crate::pipeline::Pipeline;
use crate::scene::{NodePath, PandaNode};

#[test]
fn test_attach_builds_path_lengths() {
    let pipeline = Pipeline::single_stage();
    let render = NodePath::new(&PandaNode::new(&pipeline, "render"));
    let model = render.attach_new_node(&PandaNode::new(&pipeline, "model"), 0);
    let part = model.attach_new_node(&PandaNode::new(&pipeline, "part"), 0);

    assert_eq!(render.get_num_nodes(), 1);
    assert_eq!(part.get_num_nodes(), 3);
    assert_eq!(part.to_string(), "/render/model/part");
    assert_eq!(part.get_parent().to_string(), "/render/model");
    assert_eq!(part.get_top().to_string(), "/render");
    assert!(render.component().unwrap().is_top_node());
    assert_eq!(NodePath::empty().to_string(), "**empty**");
}

#[test]
fn test_reparent_fixes_descendant_lengths() {
    let pipeline = Pipeline::single_stage();
    let a = NodePath::new(&PandaNode::new(&pipeline, "A"));
    let b = a.attach_new_node(&PandaNode::new(&pipeline, "B"), 0);
    let c = b.attach_new_node(&PandaNode::new(&pipeline, "C"), 0);
    let e = NodePath::new(&PandaNode::new(&pipeline, "E"));
    let d = e.attach_new_node(&PandaNode::new(&pipeline, "D"), 0);
    assert_eq!(c.get_num_nodes(), 3);

    b.reparent_to(&d, 0).unwrap();
    assert_eq!(c.get_num_nodes(), 4);
    assert_eq!(c.to_string(), "/E/D/B/C");
    assert_eq!(a.node().unwrap().get_num_children(), 0);
    assert_eq!(b.node().unwrap().get_num_parents(), 1);

    let nodes: Vec<_> = [&a, &b, &c, &d, &e].iter().map(|np| Arc::clone(np.node().unwrap())).collect();
    let refs: Vec<_> = nodes.iter().collect();
    assert_consistent(&refs);
}

#[test]
fn test_detach_makes_path_top_level() {
    let pipeline = Pipeline::single_stage();
    let root = NodePath::new(&PandaNode::new(&pipeline, "root"));
    let child = root.attach_new_node(&PandaNode::new(&pipeline, "child"), 0);
    let leaf = child.attach_new_node(&PandaNode::new(&pipeline, "leaf"), 0);

    child.detach_node();
    assert!(child.component().unwrap().is_top_node());
    assert_eq!(child.get_num_nodes(), 1);
    assert_eq!(leaf.get_num_nodes(), 2);
    assert_eq!(leaf.to_string(), "/child/leaf");
    assert_eq!(root.node().unwrap().get_num_children(), 0);

    // Detaching a top-level path is a no-op at the handle level
    child.detach_node();
    assert_eq!(child.get_num_nodes(), 1);
}

#[test]
#[should_panic(expected = "can't detach top-level path component")]
fn test_detaching_top_component_panics() {
    let pipeline = Pipeline::single_stage();
    let np = NodePath::new(&PandaNode::new(&pipeline, "alone"));
    PandaNode::detach(np.component().unwrap());
}

#[test]
fn test_reparent_refuses_duplicate_instance() {
    let pipeline = Pipeline::new(2);
    let parent_node = PandaNode::new(&pipeline, "P");
    let child_node = PandaNode::new(&pipeline, "C");
    let parent = NodePath::new(&parent_node);
    let child = parent.attach_new_node(&child_node, 3);

    let other = NodePath::new(&child_node);
    let result = other.reparent_to(&parent, 0);
    assert_eq!(
        result,
        Err(GraphError::DuplicateInstance {
            child: "PandaNode C".to_string(),
            parent: "PandaNode P".to_string(),
        })
    );
    assert_eq!(parent_node.get_num_children(), 1);
    assert_eq!(parent_node.get_child_sort(0), Some(3));
    assert_eq!(child_node.get_num_parents(), 1);
    assert!(other.component().unwrap().is_top_node());
    assert_eq!(child.get_num_nodes(), 2);
    assert_consistent(&[&parent_node, &child_node]);
}

#[test]
fn test_reparent_to_same_parent_resorts() {
    let pipeline = Pipeline::single_stage();
    let parent = NodePath::new(&PandaNode::new(&pipeline, "P"));
    let first = parent.attach_new_node(&PandaNode::new(&pipeline, "first"), 0);
    let second = parent.attach_new_node(&PandaNode::new(&pipeline, "second"), 1);

    first.reparent_to(&parent, 5).unwrap();
    let parent_node = parent.node().unwrap();
    assert_eq!(parent_node.get_child(0).unwrap().name(), "second");
    assert_eq!(parent_node.get_child_sort(1), Some(5));
    assert_eq!(first.get_num_nodes(), 2);
    assert_eq!(second.get_num_nodes(), 2);
}

#[test]
fn test_stash_to_adds_stashed_edge() {
    let pipeline = Pipeline::single_stage();
    let parent = NodePath::new(&PandaNode::new(&pipeline, "P"));
    let loose = NodePath::new(&PandaNode::new(&pipeline, "L"));
    loose.stash_to(&parent, 2).unwrap();

    let parent_node = parent.node().unwrap();
    assert_eq!(parent_node.get_num_children(), 0);
    assert_eq!(parent_node.get_num_stashed(), 1);
    assert_eq!(loose.to_string(), "/P/L");
}

#[test]
fn test_instance_to_creates_second_path() {
    init_logging();
    let pipeline = Pipeline::single_stage();
    let left = NodePath::new(&PandaNode::new(&pipeline, "left"));
    let right = NodePath::new(&PandaNode::new(&pipeline, "right"));
    let shared = left.attach_new_node(&PandaNode::new(&pipeline, "shared"), 0);

    let instance = shared.instance_to(&right, 0).unwrap();
    let shared_node = shared.node().unwrap();
    assert!(Arc::ptr_eq(shared_node, instance.node().unwrap()));
    assert_eq!(shared_node.get_num_parents(), 2);
    assert_eq!(shared.to_string(), "/left/shared");
    assert_eq!(instance.to_string(), "/right/shared");
    assert!(shared_node.get_num_paths() >= 2);

    assert!(shared.instance_to(&right, 0).is_err());
}

#[test]
fn test_generic_component_picks_first_parent() {
    init_logging();
    let pipeline = Pipeline::single_stage();
    let p = PandaNode::new(&pipeline, "p");
    let q = PandaNode::new(&pipeline, "q");
    let shared = PandaNode::new(&pipeline, "shared");
    p.add_child(&shared, 0);
    q.add_child(&shared, 0);

    let first = NodePath::any_path(&shared);
    let again = NodePath::any_path(&shared);
    assert_eq!(first.get_num_nodes(), 2);
    assert_eq!(first.to_string(), again.to_string());
    let via = first.get_parent();
    assert!(Arc::ptr_eq(via.node().unwrap(), &shared.get_parent(0).unwrap()));
}

#[test]
fn test_component_drop_forgets_path() {
    let pipeline = Pipeline::single_stage();
    let node = PandaNode::new(&pipeline, "n");
    let np = NodePath::new(&node);
    assert_eq!(node.get_num_paths(), 1);
    drop(np);
    assert_eq!(node.get_num_paths(), 0);
    assert!(node.read_data(0).paths.is_empty());
}

#[test]
fn test_add_child_hangs_top_paths_below_parent() {
    let pipeline = Pipeline::single_stage();
    let parent = PandaNode::new(&pipeline, "parent");
    let child = PandaNode::new(&pipeline, "child");
    let child_path = NodePath::new(&child);
    let _parent_path = NodePath::new(&parent);

    parent.add_child(&child, 0);
    assert_eq!(child_path.get_num_nodes(), 2);
    assert_eq!(child_path.to_string(), "/parent/child");

    parent.remove_child(&child);
    assert_eq!(child_path.get_num_nodes(), 1);
}

#[test]
fn test_replace_child_severs_old_paths() {
    let pipeline = Pipeline::single_stage();
    let root = NodePath::new(&PandaNode::new(&pipeline, "root"));
    let old = root.attach_new_node(&PandaNode::new(&pipeline, "old"), 0);
    let replacement = PandaNode::new(&pipeline, "new");

    assert!(root.node().unwrap().replace_child(old.node().unwrap(), &replacement));
    assert!(old.component().unwrap().is_top_node());
    assert_eq!(old.get_num_nodes(), 1);
    assert_eq!(NodePath::any_path(&replacement).to_string(), "/root/new");
}
