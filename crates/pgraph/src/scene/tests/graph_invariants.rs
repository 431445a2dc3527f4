use std::sync::Arc;

use super::{assert_consistent, child_names, init_logging, stashed_names};
use crate::error::GraphError;
use crate::pipeline::Pipeline;
use crate::scene::connection::UpConnection;
use crate::scene::{CollideMask, PandaNode, VolumeNode};
use crate::bounds::BoundingVolume;
use crate::foundation::math::Vec3;

#[test]
fn test_children_sorted_lower_first() {
    let pipeline = Pipeline::single_stage();
    let root = PandaNode::new(&pipeline, "R");
    let a = PandaNode::new(&pipeline, "A");
    let b = PandaNode::new(&pipeline, "B");
    let c = PandaNode::new(&pipeline, "C");

    root.add_child(&a, 0);
    root.add_child(&b, -1);
    root.add_child(&c, 0);
    assert_eq!(child_names(&root), ["B", "A", "C"]);
    assert_eq!(root.get_child_sort(0), Some(-1));
    assert_eq!(root.find_child(&c), Some(2));
    assert_consistent(&[&root, &a, &b, &c]);
}

#[test]
fn test_readding_moves_instead_of_duplicating() {
    let pipeline = Pipeline::new(2);
    let parent = PandaNode::new(&pipeline, "P");
    let child = PandaNode::new(&pipeline, "C");

    parent.add_child(&child, 5);
    parent.add_child(&child, 1);
    assert_eq!(parent.get_num_children(), 1);
    assert_eq!(parent.get_child_sort(0), Some(1));
    assert_eq!(child.get_num_parents(), 1);

    parent.add_stashed(&child, 2);
    assert_eq!(parent.get_num_children(), 0);
    assert_eq!(parent.get_num_stashed(), 1);
    assert_consistent(&[&parent, &child]);
}

#[test]
fn test_end_to_end_collide_masks_and_stash() {
    let pipeline = Pipeline::single_stage();
    let r = PandaNode::new(&pipeline, "R");
    let a = PandaNode::new(&pipeline, "A");
    let b = PandaNode::new(&pipeline, "B");

    r.add_child(&a, 0);
    r.add_child(&b, -1);
    assert_eq!(child_names(&r), ["B", "A"]);

    r.set_into_collide_mask(CollideMask::from_bits_retain(0x1));
    a.set_into_collide_mask(CollideMask::from_bits_retain(0x2));
    assert_eq!(r.get_net_collide_mask().bits(), 0x3);

    b.set_into_collide_mask(CollideMask::from_bits_retain(0x4));
    assert_eq!(r.get_net_collide_mask().bits(), 0x7);

    r.stash_child(0).unwrap();
    assert_eq!(child_names(&r), ["A"]);
    assert_eq!(stashed_names(&r), ["B"]);
    assert_eq!(r.get_net_collide_mask().bits(), 0x3);
    assert_consistent(&[&r, &a, &b]);
}

#[test]
fn test_stash_unstash_round_trip_keeps_sort() {
    let pipeline = Pipeline::single_stage();
    let p = PandaNode::new(&pipeline, "P");
    let c = PandaNode::new(&pipeline, "C");
    let d = PandaNode::new(&pipeline, "D");
    p.add_child(&c, 7);
    p.add_child(&d, 3);
    c.set_into_collide_mask(CollideMask::bit(5));

    let index = p.find_child(&c).unwrap();
    p.stash_child(index).unwrap();
    assert!(!p.get_net_collide_mask().contains(CollideMask::bit(5)));
    assert_eq!(c.get_num_parents(), 1);

    let stashed_index = p.find_stashed(&c).unwrap();
    assert_eq!(p.get_stashed_sort(stashed_index), Some(7));
    p.unstash_child(stashed_index).unwrap();
    assert_eq!(child_names(&p), ["D", "C"]);
    assert_eq!(p.get_child_sort(1), Some(7));
    assert!(p.get_net_collide_mask().contains(CollideMask::bit(5)));
    assert_consistent(&[&p, &c, &d]);
}

#[test]
fn test_stash_index_out_of_range() {
    let pipeline = Pipeline::single_stage();
    let p = PandaNode::new(&pipeline, "P");
    assert_eq!(p.stash_child(0), Err(GraphError::ChildIndexOutOfRange { index: 0, len: 0 }));
    assert_eq!(p.unstash_child(3), Err(GraphError::ChildIndexOutOfRange { index: 3, len: 0 }));
}

#[test]
fn test_remove_child_from_either_list() {
    let pipeline = Pipeline::single_stage();
    let p = PandaNode::new(&pipeline, "P");
    let c = PandaNode::new(&pipeline, "C");
    let s = PandaNode::new(&pipeline, "S");
    p.add_child(&c, 0);
    p.add_stashed(&s, 0);

    assert!(p.remove_child(&s));
    assert!(!p.remove_child(&s));
    assert!(p.remove_child_at(0));
    assert!(!p.remove_child_at(0));
    assert_eq!(c.get_num_parents(), 0);
    assert_consistent(&[&p, &c, &s]);
}

#[test]
fn test_replace_child_keeps_position_and_sort() {
    let pipeline = Pipeline::new(2);
    let p = PandaNode::new(&pipeline, "P");
    let a = PandaNode::new(&pipeline, "A");
    let b = PandaNode::new(&pipeline, "B");
    let n = PandaNode::new(&pipeline, "N");
    p.add_child(&a, 1);
    p.add_child(&b, 2);

    assert!(p.replace_child(&a, &n));
    assert_eq!(child_names(&p), ["N", "B"]);
    assert_eq!(p.get_child_sort(0), Some(1));
    assert_eq!(a.get_num_parents(), 0);
    assert_eq!(n.get_num_parents(), 1);
    assert!(!p.replace_child(&a, &n));
    assert_consistent(&[&p, &a, &b, &n]);
}

#[test]
fn test_replace_with_existing_child_does_not_duplicate() {
    let pipeline = Pipeline::single_stage();
    let p = PandaNode::new(&pipeline, "P");
    let a = PandaNode::new(&pipeline, "A");
    let b = PandaNode::new(&pipeline, "B");
    p.add_child(&a, 0);
    p.add_child(&b, 1);

    assert!(p.replace_child(&a, &b));
    assert_eq!(child_names(&p), ["B"]);
    assert_eq!(b.get_num_parents(), 1);
    assert_consistent(&[&p, &a, &b]);
}

#[test]
fn test_remove_all_and_steal_children() {
    let pipeline = Pipeline::single_stage();
    let from = PandaNode::new(&pipeline, "from");
    let to = PandaNode::new(&pipeline, "to");
    let a = PandaNode::new(&pipeline, "a");
    let b = PandaNode::new(&pipeline, "b");
    from.add_child(&a, 4);
    from.add_stashed(&b, 2);

    to.steal_children(&from);
    assert_eq!(from.get_num_children() + from.get_num_stashed(), 0);
    assert_eq!(child_names(&to), ["a"]);
    assert_eq!(stashed_names(&to), ["b"]);
    assert_eq!(to.get_child_sort(0), Some(4));

    to.remove_all_children();
    assert_eq!(a.get_num_parents() + b.get_num_parents(), 0);
    assert_consistent(&[&from, &to, &a, &b]);
}

#[test]
fn test_copy_children_instances() {
    let pipeline = Pipeline::single_stage();
    let from = PandaNode::new(&pipeline, "from");
    let to = PandaNode::new(&pipeline, "to");
    let a = PandaNode::new(&pipeline, "a");
    from.add_child(&a, 0);

    to.copy_children(&from);
    assert_eq!(a.get_num_parents(), 2);
    assert_consistent(&[&from, &to, &a]);
}

#[test]
fn test_copy_subgraph_preserves_internal_instancing() {
    let pipeline = Pipeline::single_stage();
    let root = PandaNode::new(&pipeline, "root");
    let a = PandaNode::new(&pipeline, "a");
    let b = PandaNode::new(&pipeline, "b");
    let shared = PandaNode::with_kind(
        &pipeline,
        "shared",
        Box::new(VolumeNode::new(BoundingVolume::sphere(Vec3::zeros(), 1.0))),
    );
    root.add_child(&a, 0);
    root.add_child(&b, 0);
    a.add_child(&shared, 0);
    b.add_child(&shared, 0);
    root.set_tag("level", "one");

    let copy = root.copy_subgraph();
    assert_eq!(copy.get_tag("level").as_deref(), Some("one"));
    assert_eq!(child_names(&copy), ["a", "b"]);

    let copy_a = copy.get_child(0).unwrap();
    let copy_b = copy.get_child(1).unwrap();
    let copy_shared = copy_a.get_child(0).unwrap();
    assert!(Arc::ptr_eq(&copy_shared, &copy_b.get_child(0).unwrap()));
    assert!(!Arc::ptr_eq(&copy_shared, &shared));
    assert_eq!(copy_shared.type_name(), "VolumeNode");
    assert_eq!(copy_shared.get_num_parents(), 2);
}

#[test]
fn test_make_copy_has_no_edges() {
    let pipeline = Pipeline::single_stage();
    let p = PandaNode::new(&pipeline, "p");
    let c = PandaNode::new(&pipeline, "c");
    p.add_child(&c, 0);
    p.set_into_collide_mask(CollideMask::bit(3));

    let copy = p.make_copy();
    assert_eq!(copy.name(), "p");
    assert_eq!(copy.get_num_children(), 0);
    assert_eq!(copy.get_into_collide_mask(), CollideMask::bit(3));
}

#[test]
fn test_combine_with_prefers_specialised_kind() {
    let pipeline = Pipeline::single_stage();
    let plain = PandaNode::new(&pipeline, "plain");
    let other = PandaNode::new(&pipeline, "other");
    let volume = PandaNode::with_kind(&pipeline, "v", Box::new(VolumeNode::new(BoundingVolume::Empty)));
    let volume2 = PandaNode::with_kind(&pipeline, "w", Box::new(VolumeNode::new(BoundingVolume::Empty)));

    assert!(Arc::ptr_eq(&plain.combine_with(&volume).unwrap(), &volume));
    assert!(Arc::ptr_eq(&volume.combine_with(&plain).unwrap(), &volume));
    assert!(Arc::ptr_eq(&plain.combine_with(&other).unwrap(), &other));
    assert!(volume.combine_with(&volume2).is_none());
}

#[test]
fn test_ls_lists_visible_subtree() {
    let pipeline = Pipeline::single_stage();
    let root = PandaNode::new(&pipeline, "root");
    let a = PandaNode::new(&pipeline, "a");
    let hidden = PandaNode::new(&pipeline, "hidden");
    root.add_child(&a, 0);
    root.add_stashed(&hidden, 0);
    a.set_tag("pickable", "1");

    let listing = root.ls();
    assert!(listing.starts_with("PandaNode root\n  PandaNode a [pickable]\n"), "{listing}");
    assert!(listing.contains("(1 stashed)"));
    assert!(!listing.contains("hidden"));
}

#[test]
fn test_verify_detached_reports_dangling_parent() {
    init_logging();
    let pipeline = Pipeline::new(2);
    let p = PandaNode::new(&pipeline, "P");
    let orphan = PandaNode::new(&pipeline, "orphan");
    assert_eq!(orphan.verify_detached(), Ok(()));

    orphan.write_stage(1).up.insert(UpConnection::new(&p));
    assert!(matches!(
        orphan.verify_detached(),
        Err(GraphError::StillParented { stage: 1, parents: 1, .. })
    ));

    orphan.write_stage(1).up.clear();
    assert_eq!(orphan.verify_detached(), Ok(()));
}

#[cfg(debug_assertions)]
#[test]
#[should_panic(expected = "still has 1 parent(s)")]
fn test_dropping_parented_node_is_caught() {
    let pipeline = Pipeline::single_stage();
    let p = PandaNode::new(&pipeline, "P");
    let orphan = PandaNode::new(&pipeline, "orphan");
    orphan.write_stage(0).up.insert(UpConnection::new(&p));
    drop(orphan);
}

#[test]
#[should_panic(expected = "as a child of itself")]
fn test_self_parenting_panics() {
    let pipeline = Pipeline::single_stage();
    let p = PandaNode::new(&pipeline, "P");
    p.add_child(&p, 0);
}
