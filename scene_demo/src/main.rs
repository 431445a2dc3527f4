//! Pipelined scene graph demo
//!
//! An application thread edits the graph at stage 0 while a cull thread
//! walks the previous frame at stage 1. The two meet at a frame barrier,
//! where the application thread advances the pipeline.
//!
//! Usage: `pipeline_demo [config.toml|config.ron]`

use std::sync::{Arc, Barrier};
use std::thread;

use pgraph::bam::{read_stream, BamError, MemoryBamWriter};
use pgraph::config::ConfigError;
use pgraph::prelude::*;
use pgraph::scene::VolumeNode;
use rand::Rng;

const FRAMES: usize = 8;
const NUM_ROCKS: usize = 12;

#[derive(thiserror::Error, Debug)]
enum DemoError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),
    #[error("bam error: {0}")]
    Bam(#[from] BamError),
    #[error("cull thread panicked")]
    CullThread,
}

/// What the cull thread saw in one frame
#[derive(Debug, Clone, Copy)]
struct CullStats {
    frame: usize,
    visible_nodes: usize,
    net_collide_mask: CollideMask,
    radius: f32,
}

fn load_config() -> Result<GraphConfig, DemoError> {
    let config = match std::env::args().nth(1) {
        Some(path) => GraphConfig::load_validated(&path)?,
        None => GraphConfig::default().with_pipeline_stages(2),
    };
    config.validate().map_err(ConfigError::Invalid)?;
    Ok(config)
}

struct Scene {
    root: Arc<PandaNode>,
    field: NodePath,
    spare: NodePath,
    rocks: Vec<NodePath>,
}

fn build_scene(pipeline: &Arc<Pipeline>, rng: &mut impl Rng) -> Scene {
    let root = PandaNode::new(pipeline, "render");
    let render = NodePath::new(&root);
    let field = render.attach_new_node(&PandaNode::new(pipeline, "field"), 0);
    let spare = render.attach_new_node(&PandaNode::new(pipeline, "spare"), 1);

    let rocks = (0..NUM_ROCKS)
        .map(|i| {
            let radius = rng.gen_range(0.5..2.0);
            let kind = VolumeNode::new(BoundingVolume::sphere(Vec3::zeros(), radius));
            let rock = PandaNode::with_kind(pipeline, format!("rock{i}"), Box::new(kind));
            rock.set_into_collide_mask(CollideMask::bit(u32::try_from(i % 4).unwrap_or(0)));
            rock.set_transform(random_position(rng));
            let sort = i32::try_from(i).unwrap_or(i32::MAX);
            field.attach_new_node(&rock, sort)
        })
        .collect();

    Scene { root, field, spare, rocks }
}

fn random_position(rng: &mut impl Rng) -> Arc<TransformState> {
    TransformState::make_pos(Vec3::new(
        rng.gen_range(-50.0..50.0),
        rng.gen_range(-50.0..50.0),
        0.0,
    ))
}

fn count_visible(node: &PandaNode) -> usize {
    let children = node.get_children();
    1 + children.iter().map(|c| count_visible(c.child())).sum::<usize>()
}

fn cull(root: &PandaNode, frame: usize) -> CullStats {
    let bound = root.get_bound();
    let radius = match &*bound {
        BoundingVolume::Sphere(sphere) => sphere.radius,
        _ => 0.0,
    };
    CullStats {
        frame,
        visible_nodes: count_visible(root),
        net_collide_mask: root.get_net_collide_mask(),
        radius,
    }
}

fn run() -> Result<(), DemoError> {
    let config = load_config()?;
    let level = config.log_level.parse().unwrap_or(log::LevelFilter::Info);
    env_logger::Builder::from_default_env().filter_level(level).init();

    log::info!("Starting pipeline demo with {} stage(s)", config.num_pipeline_stages);
    let pipeline = Pipeline::from_config(&config);
    let mut rng = rand::thread_rng();
    let scene = build_scene(&pipeline, &mut rng);

    let cull_stage = pipeline.num_stages().saturating_sub(1).min(1);
    if cull_stage == 0 {
        log::warn!("Single-stage pipeline; the cull thread shares stage 0 with the application");
    }

    let barrier = Arc::new(Barrier::new(2));
    let cull_thread = {
        let root = Arc::clone(&scene.root);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            let _stage = enter_stage(cull_stage);
            let mut stats = Vec::with_capacity(FRAMES);
            for frame in 0..FRAMES {
                // Stay off the records while the pipeline cycles
                barrier.wait();
                barrier.wait();
                stats.push(cull(&root, frame));
            }
            stats
        })
    };

    for frame in 0..FRAMES {
        let index = rng.gen_range(0..scene.rocks.len());
        if let Some(rock) = scene.rocks[index].node() {
            rock.set_transform(random_position(&mut rng));
        }
        if let Some(field) = scene.field.node() {
            if frame % 3 == 1 && field.get_num_children() > 0 {
                field.stash_child(0)?;
            } else if frame % 3 == 2 && field.get_num_stashed() > 0 {
                field.unstash_child(0)?;
            }
        }
        if frame == FRAMES / 2 {
            scene.rocks[0].reparent_to(&scene.spare, 0)?;
            log::info!("Moved {} under {}", scene.rocks[0], scene.spare);
        }

        // Frame boundary: wait for cull to finish the previous frame, then publish this one
        barrier.wait();
        pipeline.cycle();
        barrier.wait();
    }

    let stats = cull_thread.join().map_err(|_| DemoError::CullThread)?;
    for s in &stats {
        log::info!(
            "frame {}: {} visible node(s), net collide mask {}, bound radius {:.1}",
            s.frame,
            s.visible_nodes,
            s.net_collide_mask,
            s.radius
        );
    }

    let root = &scene.root;
    let stream = MemoryBamWriter::new().write_root(root)?;
    let loaded = read_stream(&pipeline, &stream)?;
    log::info!(
        "Round-tripped {} node(s) through an in-memory stream; {} object(s) written",
        loaded.len(),
        stream.num_objects()
    );
    log::debug!("Scene:\n{}", root.ls());

    Ok(())
}

fn main() {
    if let Err(err) = run() {
        log::error!("Demo failed: {}", err);
        eprintln!("Demo failed: {err}");
        std::process::exit(1);
    }
}
