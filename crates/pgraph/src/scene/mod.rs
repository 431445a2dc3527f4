//! # Scene graph
//!
//! Nodes, the edges between them and the path components naming routes
//! through them.

pub mod connection;
pub mod masks;
pub mod node_data;
pub mod node_kind;
pub mod panda_node;
pub mod node_path_component;
pub mod node_path;
mod children;

#[cfg(test)]
mod tests;

pub use connection::{DownConnection, DownList, UpConnection, UpList};
pub use masks::{CollideMask, DrawMask};
pub use node_data::NodeData;
pub use node_kind::{NodeKind, PlainNode, VolumeNode, PLAIN_NODE_TYPE};
pub use node_path::NodePath;
pub use node_path_component::NodePathComponent;
pub use panda_node::{Children, PandaNode, Parents};
