//! Distributed computational graphs: nodes joined by directed, buffered
//! edges, tracked by relocatable registries.

pub mod buffer;
pub mod commons;
pub mod error;
pub mod frame;
pub mod graph;
#[doc(hidden)]
pub mod invariant_ppt;
pub mod link;
pub mod manager;
pub mod node;
pub mod port;
pub mod registry;

pub use buffer::{pull, push, Channel, Overwrite};
pub use error::{LinkError, RegistryError};
pub use frame::{Frame, FrameCell, Signal};
pub use graph::Graph;
pub use link::{Link, PullLink, PushLink};
pub use manager::LinkManager;
pub use node::{Node, Vertex};
pub use port::{InPort, OutPort, Port};
pub use registry::{Id, Index, IndexConfig, Member, Membership};
