#![forbid(unsafe_code)]

pub mod centers;
pub mod error;
pub mod frame;
pub mod topology;
pub mod trajectory;

pub use centers::{center_of_coords, distance, radius_of_gyration, rms_deviation};
pub use error::{TrajError, TrajResult};
pub use frame::{resolve_range, Box3, Frame, FrameView, FrameViewMut};
pub use topology::{AtomTable, Residue, Topology, TopologyBuilder};
pub use trajectory::Trajectory;
