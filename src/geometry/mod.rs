pub mod path;

pub use path::{PathSegment, PathShape, SmoothPath};
