// bim-domain library entry point
pub mod error;
pub mod geometry;
pub mod program;
pub use error::DomainError;
pub use geometry::Point2;
pub use program::{BuildProgram, BuildingType, RoomSpec};
