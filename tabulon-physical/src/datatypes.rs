//! This module collects functionality specific to the supported element types.

/// Module for defining [ElementType]
pub mod element_type;
pub use element_type::ElementType;
/// Module for defining [FixedWidth] and [Primitive]
pub mod fixed_width;
pub use fixed_width::{FixedWidth, Primitive};
/// Module for defining [VarWidth]
pub mod var_width;
pub use var_width::VarWidth;
/// Module for defining [Composite], [Id128] and [Instant]
pub mod composite;
pub use composite::{Composite, Id128, Instant};
