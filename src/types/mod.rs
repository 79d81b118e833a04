//! Core types for typed vector spaces, transformations and angles

pub mod angle;
pub mod spaces;
pub mod transforms;
