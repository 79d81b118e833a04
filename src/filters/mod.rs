//! Filters
//!
//! - [`sigma`]: augmented sigma points and unscented weights
//! - [`ukf::CtrvUkf`]: unscented predict/update on the CTRV state
//! - [`fusion::FusionFilter`]: measurement-driven lifecycle fusing the
//!   Cartesian and polar sensors

pub mod fusion;
pub mod sigma;
pub mod ukf;
