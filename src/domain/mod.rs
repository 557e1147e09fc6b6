// Domain module: Business logic and models

pub mod candidate;
pub mod constraints;
pub mod errors;
pub mod problem;
pub mod solution;
pub mod value_objects;

pub use candidate::*;
pub use constraints::*;
pub use errors::*;
pub use problem::*;
pub use solution::*;
pub use value_objects::*;
