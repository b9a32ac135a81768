//! SVM solver implementations
//!
//! The binary solver is Platt's Sequential Minimal Optimization with the
//! two-threshold refinement of Keerthi et al.; `index_set` holds the index
//! bookkeeping it relies on.

pub mod index_set;
pub mod smo;

pub use self::index_set::*;
pub use self::smo::*;
