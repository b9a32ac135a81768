//! Data loading
//!
//! Readers turn files into [`Instances`](crate::core::Instances) with a
//! nominal class.

pub mod libsvm;

pub use self::libsvm::*;
