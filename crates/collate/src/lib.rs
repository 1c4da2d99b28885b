//! Batch shape primitives and method memoization for the data-loading
//! pipeline.
//!
//! Collated data reaches the loader in one of a handful of physical layouts:
//! a dense tensor whose leading axis indexes samples, a sequence of text
//! scalars, a plain vector of per-sample scalars, an ordered group of
//! per-component blocks, or a mapping from field name to a per-field batch.
//! [`Batch`] names those layouts explicitly so that measuring, slicing, and
//! merging dispatch by pattern matching rather than by probing values at
//! runtime.
//!
//! [`MethodCache`] caches the results of pure methods per receiver and
//! argument, and [`Bound`] is the callable produced by binding such a method
//! to one receiver. Both components are independent; neither performs I/O.

pub mod batch;
pub mod errors;
pub mod memo;

pub use batch::{merge, merge_with, Batch};
pub use errors::{CollateError, Result};
pub use memo::{Bound, Callable, InstanceId, MethodCache};
