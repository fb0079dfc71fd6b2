//! Cross-module scene graph tests
//!
//! Exercises the transform/bounding/culling contracts end to end, one
//! level above the per-module unit tests.

mod culling_integration;
