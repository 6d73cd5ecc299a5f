//! End-to-end tests exercising the public API as a caller would, as opposed
//! to the per-module unit tests colocated with each implementation file.

mod full_pipeline_tests;
