//! Integration tests for the DocScope plugin system.

mod builtin_test;
mod concurrency_test;
mod dependency_test;
mod dispatch_test;
mod helpers;
mod lifecycle_test;
