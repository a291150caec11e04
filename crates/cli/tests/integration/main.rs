//! CLI integration tests against fake `aws` and `cdk` executables.

#![cfg(unix)]

mod deploy_tests;
mod destroy_tests;
mod signal_tests;
