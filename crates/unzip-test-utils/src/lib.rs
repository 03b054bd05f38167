//! Utilities shared by unzip tests.
//!
//! Test doubles for the cache's collaborators ([`MemoryStorage`], [`MasterRepositoryMock`]),
//! zip fixtures, and environment variable guards.

pub mod env;
mod master;
mod storage;
mod zip_fixture;

use std::sync::{Mutex, MutexGuard};

pub use env::{env_lock, EnvVarGuard};
pub use master::MasterRepositoryMock;
pub use storage::{Fault, MemoryStorage};
pub use zip_fixture::{write_zip, zip_bytes, FIXTURE_MEMBER_MILLIS};

// A failed assertion on another test thread must not cascade into unrelated tests.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
