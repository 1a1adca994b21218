//! Analytics worker: job/result lifecycle and result descriptor merging
//! against a shared job store.

pub mod config;
pub mod error;
pub mod events;
pub mod model;
pub mod store;
pub mod worker;
