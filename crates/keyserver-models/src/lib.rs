//! Shared domain types for the federation puller and export-file mirror.
//!
//! This crate holds no I/O. Every type here is a plain data shape shared by
//! `keyserver-db`, `keyserver-core`, `keyserver-federation`, and
//! `keyserver-mirror` so that none of them have to depend on each other for
//! the wire/row shapes they pass back and forth.

mod exposure;
mod federation_query;
mod federation_sync;
mod fetch;
mod mirror;
mod reconcile;

pub use exposure::{Exposure, ExposureKey, ReportType, ReportTypeTag};
pub use federation_query::FederationQuery;
pub use federation_sync::FederationSync;
pub use fetch::{Cursor, FetchRequest, FetchResponse, FetchState};
pub use mirror::{Mirror, MirrorFile};
pub use reconcile::Action;
