//! Depot Server Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::manual_div_ceil)]
#![allow(clippy::new_without_default)]
#![allow(clippy::type_complexity)]
//!
//! HTTP serving plane of the depot NAS appliance.
//!
//! # Overview
//!
//! - **API**: REST surface for files, zones, uploads, share links and the
//!   admin trees; anonymous access under `/s/{token}`
//! - **Metadata Store**: single SQLite file (WAL) behind SQLx
//! - **Filesystem Gateway**: the only disk-touching layer, always behind
//!   the path resolver's envelope check
//! - **Background work**: expiry sweeps, upload GC, snapshot scheduling
//!
//! # Architecture
//!
//! Features are vertical slices (`features/<name>/{routes,commands,queries}`)
//! over shared infrastructure (`db`, `fsgate`, `uploads`, `auth`, `authz`,
//! `snapshots`). Write operations validate first, then touch the store or
//! the disk through one atomic step wherever the contract requires it.

pub mod api;
pub mod auth;
pub mod authz;
pub mod config;
pub mod db;
pub mod features;
pub mod fsgate;
pub mod maintenance;
pub mod middleware;
pub mod models;
pub mod snapshots;
pub mod state;
pub mod tls;
pub mod uploads;
