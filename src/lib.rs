//! A single-board kanban tracker.
//!
//! The core ([`store`], [`ordering`], [`drag`], [`sync`], tied together by
//! [`board::Board`]) keeps an ordered copy of the board and reconciles it with
//! whatever implements [`api::TaskApi`]: a SQLite file directly
//! ([`api::LocalApi`]) or a `workplan serve` instance ([`client::HttpApi`]).
//! Calls to it run on a [`worker`] thread so the board never waits on them.

pub mod api;
pub mod board;
pub mod bulk;
pub mod client;
pub mod config;
pub mod db;
pub mod drag;
pub mod error;
pub mod model;
pub mod ops;
pub mod ordering;
pub mod output;
pub mod paths;
pub mod server;
pub mod store;
pub mod sync;
pub mod transfer;
pub mod tui;
pub mod watch;
pub mod worker;
