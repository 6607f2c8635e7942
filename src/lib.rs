// src/lib.rs

//! Waypoint is a hierarchical flow-coordination runtime: a tree of flow
//! units, each driving a segment of an application's navigable flow,
//! handing off to child units and receiving one typed completion result
//! per child over a [`channel::ResultChannel`]. An external
//! [`bridge::EventBridge`] lets distant code force a flow switch at the
//! root without holding a reference to the tree.

pub mod app;
pub mod bridge;
pub mod channel;
pub mod config;
pub mod flows;
pub mod logger;
pub mod registry;
pub mod root;
pub mod schema;
pub mod services;
pub mod surface;
pub mod unit;
