//! # pharmahub-entity
//!
//! Domain entity models for the PharmaHub notification core. Every struct
//! in this crate is either a persisted record (notification, preferences),
//! a read-only record owned by an external collaborator (workspace,
//! subscription, plan), or a derived value object (workspace context).

pub mod notification;
pub mod presence;
pub mod user;
pub mod workspace;
