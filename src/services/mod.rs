//! Domain services used by HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own business logic and persistence concerns so route
//! handlers can stay focused on protocol translation and auth plumbing.

pub mod account;
pub mod housekeeping;
pub mod mailer;
pub mod pagination;
pub mod picture;
pub mod queue;
pub mod reset;
pub mod session;
