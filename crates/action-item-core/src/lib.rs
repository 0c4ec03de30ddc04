pub mod action;
pub mod action_item;
pub mod action_type;
pub mod audit;
pub mod config;
pub mod db;
pub mod definition;
pub mod error;
pub mod events;
pub mod io;
pub mod notification;
pub mod paths;
pub mod reference;
pub mod registry;
pub mod types;
pub mod workflow;

pub use error::{ActionError, Result};
