//! Application layer: the session surface, stage controller, advancement
//! serializer, decision gateway and collaborator ports.

pub mod command_handlers;
pub mod controller;
pub mod gateway;
pub mod ports;
pub mod query_handlers;
pub mod serializer;
pub mod session;
