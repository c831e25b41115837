//! Background services

pub mod maintenance;
