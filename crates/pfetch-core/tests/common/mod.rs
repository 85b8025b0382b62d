#![allow(dead_code)]

pub mod fetchers;
pub mod item_server;
