// handlers/mod.rs
//
// general  - welcome, health and the `/api?type=` listing
// resource - generic CRUD handlers, instantiated once per catalog resource
pub mod general;
pub mod resource;
