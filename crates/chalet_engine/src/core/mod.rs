//! Core engine types shared by the renderer and the applications built on it

pub mod config;
