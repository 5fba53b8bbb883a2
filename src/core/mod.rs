// FILE: src/core/mod.rs
pub mod bouncer;
pub mod mount_table;
pub mod paths;
pub mod song;
pub mod song_io;
