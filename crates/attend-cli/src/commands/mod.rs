pub mod clock;
pub mod common;
pub mod config;
pub mod roster;
pub mod run;
pub mod sync;
