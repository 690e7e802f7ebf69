pub mod daemon;
pub mod runs;
pub mod status;
pub mod trigger;
