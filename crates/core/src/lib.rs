// Core types shared by every toolbelt toolset

pub mod env;
pub mod envelope;

pub use env::{parse_var, EnvError, EnvSource, MapEnv, ProcessEnv};
pub use envelope::{Envelope, Status};
