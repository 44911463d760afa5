pub mod core;
pub mod security;

pub use crate::core::*;
pub use security::{SecretAsker, mask_secret};
