pub mod asker;
pub mod mask;

pub use asker::SecretAsker;
pub use mask::mask_secret;
