pub mod keyring;

pub use keyring::KeyringManager;
