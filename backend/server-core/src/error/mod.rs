pub mod config;
pub mod handle;
pub mod native;
pub mod registry;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Handle(#[from] handle::HandleError),

    #[error(transparent)]
    Registry(#[from] registry::RegistryError),

    #[error(transparent)]
    Native(#[from] native::NativeError),

    #[error(transparent)]
    Config(#[from] config::ConfigError),
}
