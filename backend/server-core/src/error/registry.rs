use common::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum RegistryError {
    #[error("Already Active Error: server {active_id} holds the registry {location}")]
    AlreadyActive {
        active_id: u64,
        location: ErrorLocation,
    },

    #[error("No Active Server Error: {message} {location}")]
    NoActiveServer {
        message: String,
        location: ErrorLocation,
    },
}
