use common::ErrorLocation;

use std::io::Error as IoError;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum HandleError {
    #[error("Validation Error: {message} {location}")]
    Validation {
        message: String,
        location: ErrorLocation,
    },

    #[error("Already Started Error: server {server_id} can only be started once {location}")]
    AlreadyStarted {
        server_id: u64,
        location: ErrorLocation,
    },

    #[error("Not Started Error: server {server_id} was never started {location}")]
    NotStarted {
        server_id: u64,
        location: ErrorLocation,
    },

    #[error("Thread Spawn Error: {message} {location}")]
    ThreadSpawn {
        message: String,
        location: ErrorLocation,
        #[source]
        source: IoError,
    },

    #[error("Thread Join Error: {message} {location}")]
    ThreadJoin {
        message: String,
        location: ErrorLocation,
    },
}
