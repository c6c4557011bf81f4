mod cli;
mod error;
mod logger;
mod supervisor;
