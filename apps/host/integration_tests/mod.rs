mod helpers;
mod supervisor;
