// Library interface for newsrewrite modules
// This allows tests and other binaries to import modules

pub mod auth;
pub mod cms;
pub mod error;
pub mod llm;
pub mod rewrite;
pub mod server;
