//! # Host providers
//!
//! The runtime never touches the host directly. File access, subprocesses and
//! the AI chat client sit behind the traits in this module, so an embedding
//! application (or a test) can swap in its own implementation through
//! [`ScriptConfig`](crate::config::ScriptConfig).

pub mod agent;
pub mod fs;
pub mod process;

pub use agent::{AgentResponse, AiAgent, OpenAiCompatibleAgent};
pub use fs::{FileStat, FileSystem, LocalFileSystem};
pub use process::{LocalProcessLauncher, OutputLine, ProcessLauncher, ProcessOutput};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Process error: {0}")]
    Process(String),

    #[error("Agent error: {0}")]
    Agent(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<std::io::Error> for ProviderError {
    fn from(error: std::io::Error) -> Self {
        ProviderError::Io(error.to_string())
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;
