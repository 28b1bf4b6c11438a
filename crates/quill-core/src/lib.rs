pub mod agent;
pub mod memory;
pub mod tools;

// Re-export key types
pub use agent::{AgentDefinition, AgentEvent, AgentRun, TutorRunner};
pub use memory::{MemoryBackend, MemoryError, StudentMemory, SupermemoryClient};
pub use tools::{StudentTools, ToolOutcome, ToolRegistry};
