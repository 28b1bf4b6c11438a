pub mod definition;
pub mod runner;

pub use definition::{student_prompt, AgentDefinition, TUTOR_INSTRUCTION};
pub use runner::{AgentEvent, AgentRun, ModelOverrides, TutorRunner};
