// ABOUTME: Generative model integration for assembly guidance
// ABOUTME: Gemini client, prompt building, reply decoding and the assembly assistant

pub mod analysis;
pub mod assistant;
pub mod decode;
pub mod prompts;
pub mod service;

pub use analysis::{AssemblyAnalysis, PartsIdentification, StepInstructions, VoiceAnswer};
pub use assistant::{Analyzed, AssemblyAssistant};
pub use decode::{strip_code_fences, Decoded};
pub use prompts::build_context;
pub use service::{
    AIResponse, AIServiceError, AIServiceResult, GeminiService, GenerativeModel, InlineImage,
    ModelRequest, Usage,
};
