pub mod gemini;
pub mod provider;
mod redact;
