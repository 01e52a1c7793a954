//! LLM Games: behavioral-economics experiments played by a local language model.
//!
//! This crate drives the games defined in `econ-games` with an LLM agent:
//! - Talks to an OpenAI-compatible inference server (vLLM, Ollama)
//! - Extracts actions from free-form replies, with retries and a fallback policy
//! - Runs repeated rounds through a small state machine
//! - Persists runs as JSON and CSV and analyzes them against human benchmarks

pub mod agent;
pub mod analysis;
pub mod inference;
pub mod parse;
pub mod prompt;
pub mod results;
pub mod runner;
