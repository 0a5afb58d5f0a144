pub mod app;
pub mod cancel;
pub mod cli;
pub mod features;
pub mod generate;
pub mod llm;
pub mod prompts;
pub mod session;
pub mod text;
pub mod training;
pub mod utils;

#[cfg(test)]
pub mod test_utils;
