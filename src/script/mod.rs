pub mod generator;
pub mod validator;

pub use generator::{generate_script, ScriptContext};
pub use validator::{check_for_placeholders, validate_script, TopicLexicon, ValidationReport};
