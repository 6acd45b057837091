pub mod check;
pub mod extract;
pub mod input;
pub mod json;
pub mod query;
pub mod transform;
pub mod validate;

#[cfg(test)]
mod json_tests;
