pub mod fixtures;
pub mod scanner_tests;
pub mod activation_tests;
pub mod loader_tests;
