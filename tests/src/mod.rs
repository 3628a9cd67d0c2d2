#[cfg(test)]
pub mod relay_http_tests;
#[cfg(test)]
pub mod utils;
