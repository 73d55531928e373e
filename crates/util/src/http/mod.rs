//! URL and path helpers.

pub mod http_path_resolution;

pub use http_path_resolution::*;
