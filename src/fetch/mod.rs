pub mod loader;
pub mod prefetch;
