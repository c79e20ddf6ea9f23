mod client;
mod retry;
pub mod validators;

pub use client::{ApiResponse, DadosRioClient};
pub use retry::RetryPolicy;
