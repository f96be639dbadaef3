mod client;
mod gateway;
mod usage;

// Public API of the generation subsystem.
pub use crate::error::GenerationError;
pub use client::{
    GenerationConfig, GenerationConfigError, GenerationRequest, GenerativeClient,
    HttpGenerativeClient,
};
pub use gateway::{GenerationGateway, GenerationLimits};
pub use usage::{GenerationUsageService, QuotaStatus};
