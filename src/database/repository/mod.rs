//! Repository module - decentralized data access layer.

mod greeting_repository;
mod verification_repository;

pub use greeting_repository::GreetingRepository;
pub use verification_repository::VerificationRepository;
