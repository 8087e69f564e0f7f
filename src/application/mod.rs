//! Application services and the repository seams they depend on.

pub mod inventory;
pub mod pricing;
pub mod repos;
