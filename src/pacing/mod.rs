pub mod governor;

pub use governor::{Admission, DomainSnapshot, PacingGovernor, PacingPolicy};
