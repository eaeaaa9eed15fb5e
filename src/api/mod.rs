pub mod email;
pub mod payments;
