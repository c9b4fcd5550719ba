pub mod extraction;
pub mod generation;
pub mod health;
pub mod quiz;
