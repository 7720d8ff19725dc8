pub mod health;
pub mod images;
pub mod search;
pub mod stats;
pub mod upload;
