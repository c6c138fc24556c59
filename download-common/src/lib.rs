pub mod classifier;
pub mod error;
pub mod messages;
pub mod record;
pub mod request;
pub mod resolver;
pub mod sink;
