pub mod http;
pub mod response;
pub mod transport;
pub mod types;
