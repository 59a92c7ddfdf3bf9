pub mod logging;
pub mod smtp;
