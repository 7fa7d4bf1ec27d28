pub mod analyze;
pub mod compare;
pub mod fetch;
pub mod init;
pub mod replay;
pub mod validate;
