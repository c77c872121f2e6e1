pub mod id;
pub mod init;
pub mod list;
pub mod register;
pub mod scan;
pub mod template;
pub mod validate;
pub mod watch;
