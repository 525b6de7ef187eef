pub mod diff;
pub mod init;
pub mod publish;
pub mod site;
pub mod status;
pub mod target;
