pub mod init_log;
pub mod profiling;
