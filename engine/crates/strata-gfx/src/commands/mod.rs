pub mod barrier;
pub mod command_list;
pub mod command_pool;
pub mod semaphore;
pub mod submit_info;
