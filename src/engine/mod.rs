pub mod assignment;
pub mod pool;
pub mod scheduler;
pub mod search;
