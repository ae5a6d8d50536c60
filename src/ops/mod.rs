pub mod countdown;
pub mod scan;
pub mod task_ops;
