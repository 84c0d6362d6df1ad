pub mod context;
pub mod crew;
pub mod fanout;
pub mod outlet;
pub mod pipeline;
pub mod workflow;
