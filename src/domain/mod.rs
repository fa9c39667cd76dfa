pub mod blocks;
pub mod message;
pub mod ticket;
