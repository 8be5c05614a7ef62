pub mod block;
pub mod board;
pub mod entity;
pub mod rules;
