pub mod editor;
pub mod event;
pub mod map;
pub mod resolver;
pub mod save;
pub mod session;
