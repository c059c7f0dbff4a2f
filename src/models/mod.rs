pub mod entities;
pub mod event;
pub mod health;
pub mod notification;
pub mod template;
pub mod validation;
