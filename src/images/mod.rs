pub mod cache;
pub mod compare;
pub mod element;
pub mod finder;
pub mod template;
