pub mod adapter;
pub mod document;
pub mod items;
pub mod pages;

pub use adapter::Adapter;
