pub mod shared;
pub mod urls;
