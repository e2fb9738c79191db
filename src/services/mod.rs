pub mod db;
pub mod stripe;
pub mod teemill;

pub use db::*;
pub use stripe::*;
pub use teemill::*;
