pub mod health;
pub mod streams;
pub mod xtream;
