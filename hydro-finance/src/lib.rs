#![no_std]

mod dependencies;
mod hydro_finance;
mod traits;

pub use dependencies::*;
pub use hydro_finance::*;
pub use traits::*;
