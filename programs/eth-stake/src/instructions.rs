#![allow(ambiguous_glob_reexports)]

pub mod reward_math;
pub mod initialize;
pub mod deposit;
pub mod withdraw;
pub mod payout;

pub use reward_math::*;
pub use initialize::*;
pub use deposit::*;
pub use withdraw::*;
pub use payout::*;
