pub mod classification;
pub mod intake;
pub mod retry;
