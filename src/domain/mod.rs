pub mod feedback;
pub mod tag;
pub mod ticket;
