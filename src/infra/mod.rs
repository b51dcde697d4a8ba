pub mod firestore;
pub mod huggingface;
pub mod memory;

#[cfg(test)]
pub mod fake;
