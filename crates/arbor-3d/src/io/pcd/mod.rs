mod parser;
mod writer;

pub use parser::{read_pcd, PcdError};
pub use writer::{write_pcd_ascii, write_pcd_binary};
