mod handler;
mod model;

pub use handler::{add_reaction, create_find, delete_find, list_finds, remove_reaction};
