mod handler;
mod model;

pub use handler::{
    create_have_item,
    delete_have_item,
    get_counts,
    list_have_items,
    release_item,
    reserve_item,
};
