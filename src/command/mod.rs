mod docs;
mod fetch;

pub use docs::{doc_delete, doc_get, doc_list, doc_set};
pub use fetch::fetch;
