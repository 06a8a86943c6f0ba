use std::path::PathBuf;

pub struct FetchArgs {
    /// Request body file, `-` for stdin.
    pub request: PathBuf,
}

pub struct DocGetArgs {
    pub collection: String,
    pub key: String,
}

pub struct DocSetArgs {
    pub collection: String,
    pub key: String,
    pub value: String,
}

pub struct DocListArgs {
    pub collection: String,
}

pub struct DocDeleteArgs {
    pub collection: String,
    pub key: String,
}
