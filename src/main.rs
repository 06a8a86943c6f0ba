mod argsets;
mod command;

use anyhow::{anyhow, Result};
use env_logger::Env;

use data_connector::constants::{defaults, envvars};
use data_connector::helpers::load_dotenv;

const CMD_FETCH: &str = "fetch";
const CMD_DOC_GET: &str = "doc-get";
const CMD_DOC_SET: &str = "doc-set";
const CMD_DOC_LIST: &str = "doc-list";
const CMD_DOC_DELETE: &str = "doc-delete";

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();
    env_logger::Builder::from_env(Env::default().filter_or(envvars::LOG_LEVEL, defaults::LOG_LEVEL))
        .init();

    let mut args = pico_args::Arguments::from_env();
    match args.subcommand()?.as_deref() {
        Some(CMD_FETCH) => {
            command::fetch(argsets::FetchArgs {
                request: args.free_from_str()?,
            })
            .await
        }
        Some(CMD_DOC_GET) => command::doc_get(argsets::DocGetArgs {
            collection: args.free_from_str()?,
            key: args.free_from_str()?,
        }),
        Some(CMD_DOC_SET) => command::doc_set(argsets::DocSetArgs {
            collection: args.free_from_str()?,
            key: args.free_from_str()?,
            value: args.free_from_str()?,
        }),
        Some(CMD_DOC_LIST) => command::doc_list(argsets::DocListArgs {
            collection: args.free_from_str()?,
        }),
        Some(CMD_DOC_DELETE) => command::doc_delete(argsets::DocDeleteArgs {
            collection: args.free_from_str()?,
            key: args.free_from_str()?,
        }),
        _ => Err(anyhow!(
            "Subcommand must be one of '{CMD_FETCH}', '{CMD_DOC_GET}', '{CMD_DOC_SET}', '{CMD_DOC_LIST}', '{CMD_DOC_DELETE}'"
        )),
    }
}
