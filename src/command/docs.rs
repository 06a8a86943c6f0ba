use anyhow::{anyhow, Result};
use kvstore::DocDbRW;
use serde_json::{json, Value};

use crate::argsets::{DocDeleteArgs, DocGetArgs, DocListArgs, DocSetArgs};
use data_connector::Settings;

fn open() -> Result<DocDbRW> {
    let settings = Settings::from_env();
    Ok(DocDbRW::open(&settings.docs_db)?)
}

pub fn doc_set(args: DocSetArgs) -> Result<()> {
    let db = open()?;
    // Input that is not valid JSON is stored as a string
    match serde_json::from_str::<Value>(&args.value) {
        Ok(value) => db.set(&args.collection, &args.key, value)?,
        Err(_) => db.set(&args.collection, &args.key, json!(args.value))?,
    }
    log::info!("Stored {}/{}", args.collection, args.key);
    Ok(())
}

pub fn doc_get(args: DocGetArgs) -> Result<()> {
    let db = open()?;
    let value: Value = db
        .get(&args.collection, &args.key)?
        .ok_or_else(|| anyhow!("No document '{}' in '{}'", args.key, args.collection))?;
    match value {
        Value::String(s) => print!("{s}"),
        other => print!("{other}"),
    }
    Ok(())
}

pub fn doc_list(args: DocListArgs) -> Result<()> {
    let db = open()?;
    for key in db.keys(&args.collection)? {
        println!("{key}");
    }
    Ok(())
}

pub fn doc_delete(args: DocDeleteArgs) -> Result<()> {
    let db = open()?;
    if !db.delete(&args.collection, &args.key)? {
        return Err(anyhow!("No document '{}' in '{}'", args.key, args.collection));
    }
    Ok(())
}
