use kvstore::{DocDbRO, DocDbRW};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, PartialEq)]
pub struct Template {
    protocol: String,
    url: String,
    headers: Vec<String>,
}

#[test]
fn write_and_read_document() -> Result<(), Box<dyn std::error::Error>> {
    let _ = env_logger::try_init();
    let dir = tempfile::tempdir()?;
    let sqlite_db = dir.path().join("nested").join("docs.db");

    let db = DocDbRW::open(&sqlite_db)?;

    let tpl = Template {
        protocol: String::from("rest"),
        url: String::from("https://example.com/${ids}"),
        headers: vec![String::from("x-api-key")],
    };

    db.set("templates", "sensors", &tpl)?;
    let tpl2: Template = db.get("templates", "sensors")?.expect("document missing");
    assert_eq!(tpl2, tpl);

    let db2 = DocDbRO::open(&sqlite_db)?;
    let tpl3: Template = db2.get("templates", "sensors")?.expect("document missing");
    assert_eq!(tpl3, tpl);

    let entries: Vec<(String, Template)> = db2.entries("templates")?;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0, "sensors");
    Ok(())
}

#[test]
fn read_only_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    assert!(DocDbRO::open(dir.path().join("absent.db")).is_err());
}
