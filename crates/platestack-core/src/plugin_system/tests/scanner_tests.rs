#![cfg(test)]

use std::io;

use serde_json::json;
use tempfile::tempdir;

use crate::config::LoaderConfig;
use crate::plugin_system::container::{Container, DirectoryContainer, MemoryContainer};
use crate::plugin_system::scanner::{ClassScanner, DescriptorScanner};
use crate::plugin_system::tests::fixtures::{descriptor, header};

const TOML_HEADER: &str = r#"
class = "com.example.Chat"

[[annotations]]
type = "plate"

[annotations.value]
id = "chat"
name = "Chat"
version = "2.0.0"
"#;

const YAML_HEADER: &str = r#"
class: com.example.Hidden
visibility: internal
annotations:
  - type: deprecated
"#;

#[tokio::test]
async fn test_scan_memory_container_all_formats() -> io::Result<()> {
    let container = MemoryContainer::new("bundle")
        .with_entry("com/example/Economy.class.json", header("com.example.Economy", descriptor("economy", json!([]))))
        .with_entry("com/example/Chat.class.toml", TOML_HEADER)
        .with_entry("com/example/Hidden.class.yaml", YAML_HEADER)
        .with_entry("README.md", "not a class");

    let classes = DescriptorScanner::default().scan(&container).await?;
    let names: Vec<&str> = classes.iter().map(|class| class.class_name.as_str()).collect();
    assert_eq!(names, ["com.example.Chat", "com.example.Economy", "com.example.Hidden"]);

    let chat = &classes[0];
    assert!(chat.is_public);
    assert_eq!(chat.annotation("plate").map(|a| &a.value["id"]), Some(&json!("chat")));
    assert_eq!(chat.entry, "com/example/Chat.class.toml");

    let hidden = &classes[2];
    assert!(!hidden.is_public);
    assert!(hidden.annotation("plate").is_none());
    Ok(())
}

#[tokio::test]
async fn test_scan_limits() {
    let config = LoaderConfig { max_entries: 1, max_entry_bytes: 64, ..LoaderConfig::default() };
    let scanner = DescriptorScanner::new(&config);

    let crowded = MemoryContainer::new("crowded")
        .with_entry("A.class.json", r#"{"class":"A"}"#)
        .with_entry("B.class.json", r#"{"class":"B"}"#);
    let err = scanner.scan(&crowded).await.unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidData);

    let large = MemoryContainer::new("large").with_entry("A.class.json", vec![b' '; 65]);
    let err = scanner.scan(&large).await.unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidData);
}

#[tokio::test]
async fn test_corrupt_header_fails_the_scan() {
    let container = MemoryContainer::new("corrupt").with_entry("A.class.json", "{ not json");
    let err = DescriptorScanner::default().scan(&container).await.unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    assert!(err.to_string().contains("A.class.json"));
}

#[tokio::test]
async fn test_directory_container_walks_nested_entries() -> io::Result<()> {
    let dir = tempdir()?;
    std::fs::create_dir_all(dir.path().join("com/example"))?;
    std::fs::write(dir.path().join("com/example/Economy.class.json"), header("com.example.Economy", descriptor("economy", json!([]))))?;
    std::fs::write(dir.path().join("plugin.txt"), "hello")?;

    let container = DirectoryContainer::new(dir.path()).with_name("economy.jar");
    assert_eq!(container.name(), "economy.jar");
    assert_eq!(container.entry_names().await?, ["com/example/Economy.class.json", "plugin.txt"]);
    assert_eq!(container.read_entry("plugin.txt", 1024).await?, b"hello");

    let escaped = container.read_entry("../outside.txt", 1024).await.unwrap_err();
    assert_eq!(escaped.kind(), io::ErrorKind::InvalidInput);

    let classes = DescriptorScanner::default().scan(&container).await?;
    assert_eq!(classes.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_missing_directory_is_an_io_error() {
    let container = DirectoryContainer::new("./non_existent_plugin_dir_for_test");
    let err = container.entry_names().await.unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::NotFound);
}

#[tokio::test]
async fn test_class_name_must_match_entry_path() -> io::Result<()> {
    let container = MemoryContainer::new("bundle")
        .with_entry("a/B.class.json", header("x.Y", descriptor("impostor", json!([]))))
        .with_entry("a/Economy.class.json", header("Economy", descriptor("economy", json!([]))))
        .with_entry("a/Chat.class.json", header("a.Chat", descriptor("chat", json!([]))))
        .with_entry("a/Chat$Inner.class.json", header("a.Chat$Inner", json!({})));

    let classes = DescriptorScanner::default().scan(&container).await?;
    let names: Vec<&str> = classes.iter().map(|class| class.class_name.as_str()).collect();
    assert_eq!(names, ["a.Chat", "a.Chat$Inner"]);
    assert!(classes[0].is_top_level());
    assert!(!classes[1].is_top_level());
    Ok(())
}
