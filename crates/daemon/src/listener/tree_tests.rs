// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn read_tree_lists_directories_before_their_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("lib/drivers")).unwrap();
    std::fs::write(dir.path().join("main.py"), "run()\n").unwrap();
    std::fs::write(dir.path().join("lib/drivers/led.py"), "on()\n").unwrap();

    let items = read_tree(dir.path().to_path_buf()).await.unwrap();

    let order: Vec<_> = items.iter().map(|i| (i.relative.as_str(), i.data.is_some())).collect();
    assert_eq!(
        order,
        vec![("lib", false), ("lib/drivers", false), ("lib/drivers/led.py", true), ("main.py", true)]
    );
}

#[tokio::test]
async fn read_tree_of_a_missing_directory_is_local_io() {
    let dir = tempfile::tempdir().unwrap();

    let err = read_tree(dir.path().join("absent")).await.unwrap_err();

    assert_eq!(err.code, ErrorCode::LocalIo);
}

#[tokio::test]
async fn write_tree_recreates_the_layout() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("backup");
    let items = vec![
        TreeItem { relative: "empty".into(), data: None },
        TreeItem { relative: "lib/a.py".into(), data: Some(b"abc".to_vec()) },
        TreeItem { relative: "boot.py".into(), data: Some(b"x".to_vec()) },
    ];

    let tally = write_tree(&root, items).await.unwrap();

    assert_eq!(tally, Tally { files: 2, bytes: 4 });
    assert!(root.join("empty").is_dir());
    assert_eq!(std::fs::read(root.join("lib/a.py")).unwrap(), b"abc");
    assert_eq!(std::fs::read(root.join("boot.py")).unwrap(), b"x");
}
