//! End-to-end tests of the ingestion-to-query pipeline: build a range
//! tree, serialize it, memory-map the file back and query by bisection.

use ipcc::table::write_table;
use ipcc::{subnets, CodeWord, RangeTree, Record, SortedTable, U128, V4Record, V6Record};
use std::fs;
use std::net::{Ipv4Addr, Ipv6Addr};
use tempfile::TempDir;

fn cc(s: &str) -> CodeWord {
    s.parse().unwrap()
}

fn v4(s: &str) -> u32 {
    s.parse::<Ipv4Addr>().unwrap().into()
}

fn v6(s: &str) -> U128 {
    s.parse::<Ipv6Addr>().unwrap().into()
}

fn write_tree<R: ipcc::Record>(
    dir: &TempDir,
    tree: &RangeTree<R::Key, CodeWord>,
) -> std::path::PathBuf {
    let path = dir.path().join(format!("ipcc.bst{}", R::SUFFIX));
    let mut bytes = Vec::new();
    write_table::<R>(tree, &mut bytes).unwrap();
    fs::write(&path, bytes).unwrap();
    path
}

#[test]
fn test_v4_pipeline_round_trip() {
    let mut tree = RangeTree::new();
    tree.add(v4("10.0.0.0"), v4("10.0.0.255"), cc("US"));
    tree.add(v4("10.0.1.0"), v4("10.0.1.255"), cc("US"));
    tree.add(v4("172.16.0.0"), v4("172.16.255.255"), cc("CA"));
    tree.add(v4("192.168.0.0"), v4("192.168.0.255"), cc("DE"));

    // the two adjacent US ranges coalesce during ingestion
    assert_eq!(tree.len(), 3);

    let dir = TempDir::new().unwrap();
    let path = write_tree::<V4Record>(&dir, &tree);
    let table = SortedTable::<V4Record>::open(&path).unwrap().unwrap();
    assert_eq!(table.len(), 3);

    let hit = table.lookup(v4("10.0.1.7")).unwrap();
    assert_eq!(hit.lo(), v4("10.0.0.0"));
    assert_eq!(hit.hi(), v4("10.0.1.255"));
    assert_eq!(hit.code(), cc("US"));

    assert_eq!(table.lookup(v4("172.16.200.1")).unwrap().code(), cc("CA"));
    assert_eq!(table.lookup(v4("192.168.0.255")).unwrap().code(), cc("DE"));
    assert!(table.lookup(v4("10.0.2.0")).is_none());
    assert!(table.lookup(v4("9.255.255.255")).is_none());
}

#[test]
fn test_adjacent_different_codes_do_not_merge() {
    let mut tree = RangeTree::new();
    tree.add(v4("10.0.0.0"), v4("10.0.0.255"), cc("US"));
    tree.add(v4("10.0.1.0"), v4("10.0.1.255"), cc("CA"));
    assert_eq!(tree.len(), 2);

    let dir = TempDir::new().unwrap();
    let path = write_tree::<V4Record>(&dir, &tree);
    let table = SortedTable::<V4Record>::open(&path).unwrap().unwrap();
    assert_eq!(table.lookup(v4("10.0.0.255")).unwrap().code(), cc("US"));
    assert_eq!(table.lookup(v4("10.0.1.0")).unwrap().code(), cc("CA"));
}

#[test]
fn test_reassignment_overwrites_overlap() {
    // a later delegation carves the middle out of an earlier one
    let mut tree = RangeTree::new();
    tree.add(v4("10.0.0.0"), v4("10.0.3.255"), cc("US"));
    tree.add(v4("10.0.1.0"), v4("10.0.2.255"), cc("CA"));
    assert_eq!(tree.len(), 3);

    let dir = TempDir::new().unwrap();
    let path = write_tree::<V4Record>(&dir, &tree);
    let table = SortedTable::<V4Record>::open(&path).unwrap().unwrap();
    assert_eq!(table.lookup(v4("10.0.0.128")).unwrap().code(), cc("US"));
    assert_eq!(table.lookup(v4("10.0.1.0")).unwrap().code(), cc("CA"));
    assert_eq!(table.lookup(v4("10.0.2.255")).unwrap().code(), cc("CA"));
    assert_eq!(table.lookup(v4("10.0.3.0")).unwrap().code(), cc("US"));
}

#[test]
fn test_v6_pipeline_round_trip() {
    let mut tree = RangeTree::new();
    tree.add(
        v6("2001:db8::"),
        v6("2001:db8::ffff:ffff:ffff:ffff"),
        cc("BR"),
    );
    tree.add(v6("2a00::"), v6("2a00::ffff"), cc("DE"));

    let dir = TempDir::new().unwrap();
    let path = write_tree::<V6Record>(&dir, &tree);
    let table = SortedTable::<V6Record>::open(&path).unwrap().unwrap();
    assert_eq!(table.len(), 2);

    let hit = table.lookup(v6("2001:db8::42")).unwrap();
    assert_eq!(hit.code(), cc("BR"));
    assert_eq!(
        Ipv6Addr::from(hit.lo()),
        "2001:db8::".parse::<Ipv6Addr>().unwrap()
    );

    assert_eq!(table.lookup(v6("2a00::ffff")).unwrap().code(), cc("DE"));
    assert!(table.lookup(v6("2a00::1:0")).is_none());
    assert!(table.lookup(v6("::1")).is_none());
}

#[test]
fn test_serialized_records_decompose_into_subnets() {
    let mut tree = RangeTree::new();
    tree.add(v4("10.0.0.0"), v4("10.0.1.255"), cc("US"));
    tree.add(v4("10.0.2.16"), v4("10.0.2.31"), cc("US"));
    assert_eq!(tree.len(), 2);

    let dir = TempDir::new().unwrap();
    let path = write_tree::<V4Record>(&dir, &tree);
    let table = SortedTable::<V4Record>::open(&path).unwrap().unwrap();

    let blocks: Vec<(Ipv4Addr, u8)> = table
        .records()
        .iter()
        .flat_map(|r| subnets(r.lo(), r.hi()))
        .map(|(start, len)| (Ipv4Addr::from(start), len))
        .collect();
    assert_eq!(
        blocks,
        vec![
            ("10.0.0.0".parse().unwrap(), 23),
            ("10.0.2.16".parse().unwrap(), 28),
        ]
    );
}

#[test]
fn test_large_tree_survives_the_round_trip() {
    let mut tree = RangeTree::new();
    let codes = [cc("US"), cc("CA"), cc("DE"), cc("BR"), cc("JP")];
    // each range 16 addresses wide with a 16-address gap after it
    for i in 0..2_000u32 {
        let lo = i * 32;
        tree.add(lo, lo + 15, codes[(i % 5) as usize]);
    }
    assert_eq!(tree.len(), 2_000);

    let dir = TempDir::new().unwrap();
    let path = write_tree::<V4Record>(&dir, &tree);
    let table = SortedTable::<V4Record>::open(&path).unwrap().unwrap();
    assert_eq!(table.len(), 2_000);

    for i in 0..2_000u32 {
        let lo = i * 32;
        let hit = table.lookup(lo + 7).unwrap();
        assert_eq!((hit.lo(), hit.hi()), (lo, lo + 15));
        assert_eq!(hit.code(), codes[(i % 5) as usize]);
        assert!(table.lookup(lo + 16).is_none());
    }
}
