//! Integration tests for generic container entries across close/reopen.

use chrono::{TimeZone, Utc};
use smcontainer::container::{Category, Container, DataFrame, Value};
use smcontainer::{attrs, mapping, Array, AttrValue, Attributes, ContainerOptions, Dimensions, Error, PlainOldDataType};

use tempfile::NamedTempFile;

#[test]
fn test_roundtrip_all_entry_kinds() {
    let temp = NamedTempFile::new().expect("Failed to create temp file");
    let path = temp.path();
    let origin_time = Utc.with_ymd_and_hms(2019, 7, 6, 3, 19, 53).unwrap();

    let event = mapping! {
        "id" => "ci38457511",
        "magnitude" => 7.1,
        "depth" => 8i64,
        "time" => origin_time,
        "signature" => vec![0xdeu8, 0xad, 0xbe, 0xef],
        "network" => Value::Null,
        "mechanism" => mapping! { "strike" => 321.0, "rake" => vec![Value::Float(-178.0), Value::Int(0)] },
    };
    let grid = Array::from_vec((3, 2), vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0]).expect("grid");
    let grid_meta = attrs! { "units" => "cm/s", "digits" => 4i64, "scale" => 0.5, "valid" => true };
    let stations = DataFrame::from_columns(vec![
        ("code", vec![Value::from("CLC"), Value::from("TOW2")]),
        ("pga", vec![Value::Float(0.21), Value::Float(0.07)]),
        ("time", vec![Value::Timestamp(origin_time), Value::Null]),
    ])
    .expect("table");

    {
        let mut c = Container::create(path).expect("Failed to create container");
        c.set_dictionary(&["event"], "origin", &event).expect("dictionary");
        c.set_string(&[], "readme", "Ridgecrest M7.1").expect("string");
        c.set_array(&["maps"], "pgv", &grid, &grid_meta, true).expect("array");
        c.set_dataframe(&[], "stations", &stations).expect("dataframe");
        c.close().expect("close");
    }

    let c = Container::open(path).expect("Failed to open container");
    assert_eq!(c.get_dictionary(&["event"], "origin").unwrap(), event);
    assert_eq!(c.get_string(&[], "readme").unwrap(), "Ridgecrest M7.1");

    let (array, meta) = c.get_array(&["maps"], "pgv").unwrap();
    assert_eq!(array, grid);
    assert_eq!(array.pod(), PlainOldDataType::Float32);
    assert_eq!(array.dims(), &Dimensions::d2(3, 2));
    assert_eq!(meta, grid_meta);
    assert!(c.store().unwrap().root().group("arrays").unwrap().group("maps").unwrap().dataset("pgv").unwrap().is_compressed());

    let frame = c.get_dataframe(&[], "stations").unwrap();
    assert_eq!(frame, stations);
    assert_eq!(frame.time_columns(), vec!["time".to_string()]);

    assert_eq!(c.get_dictionaries().unwrap(), vec!["event/origin"]);
    assert_eq!(c.get_strings().unwrap(), vec!["readme"]);
    assert_eq!(c.get_arrays().unwrap(), vec!["maps/pgv"]);
    assert_eq!(c.get_dataframes().unwrap(), vec!["stations"]);
}

#[test]
fn test_roundtrip_without_mmap() {
    let temp = NamedTempFile::new().expect("Failed to create temp file");
    let options = ContainerOptions { use_mmap: false, compression_level: 9 };
    {
        let mut c = Container::create_with(temp.path(), options.clone()).expect("create");
        let ids = Array::from_strings(3, &["CI.CLC", "CI.TOW2", "NP.5419"]).unwrap();
        c.set_array(&[], "ids", &ids, &Attributes::new(), true).unwrap();
        c.set_array(&[], "flags", &Array::from_bools(2, &[true, false]).unwrap(), &Attributes::new(), false)
            .unwrap();
        c.close().unwrap();
    }
    let c = Container::open_with(temp.path(), options).expect("open");
    let (ids, _) = c.get_array(&[], "ids").unwrap();
    assert_eq!(ids.to_strings().unwrap(), vec!["CI.CLC", "CI.TOW2", "NP.5419"]);
    let (flags, _) = c.get_array(&[], "flags").unwrap();
    assert_eq!(flags.to_bools().unwrap(), vec![true, false]);
    assert!(matches!(flags.to_vec::<f64>(), Err(Error::TypeMismatch { .. })));
}

#[test]
fn test_close_is_idempotent_error() {
    let temp = NamedTempFile::new().expect("Failed to create temp file");
    let mut c = Container::create(temp.path()).expect("create");
    c.close().expect("first close");
    assert!(matches!(c.close(), Err(Error::Closed)));
    assert!(matches!(c.get_dictionaries(), Err(Error::Closed)));
    assert!(matches!(c.set_string(&[], "late", "x"), Err(Error::Closed)));
}

#[test]
fn test_duplicate_array_leaves_original() {
    let temp = NamedTempFile::new().expect("Failed to create temp file");
    let mut c = Container::create(temp.path()).expect("create");
    let first = Array::from_slice(&[1i32, 2, 3]);
    let meta = attrs! { "units" => "counts" };
    c.set_array(&["a"], "x", &first, &meta, false).unwrap();

    let result = c.set_array(&["a"], "x", &Array::from_slice(&[9i32]), &Attributes::new(), false);
    assert!(matches!(result, Err(Error::DuplicateEntry(_))));

    let (array, got_meta) = c.get_array(&["a"], "x").unwrap();
    assert_eq!(array.to_vec::<i32>().unwrap(), vec![1, 2, 3]);
    assert_eq!(got_meta.get("units"), Some(&AttrValue::from("counts")));
}

#[test]
fn test_invalid_value_writes_nothing() {
    let temp = NamedTempFile::new().expect("Failed to create temp file");
    let mut c = Container::create(temp.path()).expect("create");
    let bad = mapping! { "event" => mapping! { "mags" => vec![Value::Float(6.4), Value::Float(f64::NAN)] } };
    match c.set_dictionary(&["deep", "er"], "bad", &bad) {
        Err(Error::InvalidValueType { path, .. }) => assert_eq!(path, "event.mags[1]"),
        other => panic!("expected InvalidValueType, got {:?}", other),
    }
    assert!(c.get_dictionaries().unwrap().is_empty());
    assert!(c.store().unwrap().root().is_empty());
}

#[test]
fn test_fresh_container_lists_empty() {
    let temp = NamedTempFile::new().expect("Failed to create temp file");
    let c = Container::create(temp.path()).expect("create");
    for category in Category::ALL {
        assert!(c.list_entries(category, &[]).unwrap().is_empty());
    }
    assert!(matches!(c.get_dictionary(&[], "config"), Err(Error::NotFound(_))));
}

#[test]
fn test_drop_entries_persist() {
    let temp = NamedTempFile::new().expect("Failed to create temp file");
    {
        let mut c = Container::create(temp.path()).expect("create");
        c.set_string(&["notes"], "a", "first").unwrap();
        c.set_string(&["notes"], "b", "second").unwrap();
        c.set_dataframe(&[], "empty", &DataFrame::new()).unwrap();
        c.drop_string(&["notes"], "a").unwrap();
        c.drop_dataframe(&[], "empty").unwrap();
        assert!(matches!(c.drop_string(&["notes"], "a"), Err(Error::NotFound(_))));
        c.close().unwrap();
    }
    let c = Container::open(temp.path()).expect("open");
    assert_eq!(c.get_strings().unwrap(), vec!["notes/b"]);
    assert!(c.get_dataframes().unwrap().is_empty());
}

#[test]
fn test_corrupt_file_is_rejected() {
    let temp = NamedTempFile::new().expect("Failed to create temp file");
    {
        let mut c = Container::create(temp.path()).expect("create");
        c.set_string(&[], "s", "payload").unwrap();
        c.close().unwrap();
    }
    let bytes = std::fs::read(temp.path()).unwrap();
    std::fs::write(temp.path(), &bytes[..bytes.len() - 4]).unwrap();
    assert!(Container::open(temp.path()).is_err());
}

#[test]
fn test_overflowing_extents_on_disk_are_rejected() {
    let temp = NamedTempFile::new().expect("Failed to create temp file");
    {
        let mut c = Container::create(temp.path()).expect("create");
        let grid = Array::from_vec((3, 2), vec![1.0f32; 6]).unwrap();
        c.set_array(&[], "grid", &grid, &Attributes::new(), false).unwrap();
        c.close().unwrap();
    }

    // Header block of the grid: element tag, compressed flag, rank, extents.
    let mut header = vec![PlainOldDataType::Float32 as u8, 0, 2, 0, 0, 0];
    header.extend_from_slice(&3u64.to_le_bytes());
    header.extend_from_slice(&2u64.to_le_bytes());

    let mut bytes = std::fs::read(temp.path()).unwrap();
    let at = bytes
        .windows(header.len())
        .position(|w| w == header.as_slice())
        .expect("array header in file");
    bytes[at + 6..at + 14].copy_from_slice(&(1u64 << 62).to_le_bytes());
    bytes[at + 14..at + 22].copy_from_slice(&8u64.to_le_bytes());
    std::fs::write(temp.path(), &bytes).unwrap();

    assert!(matches!(Container::open(temp.path()), Err(Error::Corrupt(_))));
}
