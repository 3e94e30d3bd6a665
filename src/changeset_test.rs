use crate::encoder::encode;
use crate::test_utils::config_data;
use crate::ChangeSet;
use crate::FORMAT_JSON;
use crate::SOURCE_KIND;

fn change_set(pairs: &[(&str, &str)]) -> ChangeSet {
    ChangeSet::from_snapshot(encode(&config_data(pairs)).unwrap(), SOURCE_KIND)
}

#[test]
fn from_snapshot_should_tag_format_and_source() {
    let cs = change_set(&[("a", "1"), ("b", "2")]);

    assert_eq!(cs.format(), FORMAT_JSON);
    assert_eq!(cs.source(), "configmap");
    assert_eq!(&cs.data()[..], br#"{"a":"1","b":"2"}"#);
}

#[test]
fn sum_should_match_stored_checksum() {
    let cs = change_set(&[("a", "1")]);

    assert_eq!(cs.sum(), cs.checksum());
}

#[test]
fn snapshots_of_same_content_should_compare_equal_by_content() {
    let first = change_set(&[("a", "1")]);
    let second = change_set(&[("a", "1")]);
    let changed = change_set(&[("a", "2")]);

    assert!(first.is_same_content(&second));
    assert!(!first.is_same_content(&changed));
    assert!(second.timestamp() >= first.timestamp());
}

#[test]
fn change_set_should_serialize_data_and_checksum() {
    let cs = change_set(&[("a", "1")]);

    let json = serde_json::to_value(&cs).unwrap();
    assert_eq!(json["checksum"], cs.checksum());
    assert_eq!(json["format"], "json");
    assert_eq!(json["source"], "configmap");
}
