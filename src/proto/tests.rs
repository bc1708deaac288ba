use std::io::Cursor;

use crate::proto::primitive::{fixed_str, variant, write_fixed_str};
use crate::proto::{Error, Kind, Record, Status};

#[test]
fn test_fixed_str_stops_at_nul() {
    let data = [b'a', b'b', 0x00, b'z'];
    let mut src = Cursor::new(&data);
    assert_eq!(fixed_str(&mut src, 4).unwrap(), "ab");
    // the full region must be consumed regardless of the NUL position
    assert_eq!(src.position(), 4);
}

#[test]
fn test_fixed_str_short_region() {
    let data = [b'a', b'b'];
    let mut src = Cursor::new(&data);
    assert!(matches!(fixed_str(&mut src, 4), Err(Error::IO(_))));
}

#[test]
fn test_write_fixed_str_pads_with_nul() {
    let mut dest = Vec::new();
    write_fixed_str(&mut dest, "hi", 4, "field").unwrap();
    assert_eq!(dest, [b'h', b'i', 0x00, 0x00]);
}

#[test]
fn test_write_fixed_str_rejects_overflow() {
    let mut dest = Vec::new();
    // no room left for the terminating NUL
    assert!(matches!(
        write_fixed_str(&mut dest, "abcd", 4, "field"),
        Err(Error::FieldOverflow("field"))
    ));
}

#[test]
fn test_write_fixed_str_rejects_embedded_nul() {
    let mut dest = Vec::new();
    assert!(matches!(
        write_fixed_str(&mut dest, "a\0b", 8, "field"),
        Err(Error::FieldOverflow("field"))
    ));
}

#[test]
fn test_variant_known_and_unknown() {
    let data = [0x00, 0x00, 0x00, 0x69];
    let mut src = Cursor::new(&data);
    let kind: Kind = variant(&mut src).unwrap();
    assert_eq!(kind, Kind::WriteFile);

    let data = [0x00, 0x00, 0x00, 0x63];
    let mut src = Cursor::new(&data);
    let res: super::Result<Kind> = variant(&mut src);
    assert!(matches!(res, Err(Error::EnumDiscMismatch(99))));
}

#[test]
fn test_record_roundtrip_all_fields() {
    let mut rec = Record::new(Kind::WriteFile);
    rec.username = "alice".into();
    rec.filename = "a.txt".into();
    rec.data = "1 Hello world.\nETIRW\n".into();
    rec.sentence_num = 3;
    rec.word_index = -1;
    rec.status = Status::InvalidIndex;
    rec.flags = 9001;
    rec.ss_ip = "127.0.0.1".into();
    rec.ss_port = 65000;
    rec.folder_path = "notes/drafts".into();

    let mut buf = Vec::new();
    rec.encode(&mut buf).unwrap();
    assert_eq!(buf.len(), Record::WIRE_LEN);

    let decoded = Record::decode(&mut buf.as_slice()).unwrap();
    assert_eq!(decoded, rec);
}

#[test]
fn test_record_roundtrip_empty() {
    let rec = Record::ack();
    let mut buf = Vec::new();
    rec.encode(&mut buf).unwrap();

    let decoded = Record::decode(&mut buf.as_slice()).unwrap();
    assert_eq!(decoded, rec);
    assert_eq!(decoded.status, Status::Success);
}

#[test]
fn test_record_wire_len_is_constant() {
    let mut small = Vec::new();
    Record::ack().encode(&mut small).unwrap();

    let mut big = Vec::new();
    let mut rec = Record::new(Kind::ListFiles);
    rec.data = "x".repeat(8000);
    rec.encode(&mut big).unwrap();

    assert_eq!(small.len(), big.len());
    assert_eq!(small.len(), Record::WIRE_LEN);
}

#[test]
fn test_record_rejects_oversized_payload() {
    let mut rec = Record::new(Kind::Response);
    rec.data = "x".repeat(8192);
    let mut buf = Vec::new();
    assert!(matches!(rec.encode(&mut buf), Err(Error::FieldOverflow("data"))));
}

#[test]
fn test_decode_truncated_record() {
    let mut buf = Vec::new();
    Record::ack().encode(&mut buf).unwrap();
    buf.truncate(Record::WIRE_LEN - 1);
    assert!(matches!(Record::decode(&mut buf.as_slice()), Err(Error::IO(_))));
}
