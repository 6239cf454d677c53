use super::*;
use std::io::Cursor;

fn encode(record: &Record) -> Vec<u8> {
    let mut buf = Vec::new();
    record.encode_into(&mut buf).unwrap();
    buf
}

#[test]
fn roundtrip_live_record() {
    let rec = Record::put(b"fruit".to_vec(), b"apple".to_vec());
    let buf = encode(&rec);
    assert_eq!(buf.len(), rec.encoded_len());

    let decoded = Record::decode_from(&mut Cursor::new(&buf)).unwrap().unwrap();
    assert_eq!(decoded, rec);
}

#[test]
fn roundtrip_empty_value() {
    let rec = Record::put(b"k".to_vec(), Vec::new());
    let decoded = Record::decode_from(&mut Cursor::new(encode(&rec)))
        .unwrap()
        .unwrap();
    assert_eq!(decoded, rec);
}

#[test]
fn tombstone_never_carries_a_value() {
    let rec = Record::tombstone(b"gone".to_vec());
    assert!(rec.value.is_empty());

    let decoded = Record::decode_from(&mut Cursor::new(encode(&rec)))
        .unwrap()
        .unwrap();
    assert!(decoded.tombstone);
    assert!(decoded.value.is_empty());
}

#[test]
fn sequential_records_decode_in_order() {
    let recs = vec![
        Record::put(b"a".to_vec(), b"1".to_vec()),
        Record::tombstone(b"b".to_vec()),
        Record::put(b"c".to_vec(), b"3".to_vec()),
    ];
    let mut stream = Vec::new();
    let mut buf = Vec::new();
    for r in &recs {
        r.encode_into(&mut buf).unwrap();
        stream.extend_from_slice(&buf);
    }

    let mut cur = Cursor::new(&stream);
    for expected in &recs {
        let got = Record::decode_from(&mut cur).unwrap().unwrap();
        assert_eq!(&got, expected);
    }
    assert!(Record::decode_from(&mut cur).unwrap().is_none());
}

#[test]
fn bit_flip_is_corrupt() {
    let rec = Record::put(b"key".to_vec(), b"value".to_vec());
    let clean = encode(&rec);

    // Flip one bit in every byte position in turn; each must either fail
    // CRC validation or (for flips inside the length fields) truncate into
    // end-of-stream. None may decode back to the original record.
    for pos in 0..clean.len() {
        let mut buf = clean.clone();
        buf[pos] ^= 0x01;
        match Record::decode_from(&mut Cursor::new(&buf)) {
            Err(CodecError::Corrupt) | Ok(None) => {}
            Ok(Some(got)) => assert_ne!(got, rec, "flip at byte {pos} went unnoticed"),
            Err(e) => panic!("unexpected error for flip at byte {pos}: {e}"),
        }
    }
}

#[test]
fn truncated_tail_is_end_of_stream() {
    let rec = Record::put(b"durable".to_vec(), b"payload".to_vec());
    let buf = encode(&rec);

    // Every proper prefix must read as a clean end, not corruption.
    for cut in 0..buf.len() {
        let got = Record::decode_from(&mut Cursor::new(&buf[..cut])).unwrap();
        assert!(got.is_none(), "prefix of {cut} bytes should be end-of-stream");
    }
}

#[test]
fn zero_padding_terminates() {
    let rec = Record::put(b"last".to_vec(), b"record".to_vec());
    let mut buf = encode(&rec);
    buf.extend_from_slice(&[0u8; 64]);

    let mut cur = Cursor::new(&buf);
    assert!(Record::decode_from(&mut cur).unwrap().is_some());
    assert!(Record::decode_from(&mut cur).unwrap().is_none());
}

#[test]
fn oversized_fields_are_rejected() {
    let mut buf = Vec::new();

    let empty_key = Record::put(Vec::new(), b"v".to_vec());
    assert!(matches!(
        empty_key.encode_into(&mut buf),
        Err(CodecError::OutOfRange(_))
    ));

    let long_key = Record::put(vec![b'k'; 256], b"v".to_vec());
    assert!(matches!(
        long_key.encode_into(&mut buf),
        Err(CodecError::OutOfRange(_))
    ));

    let long_value = Record::put(b"k".to_vec(), vec![0u8; MAX_VALUE_LEN + 1]);
    assert!(matches!(
        long_value.encode_into(&mut buf),
        Err(CodecError::OutOfRange(_))
    ));
}
