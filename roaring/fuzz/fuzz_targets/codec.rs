#![no_main]

use arbitrary::Arbitrary;
use commonware_codec::{Decode, EncodeSize};
use commonware_roaring::{Config, FrozenBuffer, Roaring, RoaringBitmap};
use libfuzzer_sys::fuzz_target;

const MAX_INPUT_LEN: usize = 1 << 20;

#[derive(Arbitrary, Debug)]
enum Format {
    Portable,
    Native,
    Frozen,
}

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    format: Format,
    max_containers: u16,
    data: Vec<u8>,
}

fn reencode(bitmap: &impl Roaring) {
    let mut buf = Vec::new();
    bitmap.serialize_portable(&mut buf);
    let decoded = RoaringBitmap::deserialize_portable(&mut buf.as_slice()).unwrap();
    assert!(decoded.equals(bitmap));
    assert_eq!(decoded.len(), bitmap.iter().count() as u64);
}

fn fuzz(input: FuzzInput) {
    let mut data = input.data;
    data.truncate(MAX_INPUT_LEN);
    let config = Config {
        max_containers: usize::from(input.max_containers) + 1,
    };

    match input.format {
        Format::Portable => {
            if let Ok(bitmap) = RoaringBitmap::decode_cfg(data.as_slice(), &config) {
                assert!(bitmap.container_count() <= config.max_containers);
                assert_eq!(bitmap.encode_size(), bitmap.portable_size());
                reencode(&bitmap);
            }
        }
        Format::Native => {
            let mut buf = data.as_slice();
            if let Ok(bitmap) = RoaringBitmap::deserialize_cfg(&mut buf, &config) {
                assert!(bitmap.container_count() <= config.max_containers);
                reencode(&bitmap);
            }
        }
        Format::Frozen => {
            let buffer = FrozenBuffer::from_bytes(&data);
            if let Ok(frozen) = buffer.view() {
                reencode(&frozen);
                assert_eq!(FrozenBuffer::new(&frozen).as_bytes(), buffer.as_bytes());
            }
        }
    }
}

fuzz_target!(|input: FuzzInput| {
    fuzz(input);
});
