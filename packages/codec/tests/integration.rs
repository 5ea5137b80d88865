use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use treefs::{Backend, Bytes, Entry, Error, InMemory, Scalar, StorageError, TreeCodec, Value};

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
struct Person {
    name: String,
    age: i64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
struct Address {
    city: String,
    zip: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
struct Student {
    name: String,
    grades: Vec<i64>,
    address: Address,
    mentor: Option<Person>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
struct Item {
    sku: String,
    qty: u32,
    price: f64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
struct Cart {
    id: Uuid,
    created: chrono::DateTime<Utc>,
    checkout: Url,
    items: Vec<Item>,
}

fn read(path: impl AsRef<Path>) -> String {
    fs::read_to_string(path).unwrap()
}

fn cart() -> Cart {
    Cart {
        id: Uuid::new_v4(),
        created: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap(),
        checkout: Url::parse("https://shop.example.com/checkout?cart=1").unwrap(),
        items: vec![
            Item {
                sku: "apple".to_string(),
                qty: 3,
                price: 0.5,
            },
            Item {
                sku: "pear".to_string(),
                qty: 1,
                price: 1.25,
            },
        ],
    }
}

#[test]
fn test_person_layout_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("person");
    let codec = TreeCodec::new();

    let alice = Person {
        name: "Alice".to_string(),
        age: 38,
    };
    codec.encode(&alice, &target).unwrap();

    assert!(target.is_dir());
    assert_eq!(read(target.join("name.txt")), "Alice");
    assert_eq!(read(target.join("age.txt")), "38");

    let back: Person = codec.decode(&target).unwrap();
    assert_eq!(back, alice);
}

#[test]
fn test_top_level_integer_is_one_leaf() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("p");
    let codec = TreeCodec::new();

    codec.encode(&12345i64, &target).unwrap();

    assert_eq!(read(dir.path().join("p.txt")), "12345");
    assert!(!target.exists());
    assert_eq!(codec.decode::<i64>(&target).unwrap(), 12345);
}

#[test]
fn test_nested_record_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("students").join("bob");
    let codec = TreeCodec::new();

    let bob = Student {
        name: "Bob".to_string(),
        grades: vec![90, 87, 99],
        address: Address {
            city: "Lyon".to_string(),
            zip: None,
        },
        mentor: Some(Person {
            name: "Alice".to_string(),
            age: 38,
        }),
    };
    codec.encode(&bob, &target).unwrap();

    assert_eq!(read(target.join("grades").join("2.txt")), "99");
    assert_eq!(read(target.join("mentor").join("name.txt")), "Alice");
    assert!(!target.join("address").join("zip").exists());
    assert!(!target.join("address").join("zip.txt").exists());

    let back: Student = codec.decode(&target).unwrap();
    assert_eq!(back, bob);
}

#[test]
fn test_cart_with_rich_scalars() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("cart");
    let codec = TreeCodec::new();

    let cart = cart();
    codec.encode(&cart, &target).unwrap();

    assert_eq!(read(target.join("id.txt")), cart.id.hyphenated().to_string());
    assert_eq!(
        read(target.join("checkout.txt")),
        "https://shop.example.com/checkout?cart=1"
    );
    assert_eq!(read(target.join("items").join("1").join("sku.txt")), "pear");

    let back: Cart = codec.decode(&target).unwrap();
    assert_eq!(back, cart);
}

#[test]
fn test_optional_enum_absent_and_present() {
    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    enum Grade {
        A,
        B,
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Report {
        g: Option<Grade>,
    }

    let dir = tempfile::tempdir().unwrap();
    let codec = TreeCodec::new();

    let empty = dir.path().join("empty");
    codec.encode(&Report { g: None }, &empty).unwrap();
    assert!(empty.is_dir());
    assert_eq!(fs::read_dir(&empty).unwrap().count(), 0);
    assert_eq!(codec.decode::<Report>(&empty).unwrap(), Report { g: None });

    let graded = dir.path().join("graded");
    codec.encode(&Report { g: Some(Grade::B) }, &graded).unwrap();
    assert_eq!(read(graded.join("g.txt")), "B");
    assert_eq!(
        codec.decode::<Report>(&graded).unwrap(),
        Report { g: Some(Grade::B) }
    );
}

#[test]
fn test_every_scalar_kind_round_trips() {
    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Scalars {
        text: String,
        empty: String,
        int: i64,
        small: i8,
        wide: u64,
        huge: i128,
        double: f64,
        single: f32,
        yes: bool,
        no: bool,
        letter: char,
        when: chrono::DateTime<Utc>,
        link: Url,
        id: Uuid,
    }

    let value = Scalars {
        text: "héllo wörld".to_string(),
        empty: String::new(),
        int: -42,
        small: -8,
        wide: u64::MAX,
        huge: i128::MIN,
        double: 1.0e-10,
        single: 0.1,
        yes: true,
        no: false,
        letter: 'λ',
        when: Utc.timestamp_opt(1_700_000_000, 123_000_000).unwrap(),
        link: Url::parse("ftp://files.example.org/a%20b").unwrap(),
        id: Uuid::new_v4(),
    };

    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("scalars");
    let codec = TreeCodec::new();
    codec.encode(&value, &target).unwrap();

    assert_eq!(read(target.join("yes.txt")), "1");
    assert_eq!(read(target.join("no.txt")), "0");
    assert_eq!(read(target.join("wide.txt")), u64::MAX.to_string());

    let back: Scalars = codec.decode(&target).unwrap();
    assert_eq!(back, value);
}

#[test]
fn test_custom_extension() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("person");
    let codec = TreeCodec::builder().extension("md").build();

    let alice = Person {
        name: "Alice".to_string(),
        age: 38,
    };
    codec.encode(&alice, &target).unwrap();

    assert_eq!(read(target.join("name.md")), "Alice");
    assert!(!target.join("name.txt").exists());
    assert_eq!(codec.decode::<Person>(&target).unwrap(), alice);
}

#[test]
fn test_encoding_into_existing_tree_keeps_siblings() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("person");
    fs::create_dir_all(&target).unwrap();
    fs::write(target.join("notes.txt"), "keep me").unwrap();

    let codec = TreeCodec::new();
    let alice = Person {
        name: "Alice".to_string(),
        age: 38,
    };
    codec.encode(&alice, &target).unwrap();
    codec.encode(&alice, &target).unwrap();

    assert_eq!(read(target.join("notes.txt")), "keep me");
    assert_eq!(codec.decode::<Person>(&target).unwrap(), alice);
}

#[test]
fn test_overwrite_replaces_leaves() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("person");
    let codec = TreeCodec::new();

    codec
        .encode(
            &Person {
                name: "Alice".to_string(),
                age: 38,
            },
            &target,
        )
        .unwrap();
    codec
        .encode(
            &Person {
                name: "Alice".to_string(),
                age: 39,
            },
            &target,
        )
        .unwrap();

    assert_eq!(read(target.join("age.txt")), "39");
}

/// Lists entries in reverse lexical order, so "10" comes before "9".
struct ReversedListing(InMemory);

impl Backend for ReversedListing {
    fn exists(&self, path: &Path) -> bool {
        self.0.exists(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.0.is_dir(path)
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), StorageError> {
        self.0.create_dir_all(path)
    }

    fn write_atomic(&self, path: &Path, data: Bytes) -> Result<(), StorageError> {
        self.0.write_atomic(path, data)
    }

    fn read(&self, path: &Path) -> Result<Bytes, StorageError> {
        self.0.read(path)
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<Entry>, StorageError> {
        let mut entries = self.0.list_dir(path)?;
        entries.sort();
        entries.reverse();
        Ok(entries)
    }
}

#[test]
fn test_sequence_order_ignores_listing_order() {
    let codec = TreeCodec::builder()
        .backend(ReversedListing(InMemory::new()))
        .build();

    let words: Vec<String> = (0..15).map(|i| format!("word-{}", i)).collect();
    codec.encode(&words, "/words").unwrap();

    let back: Vec<String> = codec.decode("/words").unwrap();
    assert_eq!(back, words);
}

#[test]
fn test_sequence_of_records_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("people");
    let codec = TreeCodec::new();

    let people: Vec<Person> = (0..12)
        .map(|i| Person {
            name: format!("person-{}", i),
            age: 20 + i,
        })
        .collect();
    codec.encode(&people, &target).unwrap();

    assert!(target.join("11").is_dir());
    assert_eq!(codec.decode::<Vec<Person>>(&target).unwrap(), people);
}

#[test]
fn test_malformed_leaf_reports_coding_path() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("cart");
    let codec = TreeCodec::new();

    codec.encode(&cart(), &target).unwrap();
    fs::write(target.join("items").join("1").join("qty.txt"), "many").unwrap();

    let err = codec.decode::<Cart>(&target).unwrap_err();
    match &err {
        Error::DecodingFailed { path, .. } => assert_eq!(path.to_string(), "items/1/qty"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_missing_tree() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("nobody");
    let codec = TreeCodec::new();

    assert_eq!(codec.decode::<Option<Person>>(&target).unwrap(), None);
    assert!(matches!(
        codec.decode::<Person>(&target),
        Err(Error::DecodingFailed { .. })
    ));
    assert!(matches!(
        codec.decode::<i64>(&target),
        Err(Error::FileRead { .. })
    ));
}

#[test]
fn test_map_with_integer_keys() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("scores");
    let codec = TreeCodec::new();

    let scores: BTreeMap<u16, String> =
        [(1, "one"), (20, "twenty"), (3, "three")]
            .into_iter()
            .map(|(k, v)| (k, v.to_string()))
            .collect();
    codec.encode(&scores, &target).unwrap();

    assert_eq!(read(target.join("20.txt")), "twenty");
    assert_eq!(codec.decode::<BTreeMap<u16, String>>(&target).unwrap(), scores);
}

#[test]
fn test_json_documents_decode_dynamically() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("doc");
    let codec = TreeCodec::new();

    let doc = serde_json::json!({
        "name": "Alice",
        "tags": ["a", "b"],
        "n": 3,
        "gone": null,
    });
    codec.encode(&doc, &target).unwrap();

    assert!(!target.join("gone").exists());
    assert!(!target.join("gone.txt").exists());

    let back: serde_json::Value = codec.decode(&target).unwrap();
    assert_eq!(
        back,
        serde_json::json!({"name": "Alice", "tags": ["a", "b"], "n": 3})
    );
}

#[test]
fn test_value_round_trip() {
    let codec = TreeCodec::builder().backend(InMemory::new()).build();

    let mut value = Value::keyed();
    value.insert("name", Value::from("Alice"));
    value.insert("grades", Value::from(vec!["A", "B"]));
    codec.encode(&value, "/v").unwrap();

    let back: Value = codec.decode("/v").unwrap();
    assert_eq!(back.get("name"), Some(&Value::from("Alice")));
    assert_eq!(back.pointer(["grades", "1"]), Some(&Value::from("B")));
}

#[test]
fn test_value_round_trip_loses_kinds() {
    let codec = TreeCodec::builder().backend(InMemory::new()).build();

    let mut value = Value::keyed();
    value.insert("age", Value::from(38i64));
    value.insert("ratio", Value::from(0.5));
    value.insert("flag", Value::from(true));
    value.insert("zip", Value::from("007"));
    value.insert("digits", Value::from("12345"));
    value.insert("empty", Value::keyed());
    codec.encode(&value, "/v").unwrap();

    let back: Value = codec.decode("/v").unwrap();
    assert_eq!(back.get("age"), Some(&Value::from(38i64)));
    assert_eq!(back.get("ratio"), Some(&Value::from(0.5)));
    // A bool is stored as `1`, a digit-only text as its digits, and an
    // empty map as an empty directory.
    assert_eq!(back.get("flag"), Some(&Value::from(1i64)));
    assert_eq!(back.get("zip"), Some(&Value::from("007")));
    assert_eq!(back.get("digits"), Some(&Value::from(12345i64)));
    assert_eq!(back.get("empty"), Some(&Value::sequence()));
}

#[test]
fn test_unit_typed_fields_round_trip() {
    use std::marker::PhantomData;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Marker;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Tagged<T> {
        name: String,
        marker: Marker,
        _kind: PhantomData<T>,
    }

    let codec = TreeCodec::builder().backend(InMemory::new()).build();
    let tagged = Tagged::<u8> {
        name: "a".to_string(),
        marker: Marker,
        _kind: PhantomData,
    };
    codec.encode(&tagged, "/t").unwrap();

    let back: Tagged<u8> = codec.decode("/t").unwrap();
    assert_eq!(back, tagged);
}

#[test]
fn test_flattened_records_round_trip() {
    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Inner {
        age: i64,
        ratio: f64,
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Outer {
        name: String,
        #[serde(flatten)]
        inner: Inner,
    }

    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("outer");
    let codec = TreeCodec::new();

    let outer = Outer {
        name: "a".to_string(),
        inner: Inner {
            age: 38,
            ratio: 0.25,
        },
    };
    codec.encode(&outer, &target).unwrap();
    assert_eq!(read(target.join("age.txt")), "38");

    let back: Outer = codec.decode(&target).unwrap();
    assert_eq!(back, outer);
}

#[test]
fn test_tagged_and_untagged_enums_round_trip() {
    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    #[serde(tag = "type")]
    enum Figure {
        Circle { r: u32 },
        Label { text: String },
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    #[serde(untagged)]
    enum Amount {
        Count(i64),
        Word(String),
    }

    let codec = TreeCodec::builder().backend(InMemory::new()).build();

    let figures = vec![
        Figure::Circle { r: 4 },
        Figure::Label {
            text: "hi".to_string(),
        },
    ];
    codec.encode(&figures, "/figures").unwrap();
    assert_eq!(codec.decode::<Vec<Figure>>("/figures").unwrap(), figures);

    let amounts = vec![Amount::Count(5), Amount::Word("five".to_string())];
    codec.encode(&amounts, "/amounts").unwrap();
    assert_eq!(codec.decode::<Vec<Amount>>("/amounts").unwrap(), amounts);
}

#[test]
fn test_library_scalars_match_the_scalar_codec() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("cart");
    let codec = TreeCodec::new();

    let mut cart = cart();
    cart.created = Utc.timestamp_opt(1_700_000_000, 123_456_000).unwrap();
    codec.encode(&cart, &target).unwrap();

    let expected = [
        ("created.txt", Scalar::Timestamp(cart.created)),
        ("checkout.txt", Scalar::Locator(cart.checkout.clone())),
        ("id.txt", Scalar::Identifier(cart.id)),
    ];
    for (file, scalar) in expected {
        let stored = read(target.join(file));
        assert_eq!(stored, scalar.render(), "{file}");
        assert_eq!(
            Scalar::from_bytes(scalar.kind(), stored.as_bytes()).unwrap(),
            scalar
        );
    }

    let back: Cart = codec.decode(&target).unwrap();
    assert_eq!(back, cart);
}

#[test]
fn test_shared_backend_handle() {
    let disk = Arc::new(InMemory::new());
    let codec = TreeCodec::builder().backend(Arc::clone(&disk)).build();

    codec.encode(&vec![1, 2, 3], "/nums").unwrap();
    assert_eq!(
        &disk.read(Path::new("/nums/2.txt")).unwrap()[..],
        b"3"
    );
}
