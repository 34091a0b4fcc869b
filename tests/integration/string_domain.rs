#![allow(missing_docs)]

use cardest::statistics::StringDomain;
use cardest::types::StatsError;

const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";

fn domain() -> StringDomain {
    StringDomain::new(LOWERCASE, 4).expect("lowercase domain")
}

// 26^3 + 26^2 + 26 + 1, 26^2 + 26 + 1 and 26 + 1: strings sharing a first,
// second or third character span this many codes.
const SPAN_1: u64 = 18_279;
const SPAN_2: u64 = 703;
const SPAN_3: u64 = 27;

#[test]
fn encoding_matches_positional_formula() {
    let domain = domain();
    let cases = [
        ("", 0),
        ("a", 1),
        ("aa", 2),
        ("aaaa", 4),
        ("aaab", 5),
        ("azzz", 1 + (25 * SPAN_2 + 1) + (25 * SPAN_3 + 1) + (25 + 1)),
        ("b", SPAN_1 + 1),
        ("ba", SPAN_1 + 1 + 1),
        ("bhja", SPAN_1 + 1 + (7 * SPAN_2 + 1) + (9 * SPAN_3 + 1) + 1),
        ("cde", 2 * SPAN_1 + 1 + (3 * SPAN_2 + 1) + (4 * SPAN_3 + 1)),
        ("zzzz", 475_254),
    ];
    for (value, code) in cases {
        assert_eq!(domain.encode(value), code, "encode({value:?})");
        assert_eq!(domain.decode(code), value, "decode({code})");
    }
}

#[test]
fn decoding_is_strictly_increasing_over_the_whole_range() {
    let domain = domain();
    let max = domain.max_encoded();
    assert_eq!(max, 475_254);
    let mut previous = domain.decode(0);
    for code in 1..=max {
        let current = domain.decode(code);
        assert!(previous < current, "{previous:?} !< {current:?} at {code}");
        previous = current;
    }
}

#[test]
fn encoding_inverts_decoding_over_the_whole_range() {
    let domain = domain();
    for code in 0..=domain.max_encoded() {
        assert_eq!(domain.encode(&domain.decode(code)), code);
    }
}

#[test]
fn neighbours_follow_encoding_order() {
    let domain = domain();
    for value in ["", "a", "abz", "abzz", "m", "yzzz"] {
        let next = domain.next_string(value);
        assert_eq!(domain.encode(&next), domain.encode(value) + 1, "next of {value:?}");
        assert_eq!(domain.previous_string(&next), value);
    }
    assert_eq!(domain.next_string("zzzz"), "zzzz");
    assert_eq!(domain.previous_string(""), "");
}

#[test]
fn long_values_are_ordered_by_their_prefix() {
    let domain = domain();
    assert_eq!(domain.truncate("abcdefgh"), "abcd");
    assert_eq!(domain.encode("abcdefgh"), domain.encode("abcd"));
    assert!(domain.supports("hello", false));
    assert!(!domain.supports("Hello", false));
    assert!(domain.supports("he%l_", true));
    assert!(!domain.supports("he%l_", false));
}

#[test]
fn configuration_errors_are_reported() {
    for (alphabet, prefix_length) in [("abd", 4), ("zyx", 4), ("a", 4), (LOWERCASE, 0), (LOWERCASE, 14)] {
        let err = StringDomain::new(alphabet, prefix_length).unwrap_err();
        assert!(matches!(err, StatsError::Config(_)), "{alphabet:?}/{prefix_length}: {err}");
        assert_eq!(err.code(), "Config");
    }
    let widest = StringDomain::default_prefix_length(26);
    assert!(StringDomain::new(LOWERCASE, widest).is_ok());
}
