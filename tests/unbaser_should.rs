use streamrelay::server::utils::unbaser_utils::{ALPHABET_62, ALPHABET_95, UnbaseError, Unbaser};

// plain positional encoding, what the packer does for radix <= 36
fn to_base(mut n: u64, radix: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % radix) as usize]);
        n /= radix;
    }
    out.reverse();
    String::from_utf8(out).unwrap()
}

#[test]
fn test_positional_round_trip() {
    for radix in 2..=36u32 {
        let unbaser = Unbaser::new(radix).unwrap();
        for n in (0..2000u64).chain([65_535, 1_000_000, u32::MAX as u64]) {
            let token = to_base(n, radix as u64);
            assert_eq!(unbaser.unbase(&token).unwrap(), n, "radix {} token {}", radix, token);
        }
    }
}

#[test]
fn test_positional_accepts_uppercase_digits() {
    let unbaser = Unbaser::new(16).unwrap();
    assert_eq!(unbaser.unbase("FF").unwrap(), 255);
}

#[test]
fn test_positional_rejects_invalid_digits() {
    let unbaser = Unbaser::new(10).unwrap();

    // english words get packed too, those have to miss instead of half parsing
    assert!(matches!(
        unbaser.unbase("12z"),
        Err(UnbaseError::Decode { radix: 10, .. })
    ));
    assert!(unbaser.unbase("hello").is_err());
    assert!(unbaser.unbase("+5").is_err());
    assert!(unbaser.unbase("").is_err());
}

#[test]
fn test_dictionary_single_characters_are_indices() {
    for radix in (37..=62u32).chain([95]) {
        let unbaser = Unbaser::new(radix).unwrap();
        let alphabet = if radix == 95 { ALPHABET_95 } else { ALPHABET_62 };

        for (index, ch) in alphabet.chars().take(radix as usize).enumerate() {
            assert_eq!(
                unbaser.unbase(&ch.to_string()).unwrap(),
                index as u64,
                "radix {} char {:?}",
                radix,
                ch
            );
        }
    }
}

#[test]
fn test_dictionary_most_significant_digit_first() {
    let unbaser = Unbaser::new(62).unwrap();

    assert_eq!(unbaser.unbase("10").unwrap(), 62);
    assert_eq!(unbaser.unbase("Z").unwrap(), 61);
    assert_eq!(unbaser.unbase("1a").unwrap(), 62 + 10);
    assert_eq!(unbaser.unbase("ZZ").unwrap(), 61 * 62 + 61);

    let unbaser = Unbaser::new(95).unwrap();
    assert_eq!(unbaser.unbase("! ").unwrap(), 95);
}

#[test]
fn test_dictionary_bounds_sliced_alphabets() {
    // base 40 only goes up to 'D' (index 39)
    let unbaser = Unbaser::new(40).unwrap();
    assert_eq!(unbaser.unbase("D").unwrap(), 39);
    assert!(unbaser.unbase("E").is_err());
    assert!(unbaser.unbase("_").is_err());
    assert!(unbaser.unbase("é").is_err());
}

#[test]
fn test_dictionary_overflow_is_a_decode_error() {
    let unbaser = Unbaser::new(62).unwrap();
    assert!(unbaser.unbase(&"Z".repeat(40)).is_err());
}

#[test]
fn test_unsupported_radix() {
    for radix in [0, 1, 63, 80, 94, 96, 200] {
        assert_eq!(
            Unbaser::new(radix).unwrap_err(),
            UnbaseError::UnsupportedRadix(radix)
        );
    }
}
