use ibig::UBig;

// Macro to create a bitmask
#[macro_export]
macro_rules! bitmask {
    ( $start_bit:expr,$width:expr ) => {{ ((1 << $width) - 1) << $start_bit }};
    ( $end_bit:expr;$start_bit:expr ) => {
        bitmask!($start_bit, $end_bit - $start_bit + 1)
    };
    ( $width:expr ) => {
        bitmask!(0, $width)
    };
}

// Macro to extract bits from a value
#[macro_export]
macro_rules! bits {
    ( $val:expr,$start_bit:expr,$width:expr ) => {{ ($val >> $start_bit) & ((1 << $width) - 1) }};
    ( $val:expr,$end_bit:expr;$start_bit:expr ) => {
        bits!($val, $start_bit, $end_bit - $start_bit + 1)
    };
    ( $val:expr,$bit:expr ) => {
        bits!($val, $bit, 1)
    };
}

#[test]
fn test_bits() {
    let ten = 0b1010;

    assert_eq!(bits!(ten, 0), 0b0);
    assert_eq!(bits!(ten, 1), 0b1);
    assert_eq!(bits!(ten, 2), 0b0);
    assert_eq!(bits!(ten, 3), 0b1);

    assert_eq!(bits!(ten, 0, 2), 0b10);
    assert_eq!(bits!(ten, 1, 3), 0b101);
    assert_eq!(bits!(ten, 3;1), 0b101);
}

#[test]
fn test_bitmask() {
    assert_eq!(bitmask!(0, 5), 0b11111);
    assert_eq!(bitmask!(10;5), 0b11111100000);
    assert_eq!(bitmask!(5), 0b11111);
}

/// All-ones word of `width` bits.
pub fn ones(width: usize) -> UBig {
    (UBig::from(1u8) << width) - UBig::from(1u8)
}

/// The `index`-th `width`-bit slice of `word`, shifted down to bit 0.
pub fn segment(word: &UBig, index: usize, width: usize) -> UBig {
    (word >> (index * width)) & ones(width)
}

/// `word` with its `index`-th `width`-bit slice replaced by the low bits of `value`.
pub fn with_segment(word: &UBig, index: usize, width: usize, value: &UBig) -> UBig {
    let offset = index * width;
    let mask = ones(width) << offset;
    let cleared = word - (word & &mask);
    cleared | ((value & ones(width)) << offset)
}

/// Strobe counterpart of [`segment`]; strobes carry one bit per lane.
pub fn strb_segment(strb: u128, index: usize, width: usize) -> u128 {
    (strb >> (index * width)) & strb_ones(width)
}

pub fn strb_ones(width: usize) -> u128 {
    if width >= 128 {
        u128::MAX
    } else {
        (1u128 << width) - 1
    }
}

/// Little-endian byte view of `word`, zero padded (or truncated) to `len` bytes.
pub fn word_to_bytes(word: &UBig, len: usize) -> Vec<u8> {
    let mut bytes = word.to_le_bytes();
    bytes.resize(len, 0);
    bytes
}

pub fn word_from_bytes(bytes: &[u8]) -> UBig {
    UBig::from_le_bytes(bytes)
}

#[test]
fn test_segments() {
    let word = UBig::from(0x4433_2211u32);

    assert_eq!(segment(&word, 0, 8), UBig::from(0x11u8));
    assert_eq!(segment(&word, 3, 8), UBig::from(0x44u8));
    assert_eq!(segment(&word, 1, 16), UBig::from(0x4433u16));

    let replaced = with_segment(&word, 1, 8, &UBig::from(0xAAu8));
    assert_eq!(replaced, UBig::from(0x4433_AA11u32));

    // value wider than the slice only contributes its low bits
    let replaced = with_segment(&word, 2, 8, &UBig::from(0x1BBu16));
    assert_eq!(replaced, UBig::from(0x44BB_2211u32));
}

#[test]
fn test_strb_segments() {
    assert_eq!(strb_segment(0b1011_0110, 1, 4), 0b1011);
    assert_eq!(strb_segment(0b1011_0110, 0, 4), 0b0110);
    assert_eq!(strb_ones(128), u128::MAX);
    assert_eq!(strb_segment(u128::MAX, 0, 128), u128::MAX);
}

#[test]
fn test_word_bytes() {
    let word = word_from_bytes(&[0x01, 0x02, 0x03]);
    assert_eq!(word, UBig::from(0x030201u32));
    assert_eq!(word_to_bytes(&word, 5), vec![1, 2, 3, 0, 0]);
    assert_eq!(word_to_bytes(&UBig::from(0u8), 2), vec![0, 0]);
}
