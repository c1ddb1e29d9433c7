//! Byte shuffle pre-filter.
//!
//! Transposes an array of `element_size`-byte elements so that byte 0 of
//! every element comes first, then byte 1, and so on. Trailing bytes that do
//! not form a whole element are copied through unchanged.

/// Shuffle `input` for elements of `element_size` bytes.
pub fn shuffle(input: &[u8], element_size: usize) -> Vec<u8> {
    if element_size <= 1 || input.len() < element_size {
        return input.to_vec();
    }

    let count = input.len() / element_size;
    let body = count * element_size;
    let mut output = vec![0u8; input.len()];

    for (i, element) in input[..body].chunks_exact(element_size).enumerate() {
        for (b, &byte) in element.iter().enumerate() {
            output[b * count + i] = byte;
        }
    }
    output[body..].copy_from_slice(&input[body..]);

    output
}

/// Invert [`shuffle`].
pub fn unshuffle(input: &[u8], element_size: usize) -> Vec<u8> {
    if element_size <= 1 || input.len() < element_size {
        return input.to_vec();
    }

    let count = input.len() / element_size;
    let body = count * element_size;
    let mut output = vec![0u8; input.len()];

    for (i, element) in output[..body].chunks_exact_mut(element_size).enumerate() {
        for (b, byte) in element.iter_mut().enumerate() {
            *byte = input[b * count + i];
        }
    }
    output[body..].copy_from_slice(&input[body..]);

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_shuffle_groups_bytes() {
        let input = [1u8, 2, 3, 4, 5, 6, 7, 8];
        assert_eq!(shuffle(&input, 4), vec![1, 5, 2, 6, 3, 7, 4, 8]);
        assert_eq!(shuffle(&input, 2), vec![1, 3, 5, 7, 2, 4, 6, 8]);
    }

    #[test]
    fn test_shuffle_keeps_tail() {
        let input = [1u8, 2, 3, 4, 9];
        assert_eq!(shuffle(&input, 2), vec![1, 3, 2, 4, 9]);
        assert_eq!(unshuffle(&shuffle(&input, 2), 2), input.to_vec());
    }

    #[test]
    fn test_degenerate_sizes_are_identity() {
        let input = [7u8, 8, 9];
        assert_eq!(shuffle(&input, 1), input.to_vec());
        assert_eq!(shuffle(&input, 8), input.to_vec());
        assert_eq!(shuffle(&[], 4), Vec::<u8>::new());
    }

    proptest! {
        #[test]
        fn prop_unshuffle_inverts_shuffle(
            data in prop::collection::vec(any::<u8>(), 0..512),
            size in prop_oneof![Just(1usize), Just(2), Just(4), Just(8)],
        ) {
            prop_assert_eq!(unshuffle(&shuffle(&data, size), size), data);
        }
    }
}
