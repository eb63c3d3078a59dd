//! Action path tokens
//!
//! The service addresses a step inside an iteration by its id written as
//! eight upper-case hex digits. Steps of a shared step are addressed by the
//! invoking step's token followed by the child's token.

/// Width of one action path token
pub const TOKEN_WIDTH: usize = 8;

/// Encode a step id as an action path token
pub fn encode(id: u32) -> String {
    format!("{:0width$X}", id, width = TOKEN_WIDTH)
}

/// Action path of `child` inside the shared step invoked by `parent`
pub fn composite(parent: u32, child: u32) -> String {
    format!("{}{}", encode(parent), encode(child))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_known_values() {
        assert_eq!(encode(0), "00000000");
        assert_eq!(encode(255), "000000FF");
        assert_eq!(encode(u32::MAX), "FFFFFFFF");
    }

    #[test]
    fn test_encode_is_fixed_width_and_ordered() {
        let samples = [0, 1, 9, 10, 15, 16, 255, 256, 4095, 65_536, 1 << 31, u32::MAX];
        for pair in samples.windows(2) {
            let (low, high) = (encode(pair[0]), encode(pair[1]));
            assert_eq!(low.len(), TOKEN_WIDTH);
            assert_eq!(high.len(), TOKEN_WIDTH);
            assert!(low < high, "{} should sort before {}", low, high);
        }
    }

    #[test]
    fn test_composite() {
        assert_eq!(composite(2, 1), "0000000200000001");
    }
}
