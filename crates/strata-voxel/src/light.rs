//! Packed per-cell light values.
//!
//! A light value is a `u16` made of four nibbles. The top nibble is the
//! intensity used by flood fill; the lower three carry red, green and blue
//! levels that the mesher bakes into vertex colour.

/// A packed light value.
pub type Light = u16;

/// No light at all.
pub const LIGHT_NONE: Light = 0;

/// Maximum intensity, white.
pub const LIGHT_FULL: Light = 0xFFFF;

/// Maximum value of a single nibble.
pub const MAX_LEVEL: u8 = 15;

/// Packs an intensity and an RGB colour into a light value.
pub fn pack_light(intensity: u8, r: u8, g: u8, b: u8) -> Light {
    (u16::from(intensity & 0xF) << 12)
        | (u16::from(r & 0xF) << 8)
        | (u16::from(g & 0xF) << 4)
        | u16::from(b & 0xF)
}

/// Returns the intensity nibble.
pub fn intensity(light: Light) -> u8 {
    (light >> 12) as u8
}

/// Replaces the intensity nibble, keeping the colour bits.
pub fn with_intensity(light: Light, level: u8) -> Light {
    (light & 0x0FFF) | (u16::from(level & 0xF) << 12)
}

/// Returns nibble `channel` (0 = blue, 1 = green, 2 = red, 3 = intensity).
pub fn channel(light: Light, channel: usize) -> u8 {
    debug_assert!(channel < 4);
    ((light >> (channel * 4)) & 0xF) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_and_unpack_channels() {
        let light = pack_light(12, 1, 2, 3);
        assert_eq!(intensity(light), 12);
        assert_eq!(channel(light, 2), 1);
        assert_eq!(channel(light, 1), 2);
        assert_eq!(channel(light, 0), 3);
        assert_eq!(channel(light, 3), 12);
    }

    #[test]
    fn test_with_intensity_keeps_colour() {
        let light = pack_light(15, 4, 5, 6);
        let dimmed = with_intensity(light, 3);
        assert_eq!(intensity(dimmed), 3);
        assert_eq!(dimmed & 0x0FFF, light & 0x0FFF);
    }

    #[test]
    fn test_full_is_max_everything() {
        assert_eq!(intensity(LIGHT_FULL), MAX_LEVEL);
        assert_eq!(LIGHT_FULL, pack_light(15, 15, 15, 15));
    }
}
