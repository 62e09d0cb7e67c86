//! Transfer functions and the lookup tables built from them.
//!
//! - EOTF: encoded `[0,1]` -> linear `[0,1]`
//! - OETF: linear `[0,1]` -> encoded `[0,1]`
//!
//! Reference standards:
//! - sRGB / Display P3: IEC 61966-2-1
//! - Adobe RGB (1998): pure gamma 563/256
//! - BT.2020: ITU-R BT.2020 (same curve as BT.709, 12-bit constants)

#![allow(clippy::excessive_precision)]

/// Transfer curve of an RGB space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransferFunction {
    Srgb,
    Gamma(f32),
    Rec2020,
}

/// Adobe RGB (1998) gamma.
pub const ADOBE_RGB_GAMMA: f32 = 563.0 / 256.0;
/// ROMM RGB gamma (linear toe ignored).
pub const PROPHOTO_GAMMA: f32 = 1.8;

const REC2020_ALPHA: f32 = 1.099_296_826_809_44;
const REC2020_BETA: f32 = 0.018_053_968_510_807;

/// Entries in the linear -> encoded table.
const ENCODE_LUT_SIZE: usize = 16384;

impl TransferFunction {
    /// Encoded `[0,1]` -> linear `[0,1]`.
    pub fn eotf(self, encoded: f32) -> f32 {
        let v = encoded.clamp(0.0, 1.0);
        match self {
            TransferFunction::Srgb => {
                if v <= 0.04045 {
                    v / 12.92
                } else {
                    ((v + 0.055) / 1.055).powf(2.4)
                }
            }
            TransferFunction::Gamma(gamma) => v.powf(gamma),
            TransferFunction::Rec2020 => {
                if v < 4.5 * REC2020_BETA {
                    v / 4.5
                } else {
                    ((v + REC2020_ALPHA - 1.0) / REC2020_ALPHA).powf(1.0 / 0.45)
                }
            }
        }
    }

    /// Linear `[0,1]` -> encoded `[0,1]`.
    pub fn oetf(self, linear: f32) -> f32 {
        let l = linear.clamp(0.0, 1.0);
        match self {
            TransferFunction::Srgb => {
                if l <= 0.0031308 {
                    l * 12.92
                } else {
                    1.055 * l.powf(1.0 / 2.4) - 0.055
                }
            }
            TransferFunction::Gamma(gamma) => l.powf(1.0 / gamma),
            TransferFunction::Rec2020 => {
                if l < REC2020_BETA {
                    4.5 * l
                } else {
                    REC2020_ALPHA * l.powf(0.45) - (REC2020_ALPHA - 1.0)
                }
            }
        }
    }
}

/// 8-bit code value -> linear light.
pub struct DecodeLut {
    table: [f32; 256],
}

impl DecodeLut {
    pub fn new(transfer: TransferFunction) -> Self {
        let mut table = [0.0f32; 256];
        for (code, entry) in table.iter_mut().enumerate() {
            *entry = transfer.eotf(code as f32 / 255.0);
        }
        Self { table }
    }

    #[inline]
    pub fn lookup(&self, code: u8) -> f32 {
        self.table[code as usize]
    }
}

/// Linear light -> 8-bit code value.
///
/// Entries are spaced evenly in `sqrt(linear)`, which keeps the steep toe of
/// gamma curves well sampled; lookups interpolate between neighbours.
pub struct EncodeLut {
    table: Vec<f32>,
}

impl EncodeLut {
    pub fn new(transfer: TransferFunction) -> Self {
        let last = (ENCODE_LUT_SIZE - 1) as f32;
        let table = (0..ENCODE_LUT_SIZE)
            .map(|i| {
                let t = i as f32 / last;
                transfer.oetf(t * t) * 255.0
            })
            .collect();
        Self { table }
    }

    /// Out-of-range input is clamped.
    #[inline]
    pub fn lookup(&self, linear: f32) -> u8 {
        let last = self.table.len() - 1;
        let pos = linear.clamp(0.0, 1.0).sqrt() * last as f32;
        let index = (pos as usize).min(last);
        let next = (index + 1).min(last);
        let frac = pos - index as f32;
        let value = self.table[index] + (self.table[next] - self.table[index]) * frac;
        value.round().clamp(0.0, 255.0) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [TransferFunction; 3] = [
        TransferFunction::Srgb,
        TransferFunction::Gamma(ADOBE_RGB_GAMMA),
        TransferFunction::Rec2020,
    ];

    #[test]
    fn test_endpoints() {
        for tf in ALL {
            assert!(tf.eotf(0.0).abs() < 1e-6, "{tf:?}");
            assert!((tf.eotf(1.0) - 1.0).abs() < 1e-5, "{tf:?}");
            assert!(tf.oetf(0.0).abs() < 1e-6, "{tf:?}");
            assert!((tf.oetf(1.0) - 1.0).abs() < 1e-5, "{tf:?}");
        }
    }

    #[test]
    fn test_srgb_mid_gray() {
        // sRGB 0.5 encoded is about 21.4% linear light
        let linear = TransferFunction::Srgb.eotf(0.5);
        assert!((linear - 0.214).abs() < 0.001);
    }

    #[test]
    fn test_oetf_inverts_eotf() {
        for tf in ALL {
            for i in 0..=100 {
                let v = i as f32 / 100.0;
                let back = tf.oetf(tf.eotf(v));
                assert!((back - v).abs() < 1e-4, "{tf:?} at {v}: {back}");
            }
        }
    }

    #[test]
    fn test_lut_roundtrip_is_exact() {
        for tf in ALL {
            let decode = DecodeLut::new(tf);
            let encode = EncodeLut::new(tf);
            for code in 0..=255u8 {
                assert_eq!(encode.lookup(decode.lookup(code)), code, "{tf:?}");
            }
        }
    }

    #[test]
    fn test_encode_lut_clamps() {
        let encode = EncodeLut::new(TransferFunction::Srgb);
        assert_eq!(encode.lookup(-0.5), 0);
        assert_eq!(encode.lookup(1.5), 255);
        assert_eq!(encode.lookup(f32::NAN), 0);
    }
}
