//! RGB primaries and RGB <-> XYZ matrices.
//!
//! Matrices are derived from chromaticity coordinates at runtime in `f64`
//! rather than stored as rounded constants, so forward and inverse
//! transforms agree to well below one 8-bit code value.

#![allow(clippy::excessive_precision)]

/// CIE 1931 xy chromaticity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Chromaticity {
    pub x: f64,
    pub y: f64,
}

impl Chromaticity {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// XYZ with Y normalized to 1.
    fn to_xyz(self) -> [f64; 3] {
        [self.x / self.y, 1.0, (1.0 - self.x - self.y) / self.y]
    }
}

/// CIE standard illuminant D65.
pub const D65: Chromaticity = Chromaticity::new(0.3127, 0.3290);
/// CIE standard illuminant D50.
pub const D50: Chromaticity = Chromaticity::new(0.3457, 0.3585);

/// Red, green and blue primaries plus the reference white.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Primaries {
    pub red: Chromaticity,
    pub green: Chromaticity,
    pub blue: Chromaticity,
    pub white: Chromaticity,
}

/// IEC 61966-2-1 / BT.709.
pub const SRGB_PRIMARIES: Primaries = Primaries {
    red: Chromaticity::new(0.64, 0.33),
    green: Chromaticity::new(0.30, 0.60),
    blue: Chromaticity::new(0.15, 0.06),
    white: D65,
};

/// DCI-P3 primaries with a D65 white.
pub const DISPLAY_P3_PRIMARIES: Primaries = Primaries {
    red: Chromaticity::new(0.680, 0.320),
    green: Chromaticity::new(0.265, 0.690),
    blue: Chromaticity::new(0.150, 0.060),
    white: D65,
};

/// Adobe RGB (1998).
pub const ADOBE_RGB_PRIMARIES: Primaries = Primaries {
    red: Chromaticity::new(0.64, 0.33),
    green: Chromaticity::new(0.21, 0.71),
    blue: Chromaticity::new(0.15, 0.06),
    white: D65,
};

/// ITU-R BT.2020.
pub const REC2020_PRIMARIES: Primaries = Primaries {
    red: Chromaticity::new(0.708, 0.292),
    green: Chromaticity::new(0.170, 0.797),
    blue: Chromaticity::new(0.131, 0.046),
    white: D65,
};

/// ROMM RGB; referenced to D50.
pub const PROPHOTO_PRIMARIES: Primaries = Primaries {
    red: Chromaticity::new(0.7347, 0.2653),
    green: Chromaticity::new(0.1596, 0.8404),
    blue: Chromaticity::new(0.0366, 0.0001),
    white: D50,
};

/// 3x3 matrix for color transformations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix3(pub [[f64; 3]; 3]);

impl Matrix3 {
    pub const IDENTITY: Self = Self([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);

    /// Multiply matrix by a column vector.
    #[inline]
    pub fn transform(&self, v: [f64; 3]) -> [f64; 3] {
        let m = &self.0;
        [
            m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
            m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
            m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
        ]
    }

    /// Matrix multiplication: self * other
    pub fn multiply(&self, other: &Self) -> Self {
        let a = &self.0;
        let b = &other.0;
        let mut result = [[0.0f64; 3]; 3];

        for (i, row) in result.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = a[i][0] * b[0][j] + a[i][1] * b[1][j] + a[i][2] * b[2][j];
            }
        }

        Self(result)
    }

    /// Inverse by cofactor expansion. `None` for a singular matrix.
    pub fn inverse(&self) -> Option<Self> {
        let m = &self.0;
        let c00 = m[1][1] * m[2][2] - m[1][2] * m[2][1];
        let c01 = m[1][2] * m[2][0] - m[1][0] * m[2][2];
        let c02 = m[1][0] * m[2][1] - m[1][1] * m[2][0];
        let det = m[0][0] * c00 + m[0][1] * c01 + m[0][2] * c02;
        if det.abs() < 1e-12 {
            return None;
        }
        let inv = 1.0 / det;

        Some(Self([
            [
                c00 * inv,
                (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv,
                (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv,
            ],
            [
                c01 * inv,
                (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv,
                (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv,
            ],
            [
                c02 * inv,
                (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv,
                (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv,
            ],
        ]))
    }
}

impl Primaries {
    /// Linear RGB to XYZ matrix relative to this space's own white.
    pub fn rgb_to_xyz(&self) -> Option<Matrix3> {
        let r = self.red.to_xyz();
        let g = self.green.to_xyz();
        let b = self.blue.to_xyz();
        let p = Matrix3([[r[0], g[0], b[0]], [r[1], g[1], b[1]], [r[2], g[2], b[2]]]);

        // Scale each primary so that RGB (1, 1, 1) lands on the white point.
        let s = p.inverse()?.transform(self.white.to_xyz());
        let m = &p.0;
        Some(Matrix3([
            [m[0][0] * s[0], m[0][1] * s[1], m[0][2] * s[2]],
            [m[1][0] * s[0], m[1][1] * s[1], m[1][2] * s[2]],
            [m[2][0] * s[0], m[2][1] * s[1], m[2][2] * s[2]],
        ]))
    }
}
