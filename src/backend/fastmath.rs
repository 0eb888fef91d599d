//! Bit-level approximations of `exp`, `ln`, `sigmoid` and `tanh`.
//!
//! An IEEE-754 value reinterpreted as an integer is roughly a scaled and shifted `log2` of
//! the value, so a linear map on the integer side followed by a reinterpretation back gives
//! an approximate exponential (and the inverse trick gives a logarithm). The offsets are the
//! calibrated constants from Schraudolph-style approximations; `exp` is computed as the
//! ratio `e^(x/2) / e^(-x/2)`, which cancels most of the error of either half.
//!
//! Inputs are clamped so that the float-to-integer conversion never saturates into the sign
//! or exponent-overflow range.

/// Single precision.
pub mod single {
    const HALF_BIAS: f32 = 1_056_478_197.0;
    const HALF_SCALE: f32 = 6_051_102.0;
    const BIAS: f32 = 1_064_866_805.0;
    const SCALE: f32 = 12_102_203.0;
    const BIAS_BITS: i32 = 1_064_866_805;

    /// Largest magnitude for which both halves stay finite and positive.
    const LIMIT: f32 = 87.0;

    #[inline]
    fn bits(v: f32) -> f32 {
        f32::from_bits(v as i32 as u32)
    }

    #[inline]
    fn halves(a: f32) -> (f32, f32) {
        let a = a.clamp(-LIMIT, LIMIT);
        (bits(HALF_BIAS + HALF_SCALE * a), bits(HALF_BIAS - HALF_SCALE * a))
    }

    pub fn exp(a: f32) -> f32 {
        if a.is_nan() {
            return a;
        }
        let (p, n) = halves(a);
        p / n
    }

    pub fn ln(a: f32) -> f32 {
        if !(a > 0.0) || a.is_infinite() {
            return a.ln();
        }
        (a.to_bits() as i32 - BIAS_BITS) as f32 * (1.0 / SCALE)
    }

    pub fn sigmoid(a: f32) -> f32 {
        if a.is_nan() {
            return a;
        }
        let (p, n) = halves(a);
        p / (p + n)
    }

    pub fn tanh(a: f32) -> f32 {
        if a.is_nan() {
            return a;
        }
        let a = a.clamp(-LIMIT, LIMIT);
        let p = bits(BIAS + SCALE * a);
        let n = bits(BIAS - SCALE * a);
        (p - n) / (p + n)
    }
}

/// Double precision.
pub mod double {
    const HALF_BIAS: f64 = 4_602_417_678_782_656_274.0; // 0x3fdf127e83d16f12
    const HALF_SCALE: f64 = 3_248_660_424_278_399.0;
    const BIAS: f64 = 4_606_921_278_410_026_770.0; // 0x3fef127e83d16f12
    const SCALE: f64 = 6_497_320_848_556_798.0;
    const BIAS_BITS: i64 = 0x3fef_127e_83d1_6f12;
    const INV_SCALE: f64 = 1.539_095_918_623_324e-16;

    const LIMIT: f64 = 700.0;

    #[inline]
    fn bits(v: f64) -> f64 {
        f64::from_bits(v as i64 as u64)
    }

    #[inline]
    fn halves(a: f64) -> (f64, f64) {
        let a = a.clamp(-LIMIT, LIMIT);
        (bits(HALF_BIAS + HALF_SCALE * a), bits(HALF_BIAS - HALF_SCALE * a))
    }

    pub fn exp(a: f64) -> f64 {
        if a.is_nan() {
            return a;
        }
        let (p, n) = halves(a);
        p / n
    }

    pub fn ln(a: f64) -> f64 {
        if !(a > 0.0) || a.is_infinite() {
            return a.ln();
        }
        (a.to_bits() as i64 - BIAS_BITS) as f64 * INV_SCALE
    }

    pub fn sigmoid(a: f64) -> f64 {
        if a.is_nan() {
            return a;
        }
        let (p, n) = halves(a);
        p / (p + n)
    }

    pub fn tanh(a: f64) -> f64 {
        if a.is_nan() {
            return a;
        }
        let a = a.clamp(-LIMIT, LIMIT);
        let p = bits(BIAS + SCALE * a);
        let n = bits(BIAS - SCALE * a);
        (p - n) / (p + n)
    }
}
