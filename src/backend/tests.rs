#[cfg(test)]
mod tests {
    use crate::backend::{Float, fastmath, kernel_exp};
    use approx::assert_relative_eq;

    fn approx_equal(a: f64, b: f64, tolerance: f64) -> bool {
        (a - b).abs() <= tolerance
    }

    #[test]
    fn test_fast_exp_tracks_exact() {
        for i in -40..=40 {
            let x = i as f64 * 0.25;
            let fast = fastmath::double::exp(x);
            assert!(
                approx_equal(fast / x.exp(), 1.0, 0.03),
                "exp({x}) = {fast}, expected {}",
                x.exp()
            );
            let fast32 = fastmath::single::exp(x as f32) as f64;
            assert!(approx_equal(fast32 / x.exp(), 1.0, 0.03));
        }
    }

    #[test]
    fn test_fast_sigmoid_and_tanh() {
        for i in -30..=30 {
            let x = i as f32 * 0.3;
            assert!(approx_equal(
                fastmath::single::sigmoid(x) as f64,
                Float::sigmoid(x as f64),
                0.01
            ));
            assert!(approx_equal(
                fastmath::single::tanh(x) as f64,
                (x as f64).tanh(),
                0.015
            ));
            assert!(approx_equal(
                fastmath::double::tanh(x as f64),
                (x as f64).tanh(),
                0.015
            ));
        }
    }

    #[test]
    fn test_fast_ln() {
        for x in [0.05f64, 0.3, 1.0, 2.5, 10.0, 1000.0] {
            assert!(approx_equal(fastmath::double::ln(x), x.ln(), 0.07));
            assert!(approx_equal(fastmath::single::ln(x as f32) as f64, x.ln(), 0.07));
        }
        assert!(fastmath::single::ln(-1.0).is_nan());
        assert_eq!(fastmath::double::ln(0.0), f64::NEG_INFINITY);
    }

    #[test]
    fn test_fast_math_saturates_without_overflowing_bits() {
        let big = fastmath::single::sigmoid(500.0);
        assert!(big > 0.99 && big <= 1.0);
        let small = fastmath::single::sigmoid(-500.0);
        assert!(small >= 0.0 && small < 0.01);
        assert_relative_eq!(fastmath::single::tanh(1e9), 1.0, epsilon = 1e-3);
        assert_relative_eq!(fastmath::double::tanh(-1e9), -1.0, epsilon = 1e-3);
        assert!(fastmath::double::exp(1e6).is_finite());
        assert!(fastmath::single::exp(f32::NAN).is_nan());
    }

    #[test]
    fn test_kernel_dispatch_follows_feature() {
        let x = 1.3f64;
        if cfg!(feature = "fast-math") {
            assert_eq!(kernel_exp(x), x.fast_exp());
        } else {
            assert_eq!(kernel_exp(x), x.exp());
        }
    }

    #[test]
    fn test_clamp_to() {
        assert_eq!(3.0f32.clamp_to(-1.0, 1.0), 1.0);
        assert_eq!((-3.0f64).clamp_to(-1.0, 1.0), -1.0);
        assert_eq!(0.25f64.clamp_to(-1.0, 1.0), 0.25);
    }
}
