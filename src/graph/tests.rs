#[cfg(test)]
mod tests {
    use crate::graph::{
        Op, Unit, Var, add, add_into, exp, log_softmax, logsumexp, matmul, matmul_into, mul,
        mul_into, sigmoid, sub, sub_into, tanh,
    };
    use crate::tensor::{Rank1, Rank2, Rank3, Shape, Tensor};
    use approx::assert_abs_diff_eq;

    /// Relative tolerance for analytic vs finite-difference gradients. Forward values go
    /// through the approximate kernels in fast-math builds while the reference uses `std`.
    fn grad_tol() -> f64 {
        if cfg!(feature = "fast-math") { 0.1 } else { 1e-5 }
    }

    fn seed<S: Shape>() -> Tensor<f64, S> {
        Tensor::from_fn(|i| 0.5 + 0.25 * (i % 3) as f64)
    }

    fn sample<S: Shape>(scale: f64) -> Tensor<f64, S> {
        Tensor::from_fn(|i| ((i as f64 + 1.0) * 0.73).sin() * scale)
    }

    /// Compares `analytic` with the central difference of `loss` around `x`.
    fn check_grad<S: Shape>(
        x: &Tensor<f64, S>,
        analytic: &Tensor<f64, S>,
        loss: impl Fn(&Tensor<f64, S>) -> f64,
    ) {
        let h = 1e-6;
        for i in 0..S::NUMEL {
            let mut xp = x.clone();
            xp.as_mut_slice()[i] += h;
            let mut xm = x.clone();
            xm.as_mut_slice()[i] -= h;
            let numeric = (loss(&xp) - loss(&xm)) / (2.0 * h);
            let a = analytic.as_slice()[i];
            assert!(
                (a - numeric).abs() <= grad_tol() * (1.0 + numeric.abs()),
                "gradient mismatch at {i}: analytic {a}, numeric {numeric}"
            );
        }
    }

    fn weighted_sum<S: Shape>(s: &Tensor<f64, S>, y: &Tensor<f64, S>) -> f64 {
        s.iter().zip(y.iter()).map(|(s, y)| s * y).sum()
    }

    #[test]
    fn test_scalar_example() {
        let a = Var::new(2.0f64);
        let w = Var::new(1.1f64);
        let b = Var::new(2.0f64);

        let out = &a * &w + &b;
        assert_abs_diff_eq!(*out.value(), 4.2, epsilon = 1e-12);
        out.backward(1.0);

        assert_abs_diff_eq!(*w.grad(), 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(*b.grad(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(*a.grad(), 1.1, epsilon = 1e-12);
    }

    #[test]
    fn test_fan_out_gradients_add_up() {
        let x = Var::new(0.7f64);
        {
            let y = &x * &x + &x * 3.0 + (&x - 1.0);
            y.backward(1.0);
        }
        let together = *x.grad();

        let mut separate = 0.0;
        x.zero_grad();
        mul(&x, &x).backward(1.0);
        separate += *x.grad();
        x.zero_grad();
        mul(&x, 3.0f64).backward(1.0);
        separate += *x.grad();
        x.zero_grad();
        sub(&x, 1.0f64).backward(1.0);
        separate += *x.grad();

        assert_abs_diff_eq!(together, 2.0 * 0.7 + 3.0 + 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(together, separate, epsilon = 1e-12);
    }

    #[test]
    fn test_constants_take_no_gradient() {
        let x = Var::new(Tensor::from([1.0f64, -2.0, 3.0]));
        let w = Var::new(Tensor::from([0.5f64, 0.5, 2.0]));
        let c = Tensor::from([10.0f64, 20.0, 30.0]);

        (&x * &w).backward(Tensor::ones());
        let (gx, gw) = (x.grad().clone(), w.grad().clone());
        x.zero_grad();
        w.zero_grad();

        (&x * &w + &c).backward(Tensor::ones());
        assert_eq!(*x.grad(), gx);
        assert_eq!(*w.grad(), gw);
        assert_eq!(c.as_slice(), &[10.0, 20.0, 30.0]);

        // A constant factor scales the gradient but is itself left alone.
        x.zero_grad();
        (&c * &x).backward(Tensor::ones());
        assert_eq!(x.grad().as_slice(), c.as_slice());
    }

    #[test]
    fn test_subtraction_negates_right_gradient() {
        let a = Var::new(5.0f64);
        let b = Var::new(3.0f64);
        (&a - &b).backward(1.0);
        assert_eq!(*a.grad(), 1.0);
        assert_eq!(*b.grad(), -1.0);
    }

    #[test]
    fn test_broadcast_gradients_reduce_to_operand_shape() {
        let xv: Tensor<f64, Rank2<2, 3>> = sample(1.0);
        let bv: Tensor<f64, Rank1<3>> = sample(0.5);
        let s = seed::<Rank2<2, 3>>();

        let x = Var::new(xv.clone());
        let b = Var::new(bv.clone());
        add(&x, &b).backward(s.clone());
        check_grad(&xv, &x.grad(), |x| weighted_sum(&s, &(x + &bv)));
        check_grad(&bv, &b.grad(), |b| weighted_sum(&s, &(&xv + b)));

        let x = Var::new(xv.clone());
        let b = Var::new(bv.clone());
        sub(&x, &b).backward(s.clone());
        check_grad(&bv, &b.grad(), |b| weighted_sum(&s, &(&xv - b)));

        let x = Var::new(xv.clone());
        let b = Var::new(bv.clone());
        mul(&x, &b).backward(s.clone());
        check_grad(&xv, &x.grad(), |x| weighted_sum(&s, &(x * &bv)));
        check_grad(&bv, &b.grad(), |b| weighted_sum(&s, &(&xv * b)));
    }

    #[test]
    fn test_matmul_gradients() {
        let av: Tensor<f64, Rank2<2, 3>> = sample(1.0);
        let bv: Tensor<f64, Rank2<3, 4>> = sample(0.8);
        let s = seed::<Rank2<2, 4>>();

        let a = Var::new(av.clone());
        let b = Var::new(bv.clone());
        (&a % &b).backward(s.clone());
        check_grad(&av, &a.grad(), |a| weighted_sum(&s, &a.matmul(&bv)));
        check_grad(&bv, &b.grad(), |b| weighted_sum(&s, &av.matmul(b)));
    }

    #[test]
    fn test_batched_matmul_gradients_sum_over_batch() {
        let av: Tensor<f64, Rank3<2, 2, 3>> = sample(1.0);
        let bv: Tensor<f64, Rank2<3, 4>> = sample(0.8);
        let s = seed::<Rank3<2, 2, 4>>();

        let a = Var::new(av.clone());
        let b = Var::new(bv.clone());
        matmul(&a, &b).backward(s.clone());
        check_grad(&av, &a.grad(), |a| weighted_sum(&s, &a.matmul(&bv)));
        check_grad(&bv, &b.grad(), |b| weighted_sum(&s, &av.matmul(b)));
    }

    #[test]
    fn test_unary_gradients() {
        let xv: Tensor<f64, Rank2<2, 3>> = sample(1.5);
        let s = seed::<Rank2<2, 3>>();

        let x = Var::new(xv.clone());
        exp(&x).backward(s.clone());
        check_grad(&xv, &x.grad(), |x| weighted_sum(&s, &x.map(f64::exp)));

        let x = Var::new(xv.clone());
        tanh(&x).backward(s.clone());
        check_grad(&xv, &x.grad(), |x| weighted_sum(&s, &x.map(f64::tanh)));

        let x = Var::new(xv.clone());
        sigmoid(&x).backward(s.clone());
        check_grad(&xv, &x.grad(), |x| {
            weighted_sum(&s, &x.map(|v| 1.0 / (1.0 + (-v).exp())))
        });

        let x = Var::new(xv.clone());
        (-&x).backward(s.clone());
        check_grad(&xv, &x.grad(), |x| weighted_sum(&s, &(-x)));
    }

    fn exact_lse(row: &[f64]) -> f64 {
        let m = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        row.iter().map(|x| (x - m).exp()).sum::<f64>().ln() + m
    }

    #[test]
    fn test_logsumexp_gradient_is_softmax() {
        let xv: Tensor<f64, Rank2<2, 3>> = sample(2.0);
        let s = seed::<Rank2<2, 1>>();

        let x = Var::new(xv.clone());
        logsumexp(&x).backward(s.clone());
        check_grad(&xv, &x.grad(), |x| {
            x.as_slice()
                .chunks(3)
                .zip(s.iter())
                .map(|(row, s)| s * exact_lse(row))
                .sum()
        });
    }

    #[test]
    fn test_log_softmax_composite_gradient() {
        let xv: Tensor<f64, Rank2<2, 3>> = sample(2.0);
        let s = seed::<Rank2<2, 3>>();

        let x = Var::new(xv.clone());
        let y = log_softmax(&x);
        assert_abs_diff_eq!(
            y.value().as_slice()[4],
            xv.as_slice()[4] - exact_lse(&xv.as_slice()[3..]),
            epsilon = 0.1
        );
        y.backward(s.clone());

        check_grad(&xv, &x.grad(), |x| {
            x.as_slice()
                .chunks(3)
                .zip(s.as_slice().chunks(3))
                .map(|(row, s)| {
                    let lse = exact_lse(row);
                    row.iter().zip(s).map(|(x, s)| s * (x - lse)).sum::<f64>()
                })
                .sum()
        });
    }

    #[test]
    fn test_nested_expression_chain_rule() {
        let xv: Tensor<f64, Rank2<1, 3>> = sample(1.0);
        let wv: Tensor<f64, Rank2<3, 2>> = sample(0.6);
        let bv: Tensor<f64, Rank1<2>> = sample(0.3);
        let s = seed::<Rank2<1, 2>>();

        let x = Var::new(xv.clone());
        let w = Var::new(wv.clone());
        let b = Var::new(bv.clone());
        tanh(&x % &w + &b).backward(s.clone());

        let forward = |x: &Tensor<f64, Rank2<1, 3>>, w: &Tensor<f64, Rank2<3, 2>>| {
            (x.matmul(w) + &bv).map(f64::tanh)
        };
        check_grad(&wv, &w.grad(), |w| weighted_sum(&s, &forward(&xv, w)));
        check_grad(&xv, &x.grad(), |x| weighted_sum(&s, &forward(x, &wv)));
    }

    #[test]
    fn test_backward_runs_once() {
        let x = Var::new(3.0f64);
        let mut y = &x * 2.0;
        assert!(y.is_pending());

        y.seed(1.0);
        y.propagate();
        assert!(!y.is_pending());
        y.propagate();
        drop(y);

        assert_eq!(*x.grad(), 2.0);
    }

    #[test]
    fn test_drop_propagates_seeded_gradient() {
        let x = Var::new(0.0f64);
        {
            let y = exp(&x);
            y.seed(2.0);
        }
        // exp(0) = 1, exactly 1 in both precision modes.
        assert_abs_diff_eq!(*x.grad(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_borrowed_unit_propagates_after_its_readers() {
        let x = Var::new(1.5f64);
        let h = &x * &x;
        let y = &h + &h;
        y.backward(1.0);
        assert_eq!(*h.grad(), 2.0);
        assert_eq!(*x.grad(), 0.0);

        drop(h);
        assert_abs_diff_eq!(*x.grad(), 2.0 * 2.0 * 1.5, epsilon = 1e-12);
    }

    #[test]
    fn test_shared_propagates_after_last_consumer() {
        let x = Var::new(2.0f64);
        let z = (&x * &x).shared();
        assert_eq!(z.handles(), 1);

        let y = z.clone() * 3.0 + z;
        y.backward(1.0);

        // dz = 3 + 1 and dz/dx = 2x.
        assert_abs_diff_eq!(*x.grad(), 4.0 * 2.0 * 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_composite_unit_with_two_outputs() {
        let x = Var::new(2.0f64);
        let s = Var::new(1.0f64);

        let state = (&x * &s).shared();
        let out = &x + state.clone();
        let unit = Unit::composite((out, state));
        assert_eq!(*unit.0.value(), 4.0);
        assert_eq!(*unit.1.value(), 2.0);

        unit.0.seed(1.0);
        unit.1.accumulate(&1.0);
        drop(unit);

        // The state collects 1 through `out` and 1 from its own seed.
        assert_abs_diff_eq!(*x.grad(), 1.0 + 2.0 * 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(*s.grad(), 2.0 * 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_constants_on_the_left() {
        let x = Var::new(Tensor::from([0.0f64, 1.0]));
        let y: Op<'_, Tensor<f64, Rank1<2>>> = 2.0 * &x + (1.0 - &x);
        assert_eq!(y.value().as_slice(), &[1.0, 2.0]);
        y.backward(Tensor::ones());
        assert_eq!(x.grad().as_slice(), &[1.0, 1.0]);

        let x = Var::new(Tensor::from([[1.0f64, 2.0]]));
        let w = Tensor::from([[1.0, 0.0], [0.0, 1.0]]);
        let row = Tensor::from([3.0, 4.0]);
        (&row * (&x % w)).backward(Tensor::ones());
        assert_eq!(x.grad().as_slice(), &[3.0, 4.0]);
    }

    #[test]
    fn test_scalar_variable_times_tensor_variable() {
        let k = Var::new(2.0f64);
        let t = Var::new(Tensor::from([1.0f64, 2.0, 3.0]));
        (&k * &t).backward(Tensor::ones());
        assert_eq!(*k.grad(), 6.0);
        assert_eq!(t.grad().as_slice(), &[2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_tensor_constant_on_the_left() {
        let row = Tensor::<f64, Rank1<3>>::from([1.0, 2.0, 3.0]);
        let x = Var::new(Tensor::<f64, Rank2<2, 3>>::full(2.0));

        let y = row.clone() * &x;
        assert_eq!(y.value().as_slice(), &[2.0, 4.0, 6.0, 2.0, 4.0, 6.0]);
        y.backward(Tensor::ones());
        assert_eq!(x.grad().as_slice(), &[1.0, 2.0, 3.0, 1.0, 2.0, 3.0]);

        x.zero_grad();
        let y = &row + &x;
        assert_eq!(y.value().as_slice(), &[3.0, 4.0, 5.0, 3.0, 4.0, 5.0]);
        y.backward(Tensor::ones());
        assert_eq!(x.grad().as_slice(), &[1.0; 6]);

        x.zero_grad();
        let m = Tensor::<f64, Rank2<2, 3>>::full(5.0);
        (m - &x).backward(Tensor::ones());
        assert_eq!(x.grad().as_slice(), &[-1.0; 6]);
    }

    #[test]
    fn test_unit_batch_axis_broadcasts_from_either_side() {
        let bias = Var::new(Tensor::<f64, Rank2<1, 3>>::from([[1.0, 2.0, 3.0]]));
        let x = Var::new(Tensor::<f64, Rank2<4, 3>>::from_fn(|i| i as f64));

        let y: Op<'_, Tensor<f64, Rank2<4, 3>>> = add_into(&bias, &x);
        assert_eq!(y.value().at(&[2, 1]), 7.0 + 2.0);
        y.backward(Tensor::ones());
        assert_eq!(bias.grad().as_slice(), &[4.0, 4.0, 4.0]);
        assert_eq!(x.grad().as_slice(), &[1.0; 12]);

        bias.zero_grad();
        x.zero_grad();
        let y: Op<'_, Tensor<f64, Rank2<4, 3>>> = add_into(&x, &bias);
        assert_eq!(y.value().at(&[3, 0]), 9.0 + 1.0);
        y.backward(Tensor::from_fn(|i| (i / 3) as f64));
        // Column sums of the seed rows 0, 1, 2, 3.
        assert_eq!(bias.grad().as_slice(), &[6.0, 6.0, 6.0]);
        assert_eq!(x.grad().at(&[3, 2]), 3.0);
    }

    #[test]
    fn test_explicit_output_gradients() {
        let x0 = sample::<Rank2<1, 3>>(1.0);
        let w = sample::<Rank2<4, 3>>(0.8);
        let y = seed::<Rank2<4, 3>>();

        let x = Var::new(x0.clone());
        let wv = Var::new(w.clone());
        let out: Op<'_, Tensor<f64, Rank2<4, 3>>> = mul_into(&x, &wv);
        out.backward(y.clone());
        check_grad(&x0, &x.grad(), |x| {
            let p: Tensor<f64, Rank2<4, 3>> =
                Tensor::from_fn(|i| x.as_slice()[i % 3] * w.as_slice()[i]);
            weighted_sum(&p, &y)
        });

        let x = Var::new(x0.clone());
        let wv = Var::new(w.clone());
        let out: Op<'_, Tensor<f64, Rank2<4, 3>>> = sub_into(&wv, &x);
        out.backward(y.clone());
        let expected: Vec<f64> = (0..3)
            .map(|j| -(0..4).map(|r| y.at(&[r, j])).sum::<f64>())
            .collect();
        for (g, e) in x.grad().iter().zip(&expected) {
            assert_abs_diff_eq!(*g, *e, epsilon = 1e-12);
        }
        assert_eq!(wv.grad().as_slice(), y.as_slice());
    }

    #[test]
    fn test_matmul_into_unit_batch_on_the_left() {
        let a0 = sample::<Rank3<1, 2, 3>>(1.0);
        let b0 = sample::<Rank3<2, 3, 4>>(0.5);
        let y = seed::<Rank3<2, 2, 4>>();

        let a = Var::new(a0.clone());
        let b = Var::new(b0.clone());
        let out: Op<'_, Tensor<f64, Rank3<2, 2, 4>>> = matmul_into(&a, &b);
        for batch in 0..2 {
            for (i, k) in [(0, 0), (1, 3)] {
                let expected: f64 =
                    (0..3).map(|j| a0.at(&[0, i, j]) * b0.at(&[batch, j, k])).sum();
                assert_abs_diff_eq!(out.value().at(&[batch, i, k]), expected, epsilon = 1e-12);
            }
        }
        out.backward(y.clone());

        let product = |a: &Tensor<f64, Rank3<1, 2, 3>>, b: &Tensor<f64, Rank3<2, 3, 4>>| {
            let p: Tensor<f64, Rank3<2, 2, 4>> = Tensor::from_fn(|n| {
                let (batch, i, k) = (n / 8, (n / 4) % 2, n % 4);
                (0..3).map(|j| a.at(&[0, i, j]) * b.at(&[batch, j, k])).sum()
            });
            weighted_sum(&p, &y)
        };
        check_grad(&a0, &a.grad(), |a| product(a, &b0));
        check_grad(&b0, &b.grad(), |b| product(&a0, b));
    }
}
