use ferrodiff::tensor::{mat_mul, zip_broadcast};
use ferrodiff::graph::add_into;
use ferrodiff::{Op, Rank1, Rank2, Rank3, Shape, Tensor, Var};
use ndarray::Ix2;
use proptest::prelude::*;

fn tensor<S: Shape>(values: Vec<f64>) -> Tensor<f64, S> {
    Tensor::from_vec(values).expect("strategy yields S::NUMEL elements")
}

fn elements<S: Shape>() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-5.0f64..5.0, S::NUMEL)
}

fn transpose<const R: usize, const C: usize>(
    t: &Tensor<f64, Rank2<R, C>>,
) -> Tensor<f64, Rank2<C, R>> {
    Tensor::from_fn(|i| t.at(&[i % R, i / R]))
}

fn assert_close(a: &[f64], b: &[f64]) -> Result<(), TestCaseError> {
    prop_assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(b) {
        prop_assert!((x - y).abs() <= 1e-9 * (1.0 + y.abs()), "{} vs {}", x, y);
    }
    Ok(())
}

proptest! {
    #[test]
    fn prop_fan_out_gradients_are_additive(
        x in -5.0f64..5.0,
        a in -3.0f64..3.0,
        b in -3.0f64..3.0,
    ) {
        let v = Var::new(x);
        (&v * a + &v * b + &v * &v).backward(1.0);
        let together = *v.grad();

        let mut separate = 0.0;
        for part in 0..3 {
            v.zero_grad();
            match part {
                0 => (&v * a).backward(1.0),
                1 => (&v * b).backward(1.0),
                _ => (&v * &v).backward(1.0),
            }
            separate += *v.grad();
        }
        prop_assert!((together - separate).abs() <= 1e-9);
        prop_assert!((together - (a + b + 2.0 * x)).abs() <= 1e-9);
    }

    #[test]
    fn prop_broadcast_is_commutative(
        xs in elements::<Rank2<3, 4>>(),
        ys in elements::<Rank1<4>>()
    ) {
        let x: Tensor<f64, Rank2<3, 4>> = tensor(xs);
        let y: Tensor<f64, Rank1<4>> = tensor(ys);
        let xy = &x + &y;
        let yx = &y + &x;
        assert_close(xy.as_slice(), yx.as_slice())?;
        assert_close((&x * &y).as_slice(), (&y * &x).as_slice())?;
    }

    #[test]
    fn prop_outer_broadcast_is_commutative(
        xs in elements::<Rank2<1, 3>>(),
        ys in elements::<Rank2<4, 1>>()
    ) {
        let x: Tensor<f64, Rank2<1, 3>> = tensor(xs);
        let y: Tensor<f64, Rank2<4, 1>> = tensor(ys);
        let xy: Tensor<f64, Rank2<4, 3>> = zip_broadcast(&x, &y, |a, b| a + b);
        let yx: Tensor<f64, Rank2<4, 3>> = zip_broadcast(&y, &x, |a, b| a + b);
        assert_close(xy.as_slice(), yx.as_slice())?;
        prop_assert_eq!(xy.at(&[2, 1]), x.at(&[0, 1]) + y.at(&[2, 0]));
    }

    #[test]
    fn prop_transpose_kernels_agree(
        xs in elements::<Rank2<3, 4>>(),
        ys in elements::<Rank2<4, 2>>()
    ) {
        let a: Tensor<f64, Rank2<3, 4>> = tensor(xs);
        let b: Tensor<f64, Rank2<4, 2>> = tensor(ys);
        let plain = mat_mul::<false, false, _, _, _>(&a, &b);
        let left = mat_mul::<true, false, _, _, _>(&transpose(&a), &b);
        let right = mat_mul::<false, true, _, _, _>(&a, &transpose(&b));
        assert_close(left.as_slice(), plain.as_slice())?;
        assert_close(right.as_slice(), plain.as_slice())?;
    }

    #[test]
    fn prop_matmul_matches_ndarray(
        xs in elements::<Rank2<5, 3>>(),
        ys in elements::<Rank2<3, 4>>()
    ) {
        let a: Tensor<f64, Rank2<5, 3>> = tensor(xs);
        let b: Tensor<f64, Rank2<3, 4>> = tensor(ys);
        let ours = a.matmul(&b);

        let na = a.to_ndarray().into_dimensionality::<Ix2>().unwrap();
        let nb = b.to_ndarray().into_dimensionality::<Ix2>().unwrap();
        let oracle = na.dot(&nb);
        assert_close(ours.as_slice(), oracle.as_slice().unwrap())?;
    }

    #[test]
    fn prop_batched_matmul_matches_per_slice(
        xs in elements::<Rank3<2, 3, 4>>(),
        ys in elements::<Rank2<4, 2>>()
    ) {
        let a: Tensor<f64, Rank3<2, 3, 4>> = tensor(xs);
        let b: Tensor<f64, Rank2<4, 2>> = tensor(ys);
        let batched = a.matmul(&b);
        for i in 0..2 {
            let single = a.slice(i).matmul(&b);
            assert_close(batched.slice(i).as_slice(), single.as_slice())?;
        }
    }

    #[test]
    fn prop_constants_do_not_change(xs in elements::<Rank1<4>>(), ws in elements::<Rank1<4>>()) {
        let c: Tensor<f64, Rank1<4>> = tensor(xs);
        let w = Var::new(tensor::<Rank1<4>>(ws));
        let before = c.clone();
        (&c * &w + &c).backward(Tensor::ones());
        prop_assert_eq!(&c, &before);
        assert_close(w.grad().as_slice(), c.as_slice())?;
    }

    #[test]
    fn prop_unit_axis_gradient_sums_over_batch(
        bs in elements::<Rank2<1, 3>>(),
        xs in elements::<Rank2<4, 3>>(),
        gs in elements::<Rank2<4, 3>>()
    ) {
        let g: Tensor<f64, Rank2<4, 3>> = tensor(gs);
        let column_sums: Vec<f64> = (0..3).map(|j| (0..4).map(|r| g.at(&[r, j])).sum()).collect();
        let b = Var::new(tensor::<Rank2<1, 3>>(bs));
        let x = Var::new(tensor::<Rank2<4, 3>>(xs));

        let left: Op<'_, Tensor<f64, Rank2<4, 3>>> = add_into(&b, &x);
        let right: Op<'_, Tensor<f64, Rank2<4, 3>>> = add_into(&x, &b);
        assert_close(left.value().as_slice(), right.value().as_slice())?;
        left.backward(g.clone());
        assert_close(b.grad().as_slice(), &column_sums)?;

        b.zero_grad();
        right.backward(g.clone());
        assert_close(b.grad().as_slice(), &column_sums)?;
        let twice: Vec<f64> = g.iter().map(|v| 2.0 * v).collect();
        assert_close(x.grad().as_slice(), &twice)?;
    }
}
